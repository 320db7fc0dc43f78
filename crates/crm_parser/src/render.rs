//! C3: renders a [`Tree`] plus its header material back into recipe text.

use crate::node::{MultilineVariant, Node, NodeId, NodeValue, Tree};
use crate::parse::SetStatement;

const INDENT_STEP: usize = 2;

/// Renders a full recipe document: top-of-file comments, then (for v0) `{% set %}` statements,
/// then the mapping tree.
pub fn render(tree: &Tree, top_of_file_comments: &[String], set_statements: &[SetStatement]) -> String {
    let mut out = String::new();

    for comment in top_of_file_comments {
        out.push_str(comment);
        out.push('\n');
    }

    if !set_statements.is_empty() {
        for stmt in set_statements {
            out.push_str(&render_set_statement(stmt));
            out.push('\n');
        }
        out.push('\n');
    }

    let root = tree.root();
    render_children(tree, root, 0, &mut out);

    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn render_set_statement(stmt: &SetStatement) -> String {
    match &stmt.comment {
        Some(c) => format!("{{% set {} = {} %}}  {}", stmt.name, stmt.expr, c),
        None => format!("{{% set {} = {} %}}", stmt.name, stmt.expr),
    }
}

fn render_children(tree: &Tree, parent: NodeId, depth: usize, out: &mut String) {
    for &child in tree.children(parent) {
        render_node(tree, child, depth, out);
    }
}

fn render_node(tree: &Tree, id: NodeId, depth: usize, out: &mut String) {
    let node = tree.get(id);
    let pad = " ".repeat(depth * INDENT_STEP);

    if node.value.is_sentinel() && node.comment.is_some() && !node.key_flag && !node.list_member_flag && node.children.is_empty() {
        out.push_str(&pad);
        out.push_str(node.comment.as_deref().unwrap_or_default());
        out.push('\n');
        return;
    }

    if node.list_member_flag {
        render_list_item(tree, node, depth, out);
        return;
    }

    if node.key_flag {
        render_key(tree, id, depth, out);
        return;
    }

    // A bare scalar/sentinel outside of a key or list context; shouldn't normally occur at the
    // top level, but render defensively.
    out.push_str(&pad);
    out.push_str(&render_scalar(&node.value, node.multiline_variant));
    out.push('\n');
}

fn render_key(tree: &Tree, id: NodeId, depth: usize, out: &mut String) {
    let node = tree.get(id);
    let pad = " ".repeat(depth * INDENT_STEP);
    let key = node.value.as_str().unwrap_or_default();

    if node.children.is_empty() {
        out.push_str(&pad);
        out.push_str(key);
        out.push_str(":\n");
        return;
    }

    if node.children.len() == 1 {
        let value_node = tree.get(node.children[0]);
        if !value_node.key_flag && !value_node.list_member_flag {
            out.push_str(&pad);
            out.push_str(key);
            out.push_str(": ");
            render_value_inline(tree, node.children[0], depth, out);
            if let Some(comment) = &node.comment {
                out.push_str("  ");
                out.push_str(comment);
            }
            out.push('\n');
            return;
        }
    }

    let comment = node.comment.clone();
    out.push_str(&pad);
    out.push_str(key);
    out.push(':');
    if let Some(comment) = &comment {
        out.push_str("  ");
        out.push_str(comment);
    }
    out.push('\n');
    render_children(tree, id, depth + 1, out);
}

fn render_value_inline(tree: &Tree, id: NodeId, depth: usize, out: &mut String) {
    let node = tree.get(id);
    if let NodeValue::MultilineString(lines) = &node.value {
        out.push_str(node.multiline_variant.marker());
        out.push('\n');
        let pad = " ".repeat((depth + 1) * INDENT_STEP);
        for line in lines {
            out.push_str(&pad);
            out.push_str(line);
            out.push('\n');
        }
        // render_key appends the trailing '\n' itself for the inline case; pop the extra one
        // from the last multiline body line so formatting stays one-newline-per-line.
        if out.ends_with('\n') {
            out.pop();
        }
    } else {
        out.push_str(&render_scalar(&node.value, node.multiline_variant));
    }
}

fn render_list_item(tree: &Tree, node: &Node, depth: usize, out: &mut String) {
    let pad = " ".repeat(depth * INDENT_STEP);
    out.push_str(&pad);
    out.push_str("- ");

    if node.children.is_empty() && !node.value.is_sentinel() {
        out.push_str(&render_scalar(&node.value, node.multiline_variant));
        if let Some(comment) = &node.comment {
            out.push_str("  ");
            out.push_str(comment);
        }
        out.push('\n');
        return;
    }

    if node.children.is_empty() {
        out.push('\n');
        return;
    }

    // A list item holding a nested mapping ("- key: value" plus further sibling keys).
    let first = tree.get(node.children[0]);
    if first.key_flag {
        let key = first.value.as_str().unwrap_or_default();
        if first.children.len() == 1 && !tree.get(first.children[0]).key_flag && !tree.get(first.children[0]).list_member_flag {
            out.push_str(key);
            out.push_str(": ");
            render_value_inline(tree, first.children[0], depth + 1, out);
            out.push('\n');
        } else {
            out.push_str(key);
            out.push_str(":\n");
            render_children(tree, node.children[0], depth + 2, out);
        }
        for &sibling in &node.children[1..] {
            render_node(tree, sibling, depth + 1, out);
        }
    } else {
        out.push('\n');
        for &child in &node.children {
            render_node(tree, child, depth + 1, out);
        }
    }
}

fn render_scalar(value: &NodeValue, variant: MultilineVariant) -> String {
    match value {
        NodeValue::Null => String::new(),
        NodeValue::Bool(b) => b.to_string(),
        NodeValue::Int(i) => i.to_string(),
        NodeValue::Float(f) => f.to_string(),
        NodeValue::String(s) => quote_if_needed(s),
        NodeValue::MultilineString(lines) => format!("{}\n{}", variant.marker(), lines.join("\n")),
        NodeValue::Sentinel => String::new(),
    }
}

/// A plain YAML scalar must be quoted if it would otherwise be parsed as a different type, or
/// if it contains a flow-breaking character.
fn quote_if_needed(s: &str) -> String {
    let needs_quote = s.is_empty()
        || s.parse::<i64>().is_ok()
        || s.parse::<f64>().is_ok()
        || matches!(s, "true" | "false" | "null" | "~" | "yes" | "no")
        || s.contains(": ")
        || s.contains(":\t")
        || s.contains('#')
        || s.starts_with(['-', '*', '&', '!', '|', '>', '\'', '"', '%', '@', '`'])
        || s.starts_with(' ')
        || s.ends_with(' ');
    if needs_quote {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn round_trips_a_flat_mapping() {
        let src = "package:\n  name: foo\n  version: \"1.0\"\n";
        let out = parse(src, false).unwrap();
        let rendered = render(&out.tree, &out.top_of_file_comments, &out.set_statements);
        assert!(rendered.contains("name: foo"));
        assert!(rendered.contains("version: \"1.0\""));
    }

    #[test]
    fn renders_set_statements_before_the_tree() {
        let src = "{% set version = \"1.2.3\" %}\npackage:\n  name: foo\n";
        let out = parse(src, false).unwrap();
        let rendered = render(&out.tree, &out.top_of_file_comments, &out.set_statements);
        let set_pos = rendered.find("{% set").unwrap();
        let pkg_pos = rendered.find("package:").unwrap();
        assert!(set_pos < pkg_pos);
    }

    #[test]
    fn renders_list_of_scalars_with_dash_prefix() {
        let src = "requirements:\n  host:\n    - python\n    - pip\n";
        let out = parse(src, false).unwrap();
        let rendered = render(&out.tree, &out.top_of_file_comments, &out.set_statements);
        assert!(rendered.contains("- python"));
        assert!(rendered.contains("- pip"));
    }
}

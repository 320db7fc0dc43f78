//! C3: the line-oriented parser. Builds a [`Tree`] from v0 (post-[`crate::format`]) or v1 text.

use crate::error::ParserError;
use crate::node::{CommentPosition, MultilineVariant, Node, NodeId, NodeValue, Tree};

/// A `{% set NAME = EXPR %}` statement recovered from v0 header text. Kept as raw text
/// alongside its parsed pieces so re-rendering can reproduce the original spacing when the
/// statement is untouched.
#[derive(Debug, Clone)]
pub struct SetStatement {
    pub name: String,
    pub expr: String,
    pub comment: Option<String>,
}

pub struct ParseOutput {
    pub tree: Tree,
    pub set_statements: Vec<SetStatement>,
    pub top_of_file_comments: Vec<String>,
}

struct Line<'a> {
    number: usize,
    indent: usize,
    content: &'a str,
}

pub fn parse(text: &str, force_remove_jinja: bool) -> Result<ParseOutput, ParserError> {
    if text.trim().is_empty() {
        return Err(ParserError::Empty);
    }

    let raw_lines: Vec<&str> = text.lines().collect();
    let mut idx = 0;

    let mut top_of_file_comments = Vec::new();
    while idx < raw_lines.len() {
        let trimmed = raw_lines[idx].trim();
        if trimmed.is_empty() {
            idx += 1;
            continue;
        }
        if trimmed.starts_with('#') {
            top_of_file_comments.push(trimmed.to_string());
            idx += 1;
            continue;
        }
        break;
    }

    let mut set_statements = Vec::new();
    loop {
        while idx < raw_lines.len() && raw_lines[idx].trim().is_empty() {
            idx += 1;
        }
        if idx >= raw_lines.len() {
            break;
        }
        let trimmed = raw_lines[idx].trim();
        if let Some(stmt) = parse_set_statement(trimmed) {
            set_statements.push(stmt);
            idx += 1;
            continue;
        }
        break;
    }

    let body_lines: Vec<Line> = raw_lines[idx..]
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| Line {
            number: idx + i + 1,
            indent: indent_of(l),
            content: l.trim_start(),
        })
        .collect();

    reject_unsupported_jinja(&body_lines, force_remove_jinja)?;

    let mut tree = Tree::new();
    let root = tree.root();
    let mut pos = 0;
    let base_indent = body_lines.first().map(|l| l.indent).unwrap_or(0);
    let children = parse_block(&body_lines, &mut pos, base_indent, &mut tree)?;
    for child in children {
        tree.get_mut(root).children.push(child);
    }

    Ok(ParseOutput {
        tree,
        set_statements,
        top_of_file_comments,
    })
}

fn reject_unsupported_jinja(lines: &[Line], force_remove_jinja: bool) -> Result<(), ParserError> {
    for line in lines {
        let t = line.content.trim();
        if (t.starts_with("{% if") || t.starts_with("{%if") || t.starts_with("{% for") || t.starts_with("{%for"))
            && !force_remove_jinja
        {
            return Err(ParserError::UnsupportedJinjaStatement { line: line.number });
        }
    }
    Ok(())
}

fn parse_set_statement(line: &str) -> Option<SetStatement> {
    let line = line.trim();
    let rest = line.strip_prefix("{% set ").or_else(|| line.strip_prefix("{%set "))?;
    let (body, comment) = match rest.find('#') {
        Some(i) => (&rest[..i], Some(rest[i..].trim().to_string())),
        None => (rest, None),
    };
    let body = body.trim().strip_suffix("%}")?.trim();
    let (name, expr) = body.split_once('=')?;
    Some(SetStatement {
        name: name.trim().to_string(),
        expr: expr.trim().to_string(),
        comment,
    })
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Parses all sibling entries at exactly `indent`, consuming lines from `*pos` until a line
/// with a lesser indent is found (the caller's scope ends) or input is exhausted.
fn parse_block(lines: &[Line], pos: &mut usize, indent: usize, tree: &mut Tree) -> Result<Vec<NodeId>, ParserError> {
    let mut siblings = Vec::new();
    let mut seen_keys: std::collections::HashSet<String> = std::collections::HashSet::new();

    while *pos < lines.len() {
        let line = &lines[*pos];
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            // Indentation increased without an owning parent at this level; malformed input.
            return Err(ParserError::Malformed {
                line: line.number,
                message: "unexpected indentation increase".to_string(),
            });
        }

        if line.content.starts_with('#') {
            let node = Node {
                comment: Some(line.content.to_string()),
                comment_position: CommentPosition::Default,
                line: line.number,
                ..Node::sentinel()
            };
            siblings.push(tree.push(node));
            *pos += 1;
            continue;
        }

        if line.content.starts_with('-') {
            let node_id = parse_list_item(lines, pos, indent, tree)?;
            siblings.push(node_id);
            continue;
        }

        let entry_line = line.number;
        let (key_node, key_name) = parse_mapping_entry(lines, pos, indent, tree)?;
        if let Some(name) = key_name {
            if !seen_keys.insert(name.clone()) {
                return Err(ParserError::DuplicateKey { line: entry_line, key: name });
            }
        }
        siblings.push(key_node);
    }

    Ok(siblings)
}

/// Splits `key: value[  # comment]` at the first unquoted `:` followed by whitespace or EOL.
fn split_key_value(content: &str) -> Option<(&str, &str)> {
    let bytes = content.as_bytes();
    let mut in_quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = in_quote {
            if c == q {
                in_quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            b'"' | b'\'' => in_quote = Some(c),
            b':' if i + 1 == bytes.len() || bytes[i + 1] == b' ' || bytes[i + 1] == b'\t' => {
                return Some((&content[..i], content[i + 1..].trim_start()));
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn split_trailing_comment(value: &str) -> (&str, Option<&str>) {
    if let Some(i) = find_unquoted_hash(value) {
        (value[..i].trim_end(), Some(value[i..].trim()))
    } else {
        (value, None)
    }
}

fn find_unquoted_hash(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut in_quote: Option<u8> = None;
    for (i, &c) in bytes.iter().enumerate() {
        if let Some(q) = in_quote {
            if c == q {
                in_quote = None;
            }
            continue;
        }
        match c {
            b'"' | b'\'' => in_quote = Some(c),
            b'#' => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_scalar(raw: &str) -> NodeValue {
    let raw = raw.trim();
    if raw.is_empty() {
        return NodeValue::Null;
    }
    if (raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2) || (raw.starts_with('\'') && raw.ends_with('\'') && raw.len() >= 2) {
        return NodeValue::String(raw[1..raw.len() - 1].to_string());
    }
    match raw {
        "true" | "True" | "yes" | "Yes" => return NodeValue::Bool(true),
        "false" | "False" | "no" | "No" => return NodeValue::Bool(false),
        "null" | "None" | "~" => return NodeValue::Null,
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return NodeValue::Int(i);
    }
    if raw.chars().next().map(|c| c.is_ascii_digit() || c == '-').unwrap_or(false) {
        if let Ok(f) = raw.parse::<f64>() {
            return NodeValue::Float(f);
        }
    }
    NodeValue::String(raw.to_string())
}

fn parse_mapping_entry(lines: &[Line], pos: &mut usize, indent: usize, tree: &mut Tree) -> Result<(NodeId, Option<String>), ParserError> {
    let line_no = lines[*pos].number;
    let content = lines[*pos].content;
    let Some((key, value)) = split_key_value(content) else {
        return Err(ParserError::Malformed {
            line: line_no,
            message: format!("expected `key: value`, got `{content}`"),
        });
    };
    *pos += 1;

    let mut key_node = Node {
        value: NodeValue::String(key.trim().trim_matches('"').trim_matches('\'').to_string()),
        key_flag: true,
        line: line_no,
        ..Node::sentinel()
    };

    if value.is_empty() {
        let child_indent = lines.get(*pos).map(|l| l.indent);
        if let Some(ci) = child_indent {
            if ci > indent {
                let children = parse_block(lines, pos, ci, tree)?;
                key_node.children = children;
            }
        }
        let id = tree.push(key_node);
        return Ok((id, Some(key.trim().to_string())));
    }

    if let Some(variant) = MultilineVariant::from_marker(value.trim()) {
        let (ml_lines, _) = consume_multiline(lines, pos, indent);
        key_node.multiline_variant = variant;
        let value_node = tree.push(Node {
            value: NodeValue::MultilineString(ml_lines),
            multiline_variant: variant,
            line: line_no,
            ..Node::sentinel()
        });
        key_node.children = vec![value_node];
        let id = tree.push(key_node);
        return Ok((id, Some(key.trim().to_string())));
    }

    let (scalar_text, comment) = split_trailing_comment(value);
    key_node.comment = comment.map(str::to_string);
    let value_node = tree.push(Node {
        value: parse_scalar(scalar_text),
        line: line_no,
        ..Node::sentinel()
    });
    key_node.children = vec![value_node];
    let id = tree.push(key_node);
    Ok((id, Some(key.trim().to_string())))
}

fn consume_multiline(lines: &[Line], pos: &mut usize, parent_indent: usize) -> (Vec<String>, usize) {
    let mut out = Vec::new();
    let body_indent = lines.get(*pos).map(|l| l.indent).filter(|i| *i > parent_indent);
    while *pos < lines.len() {
        let line = &lines[*pos];
        match body_indent {
            Some(bi) if line.indent >= bi => {
                out.push(line.content.to_string());
                *pos += 1;
            }
            _ => break,
        }
    }
    (out, body_indent.unwrap_or(parent_indent + 2))
}

fn parse_list_item(lines: &[Line], pos: &mut usize, indent: usize, tree: &mut Tree) -> Result<NodeId, ParserError> {
    let line_no = lines[*pos].number;
    let content = lines[*pos].content;
    let rest = content[1..].trim_start();
    *pos += 1;

    if rest.is_empty() {
        let child_indent = lines.get(*pos).map(|l| l.indent);
        let mut children = Vec::new();
        if let Some(ci) = child_indent {
            if ci > indent {
                children = parse_block(lines, pos, ci, tree)?;
            }
        }
        return Ok(tree.push(Node {
            list_member_flag: true,
            children,
            line: line_no,
            ..Node::sentinel()
        }));
    }

    if let Some((_key, _value)) = split_key_value(rest) {
        // `- key: value` — an inline first mapping key, with further keys possibly indented to
        // align with it on subsequent lines.
        let item_indent = indent + (content.len() - content.trim_start_matches('-').trim_start().len());
        let synthetic_indent = item_indent;
        let fabricated: Vec<Line> = std::iter::once(Line {
            number: line_no,
            indent: synthetic_indent,
            content: rest,
        })
        .collect();
        let mut fpos = 0;
        let (first_child, _) = parse_mapping_entry(&fabricated, &mut fpos, synthetic_indent.saturating_sub(2), tree)?;

        let mut children = vec![first_child];
        while *pos < lines.len() && lines[*pos].indent == synthetic_indent && !lines[*pos].content.starts_with('-') {
            let (child, _) = parse_mapping_entry(lines, pos, synthetic_indent, tree)?;
            children.push(child);
        }

        return Ok(tree.push(Node {
            list_member_flag: true,
            children,
            line: line_no,
            ..Node::sentinel()
        }));
    }

    if let Some(variant) = MultilineVariant::from_marker(rest.trim()) {
        let (ml_lines, _) = consume_multiline(lines, pos, indent);
        return Ok(tree.push(Node {
            value: NodeValue::MultilineString(ml_lines),
            multiline_variant: variant,
            list_member_flag: true,
            line: line_no,
            ..Node::sentinel()
        }));
    }

    let (scalar_text, comment) = split_trailing_comment(rest);
    Ok(tree.push(Node {
        value: parse_scalar(scalar_text),
        comment: comment.map(str::to_string),
        list_member_flag: true,
        line: line_no,
        ..Node::sentinel()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_flat_mapping() {
        let out = parse("package:\n  name: foo\n  version: \"1.0\"\n", false).unwrap();
        let root = out.tree.root();
        assert_eq!(out.tree.children(root).len(), 1);
    }

    #[test]
    fn parses_set_statements_at_the_head() {
        let out = parse("{% set version = \"1.2.3\" %}\npackage:\n  name: foo\n", false).unwrap();
        assert_eq!(out.set_statements.len(), 1);
        assert_eq!(out.set_statements[0].name, "version");
        assert_eq!(out.set_statements[0].expr, "\"1.2.3\"");
    }

    #[test]
    fn parses_list_of_scalars() {
        let out = parse("requirements:\n  host:\n    - python\n    - pip\n", false).unwrap();
        let root = out.tree.root();
        let reqs = out.tree.children(root)[0];
        let host = out.tree.children(reqs)[0];
        assert_eq!(out.tree.children(host).len(), 2);
    }

    #[test]
    fn empty_input_is_a_parsing_error() {
        assert!(parse("", false).is_err());
        assert!(parse("   \n  \n", false).is_err());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let result = parse("package:\n  name: foo\n  name: bar\n", false);
        assert!(matches!(result, Err(ParserError::DuplicateKey { .. })));
    }
}

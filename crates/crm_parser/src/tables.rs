//! C4: variable and selector tables.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::error::ParserError;
use crate::node::{NodeId, NodeValue, Tree};
use crate::parse::SetStatement;
use crm_jinja::{substitute, Dialect, Sandbox, Variable};
use crm_types::Primitive;

/// One textual definition of a variable. v0 recipes may define the same name more than once
/// (e.g. reassigned under different selectors further down the header); all definitions are
/// kept in source order and [`VariableTable::resolve`] left-folds over them sequentially,
/// matching the original evaluator's behaviour exactly (later definitions win, unconditionally —
/// no selector-aware branching is applied at evaluation time).
#[derive(Debug, Clone)]
pub struct NodeVar {
    pub name: String,
    pub raw_expr: String,
    pub comment: Option<String>,
    /// The definition's value when it needs no Jinja evaluation: a v0 `{% set %}` expression
    /// that parsed as a Python-style literal (or, failing that, its raw text, mirroring the
    /// original's `ast.literal_eval`-with-string-fallback), or a v1 `/context` scalar whose text
    /// carries no `{{ }}`/`${{ }}` substitution. `None` only for a v1 scalar that does carry
    /// substitution syntax, which must be evaluated against the sandbox at resolve time.
    pub literal: Option<Primitive>,
}

/// Maps a variable name to every textual definition found for it, in source order.
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    entries: IndexMap<String, Vec<NodeVar>>,
}

impl VariableTable {
    pub fn from_set_statements(statements: &[SetStatement]) -> Self {
        let mut entries: IndexMap<String, Vec<NodeVar>> = IndexMap::new();
        for stmt in statements {
            entries.entry(stmt.name.clone()).or_default().push(NodeVar {
                name: stmt.name.clone(),
                literal: Some(parse_v0_literal(&stmt.expr)),
                raw_expr: stmt.expr.clone(),
                comment: stmt.comment.clone(),
            });
        }
        VariableTable { entries }
    }

    /// v1 recipes declare variables as a flat `/context` mapping; each key has exactly one
    /// definition.
    pub fn from_context_tree(tree: &Tree, context_id: NodeId) -> Self {
        let mut entries: IndexMap<String, Vec<NodeVar>> = IndexMap::new();
        for &child in tree.children(context_id) {
            let node = tree.get(child);
            if !node.key_flag {
                continue;
            }
            let Some(name) = node.value.as_str() else { continue };
            let value_node = node.children.first().map(|&v| tree.get(v));
            let raw_expr = value_node.map(|n| n.value.to_search_string()).unwrap_or_default();
            let literal = if raw_expr.contains("{{") {
                None
            } else {
                Some(value_node.map(|n| primitive_from_node_value(&n.value)).unwrap_or(Primitive::Null))
            };
            entries.entry(name.to_string()).or_default().push(NodeVar {
                name: name.to_string(),
                raw_expr,
                comment: node.comment.clone(),
                literal,
            });
        }
        VariableTable { entries }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn definitions(&self, name: &str) -> Option<&[NodeVar]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Resolves every variable to a concrete [`Primitive`]. A variable with a single definition
    /// is returned as-is (its pre-parsed literal, or — for a v1 scalar with embedded `${{ }}`
    /// substitution — the sandbox-evaluated result); a variable redefined more than once (the
    /// v0 string-concatenation idiom) has each definition evaluated through the sandbox in
    /// source order, with the running result inserted back into scope after every step so the
    /// next definition can reference its own immediately-prior value.
    pub fn resolve(&self, sandbox: &Sandbox) -> Result<HashMap<String, Primitive>, ParserError> {
        let mut resolved: HashMap<String, Variable> = HashMap::new();
        for (name, defs) in &self.entries {
            let value = match defs.as_slice() {
                [single] => match &single.literal {
                    Some(p) => p.clone(),
                    None => resolve_templated_literal(&single.raw_expr, sandbox, &resolved)?,
                },
                _ => {
                    let mut value = Primitive::Null;
                    for def in defs {
                        value = sandbox.eval_primitive(&def.raw_expr, &resolved)?;
                        resolved.insert(name.clone(), Variable(value.clone()));
                    }
                    value
                }
            };
            resolved.insert(name.clone(), Variable(value));
        }
        Ok(resolved.into_iter().map(|(k, v)| (k, v.0)).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[NodeVar])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Parses a v0 `{% set %}` expression the way the original table builder does: try it as a
/// Python-style literal (int, float, `True`/`False`/`None`, a quoted string), and if that fails
/// fall back to the raw expression text as a plain string. The raw text is what lets the
/// multi-definition concatenation idiom (`{% set x = x + "_b" %}`) still evaluate correctly —
/// the fallback string is exactly the expression [`Sandbox::eval_primitive`] needs to see.
fn parse_v0_literal(expr: &str) -> Primitive {
    let t = expr.trim();
    if let Ok(i) = t.parse::<i64>() {
        return Primitive::Int(i);
    }
    if let Ok(f) = t.parse::<f64>() {
        return Primitive::Float(f);
    }
    match t {
        "True" => return Primitive::Bool(true),
        "False" => return Primitive::Bool(false),
        "None" => return Primitive::Null,
        _ => {}
    }
    let quoted = t.len() >= 2
        && ((t.starts_with('"') && t.ends_with('"')) || (t.starts_with('\'') && t.ends_with('\'')));
    if quoted {
        return Primitive::Str(t[1..t.len() - 1].to_string());
    }
    Primitive::Str(expr.to_string())
}

fn primitive_from_node_value(value: &NodeValue) -> Primitive {
    match value {
        NodeValue::Null | NodeValue::Sentinel => Primitive::Null,
        NodeValue::Bool(b) => Primitive::Bool(*b),
        NodeValue::Int(i) => Primitive::Int(*i),
        NodeValue::Float(f) => Primitive::Float(*f),
        NodeValue::String(s) => Primitive::Str(s.clone()),
        NodeValue::MultilineString(lines) => Primitive::Str(lines.join("\n")),
    }
}

/// Evaluates a v1 `/context` scalar that carries `${{ }}`/`{{ }}` substitution. A value that is
/// wholly one such span (nothing outside it) is evaluated as a single expression, preserving its
/// type (e.g. a context entry aliasing another as a number); anything else is treated as a
/// string with embedded substitutions and rendered through [`substitute`].
fn resolve_templated_literal(raw_expr: &str, sandbox: &Sandbox, vars: &HashMap<String, Variable>) -> Result<Primitive, ParserError> {
    if let Some(expr) = full_template_expr(raw_expr) {
        return Ok(sandbox.eval_primitive(expr, vars)?);
    }
    let (rendered, _warnings) = substitute(raw_expr, Dialect::V1, sandbox, vars);
    Ok(Primitive::Str(rendered))
}

fn full_template_expr(text: &str) -> Option<&str> {
    let t = text.trim();
    let inner = t.strip_prefix("${{").or_else(|| t.strip_prefix("{{"))?;
    inner.strip_suffix("}}").map(str::trim)
}

/// One occurrence of a selector comment attached to a node, recorded by the path it governs.
#[derive(Debug, Clone)]
pub struct SelectorInfo {
    pub raw: String,
    pub path: crate::path::Path,
}

/// Maps a selector's raw text (e.g. `[win]`) to every path it was found attached to.
#[derive(Debug, Clone, Default)]
pub struct SelectorTable {
    entries: IndexMap<String, Vec<SelectorInfo>>,
}

impl SelectorTable {
    pub fn build(tree: &Tree) -> Self {
        let mut entries: IndexMap<String, Vec<SelectorInfo>> = IndexMap::new();
        let mut paths: HashMap<NodeId, crate::path::Path> = HashMap::new();
        paths.insert(tree.root(), crate::path::Path::root());

        // walk() is pre-order, so a parent's path is always recorded before its children are
        // visited and can derive their own path from it.
        for id in tree.walk() {
            let parent_path = paths.get(&id).cloned().unwrap_or_else(crate::path::Path::root);
            for (idx, &child) in tree.children(id).iter().enumerate() {
                let child_node = tree.get(child);
                let child_path = if child_node.key_flag {
                    parent_path.push_key(child_node.value.as_str().unwrap_or_default())
                } else {
                    parent_path.push_index(idx)
                };
                paths.entry(child).or_insert(child_path);
            }
        }

        for id in tree.walk() {
            let node = tree.get(id);
            let Some(comment) = &node.comment else { continue };
            let Some(raw) = crm_selector::extract_bracketed(comment) else { continue };
            let path = paths.get(&id).cloned().unwrap_or_else(crate::path::Path::root);
            entries.entry(format!("[{raw}]")).or_default().push(SelectorInfo { raw: raw.to_string(), path });
        }

        SelectorTable { entries }
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.entries.contains_key(raw)
    }

    pub fn paths_for(&self, raw: &str) -> Vec<crate::path::Path> {
        self.entries.get(raw).map(|v| v.iter().map(|i| i.path.clone()).collect()).unwrap_or_default()
    }

    pub fn paths(&self) -> Vec<crate::path::Path> {
        self.entries.values().flatten().map(|i| i.path.clone()).collect()
    }

    pub fn at_path(&self, path: &crate::path::Path) -> Option<&str> {
        self.entries.iter().find(|(_, infos)| infos.iter().any(|i| &i.path == path)).map(|(raw, _)| raw.as_str())
    }
}

pub fn dialect_for(schema: crate::schema::SchemaVersion) -> Dialect {
    match schema {
        crate::schema::SchemaVersion::V0 => Dialect::V0,
        crate::schema::SchemaVersion::V1 => Dialect::V1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn resolves_sequential_redefinitions_left_to_right() {
        let src = "{% set x = 1 %}\n{% set x = x + 1 %}\npackage:\n  name: foo\n";
        let out = parse(src, false).unwrap();
        let table = VariableTable::from_set_statements(&out.set_statements);
        let sandbox = Sandbox::new();
        let resolved = table.resolve(&sandbox).unwrap();
        assert_eq!(resolved.get("x"), Some(&Primitive::Int(2)));
    }

    #[test]
    fn a_redefinition_sees_its_own_prior_value_not_just_other_variables() {
        // Each `x` redefinition depends on the one immediately before it, not on `y` at all —
        // this only resolves correctly if `resolved` is updated after every definition, not once
        // after the whole chain.
        let src = "{% set x = 1 %}\n{% set x = x + 1 %}\n{% set x = x + 1 %}\npackage:\n  name: foo\n";
        let out = parse(src, false).unwrap();
        let table = VariableTable::from_set_statements(&out.set_statements);
        let sandbox = Sandbox::new();
        let resolved = table.resolve(&sandbox).unwrap();
        assert_eq!(resolved.get("x"), Some(&Primitive::Int(3)));
    }

    #[test]
    fn a_single_v0_definition_is_returned_literally_without_jinja_evaluation() {
        // `env.get` is not a literal, but with a single definition it must never be run through
        // the sandbox at all — it should come back as the raw expression text, unevaluated.
        let src = "{% set channel_targets = env.get(\"CHANNEL_TARGETS\", \"\") %}\npackage:\n  name: foo\n";
        let out = parse(src, false).unwrap();
        let table = VariableTable::from_set_statements(&out.set_statements);
        let sandbox = Sandbox::new();
        let resolved = table.resolve(&sandbox).unwrap();
        assert_eq!(resolved.get("channel_targets"), Some(&Primitive::Str("env.get(\"CHANNEL_TARGETS\", \"\")".to_string())));
    }

    #[test]
    fn v1_context_scalars_resolve_to_their_literal_yaml_type() {
        let src = "schema_version: 1\ncontext:\n  name: cool-package\n  build_number: 2\npackage:\n  name: foo\n";
        let out = parse(src, false).unwrap();
        let context_id = out.tree.find_key_child(out.tree.root(), "context").unwrap();
        let table = VariableTable::from_context_tree(&out.tree, context_id);
        let sandbox = Sandbox::new();
        let resolved = table.resolve(&sandbox).unwrap();
        assert_eq!(resolved.get("name"), Some(&Primitive::Str("cool-package".to_string())));
        assert_eq!(resolved.get("build_number"), Some(&Primitive::Int(2)));
    }

    #[test]
    fn v1_context_scalars_with_substitution_are_rendered_against_other_context_vars() {
        let src = "schema_version: 1\ncontext:\n  name: foo\n  version: \"1.0\"\n  full: \"${{ name }}-${{ version }}\"\npackage:\n  name: foo\n";
        let out = parse(src, false).unwrap();
        let context_id = out.tree.find_key_child(out.tree.root(), "context").unwrap();
        let table = VariableTable::from_context_tree(&out.tree, context_id);
        let sandbox = Sandbox::new();
        let resolved = table.resolve(&sandbox).unwrap();
        assert_eq!(resolved.get("full"), Some(&Primitive::Str("foo-1.0".to_string())));
    }

    #[test]
    fn selector_table_records_paths_for_commented_nodes() {
        let src = "build:\n  number: 0  # [win]\n";
        let out = parse(src, false).unwrap();
        let table = SelectorTable::build(&out.tree);
        assert!(table.contains("[win]"));
    }
}

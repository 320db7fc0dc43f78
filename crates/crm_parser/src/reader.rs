//! C5: read-only access to a parsed recipe.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::ParserError;
use crate::format::format_text;
use crate::node::{NodeId, NodeValue, Tree};
use crate::parse::{parse, SetStatement};
use crate::path::{Path, PathPart};
use crate::render::render;
use crate::schema::SchemaVersion;
use crate::tables::{dialect_for, SelectorTable, VariableTable};
use crm_jinja::{substitute, Sandbox};
use crm_selector::{BuildContext, Selector};
use crm_types::Primitive;

/// A parsed, read-only view of a recipe file. Mutation lives on [`crate::patch::Parser`], which
/// wraps a `Reader` and adds the JSON-Patch surface — every read operation on `Parser` simply
/// delegates here.
pub struct Reader {
    pub(crate) tree: Tree,
    pub(crate) top_of_file_comments: Vec<String>,
    pub(crate) set_statements: Vec<SetStatement>,
    pub(crate) schema: SchemaVersion,
    pub(crate) variables: VariableTable,
    pub(crate) selectors: SelectorTable,
    original_text: String,
}

impl Reader {
    pub fn new(text: &str) -> Result<Self, ParserError> {
        let schema = SchemaVersion::detect(text);
        let formatted = format_text(text);
        let parsed = parse(&formatted.text, false)?;

        let variables = match schema {
            SchemaVersion::V0 => VariableTable::from_set_statements(&parsed.set_statements),
            SchemaVersion::V1 => parsed
                .tree
                .find_key_child(parsed.tree.root(), "context")
                .map(|id| VariableTable::from_context_tree(&parsed.tree, id))
                .unwrap_or_default(),
        };
        let selectors = SelectorTable::build(&parsed.tree);

        Ok(Reader {
            tree: parsed.tree,
            top_of_file_comments: parsed.top_of_file_comments,
            set_statements: parsed.set_statements,
            schema,
            variables,
            selectors,
            original_text: text.to_string(),
        })
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.schema
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    fn resolve_path(&self, path: &Path) -> Option<NodeId> {
        let mut current = self.tree.root();
        for part in path.parts() {
            match part {
                PathPart::Key(key) => {
                    current = self.tree.find_key_child(current, key)?;
                }
                PathPart::Index(i) => {
                    current = *self.tree.children(current).get(*i)?;
                }
            }
        }
        Some(current)
    }

    pub fn contains_value(&self, path: &Path) -> bool {
        self.resolve_path(path).is_some()
    }

    /// Returns the scalar value at `path`. If the node has exactly one unnamed child (the
    /// usual mapping-value shape), that child's value is returned instead of the sentinel key
    /// node itself.
    pub fn get_value(&self, path: &Path) -> Result<&NodeValue, ParserError> {
        let id = self.resolve_path(path).ok_or_else(|| ParserError::PathNotFound { path: path.clone() })?;
        let node = self.tree.get(id);
        if node.value.is_sentinel() {
            if node.children.len() == 1 && !self.tree.get(node.children[0]).key_flag {
                return Ok(&self.tree.get(node.children[0]).value);
            }
            return Err(ParserError::SentinelRead { path: path.clone() });
        }
        Ok(&node.value)
    }

    /// Lists every path below `base` that resolves to a list (a node whose children are all
    /// flagged `list_member_flag`).
    pub fn list_value_paths(&self, base: &Path) -> Vec<Path> {
        let Some(base_id) = self.resolve_path(base) else { return Vec::new() };
        let mut out = Vec::new();
        self.collect_list_paths(base_id, base.clone(), &mut out);
        out
    }

    fn collect_list_paths(&self, id: NodeId, path: Path, out: &mut Vec<Path>) {
        let children = self.tree.children(id);
        if !children.is_empty() && children.iter().all(|&c| self.tree.get(c).list_member_flag) {
            out.push(path.clone());
        }
        for (idx, &child) in children.iter().enumerate() {
            let child_node = self.tree.get(child);
            let child_path = if child_node.key_flag {
                path.push_key(child_node.value.as_str().unwrap_or_default())
            } else {
                path.push_index(idx)
            };
            self.collect_list_paths(child, child_path, out);
        }
    }

    /// Substring search over every leaf's stringified value, returning the owning paths.
    pub fn search(&self, needle: &str) -> Vec<Path> {
        let mut out = Vec::new();
        self.search_node(self.tree.root(), Path::root(), needle, &mut out);
        out
    }

    fn search_node(&self, id: NodeId, path: Path, needle: &str, out: &mut Vec<Path>) {
        let node = self.tree.get(id);
        if node.is_leaf() && node.value.to_search_string().contains(needle) {
            out.push(path.clone());
        }
        for (idx, &child) in self.tree.children(id).iter().enumerate() {
            let child_node = self.tree.get(child);
            let child_path = if child_node.key_flag {
                path.push_key(child_node.value.as_str().unwrap_or_default())
            } else {
                path.push_index(idx)
            };
            self.search_node(child, child_path, needle, out);
        }
    }

    pub fn find_value(&self, needle: &str) -> Option<Path> {
        self.search(needle).into_iter().next()
    }

    pub fn list_variables(&self) -> Vec<&str> {
        self.variables.names().collect()
    }

    pub fn contains_variable(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    pub fn get_variable(&self, name: &str, build_env_vars: &HashMap<String, Primitive>) -> Result<Primitive, ParserError> {
        let sandbox = Sandbox::new();
        let mut resolved = self.variables.resolve(&sandbox)?;
        resolved.extend(build_env_vars.clone());
        resolved.get(name).cloned().ok_or_else(|| ParserError::Malformed {
            line: 0,
            message: format!("no such variable `{name}`"),
        })
    }

    /// Every `{{ NAME }}` / `${{ NAME }}` reference to `name` found anywhere in the recipe
    /// text, scanned as raw substrings rather than by walking the tree (references can appear
    /// inside any scalar, including ones the tree doesn't model specially).
    pub fn get_variable_references(&self, name: &str) -> Vec<Path> {
        let needle_v0 = format!("{{{{ {name} }}}}");
        let needle_v1 = format!("${{{{ {name} }}}}");
        let mut out = self.search(&needle_v0);
        out.extend(self.search(&needle_v1));
        out
    }

    pub fn list_selectors(&self) -> Vec<String> {
        self.selectors.paths().into_iter().filter_map(|p| self.selectors.at_path(&p).map(str::to_string)).collect()
    }

    pub fn contains_selector(&self, raw: &str) -> bool {
        self.selectors.contains(raw)
    }

    pub fn get_selector_paths(&self, raw: &str) -> Vec<Path> {
        self.selectors.paths_for(raw)
    }

    pub fn contains_selector_at_path(&self, path: &Path) -> bool {
        self.selectors.at_path(path).is_some()
    }

    pub fn get_selector_at_path(&self, path: &Path) -> Option<Selector> {
        let raw = self.selectors.at_path(path)?;
        let inner = crm_selector::extract_bracketed(raw).unwrap_or(raw.trim_start_matches('[').trim_end_matches(']'));
        Selector::parse(inner).ok()
    }

    /// Builds a path -> trailing-comment map for every node carrying one (selectors included).
    /// Every variable's textual definitions, in source order, including any attached comment.
    pub fn variable_definitions(&self, name: &str) -> Option<&[crate::tables::NodeVar]> {
        self.variables.definitions(name)
    }

    /// Every recorded selector use, as `(bracketed expression, path)` pairs, e.g. `("[win]",
    /// /build/number)`.
    pub fn selector_table_entries(&self) -> Vec<(String, Path)> {
        self.selectors
            .paths()
            .into_iter()
            .filter_map(|p| self.selectors.at_path(&p).map(|raw| (raw.to_string(), p)))
            .collect()
    }

    /// True if the node at `path` is a list member (preceded by `-` in its original rendering).
    pub fn is_list_member(&self, path: &Path) -> bool {
        self.resolve_path(path).is_some_and(|id| self.tree.get(id).list_member_flag)
    }

    pub fn get_comments_table(&self) -> HashMap<Path, String> {
        let mut out = HashMap::new();
        self.collect_comments(self.tree.root(), Path::root(), &mut out);
        out
    }

    fn collect_comments(&self, id: NodeId, path: Path, out: &mut HashMap<Path, String>) {
        let node = self.tree.get(id);
        if let Some(comment) = &node.comment {
            out.insert(path.clone(), comment.clone());
        }
        for (idx, &child) in self.tree.children(id).iter().enumerate() {
            let child_node = self.tree.get(child);
            let child_path = if child_node.key_flag {
                path.push_key(child_node.value.as_str().unwrap_or_default())
            } else {
                path.push_index(idx)
            };
            self.collect_comments(child, child_path, out);
        }
    }

    pub fn get_recipe_name(&self) -> Option<String> {
        let package = self.tree.find_key_child(self.tree.root(), "package").or_else(|| {
            self.tree
                .find_key_child(self.tree.root(), "outputs")
                .and_then(|outputs| self.tree.children(outputs).first().copied())
                .and_then(|first_output| self.tree.find_key_child(first_output, "package"))
        })?;
        let name_node = self.tree.find_key_child(package, "name")?;
        self.tree.children(name_node).first().and_then(|&c| self.tree.get(c).value.as_str().map(str::to_string))
    }

    pub fn get_package_paths(&self) -> Vec<Path> {
        let mut out = Vec::new();
        if self.tree.find_key_child(self.tree.root(), "package").is_some() {
            out.push(Path::root().push_key("package"));
        }
        if let Some(outputs) = self.tree.find_key_child(self.tree.root(), "outputs") {
            for (idx, &output) in self.tree.children(outputs).iter().enumerate() {
                if self.tree.find_key_child(output, "package").is_some() {
                    out.push(Path::root().push_key("outputs").push_index(idx).push_key("package"));
                }
            }
        }
        out
    }

    pub fn get_dependency_paths(&self) -> Vec<Path> {
        let mut out = Vec::new();
        for package_path in self.get_package_paths() {
            let base = package_path.parent().unwrap_or_else(Path::root);
            if let Some(requirements) = self.resolve_path(&base.push_key("requirements")) {
                for &section in self.tree.children(requirements) {
                    let section_node = self.tree.get(section);
                    if let Some(name) = section_node.value.as_str() {
                        out.push(base.push_key("requirements").push_key(name));
                    }
                }
            }
        }
        out
    }

    pub fn is_multi_output(&self) -> bool {
        self.tree.find_key_child(self.tree.root(), "outputs").is_some()
    }

    pub fn is_python_recipe(&self) -> bool {
        self.get_dependency_paths().iter().any(|p| p.to_string().contains("/requirements/host") || p.to_string().contains("/requirements/run"))
            && self.search("python").iter().any(|p| p.to_string().contains("requirements"))
    }

    /// SHA-256 of the current rendered text, not the original source — so it reflects patches
    /// applied since the reader was constructed.
    pub fn calc_sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.render().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn render(&self) -> String {
        render(&self.tree, &self.top_of_file_comments, &self.set_statements)
    }

    /// Renders to a generic JSON value, suitable for diffing or external tooling; sentinel
    /// key nodes become JSON objects/arrays, leaf nodes become their scalar JSON representation.
    pub fn render_to_object(&self) -> serde_json::Value {
        self.node_to_json(self.tree.root())
    }

    fn node_to_json(&self, id: NodeId) -> serde_json::Value {
        let node = self.tree.get(id);
        if node.is_leaf() {
            return node.value.to_json();
        }
        let children = self.tree.children(id);
        if !children.is_empty() && children.iter().all(|&c| self.tree.get(c).list_member_flag) {
            return serde_json::Value::Array(children.iter().map(|&c| self.node_to_json(c)).collect());
        }
        let mut map = serde_json::Map::new();
        for &child in children {
            let child_node = self.tree.get(child);
            if let Some(key) = child_node.value.as_str() {
                map.insert(key.to_string(), if child_node.children.len() == 1 && !self.tree.get(child_node.children[0]).key_flag {
                    self.node_to_json(child_node.children[0])
                } else {
                    self.node_to_json(child)
                });
            }
        }
        serde_json::Value::Object(map)
    }

    /// Substitutes every `{{ }}`/`${{ }}` expression in `text` using this recipe's resolved
    /// variable table plus `build_env_vars`.
    pub fn substitute_text(&self, text: &str, build_env_vars: &HashMap<String, Primitive>) -> Result<String, ParserError> {
        let sandbox = Sandbox::new();
        let resolved = self.variables.resolve(&sandbox)?;
        let mut vars: HashMap<String, crm_jinja::Variable> = resolved.into_iter().map(|(k, v)| (k, crm_jinja::Variable(v))).collect();
        for (k, v) in build_env_vars {
            vars.insert(k.clone(), crm_jinja::Variable(v.clone()));
        }
        let (rendered, _warnings) = substitute(text, dialect_for(self.schema), &sandbox, &vars);
        Ok(rendered)
    }

    pub fn build_context(&self, platform: crm_selector::Platform, build_env_vars: HashMap<String, Primitive>) -> Result<BuildContext, ParserError> {
        Ok(BuildContext::new(platform, build_env_vars)?)
    }

    /// Appends `ext` to `base`, normalizing slashes — pure path algebra, no tree lookup.
    pub fn append_to_path(&self, base: &Path, ext: &str) -> Path {
        Path::append(&base.to_string(), ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_scalar_value_at_a_path() {
        let reader = Reader::new("package:\n  name: foo\n  version: \"1.0\"\n").unwrap();
        let path: Path = "/package/name".parse().unwrap();
        assert_eq!(reader.get_value(&path).unwrap().as_str(), Some("foo"));
    }

    #[test]
    fn lists_variables_from_set_statements() {
        let reader = Reader::new("{% set version = \"1.0\" %}\npackage:\n  name: foo\n").unwrap();
        assert!(reader.contains_variable("version"));
    }

    #[test]
    fn finds_selector_paths() {
        let reader = Reader::new("build:\n  number: 0  # [win]\n").unwrap();
        assert!(reader.contains_selector("[win]"));
        assert!(!reader.get_selector_paths("[win]").is_empty());
    }

    #[test]
    fn recipe_name_is_read_from_the_package_section() {
        let reader = Reader::new("package:\n  name: my-pkg\n  version: \"1.0\"\n").unwrap();
        assert_eq!(reader.get_recipe_name().as_deref(), Some("my-pkg"));
    }

    #[test]
    fn missing_path_is_an_error() {
        let reader = Reader::new("package:\n  name: foo\n").unwrap();
        let path: Path = "/package/missing".parse().unwrap();
        assert!(matches!(reader.get_value(&path), Err(ParserError::PathNotFound { .. })));
    }
}

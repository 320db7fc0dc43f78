//! C6: JSON-Patch-style mutation over the parse tree.

use similar::TextDiff;

use crate::error::ParserError;
use crate::node::{Node, NodeId, NodeValue};
use crate::path::{Path, PathPart};
use crate::reader::Reader;

/// One RFC 6902-style operation. `value` is `None` for `remove`; `from` is only set for
/// `move`/`copy`.
#[derive(Debug, Clone)]
pub enum PatchOp {
    Add { path: Path, value: serde_json::Value },
    Remove { path: Path },
    Replace { path: Path, value: serde_json::Value },
    Move { from: Path, path: Path },
    Copy { from: Path, path: Path },
    Test { path: Path, value: serde_json::Value },
}

/// How a conflicting existing selector/dependency should be handled by a convenience mutator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictMode {
    /// Fail with [`ParserError::InvalidPatch`] if something is already there.
    Error,
    /// Silently replace whatever is already there.
    Replace,
    /// Leave the existing entry and skip the operation.
    Skip,
}

/// A [`Reader`] plus the mutable JSON-Patch surface. Every read operation delegates to the
/// inner reader; every write goes through [`Parser::patch`] so the modification flag and variable
/// table stay consistent.
pub struct Parser {
    reader: Reader,
    modified: bool,
}

impl std::ops::Deref for Parser {
    type Target = Reader;
    fn deref(&self) -> &Reader {
        &self.reader
    }
}

impl Parser {
    pub fn new(text: &str) -> Result<Self, ParserError> {
        Ok(Parser {
            reader: Reader::new(text)?,
            modified: false,
        })
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    fn resolve(&self, path: &Path) -> Option<NodeId> {
        let mut current = self.reader.tree.root();
        for part in path.parts() {
            match part {
                PathPart::Key(key) => current = self.reader.tree.find_key_child(current, key)?,
                PathPart::Index(i) => current = *self.reader.tree.children(current).get(*i)?,
            }
        }
        Some(current)
    }

    fn rebuild_tables(&mut self) {
        self.reader.selectors = crate::tables::SelectorTable::build(&self.reader.tree);
        self.reader.variables = match self.reader.schema {
            crate::schema::SchemaVersion::V0 => crate::tables::VariableTable::from_set_statements(&self.reader.set_statements),
            crate::schema::SchemaVersion::V1 => self
                .reader
                .tree
                .find_key_child(self.reader.tree.root(), "context")
                .map(|id| crate::tables::VariableTable::from_context_tree(&self.reader.tree, id))
                .unwrap_or_default(),
        };
    }

    pub fn patch(&mut self, op: PatchOp) -> Result<(), ParserError> {
        match op {
            PatchOp::Test { path, value } => {
                let actual = self.reader.render_to_object_at(&path)?;
                if actual != value {
                    return Err(ParserError::InvalidPatch(format!("test failed at `{path}`: expected {value}, found {actual}")));
                }
                Ok(())
            }
            PatchOp::Remove { path } => self.op_remove(&path),
            PatchOp::Add { path, value } => self.op_add(&path, &value),
            PatchOp::Replace { path, value } => {
                self.op_remove(&path).ok();
                self.op_add(&path, &value)
            }
            PatchOp::Move { from, path } => {
                let value = self.reader.render_to_object_at(&from)?;
                self.op_remove(&from)?;
                self.op_add(&path, &value)
            }
            PatchOp::Copy { from, path } => {
                let value = self.reader.render_to_object_at(&from)?;
                self.op_add(&path, &value)
            }
        }
    }

    fn op_remove(&mut self, path: &Path) -> Result<(), ParserError> {
        let Some(parent_path) = path.parent() else {
            return Err(ParserError::InvalidPatch("cannot remove the document root".to_string()));
        };
        let parent_id = self.resolve(&parent_path).ok_or_else(|| ParserError::PathNotFound { path: path.clone() })?;
        let id = self.resolve(path).ok_or_else(|| ParserError::PathNotFound { path: path.clone() })?;
        let children = &mut self.reader.tree.get_mut(parent_id).children;
        let idx = children.iter().position(|&c| c == id).ok_or_else(|| ParserError::PathNotFound { path: path.clone() })?;
        children.remove(idx);
        self.modified = true;
        self.rebuild_tables();
        Ok(())
    }

    fn op_add(&mut self, path: &Path, value: &serde_json::Value) -> Result<(), ParserError> {
        let Some(parent_path) = path.parent() else {
            return Err(ParserError::InvalidPatch("cannot add the document root".to_string()));
        };
        let parent_id = self.resolve(&parent_path).ok_or_else(|| ParserError::PathNotFound { path: parent_path.clone() })?;

        match path.last() {
            Some(PathPart::Key(key)) => {
                if let Some(existing) = self.reader.tree.find_key_child(parent_id, key) {
                    let replacement = self.build_value_children(value);
                    self.reader.tree.get_mut(existing).children = replacement;
                } else {
                    let key_id = self.build_key_node(key, value);
                    self.reader.tree.get_mut(parent_id).children.push(key_id);
                }
            }
            Some(PathPart::Index(i)) => {
                let item_id = self.build_list_item(value);
                let children = &mut self.reader.tree.get_mut(parent_id).children;
                let insert_at = (*i).min(children.len());
                children.insert(insert_at, item_id);
            }
            None => return Err(ParserError::InvalidPatch("cannot add at the document root".to_string())),
        }

        self.modified = true;
        self.rebuild_tables();
        Ok(())
    }

    fn build_key_node(&mut self, key: &str, value: &serde_json::Value) -> NodeId {
        let children = self.build_value_children(value);
        self.reader.tree.push(Node {
            value: NodeValue::String(key.to_string()),
            key_flag: true,
            children,
            ..Node::sentinel()
        })
    }

    fn build_value_children(&mut self, value: &serde_json::Value) -> Vec<NodeId> {
        match value {
            serde_json::Value::Object(map) => map.iter().map(|(k, v)| self.build_key_node(k, v)).collect(),
            serde_json::Value::Array(items) => items.iter().map(|v| self.build_list_item(v)).collect(),
            scalar => {
                let node_value = NodeValue::from_json_scalar(scalar).unwrap_or(NodeValue::Null);
                vec![self.reader.tree.push(Node::scalar(node_value))]
            }
        }
    }

    fn build_list_item(&mut self, value: &serde_json::Value) -> NodeId {
        match value {
            serde_json::Value::Object(map) => {
                let children = map.iter().map(|(k, v)| self.build_key_node(k, v)).collect();
                self.reader.tree.push(Node {
                    list_member_flag: true,
                    children,
                    ..Node::sentinel()
                })
            }
            scalar => {
                let node_value = NodeValue::from_json_scalar(scalar).unwrap_or(NodeValue::Null);
                self.reader.tree.push(Node {
                    value: node_value,
                    list_member_flag: true,
                    ..Node::sentinel()
                })
            }
        }
    }

    /// Replaces every occurrence of `needle` found in leaf scalars with `replacement`, reusing
    /// [`Reader::search`] for discovery.
    pub fn search_and_patch_replace(&mut self, needle: &str, replacement: &str) -> Result<usize, ParserError> {
        let paths = self.reader.search(needle);
        let mut count = 0;
        for path in &paths {
            if let Ok(value) = self.reader.get_value(path) {
                let replaced = value.to_search_string().replace(needle, replacement);
                self.op_add(path, &serde_json::Value::String(replaced))?;
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn set_variable(&mut self, name: &str, expr: &str) -> Result<(), ParserError> {
        match self.reader.schema {
            crate::schema::SchemaVersion::V0 => {
                if let Some(existing) = self.reader.set_statements.iter_mut().find(|s| s.name == name) {
                    existing.expr = expr.to_string();
                } else {
                    self.reader.set_statements.push(crate::parse::SetStatement {
                        name: name.to_string(),
                        expr: expr.to_string(),
                        comment: None,
                    });
                }
            }
            crate::schema::SchemaVersion::V1 => {
                let context_id = self.resolve(&Path::root().push_key("context")).ok_or_else(|| {
                    ParserError::InvalidPatch("no /context section to set a variable in".to_string())
                })?;
                if let Some(existing) = self.reader.tree.find_key_child(context_id, name) {
                    let value_node = self.reader.tree.push(Node::scalar(NodeValue::String(expr.to_string())));
                    self.reader.tree.get_mut(existing).children = vec![value_node];
                } else {
                    let key_id = self.build_key_node(name, &serde_json::Value::String(expr.to_string()));
                    self.reader.tree.get_mut(context_id).children.push(key_id);
                }
            }
        }
        self.modified = true;
        self.rebuild_tables();
        Ok(())
    }

    pub fn add_variable(&mut self, name: &str, expr: &str) -> Result<(), ParserError> {
        if self.reader.variables.contains(name) {
            return Err(ParserError::InvalidPatch(format!("variable `{name}` already exists")));
        }
        self.set_variable(name, expr)
    }

    pub fn remove_variable(&mut self, name: &str) -> Result<(), ParserError> {
        match self.reader.schema {
            crate::schema::SchemaVersion::V0 => {
                self.reader.set_statements.retain(|s| s.name != name);
            }
            crate::schema::SchemaVersion::V1 => {
                if let Some(context_id) = self.resolve(&Path::root().push_key("context")) {
                    if let Some(existing) = self.reader.tree.find_key_child(context_id, name) {
                        let children = &mut self.reader.tree.get_mut(context_id).children;
                        children.retain(|&c| c != existing);
                    }
                }
            }
        }
        self.modified = true;
        self.rebuild_tables();
        Ok(())
    }

    pub fn add_selector(&mut self, path: &Path, selector: &str, mode: ConflictMode) -> Result<(), ParserError> {
        let id = self.resolve(path).ok_or_else(|| ParserError::PathNotFound { path: path.clone() })?;
        let node = self.reader.tree.get_mut(id);
        if node.comment.is_some() {
            match mode {
                ConflictMode::Error => return Err(ParserError::InvalidPatch(format!("`{path}` already has a selector"))),
                ConflictMode::Skip => return Ok(()),
                ConflictMode::Replace => {}
            }
        }
        node.comment = Some(format!("# [{selector}]"));
        self.modified = true;
        self.rebuild_tables();
        Ok(())
    }

    /// Attaches a plain trailing comment (not bracket-wrapped as a selector) to the node at
    /// `path`, overwriting whatever comment was already there.
    pub fn set_comment(&mut self, path: &Path, comment: &str) -> Result<(), ParserError> {
        let id = self.resolve(path).ok_or_else(|| ParserError::PathNotFound { path: path.clone() })?;
        self.reader.tree.get_mut(id).comment = Some(comment.to_string());
        self.modified = true;
        self.rebuild_tables();
        Ok(())
    }

    pub fn remove_selector(&mut self, path: &Path) -> Result<(), ParserError> {
        let id = self.resolve(path).ok_or_else(|| ParserError::PathNotFound { path: path.clone() })?;
        self.reader.tree.get_mut(id).comment = None;
        self.modified = true;
        self.rebuild_tables();
        Ok(())
    }

    pub fn add_dependency(&mut self, section_path: &Path, dependency: &str, mode: ConflictMode) -> Result<(), ParserError> {
        let section_id = self.resolve(section_path).ok_or_else(|| ParserError::PathNotFound { path: section_path.clone() })?;
        let already_present = self
            .reader
            .tree
            .children(section_id)
            .iter()
            .any(|&c| self.reader.tree.get(c).value.as_str() == Some(dependency));
        if already_present {
            match mode {
                ConflictMode::Error => return Err(ParserError::InvalidPatch(format!("`{dependency}` already present at `{section_path}`"))),
                ConflictMode::Skip => return Ok(()),
                ConflictMode::Replace => {
                    let children = &mut self.reader.tree.get_mut(section_id).children;
                    children.retain(|&c| self.reader.tree.get(c).value.as_str() != Some(dependency));
                }
            }
        }
        let item = self.reader.tree.push(Node {
            value: NodeValue::String(dependency.to_string()),
            list_member_flag: true,
            ..Node::sentinel()
        });
        self.reader.tree.get_mut(section_id).children.push(item);
        self.modified = true;
        self.rebuild_tables();
        Ok(())
    }

    pub fn remove_dependency(&mut self, section_path: &Path, dependency: &str) -> Result<(), ParserError> {
        let section_id = self.resolve(section_path).ok_or_else(|| ParserError::PathNotFound { path: section_path.clone() })?;
        let children = &mut self.reader.tree.get_mut(section_id).children;
        let before = children.len();
        children.retain(|&c| self.reader.tree.get(c).value.as_str() != Some(dependency));
        if self.reader.tree.children(section_id).len() == before {
            return Err(ParserError::InvalidPatch(format!("`{dependency}` not present at `{section_path}`")));
        }
        self.modified = true;
        self.rebuild_tables();
        Ok(())
    }

    /// A unified diff between the original and current rendering.
    pub fn diff(&self) -> String {
        let before = self.reader.original_text();
        let after = self.reader.render();
        TextDiff::from_lines(before, &after).unified_diff().context_radius(3).to_string()
    }
}

impl Reader {
    /// Renders the subtree at `path` to a JSON value, for `test`/`move`/`copy` operations.
    fn render_to_object_at(&self, path: &Path) -> Result<serde_json::Value, ParserError> {
        if path.is_root() {
            return Ok(self.render_to_object());
        }
        let full = self.render_to_object();
        let mut current = &full;
        for part in path.parts() {
            current = match part {
                PathPart::Key(key) => current.get(key).ok_or_else(|| ParserError::PathNotFound { path: path.clone() })?,
                PathPart::Index(i) => current.get(i).ok_or_else(|| ParserError::PathNotFound { path: path.clone() })?,
            };
        }
        Ok(current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_a_mapping_key() {
        let mut parser = Parser::new("package:\n  name: foo\n").unwrap();
        let path: Path = "/package/version".parse().unwrap();
        parser.patch(PatchOp::Add { path: path.clone(), value: serde_json::json!("1.0") }).unwrap();
        assert_eq!(parser.get_value(&path).unwrap().as_str(), Some("1.0"));
        parser.patch(PatchOp::Remove { path: path.clone() }).unwrap();
        assert!(!parser.contains_value(&path));
        assert!(parser.is_modified());
    }

    #[test]
    fn calc_sha256_reflects_patches_and_is_restored_after_an_add_then_remove() {
        let mut parser = Parser::new("package:\n  name: foo\n").unwrap();
        let before = parser.calc_sha256();
        let path: Path = "/package/version".parse().unwrap();
        parser.patch(PatchOp::Add { path: path.clone(), value: serde_json::json!("1.0") }).unwrap();
        let during = parser.calc_sha256();
        assert_ne!(before, during);
        parser.patch(PatchOp::Remove { path }).unwrap();
        assert_eq!(parser.calc_sha256(), before);
    }

    #[test]
    fn replace_overwrites_an_existing_scalar() {
        let mut parser = Parser::new("package:\n  name: foo\n").unwrap();
        let path: Path = "/package/name".parse().unwrap();
        parser.patch(PatchOp::Replace { path: path.clone(), value: serde_json::json!("bar") }).unwrap();
        assert_eq!(parser.get_value(&path).unwrap().as_str(), Some("bar"));
    }

    #[test]
    fn conflicting_selector_add_errors_by_default() {
        let mut parser = Parser::new("build:\n  number: 0  # [win]\n").unwrap();
        let path: Path = "/build/number".parse().unwrap();
        let result = parser.add_selector(&path, "linux", ConflictMode::Error);
        assert!(result.is_err());
    }

    #[test]
    fn search_and_replace_updates_matching_scalars() {
        let mut parser = Parser::new("package:\n  name: foo\n  summary: a foo package\n").unwrap();
        let replaced = parser.search_and_patch_replace("foo", "bar").unwrap();
        assert_eq!(replaced, 2);
    }

    #[test]
    fn diff_reports_no_changes_for_an_unmodified_parser() {
        let parser = Parser::new("package:\n  name: foo\n").unwrap();
        assert!(!parser.is_modified());
        assert!(parser.diff().is_empty());
    }
}

//! C8: projects a recipe onto a concrete build variant — selectors are evaluated and stripped,
//! template expressions are substituted, producing a variant-specific, selector-free document.

use std::collections::HashMap;

use crate::error::ParserError;
use crate::node::{NodeId, Tree};
use crate::reader::Reader;
use crate::tables::dialect_for;
use crm_jinja::{substitute, Sandbox, Variable};
use crm_selector::{BuildContext, Selector};
use crm_types::Primitive;

/// A fully-resolved recipe for one point in the build matrix: selectors have been evaluated
/// (nodes whose selector is false are dropped, selectors whose selector is true are kept with
/// the comment stripped) and every template expression has been substituted with its
/// `BuildContext`/variable value.
pub struct RecipeVariant {
    tree: Tree,
    warnings: Vec<String>,
}

impl RecipeVariant {
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn render(&self) -> String {
        crate::render::render(&self.tree, &[], &[])
    }
}

/// Builds the [`RecipeVariant`] for `reader` under `context`, additionally substituting
/// `build_env_vars` (merged over the recipe's own resolved variable table — variant values win).
pub fn project(reader: &Reader, context: &BuildContext, build_env_vars: &HashMap<String, Primitive>) -> Result<RecipeVariant, ParserError> {
    let sandbox = Sandbox::new();
    let mut resolved: HashMap<String, Variable> = reader.variables.resolve(&sandbox)?.into_iter().map(|(k, v)| (k, Variable(v))).collect();
    for (k, v) in build_env_vars {
        resolved.insert(k.clone(), Variable(v.clone()));
    }

    let mut tree = reader.tree().clone();
    let mut warnings = Vec::new();
    let dialect = dialect_for(reader.schema_version());

    prune_selectors(&mut tree, tree.root(), context)?;
    substitute_scalars(&mut tree, tree.root(), dialect, &sandbox, &resolved, &mut warnings);

    Ok(RecipeVariant { tree, warnings })
}

/// Walks the tree bottom-up (via an explicit post-order traversal built from `walk()`'s
/// pre-order output) dropping any node whose comment carries a selector that evaluates false.
fn prune_selectors(tree: &mut Tree, root: NodeId, context: &BuildContext) -> Result<(), ParserError> {
    let order = tree.walk();
    for id in order {
        let children = tree.children(id).to_vec();
        let mut keep = Vec::with_capacity(children.len());
        for child in children {
            if node_selector_is_false(tree, child, context)? {
                continue;
            }
            keep.push(child);
        }
        tree.get_mut(id).children = keep;
    }
    let _ = root;
    Ok(())
}

fn node_selector_is_false(tree: &Tree, id: NodeId, context: &BuildContext) -> Result<bool, ParserError> {
    let node = tree.get(id);
    let Some(comment) = &node.comment else { return Ok(false) };
    let Some(raw) = crm_selector::extract_bracketed(comment) else { return Ok(false) };
    let selector = Selector::parse(raw)?;
    Ok(!selector.does_apply(context)?)
}

fn substitute_scalars(
    tree: &mut Tree,
    id: NodeId,
    dialect: crm_jinja::Dialect,
    sandbox: &Sandbox,
    vars: &HashMap<String, Variable>,
    warnings: &mut Vec<String>,
) {
    let children = tree.children(id).to_vec();
    for child in &children {
        substitute_scalars(tree, *child, dialect, sandbox, vars, warnings);
    }

    let node = tree.get_mut(id);
    if node.is_leaf() {
        if let Some(text) = node.value.as_str() {
            let (rendered, mut node_warnings) = substitute(text, dialect, sandbox, vars);
            if rendered != text {
                node.value = crate::node::NodeValue::String(rendered);
            }
            warnings.append(&mut node_warnings);
        }
    }
    // Selectors that survived pruning (i.e. evaluated true) no longer need to be rendered.
    if node.comment.as_deref().and_then(crm_selector::extract_bracketed).is_some() {
        node.comment = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;
    use crm_selector::Platform;

    #[test]
    fn selectors_that_evaluate_false_are_dropped() {
        let reader = Reader::new("build:\n  number: 0\n  skip: true  # [win]\n").unwrap();
        let context = BuildContext::new(Platform::Linux64, HashMap::new()).unwrap();
        let variant = project(&reader, &context, &HashMap::new()).unwrap();
        let rendered = variant.render();
        assert!(!rendered.contains("skip"));
    }

    #[test]
    fn selectors_that_evaluate_true_survive_without_the_comment() {
        let reader = Reader::new("build:\n  number: 0\n  skip: true  # [linux]\n").unwrap();
        let context = BuildContext::new(Platform::Linux64, HashMap::new()).unwrap();
        let variant = project(&reader, &context, &HashMap::new()).unwrap();
        let rendered = variant.render();
        assert!(rendered.contains("skip: true"));
        assert!(!rendered.contains("[linux]"));
    }

    #[test]
    fn template_expressions_are_substituted_with_resolved_variables() {
        let reader = Reader::new("{% set version = \"1.2.3\" %}\npackage:\n  name: foo\n  version: \"{{ version }}\"\n").unwrap();
        let context = BuildContext::new(Platform::Linux64, HashMap::new()).unwrap();
        let variant = project(&reader, &context, &HashMap::new()).unwrap();
        let rendered = variant.render();
        assert!(rendered.contains("1.2.3"));
    }
}

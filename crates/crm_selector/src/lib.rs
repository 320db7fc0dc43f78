//! Selector expression grammar and build-context evaluation for conda recipes.
//!
//! A v0 selector appears as a bracketed comment, `# [linux and not py2k]`. This crate parses
//! the bracketed expression with a real recursive-descent grammar (see [`parser::parse`]) and
//! evaluates it against a [`BuildContext`] — it never shells out to a general-purpose
//! expression evaluator.

mod ast;
mod build_context;
mod error;
mod eval;
mod lexer;
mod parser;
pub mod platform;

pub use ast::SelectorExpr;
pub use build_context::BuildContext;
pub use error::SelectorError;
pub use platform::Platform;

/// A single parsed selector expression, as it appeared in a `# [...]` comment.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    raw: String,
    expr: SelectorExpr,
}

impl Selector {
    /// Parses a selector's inner expression text (with any surrounding `[`/`]` already
    /// stripped by the caller — see [`extract_bracketed`]).
    pub fn parse(content: &str) -> Result<Self, SelectorError> {
        let raw = content.trim().to_string();
        let expr = parser::parse(&raw)?;
        Ok(Self { raw, expr })
    }

    pub fn does_apply(&self, context: &BuildContext) -> Result<bool, SelectorError> {
        eval::evaluate(&self.expr, context.selector_context())
    }

    pub fn expr(&self) -> &SelectorExpr {
        &self.expr
    }

    /// Renders the selector the way it appears in a v0 comment: `[expr]`.
    pub fn render(&self) -> String {
        format!("[{}]", self.raw)
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Extracts the bracketed selector substring (if any) from a trailing comment, e.g.
/// `"# some text [linux]"` -> `Some("linux")`. Returns `None` if no bracketed expression is
/// present.
pub fn extract_bracketed(comment: &str) -> Option<&str> {
    let start = comment.rfind('[')?;
    let end = comment[start..].find(']')? + start;
    Some(&comment[start + 1..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn extracts_bracketed_expression_from_a_comment() {
        assert_eq!(extract_bracketed("# [linux and not py2k]"), Some("linux and not py2k"));
        assert_eq!(extract_bracketed("# just a comment"), None);
    }

    #[test]
    fn empty_selector_always_applies() {
        // An empty bracket is unusual but should not crash; callers that encounter `[]`
        // should treat the node as unconditional rather than invoking the parser at all.
        let ctx = BuildContext::new(Platform::Linux64, HashMap::new()).unwrap();
        let selector = Selector::parse("linux").unwrap();
        assert!(selector.does_apply(&ctx).unwrap());
    }

    #[test]
    fn selector_with_empty_platform_context_is_false() {
        let ctx = BuildContext::new(Platform::Win64, HashMap::new()).unwrap();
        let selector = Selector::parse("linux").unwrap();
        assert!(!selector.does_apply(&ctx).unwrap());
    }

    #[test]
    fn unbalanced_parens_raise_selector_syntax_error() {
        assert!(Selector::parse("(linux").is_err());
    }
}

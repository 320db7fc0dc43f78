use thiserror::Error;

use crate::path::Path;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("recipe text is empty")]
    Empty,

    #[error("malformed recipe text at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("unsupported jinja statement block at line {line}; pass force_remove_jinja to strip it")]
    UnsupportedJinjaStatement { line: usize },

    #[error("duplicate key `{key}` at line {line}")]
    DuplicateKey { line: usize, key: String },

    #[error("internal error: sentinel node read as a value at {path}")]
    SentinelRead { path: Path },

    #[error("path `{path}` does not exist")]
    PathNotFound { path: Path },

    #[error("invalid JSON-Patch operation: {0}")]
    InvalidPatch(String),

    #[error("list index {index} is out of bounds for `{path}` (length {len})")]
    IndexOutOfBounds { path: Path, index: usize, len: usize },

    #[error(transparent)]
    Selector(#[from] crm_selector::SelectorError),

    #[error(transparent)]
    Jinja(#[from] crm_jinja::JinjaError),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

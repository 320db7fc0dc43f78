use thiserror::Error;

/// A selector expression could not be parsed or evaluated.
///
/// Mirrors `SelectorSyntaxError` from the original tool: any malformed or unsafe selector
/// expression is reported through this single error kind, carrying the byte offset of the
/// token that triggered the failure where one is available.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SelectorError {
    #[error("selector syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("{component} version {value:?} is not well-formed")]
    InvalidVersion { component: &'static str, value: String },
}

impl SelectorError {
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        SelectorError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

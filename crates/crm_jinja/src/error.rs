use thiserror::Error;

#[derive(Debug, Error)]
pub enum JinjaError {
    #[error("template expression `{expr}` failed to evaluate: {source}")]
    Evaluation { expr: String, source: minijinja::Error },

    #[error("template expression `{expr}` did not evaluate to a primitive")]
    NonPrimitive { expr: String },

    #[error("unbalanced template delimiter starting at byte {offset}")]
    UnbalancedDelimiter { offset: usize },
}

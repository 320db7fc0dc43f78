use thiserror::Error;

#[derive(Debug, Error)]
pub enum CbcError {
    #[error("zip keys are invalid: {reason}")]
    ZipKeys { reason: String },

    #[error("CBC variable not found: {0}")]
    VariableNotFound(String),

    #[error("CBC variable `{0}` has no value for the provided selector context")]
    NoSelectorMatch(String),

    #[error("no zip keys found in the CBC file")]
    NoZipKeys,

    #[error(transparent)]
    Parser(#[from] crm_parser::ParserError),

    #[error(transparent)]
    Selector(#[from] crm_selector::SelectorError),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

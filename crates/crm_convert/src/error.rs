use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Parser(#[from] crm_parser::ParserError),

    #[error(transparent)]
    Selector(#[from] crm_selector::SelectorError),

    #[error("recipe has no top-level `package` or `outputs` section to convert")]
    NoPackageSection,
}

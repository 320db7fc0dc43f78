use thiserror::Error;

#[derive(Debug, Error)]
pub enum BumpError {
    #[error("recipe is in an invalid state for this operation: {0}")]
    InvalidState(String),

    #[error("failed to patch the recipe: {0}")]
    Patch(#[from] crm_parser::ParserError),

    #[error(transparent)]
    Fetch(#[from] crm_fetcher::FetchError),

    #[error("failed to read or write the recipe file: {0}")]
    Io(#[from] std::io::Error),
}

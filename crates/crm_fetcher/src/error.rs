use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network request failed: {0}")]
    Network(#[from] reqwest_middleware::Error),

    #[error("filesystem error while fetching `{name}`: {source}")]
    Io { name: String, #[source] source: std::io::Error },

    #[error("failed to extract archive for `{name}`: {message}")]
    Archive { name: String, message: String },

    #[error("`{recipe}` contains an unsupported source object at `{path}`")]
    Unsupported { recipe: String, path: String },

    #[error("{0}")]
    Required(String),

    #[error("git operation failed for `{url}`: {message}")]
    Git { url: String, message: String },

    #[error("API call failed: {0}")]
    Api(String),

    #[error("invalid URL `{0}`: {1}")]
    InvalidUrl(String, #[source] url::ParseError),
}

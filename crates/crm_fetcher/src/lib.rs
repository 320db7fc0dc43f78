//! C10: artifact fetching for recipe `/source` entries — HTTP archives and git checkouts,
//! concurrent retrying orchestration, and PyPI URL correction.
//!
//! - [`http`] / [`git`] — the two fetcher shapes.
//! - [`recipe`] — reads and normalizes `/source` into [`recipe::SourceSpec`]s.
//! - [`pypi`] — canonical-URL correction against the PyPI JSON API.
//! - [`orchestrate`] — builds fetchers from a recipe and drives them concurrently with retry.

pub mod error;
pub mod git;
pub mod http;
pub mod orchestrate;
pub mod pypi;
pub mod recipe;

pub use error::FetchError;
pub use git::GitFetcher;
pub use http::HttpFetcher;
pub use orchestrate::{
    fetch_all_artifacts_with_retry, fetch_all_corrected_artifacts_with_retry, fetch_archive_with_retry, from_recipe, FetchOutcome, Fetcher,
    DEFAULT_RETRIES, DEFAULT_RETRY_INTERVAL,
};
pub use recipe::{collect_sources, SourcePath, SourceSpec};

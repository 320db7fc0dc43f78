//! Builds fetchers from a recipe's `/source` section and drives them concurrently with
//! linear-backoff retries, optionally correcting stale PyPI URLs along the way.

use std::sync::Arc;
use std::time::Duration;

use crm_parser::Reader;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest_middleware::ClientWithMiddleware;
use tokio::sync::Semaphore;

use crate::error::FetchError;
use crate::git::GitFetcher;
use crate::http::HttpFetcher;
use crate::pypi;
use crate::recipe::{collect_sources, SourcePath, SourceSpec};

pub const DEFAULT_RETRY_INTERVAL: f64 = 10.0;
pub const DEFAULT_RETRIES: u32 = 5;

pub enum Fetcher {
    Http(HttpFetcher),
    Git(GitFetcher),
}

impl Fetcher {
    pub async fn fetch(&mut self) -> Result<(), FetchError> {
        match self {
            Fetcher::Http(f) => f.fetch().await,
            Fetcher::Git(f) => f.fetch().await,
        }
    }

    pub fn fetched(&self) -> bool {
        match self {
            Fetcher::Http(f) => f.fetched(),
            Fetcher::Git(f) => f.fetched(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Fetcher::Http(f) => f.url(),
            Fetcher::Git(f) => f.url(),
        }
    }
}

pub struct FetchOutcome {
    pub path: SourcePath,
    pub fetcher: Fetcher,
    pub updated_url: Option<String>,
}

/// Reads `/source`, normalizes single-vs-list, and builds one fetcher per entry.
/// Unsupported entries are skipped if `ignore_unsupported` is set, else this fails.
pub fn from_recipe(reader: &Reader, client: Arc<ClientWithMiddleware>, ignore_unsupported: bool) -> Result<Vec<(SourcePath, Fetcher)>, FetchError> {
    collect_sources(reader, ignore_unsupported)?
        .into_iter()
        .map(|(path, spec)| {
            let fetcher = match spec {
                SourceSpec::Http { url, sha256, file_name } => Fetcher::Http(HttpFetcher::new(client.clone(), url, file_name, sha256)?),
                SourceSpec::Git { url, branch, tag, rev } => Fetcher::Git(GitFetcher::new(url, branch, tag, rev)?),
            };
            Ok((path, fetcher))
        })
        .collect()
}

/// Linear-backoff retry loop: attempt `fetcher.fetch()`; on failure sleep
/// `retry_interval * attempt_index` and retry, up to `retries` attempts total.
pub async fn fetch_archive_with_retry(fetcher: &mut Fetcher, retry_interval: f64, retries: u32) -> Result<(), FetchError> {
    let mut last_err = None;
    for attempt in 1..=retries.max(1) {
        match fetcher.fetch().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!("attempt {attempt}/{retries} failed to fetch `{}`: {e}", fetcher.url());
                last_err = Some(e);
                if attempt < retries {
                    tokio::time::sleep(Duration::from_secs_f64(retry_interval * f64::from(attempt))).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| FetchError::Required("fetch retry loop exited without an attempt".to_string())))
}

/// Drives every fetcher built from `reader` concurrently, bounded by a task pool sized to
/// the host's available parallelism. Temp-dir guards live inside each returned [`Fetcher`]
/// and are dropped (deleting the directory) once the caller drops the outcome.
pub async fn fetch_all_artifacts_with_retry(
    reader: &Reader,
    client: Arc<ClientWithMiddleware>,
    retry_interval: f64,
    retries: u32,
) -> Result<Vec<FetchOutcome>, FetchError> {
    let fetchers = from_recipe(reader, client, false)?;
    let pool_size = std::thread::available_parallelism().map(Into::into).unwrap_or(4usize);
    let semaphore = Arc::new(Semaphore::new(pool_size));

    let mut tasks = FuturesUnordered::new();
    for (path, mut fetcher) in fetchers {
        let permit = semaphore.clone();
        tasks.push(async move {
            let _permit = permit.acquire_owned().await.expect("semaphore is never closed");
            let result = fetch_archive_with_retry(&mut fetcher, retry_interval, retries).await;
            (path, fetcher, result)
        });
    }

    let mut outcomes = Vec::new();
    while let Some((path, fetcher, result)) = tasks.next().await {
        result?;
        outcomes.push(FetchOutcome { path, fetcher, updated_url: None });
    }
    Ok(outcomes)
}

/// Like [`fetch_all_artifacts_with_retry`], but for HTTP sources whose URL looks like a PyPI
/// download: if the initial fetch fails after half the retry budget, query the PyPI JSON API
/// for the canonical filename and retry the corrected URL with the remaining budget.
pub async fn fetch_all_corrected_artifacts_with_retry(
    reader: &Reader,
    client: Arc<ClientWithMiddleware>,
    retry_interval: f64,
    retries: u32,
    package_name: &str,
    package_version: &str,
) -> Result<Vec<FetchOutcome>, FetchError> {
    let fetchers = from_recipe(reader, client.clone(), false)?;
    let half = (retries / 2).max(1);
    let remainder = retries.saturating_sub(half).max(1);

    let mut outcomes = Vec::new();
    for (path, mut fetcher) in fetchers {
        let is_pypi_http = matches!(&fetcher, Fetcher::Http(h) if pypi::looks_like_pypi_url(h.url()));
        if !is_pypi_http {
            fetch_archive_with_retry(&mut fetcher, retry_interval, retries).await?;
            outcomes.push(FetchOutcome { path, fetcher, updated_url: None });
            continue;
        }

        match fetch_archive_with_retry(&mut fetcher, retry_interval, half).await {
            Ok(()) => outcomes.push(FetchOutcome { path, fetcher, updated_url: None }),
            Err(_) => {
                tracing::info!("`{}` failed after {half} attempts, querying PyPI for a corrected URL", path.0);
                let corrected = pypi::corrected_url(&client, package_name, package_version).await?;
                let Fetcher::Http(old) = &fetcher else { unreachable!("guarded by is_pypi_http above") };
                let mut replacement = Fetcher::Http(HttpFetcher::new(client.clone(), corrected.clone(), None, old.sha256().map(str::to_string))?);
                fetch_archive_with_retry(&mut replacement, retry_interval, remainder).await?;
                outcomes.push(FetchOutcome { path, fetcher: replacement, updated_url: Some(corrected) });
            }
        }
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_recipe_builds_one_fetcher_per_source() {
        let reader = Reader::new("source:\n  url: https://example.com/a.tar.gz\n").unwrap();
        let client = Arc::new(crate::http::build_client().unwrap());
        let fetchers = from_recipe(&reader, client, false).unwrap();
        assert_eq!(fetchers.len(), 1);
        assert!(matches!(fetchers[0].1, Fetcher::Http(_)));
    }

    #[tokio::test]
    async fn from_recipe_is_empty_when_source_is_absent() {
        let reader = Reader::new("package:\n  name: foo\n").unwrap();
        let client = Arc::new(crate::http::build_client().unwrap());
        let fetchers = from_recipe(&reader, client, false).unwrap();
        assert!(fetchers.is_empty());
    }
}

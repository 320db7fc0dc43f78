//! HTTP artifact fetcher: downloads an archive over HTTP(S), verifies/records its SHA-256,
//! and extracts it into the fetcher's scoped temp directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use sha2::{Digest, Sha256};

use crate::error::FetchError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Builds the shared `reqwest_middleware` client used by every [`HttpFetcher`]: a plain
/// `reqwest::Client` wrapped with an exponential-backoff retry policy, mirroring the way
/// the networking crate this fetcher is modeled on builds its own client.
pub fn build_client() -> Result<ClientWithMiddleware, FetchError> {
    let inner = reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .user_agent(concat!("crm/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(reqwest_middleware::Error::Reqwest)?;
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
    Ok(reqwest_middleware::ClientBuilder::new(inner)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

pub struct HttpFetcher {
    client: Arc<ClientWithMiddleware>,
    url: String,
    file_name: Option<String>,
    expected_sha256: Option<String>,
    temp_dir: tempfile::TempDir,
    fetched: bool,
    sha256: Option<String>,
    archive_path: Option<PathBuf>,
}

impl HttpFetcher {
    pub fn new(client: Arc<ClientWithMiddleware>, url: impl Into<String>, file_name: Option<String>, expected_sha256: Option<String>) -> Result<Self, FetchError> {
        let url = url.into();
        let temp_dir = tempfile::Builder::new()
            .prefix("crm-http-")
            .tempdir()
            .map_err(|source| FetchError::Io { name: url.clone(), source })?;
        Ok(Self { client, url, file_name, expected_sha256, temp_dir, fetched: false, sha256: None, archive_path: None })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fetched(&self) -> bool {
        self.fetched
    }

    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }

    fn fetch_guard(&self, what: &str) -> Result<(), FetchError> {
        if !self.fetched {
            return Err(FetchError::Required(format!("cannot {what}: `{}` has not been fetched yet", self.url)));
        }
        Ok(())
    }

    pub fn get_path_to_source_code(&self) -> Result<&Path, FetchError> {
        self.fetch_guard("get the path to source code")?;
        Ok(self.temp_dir.path())
    }

    pub async fn fetch(&mut self) -> Result<(), FetchError> {
        let response = self.client.get(&self.url).send().await.map_err(FetchError::Network)?;
        let bytes = response
            .error_for_status()
            .map_err(|e| FetchError::Network(reqwest_middleware::Error::Reqwest(e)))?
            .bytes()
            .await
            .map_err(|e| FetchError::Network(reqwest_middleware::Error::Reqwest(e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = format!("{:x}", hasher.finalize());
        if let Some(expected) = &self.expected_sha256 {
            if !expected.eq_ignore_ascii_case(&digest) {
                return Err(FetchError::Archive {
                    name: self.url.clone(),
                    message: format!("sha256 mismatch: expected {expected}, got {digest}"),
                });
            }
        }
        self.sha256 = Some(digest);

        let name = self.file_name.clone().unwrap_or_else(|| file_name_from_url(&self.url));
        let archive_path = self.temp_dir.path().join(&name);
        tokio::fs::write(&archive_path, &bytes).await.map_err(|source| FetchError::Io { name: self.url.clone(), source })?;
        tracing::debug!("downloaded {} bytes from {} (sha256 {digest})", bytes.len(), self.url);

        extract_archive(&archive_path, self.temp_dir.path())?;
        self.archive_path = Some(archive_path);
        self.fetched = true;
        Ok(())
    }
}

fn file_name_from_url(url: &str) -> String {
    url.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("source").to_string()
}

fn extract_archive(archive: &Path, target: &Path) -> Result<(), FetchError> {
    let name = archive.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let err = |message: String| FetchError::Archive { name: name.to_string(), message };

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let file = std::fs::File::open(archive).map_err(|e| err(e.to_string()))?;
        tar::Archive::new(GzDecoder::new(file)).unpack(target).map_err(|e| err(e.to_string()))?;
    } else if name.ends_with(".tar") {
        let file = std::fs::File::open(archive).map_err(|e| err(e.to_string()))?;
        tar::Archive::new(file).unpack(target).map_err(|e| err(e.to_string()))?;
    } else if name.ends_with(".zip") {
        let file = std::fs::File::open(archive).map_err(|e| err(e.to_string()))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| err(e.to_string()))?;
        zip.extract(target).map_err(|e| err(e.to_string()))?;
    }
    // Anything else (a single source file with no known archive extension) is left
    // in place at `archive` for the caller to read directly.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_derived_from_the_final_url_segment() {
        assert_eq!(file_name_from_url("https://example.com/pkg/foo-1.0.tar.gz"), "foo-1.0.tar.gz");
    }

    #[tokio::test]
    async fn fetch_guard_rejects_reads_before_fetch() {
        let client = Arc::new(build_client().unwrap());
        let fetcher = HttpFetcher::new(client, "https://example.com/a.tar.gz", None, None).unwrap();
        assert!(fetcher.get_path_to_source_code().is_err());
    }
}

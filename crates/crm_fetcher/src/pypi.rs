//! PyPI URL correction: when an HTTP source points at a stale or malformed PyPI URL, query
//! the PyPI JSON API for the package's canonical filename and rebuild the download URL.

use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use crate::error::FetchError;

#[derive(Debug, Deserialize)]
struct PypiResponse {
    info: PypiInfo,
    releases: std::collections::HashMap<String, Vec<PypiReleaseFile>>,
}

#[derive(Debug, Deserialize)]
struct PypiInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PypiReleaseFile {
    filename: String,
    packagetype: Option<String>,
}

/// A URL looks like a PyPI source download if it's served from one of PyPI's own file hosts.
pub fn looks_like_pypi_url(url: &str) -> bool {
    url.contains("pypi.io/packages") || url.contains("pypi.org/packages") || url.contains("files.pythonhosted.org")
}

/// Queries `https://pypi.org/pypi/{name}/json` and rebuilds the canonical source-distribution
/// URL for `version`, in the form `https://pypi.org/packages/source/{first_letter}/{name}/{filename}`.
pub async fn corrected_url(client: &ClientWithMiddleware, name: &str, version: &str) -> Result<String, FetchError> {
    let endpoint = format!("https://pypi.org/pypi/{name}/json");
    let response = client.get(&endpoint).send().await.map_err(FetchError::Network)?;
    let response = response
        .error_for_status()
        .map_err(|e| FetchError::Api(format!("PyPI lookup for `{name}` failed: {e}")))?;
    let body: PypiResponse = response.json().await.map_err(|e| FetchError::Api(format!("PyPI response for `{name}` was not valid JSON: {e}")))?;

    let files = body
        .releases
        .get(version)
        .ok_or_else(|| FetchError::Api(format!("PyPI has no release `{version}` for `{name}`")))?;
    let source_file = files
        .iter()
        .find(|f| f.packagetype.as_deref() == Some("sdist"))
        .or_else(|| files.first())
        .ok_or_else(|| FetchError::Api(format!("PyPI release `{version}` of `{name}` has no files")))?;

    let first_letter = body.info.name.chars().next().ok_or_else(|| FetchError::Api(format!("PyPI package name `{name}` is empty")))?;
    Ok(format!("https://pypi.org/packages/source/{first_letter}/{}/{}", body.info.name, source_file.filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_pypi_hosts() {
        assert!(looks_like_pypi_url("https://pypi.io/packages/source/f/foo/foo-1.0.tar.gz"));
        assert!(looks_like_pypi_url("https://files.pythonhosted.org/packages/ab/foo-1.0.tar.gz"));
        assert!(!looks_like_pypi_url("https://github.com/foo/foo/archive/v1.0.tar.gz"));
    }
}

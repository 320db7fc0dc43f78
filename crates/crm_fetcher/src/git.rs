//! Git artifact fetcher: shells out to the system `git` binary to clone a repository and
//! check out a `tag`/`rev`/`branch` target, rather than embedding a Git implementation.

use std::path::Path;
use std::process::Stdio;

use regex::Regex;
use tokio::process::Command;

use crate::error::FetchError;

#[derive(Debug, Clone)]
struct GitTarget {
    branch: Option<String>,
    tag: Option<String>,
    rev: Option<String>,
}

pub struct GitFetcher {
    url: String,
    target: GitTarget,
    temp_dir: tempfile::TempDir,
    fetched: bool,
    tags: Vec<String>,
}

impl GitFetcher {
    pub fn new(url: impl Into<String>, branch: Option<String>, tag: Option<String>, rev: Option<String>) -> Result<Self, FetchError> {
        let url = url.into();
        let temp_dir = tempfile::Builder::new()
            .prefix("crm-git-")
            .tempdir()
            .map_err(|source| FetchError::Io { name: url.clone(), source })?;
        Ok(Self { url, target: GitTarget { branch, tag, rev }, temp_dir, fetched: false, tags: Vec::new() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fetched(&self) -> bool {
        self.fetched
    }

    pub fn get_repo_tags(&self) -> &[String] {
        &self.tags
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

    /// Tag beats rev beats branch, matching the priority a `conda` recipe author expects:
    /// the most specific, most reproducible target wins.
    fn resolve_checkout_target(&self) -> Option<&str> {
        self.target.tag.as_deref().or(self.target.rev.as_deref()).or(self.target.branch.as_deref())
    }

    pub async fn fetch(&mut self) -> Result<(), FetchError> {
        tracing::debug!("cloning {} into {}", self.url, self.temp_dir.path().display());
        run_git(&["clone", "--no-checkout", self.url.as_str(), "."], self.temp_dir.path()).await?;

        let tags_output = run_git(&["tag", "--list"], self.temp_dir.path()).await?;
        self.tags = tags_output.lines().map(str::to_string).filter(|l| !l.is_empty()).collect();

        let checkout = self.resolve_checkout_target().unwrap_or("HEAD");
        run_git(&["checkout", checkout], self.temp_dir.path()).await?;

        self.fetched = true;
        Ok(())
    }
}

async fn run_git(args: &[&str], cwd: &Path) -> Result<String, FetchError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| FetchError::Io { name: format!("git {}", args.join(" ")), source })?;

    if !output.status.success() {
        return Err(FetchError::Git {
            url: cwd.display().to_string(),
            message: format!("`git {}` failed: {}", args.join(" "), String::from_utf8_lossy(&output.stderr)),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Matches `1.2.3` against `v1.2.3`, `release-1.2.3`, `release-v1.2.3` or a bare `1.2.3`,
/// tolerating a local-version suffix (`+build`) and excluding anything that reads as a
/// pre-release tag.
fn version_matches_tag(version: &str, tag: &str) -> bool {
    let escaped = regex::escape(version);
    let pattern = format!(r"(?i)^(?:v|release-|release-v)?{escaped}(?:\+.*)?$");
    let re = Regex::new(&pattern).expect("constructed from an escaped, well-formed version string");
    re.is_match(tag)
}

pub fn match_tag_from_version<'a>(version: &str, tags: &'a [String]) -> Option<&'a str> {
    tags.iter().find(|tag| version_matches_tag(version, tag)).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_common_tag_prefixes() {
        assert!(version_matches_tag("1.2.3", "v1.2.3"));
        assert!(version_matches_tag("1.2.3", "release-1.2.3"));
        assert!(version_matches_tag("1.2.3", "release-v1.2.3"));
        assert!(version_matches_tag("1.2.3", "1.2.3+build2"));
        assert!(!version_matches_tag("1.2.3", "1.2.3-rc1"));
    }

    #[test]
    fn match_tag_from_version_finds_the_first_match() {
        let tags = vec!["v1.0.0".to_string(), "v1.2.3".to_string()];
        assert_eq!(match_tag_from_version("1.2.3", &tags), Some("v1.2.3"));
        assert_eq!(match_tag_from_version("9.9.9", &tags), None);
    }

    #[test]
    fn checkout_target_prefers_tag_over_rev_over_branch() {
        let fetcher = GitFetcher {
            url: "https://example.com/repo.git".to_string(),
            target: GitTarget { branch: Some("main".to_string()), tag: Some("v1".to_string()), rev: Some("deadbeef".to_string()) },
            temp_dir: tempfile::tempdir().unwrap(),
            fetched: false,
            tags: Vec::new(),
        };
        assert_eq!(fetcher.resolve_checkout_target(), Some("v1"));
    }
}

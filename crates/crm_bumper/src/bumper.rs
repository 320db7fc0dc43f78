//! C11: stateful recipe editing operations driving `crm bump-recipe` — build number, version,
//! source URL and hash updates, plus the final write-back.

use std::path::{Path as FsPath, PathBuf};

use crm_fetcher::{FetchOutcome, Fetcher};
use crm_parser::{Parser, Path, PatchOp};

use crate::error::BumpError;

/// Variable names treated as the recipe's "hash variable": if the recipe defines exactly one
/// of these and `/source/sha256` is a reference to it, `update_sha256` rewrites the variable
/// instead of patching every source entry.
const HASH_VARIABLE_NAMES: &[&str] = &["sha256", "hash", "hash_val", "hash_value", "checksum", "check_sum", "hashval", "hashvalue"];

#[derive(Debug, Clone, Copy, Default)]
pub struct VersionBumperOptions {
    pub dry_run: bool,
    pub commit_on_failure: bool,
    pub omit_trailing_newline: bool,
}

pub struct VersionBumper {
    path: PathBuf,
    parser: Parser,
    options: VersionBumperOptions,
    disk_write_cntr: u32,
}

impl VersionBumper {
    pub fn new(path: impl Into<PathBuf>, options: VersionBumperOptions) -> Result<Self, BumpError> {
        let path = path.into();
        let content = fs_err::read_to_string(&path)?;
        let parser = Parser::new(&content)?;
        Self::from_parser(path, parser, options)
    }

    /// Builds a bumper from an already-read, already-parsed recipe, so that callers who need
    /// to distinguish I/O failure from parse failure (e.g. the CLI's distinct exit codes) can
    /// do their own `fs_err::read_to_string`/`Parser::new` ahead of this call.
    pub fn from_parser(path: impl Into<PathBuf>, mut parser: Parser, options: VersionBumperOptions) -> Result<Self, BumpError> {
        // Deprecated PyPI download domain; migrated unconditionally as a post-processing pass.
        parser.search_and_patch_replace("pypi.io", "pypi.org")?;
        Ok(Self { path: path.into(), parser, options, disk_write_cntr: 0 })
    }

    pub fn recipe_reader(&self) -> &Parser {
        &self.parser
    }

    fn fail<T>(&mut self, err: BumpError) -> Result<T, BumpError> {
        if self.options.commit_on_failure {
            let _ = self.commit_changes();
        }
        Err(err)
    }

    /// `value = None` increments the current `/build/number` (adding `0` if absent);
    /// `value = Some(n)` overwrites it. `/build` itself must already exist.
    pub fn update_build_num(&mut self, value: Option<i64>) -> Result<(), BumpError> {
        let build_path: Path = "/build".parse().expect("static path");
        if !self.parser.contains_value(&build_path) {
            return self.fail(BumpError::InvalidState("recipe has no `/build` section".to_string()));
        }

        let number_path: Path = "/build/number".parse().expect("static path");
        let new_value = match value {
            Some(n) if n < 0 => return self.fail(BumpError::InvalidState(format!("build number cannot be negative: {n}"))),
            Some(n) => n,
            None => match self.parser.get_value(&number_path) {
                Ok(v) => v.as_i64().ok_or_else(|| BumpError::InvalidState("`/build/number` is not an integer".to_string()))? + 1,
                Err(_) => 0,
            },
        };

        if let Err(e) = self.parser.patch(PatchOp::Replace { path: number_path, value: serde_json::json!(new_value) }) {
            return self.fail(e.into());
        }
        Ok(())
    }

    /// Writes `new` to `/package/version`, or to the `version` template variable if one is
    /// defined and `/package/version` is a reference to it.
    pub fn update_version(&mut self, new: &str) -> Result<(), BumpError> {
        if new.is_empty() {
            return self.fail(BumpError::InvalidState("target version cannot be empty".to_string()));
        }
        let version_path: Path = "/package/version".parse().expect("static path");
        let current = self.parser.get_value(&version_path).ok().and_then(|v| v.as_str().map(str::to_string));
        if current.as_deref() == Some(new) {
            return self.fail(BumpError::InvalidState(format!("target version is unchanged: {new}")));
        }

        let references_version_var = self.parser.contains_variable("version")
            && self.parser.get_variable_references("version").iter().any(|p| *p == version_path);

        let result = if references_version_var {
            self.parser.set_variable("version", new)
        } else {
            self.parser.patch(PatchOp::Add { path: version_path, value: serde_json::json!(new) })
        };
        if let Err(e) = result {
            return self.fail(e.into());
        }
        Ok(())
    }

    /// Patches `/source/.../url` for every fetched outcome that carries a corrected URL
    /// (produced by [`crm_fetcher::fetch_all_corrected_artifacts_with_retry`]).
    pub fn update_http_urls(&mut self, outcomes: &[FetchOutcome]) -> Result<(), BumpError> {
        for outcome in outcomes {
            let Fetcher::Http(_) = &outcome.fetcher else { continue };
            let Some(updated_url) = &outcome.updated_url else { continue };
            let base: Path = outcome.path.0.parse().map_err(|_| BumpError::InvalidState(format!("invalid source path `{}`", outcome.path.0)))?;
            let url_path = self.parser.append_to_path(&base, "/url");
            if let Err(e) = self.parser.patch(PatchOp::Replace { path: url_path, value: serde_json::json!(updated_url) }) {
                return self.fail(e.into());
            }
        }
        Ok(())
    }

    /// Short-circuits through a single hash variable if one is in play; otherwise patches
    /// `/source/.../sha256` for every HTTP outcome to its computed digest.
    pub fn update_sha256(&mut self, outcomes: &[FetchOutcome]) -> Result<(), BumpError> {
        if let Some(var_name) = self.single_hash_variable() {
            let digest = outcomes.iter().find_map(|o| match &o.fetcher {
                Fetcher::Http(h) => h.sha256().map(str::to_string),
                Fetcher::Git(_) => None,
            });
            if let Some(digest) = digest {
                if let Err(e) = self.parser.set_variable(&var_name, &digest) {
                    return self.fail(e.into());
                }
            }
            return Ok(());
        }

        for outcome in outcomes {
            let Fetcher::Http(http) = &outcome.fetcher else { continue };
            let Some(digest) = http.sha256() else { continue };
            let base: Path = outcome.path.0.parse().map_err(|_| BumpError::InvalidState(format!("invalid source path `{}`", outcome.path.0)))?;
            let sha_path = self.parser.append_to_path(&base, "/sha256");
            if let Err(e) = self.parser.patch(PatchOp::Replace { path: sha_path, value: serde_json::json!(digest) }) {
                return self.fail(e.into());
            }
        }
        Ok(())
    }

    fn single_hash_variable(&self) -> Option<String> {
        let defined: Vec<&str> = HASH_VARIABLE_NAMES.iter().copied().filter(|name| self.parser.contains_variable(name)).collect();
        let [name] = defined.as_slice() else { return None };
        let sha_path: Path = "/source/sha256".parse().expect("static path");
        self.parser.get_variable_references(name).iter().any(|p| *p == sha_path).then(|| (*name).to_string())
    }

    /// In dry-run mode, prints the rendered recipe to standard output; otherwise writes it
    /// back to the original file path and counts the write.
    pub fn commit_changes(&mut self) -> Result<(), BumpError> {
        let mut text = self.parser.render();
        if self.options.omit_trailing_newline {
            while text.ends_with('\n') {
                text.pop();
            }
        }
        if self.options.dry_run {
            println!("{text}");
            return Ok(());
        }
        fs_err::write(&self.path, text)?;
        self.disk_write_cntr += 1;
        Ok(())
    }

    pub fn disk_write_count(&self) -> u32 {
        self.disk_write_cntr
    }

    pub fn path(&self) -> &FsPath {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn update_build_num_increments_when_value_is_none() {
        let f = write_temp("build:\n  number: 41\n");
        let mut vb = VersionBumper::new(f.path(), VersionBumperOptions::default()).unwrap();
        vb.update_build_num(None).unwrap();
        let path: Path = "/build/number".parse().unwrap();
        assert_eq!(vb.recipe_reader().get_value(&path).unwrap().as_i64(), Some(42));
    }

    #[test]
    fn update_build_num_requires_a_build_section() {
        let f = write_temp("package:\n  name: foo\n");
        let mut vb = VersionBumper::new(f.path(), VersionBumperOptions::default()).unwrap();
        assert!(vb.update_build_num(None).is_err());
    }

    #[test]
    fn update_version_rejects_empty_string() {
        let f = write_temp("package:\n  name: foo\n  version: 1.0.0\n");
        let mut vb = VersionBumper::new(f.path(), VersionBumperOptions::default()).unwrap();
        assert!(vb.update_version("").is_err());
    }

    #[test]
    fn update_version_writes_the_package_field_directly() {
        let f = write_temp("package:\n  name: foo\n  version: 1.0.0\n");
        let mut vb = VersionBumper::new(f.path(), VersionBumperOptions::default()).unwrap();
        vb.update_version("1.2.3").unwrap();
        let path: Path = "/package/version".parse().unwrap();
        assert_eq!(vb.recipe_reader().get_value(&path).unwrap().as_str(), Some("1.2.3"));
    }

    #[test]
    fn dry_run_commit_does_not_touch_disk() {
        let f = write_temp("package:\n  name: foo\n");
        let mut vb = VersionBumper::new(f.path(), VersionBumperOptions { dry_run: true, ..Default::default() }).unwrap();
        vb.commit_changes().unwrap();
        assert_eq!(vb.disk_write_count(), 0);
    }
}

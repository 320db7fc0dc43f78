//! Reads `/source` out of a recipe document and normalizes it into [`SourceSpec`]s,
//! translating the v0/v1 key names for git sources along the way.

use crm_parser::{Reader, SchemaVersion};
use serde_json::Value;

use crate::error::FetchError;

#[derive(Debug, Clone)]
pub enum SourceSpec {
    Http { url: String, sha256: Option<String>, file_name: Option<String> },
    Git { url: String, branch: Option<String>, tag: Option<String>, rev: Option<String> },
}

/// `/source`'s path key, for error messages and for patching back an updated URL/sha256.
#[derive(Debug, Clone)]
pub struct SourcePath(pub String);

pub fn collect_sources(reader: &Reader, ignore_unsupported: bool) -> Result<Vec<(SourcePath, SourceSpec)>, FetchError> {
    let root = reader.render_to_object();
    let Some(source) = root.get("source") else {
        return Ok(Vec::new());
    };

    let entries: Vec<(String, &Value)> = match source {
        Value::Array(items) => items.iter().enumerate().map(|(i, v)| (format!("/source/{i}"), v)).collect(),
        Value::Object(_) => vec![("/source".to_string(), source)],
        _ => return Ok(Vec::new()),
    };

    let mut specs = Vec::with_capacity(entries.len());
    for (path, entry) in entries {
        match parse_source_entry(entry, reader.schema_version()) {
            Some(spec) => specs.push((SourcePath(path), spec)),
            None => {
                if ignore_unsupported {
                    continue;
                }
                return Err(FetchError::Unsupported { recipe: reader.get_recipe_name().unwrap_or_default(), path });
            }
        }
    }
    Ok(specs)
}

fn parse_source_entry(entry: &Value, schema: SchemaVersion) -> Option<SourceSpec> {
    let obj = entry.as_object()?;
    if let Some(url) = obj.get("url").and_then(Value::as_str) {
        return Some(SourceSpec::Http {
            url: url.to_string(),
            sha256: obj.get("sha256").and_then(Value::as_str).map(str::to_string),
            file_name: obj.get("file_name").or_else(|| obj.get("fn")).and_then(Value::as_str).map(str::to_string),
        });
    }

    let git_url_key = match schema {
        SchemaVersion::V0 => "git_url",
        SchemaVersion::V1 => "git",
    };
    let url = obj.get(git_url_key).or_else(|| obj.get("git")).and_then(Value::as_str)?;
    let (branch_key, tag_key, rev_key) = match schema {
        SchemaVersion::V0 => ("git_branch", "git_tag", "git_rev"),
        SchemaVersion::V1 => ("branch", "tag", "rev"),
    };
    Some(SourceSpec::Git {
        url: url.to_string(),
        branch: obj.get(branch_key).and_then(Value::as_str).map(str::to_string),
        tag: obj.get(tag_key).and_then(Value::as_str).map(str::to_string),
        rev: obj.get(rev_key).and_then(Value::as_str).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_http_source_becomes_one_spec() {
        let reader = Reader::new("source:\n  url: https://example.com/a.tar.gz\n  sha256: abc\n").unwrap();
        let specs = collect_sources(&reader, false).unwrap();
        assert_eq!(specs.len(), 1);
        assert!(matches!(&specs[0].1, SourceSpec::Http { url, .. } if url == "https://example.com/a.tar.gz"));
    }

    #[test]
    fn v0_git_keys_translate() {
        let reader = Reader::new("source:\n  git_url: https://example.com/repo.git\n  git_tag: v1.0\n").unwrap();
        let specs = collect_sources(&reader, false).unwrap();
        assert!(matches!(&specs[0].1, SourceSpec::Git { tag: Some(t), .. } if t == "v1.0"));
    }

    #[test]
    fn unsupported_source_without_ignore_flag_errors() {
        let reader = Reader::new("source:\n  path: ../local\n").unwrap();
        assert!(collect_sources(&reader, false).is_err());
        assert!(collect_sources(&reader, true).unwrap().is_empty());
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// A CBC/variant variable name, normalized so that `pkg-name`, `pkg_name` and `PKG_NAME` all
/// refer to the same variable. conda-build treats dashes and underscores interchangeably in
/// variant keys; we canonicalize to lower-case with underscores and keep the original spelling
/// around for rendering.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct NormalizedKey {
    original: String,
    normalized: String,
}

impl NormalizedKey {
    pub fn new(raw: impl Into<String>) -> Self {
        let original = raw.into();
        let normalized = original.to_ascii_lowercase().replace('-', "_");
        Self { original, normalized }
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn original(&self) -> &str {
        &self.original
    }
}

impl From<&str> for NormalizedKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NormalizedKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for NormalizedKey {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl std::hash::Hash for NormalizedKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl Ord for NormalizedKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl PartialOrd for NormalizedKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_and_underscore_are_equivalent() {
        assert_eq!(NormalizedKey::new("pkg-name"), NormalizedKey::new("pkg_name"));
        assert_eq!(NormalizedKey::new("PKG_NAME"), NormalizedKey::new("pkg-name"));
    }

    #[test]
    fn original_spelling_is_preserved() {
        let key = NormalizedKey::new("Python-Version");
        assert_eq!(key.original(), "Python-Version");
        assert_eq!(key.as_str(), "python_version");
    }
}

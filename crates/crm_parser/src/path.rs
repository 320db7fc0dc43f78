use std::fmt;
use std::str::FromStr;

/// A single component of a [`Path`]: either a mapping key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathPart {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPart::Key(k) => f.write_str(&escape(k)),
            PathPart::Index(i) => write!(f, "{i}"),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn unescape(s: &str) -> String {
    s.replace("~1", "/").replace("~0", "~")
}

/// A JSON-Pointer-style path, e.g. `/build/number` or `/outputs/0/package/name`. `/` alone
/// denotes the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path(Vec<PathPart>);

impl Path {
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn from_parts(parts: Vec<PathPart>) -> Self {
        Path(parts)
    }

    pub fn parts(&self) -> &[PathPart] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            return None;
        }
        let mut parts = self.0.clone();
        parts.pop();
        Some(Path(parts))
    }

    pub fn last(&self) -> Option<&PathPart> {
        self.0.last()
    }

    pub fn push_key(&self, key: impl Into<String>) -> Path {
        let mut parts = self.0.clone();
        parts.push(PathPart::Key(key.into()));
        Path(parts)
    }

    pub fn push_index(&self, index: usize) -> Path {
        let mut parts = self.0.clone();
        parts.push(PathPart::Index(index));
        Path(parts)
    }

    /// Pure path algebra: joins a base path and an extension path, normalizing any
    /// leading/trailing `/`.
    pub fn append(base: &str, ext: &str) -> Path {
        let base = base.trim_end_matches('/');
        let ext = ext.trim_start_matches('/');
        if ext.is_empty() {
            return Path::from_str(base).unwrap_or_else(|_| Path::root());
        }
        let joined = if base.is_empty() || base == "/" {
            format!("/{ext}")
        } else {
            format!("{base}/{ext}")
        };
        Path::from_str(&joined).unwrap_or_else(|_| Path::root())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for part in &self.0 {
            write!(f, "/{part}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "/" {
            return Ok(Path::root());
        }
        let s = s.strip_prefix('/').unwrap_or(s);
        let parts = s
            .split('/')
            .map(|raw| {
                let raw = unescape(raw);
                match raw.parse::<usize>() {
                    Ok(i) if !raw.starts_with('0') || raw == "0" => PathPart::Index(i),
                    _ => PathPart::Key(raw),
                }
            })
            .collect();
        Ok(Path(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        let path: Path = "/outputs/0/package/name".parse().unwrap();
        assert_eq!(path.to_string(), "/outputs/0/package/name");
    }

    #[test]
    fn append_normalizes_slashes() {
        assert_eq!(Path::append("/build/", "/number").to_string(), "/build/number");
        assert_eq!(Path::append("/build", "number").to_string(), "/build/number");
    }

    #[test]
    fn escapes_tilde_and_slash_in_keys() {
        let path = Path::root().push_key("a/b").push_key("c~d");
        assert_eq!(path.to_string(), "/a~1b/c~0d");
    }
}

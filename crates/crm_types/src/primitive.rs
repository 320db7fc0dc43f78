use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar value as conda-build's templating and selector layers understand it: every
/// primitive a recipe field, template variable or selector context entry can hold.
///
/// This is the common subset shared by [`crate::NormalizedKey`]-keyed tables, the selector
/// build context, and the CBC variant tables. The recipe IR's own `NodeValue` (in `crm_parser`)
/// is a superset that additionally tracks multiline strings and the sentinel/structural marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Primitive {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Primitive {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Primitive::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Primitive::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Primitive::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Mirrors conda-build's type coercion for selector contexts: a string that parses as an
    /// integer becomes one, `"true"`/`"false"` (case-insensitively) become booleans, everything
    /// else stays a string.
    pub fn coerce_selector_view(self) -> Primitive {
        let Primitive::Str(s) = &self else {
            return self;
        };
        if let Ok(i) = s.parse::<i64>() {
            return Primitive::Int(i);
        }
        match s.to_ascii_lowercase().as_str() {
            "true" => Primitive::Bool(true),
            "false" => Primitive::Bool(false),
            _ => self,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Null => write!(f, "null"),
            Primitive::Bool(b) => write!(f, "{b}"),
            Primitive::Int(i) => write!(f, "{i}"),
            Primitive::Float(x) => write!(f, "{x}"),
            Primitive::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Primitive::Str(value.to_string())
    }
}

impl From<String> for Primitive {
    fn from(value: String) -> Self {
        Primitive::Str(value)
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Primitive::Bool(value)
    }
}

impl From<i64> for Primitive {
    fn from(value: i64) -> Self {
        Primitive::Int(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_numeric_strings() {
        assert_eq!(Primitive::from("42").coerce_selector_view(), Primitive::Int(42));
    }

    #[test]
    fn coerces_boolean_strings_case_insensitively() {
        assert_eq!(Primitive::from("True").coerce_selector_view(), Primitive::Bool(true));
        assert_eq!(Primitive::from("FALSE").coerce_selector_view(), Primitive::Bool(false));
    }

    #[test]
    fn leaves_plain_strings_alone() {
        assert_eq!(
            Primitive::from("linux-64").coerce_selector_view(),
            Primitive::Str("linux-64".to_string())
        );
    }
}

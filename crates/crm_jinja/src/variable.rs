use std::fmt;

use crm_types::Primitive;
use minijinja::value::Value as MiniValue;

/// A template variable value, convertible to and from [`minijinja::Value`] at the sandbox
/// boundary. Only primitive shapes are supported — the sandbox never hands back a list, map, or
/// callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable(pub Primitive);

impl From<Primitive> for Variable {
    fn from(value: Primitive) -> Self {
        Variable(value)
    }
}

impl From<Variable> for MiniValue {
    fn from(value: Variable) -> Self {
        match value.0 {
            Primitive::Null => MiniValue::from(()),
            Primitive::Bool(b) => MiniValue::from(b),
            Primitive::Int(i) => MiniValue::from(i),
            Primitive::Float(f) => MiniValue::from(f),
            Primitive::Str(s) => MiniValue::from(s),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Converts an evaluated [`minijinja::Value`] back to a [`Primitive`], failing closed (returning
/// `None`) for anything that is not a scalar — lists, maps, and undefined values are not
/// substitutable results.
pub fn minivalue_to_primitive(value: &MiniValue) -> Option<Primitive> {
    use minijinja::value::ValueKind;
    match value.kind() {
        ValueKind::None | ValueKind::Undefined => Some(Primitive::Null),
        ValueKind::Bool => Some(Primitive::Bool(value.is_true())),
        ValueKind::Number => {
            let text = value.to_string();
            if let Ok(i) = text.parse::<i64>() {
                Some(Primitive::Int(i))
            } else {
                text.parse::<f64>().ok().map(Primitive::Float)
            }
        }
        ValueKind::String => value.as_str().map(|s| s.to_string()).map(Primitive::Str),
        _ => None,
    }
}

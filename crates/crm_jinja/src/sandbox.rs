use std::collections::HashMap;
use std::sync::Arc;

use minijinja::value::{Object, Value as MiniValue};
use minijinja::{Environment, Error as MiniError, ErrorKind, State};

use crate::error::JinjaError;
use crate::variable::{minivalue_to_primitive, Variable};
use crm_types::Primitive;

/// A narrow, non-Turing-complete expression sandbox for v0 `{{ }}` / v1 `${{ }}` recipe
/// expressions.
///
/// Built on [`minijinja::Environment::compile_expression`], never on template-statement
/// compilation — there is no `{% if %}`/`{% for %}` support here by construction, since
/// `compile_expression` cannot parse statement blocks. Globals are restricted to the
/// allow-listed `len`, `str`, `int`, `float`, `env.get`, and `match`.
pub struct Sandbox {
    env: Environment<'static>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_global("env", MiniValue::from_object(EnvAccessor));
        env.add_function("len", len_fn);
        env.add_function("str", str_fn);
        env.add_function("int", int_fn);
        env.add_function("float", float_fn);
        env.add_function("match", match_fn);
        Self { env }
    }

    /// Evaluates `expr` against `vars`, returning the resulting primitive. Any expression that
    /// does not reduce to a scalar (a list, map, or undefined result) is an error.
    pub fn eval_primitive(&self, expr: &str, vars: &HashMap<String, Variable>) -> Result<Primitive, JinjaError> {
        let template = self.env.compile_expression(expr).map_err(|source| JinjaError::Evaluation {
            expr: expr.to_string(),
            source,
        })?;
        let mut context = std::collections::BTreeMap::new();
        for (name, value) in vars {
            context.insert(name.clone(), MiniValue::from(value.clone()));
        }
        let result = template.eval(context).map_err(|source| JinjaError::Evaluation {
            expr: expr.to_string(),
            source,
        })?;
        minivalue_to_primitive(&result).ok_or_else(|| JinjaError::NonPrimitive { expr: expr.to_string() })
    }
}

#[derive(Debug)]
struct EnvAccessor;

impl Object for EnvAccessor {
    fn call_method(self: &Arc<Self>, _state: &State, name: &str, args: &[MiniValue]) -> Result<MiniValue, MiniError> {
        match name {
            "get" => {
                let key = args.first().and_then(|v| v.as_str()).unwrap_or_default();
                let default = args.get(1).cloned().unwrap_or_else(|| MiniValue::from(()));
                Ok(std::env::var(key).map(MiniValue::from).unwrap_or(default))
            }
            other => Err(MiniError::new(ErrorKind::UnknownMethod, format!("env has no method `{other}`"))),
        }
    }
}

fn len_fn(value: MiniValue) -> Result<usize, MiniError> {
    value
        .len()
        .ok_or_else(|| MiniError::new(ErrorKind::InvalidOperation, "value has no length"))
}

fn str_fn(value: MiniValue) -> String {
    value.to_string()
}

fn int_fn(value: MiniValue) -> Result<i64, MiniError> {
    value
        .to_string()
        .parse::<i64>()
        .map_err(|_| MiniError::new(ErrorKind::InvalidOperation, "value is not convertible to int"))
}

fn float_fn(value: MiniValue) -> Result<f64, MiniError> {
    value
        .to_string()
        .parse::<f64>()
        .map_err(|_| MiniError::new(ErrorKind::InvalidOperation, "value is not convertible to float"))
}

/// `match(version, predicate)`: the version-check function used throughout selector-to-
/// conditional conversion, e.g. `match(python, "<3.6")`. Compares dotted numeric version
/// components pairwise, treating missing trailing components as zero.
fn match_fn(version: MiniValue, predicate: String) -> Result<bool, MiniError> {
    let version = version.to_string();
    let (op, rhs) = split_predicate(&predicate)
        .ok_or_else(|| MiniError::new(ErrorKind::InvalidOperation, format!("malformed version predicate `{predicate}`")))?;
    let ordering = compare_versions(&version, rhs);
    Ok(match op {
        "==" => ordering == std::cmp::Ordering::Equal,
        "!=" => ordering != std::cmp::Ordering::Equal,
        "<=" => ordering != std::cmp::Ordering::Greater,
        ">=" => ordering != std::cmp::Ordering::Less,
        "<" => ordering == std::cmp::Ordering::Less,
        ">" => ordering == std::cmp::Ordering::Greater,
        _ => unreachable!("split_predicate only returns known operators"),
    })
}

fn split_predicate(predicate: &str) -> Option<(&str, &str)> {
    for op in ["==", "!=", "<=", ">=", "<", ">"] {
        if let Some(rest) = predicate.strip_prefix(op) {
            return Some((op, rest.trim()));
        }
    }
    None
}

fn compare_versions(lhs: &str, rhs: &str) -> std::cmp::Ordering {
    let mut lhs_parts = lhs.split('.').map(|p| p.parse::<u64>().unwrap_or(0));
    let mut rhs_parts = rhs.split('.').map(|p| p.parse::<u64>().unwrap_or(0));
    loop {
        match (lhs_parts.next(), rhs_parts.next()) {
            (None, None) => return std::cmp::Ordering::Equal,
            (Some(l), None) => {
                if l != 0 {
                    return std::cmp::Ordering::Greater;
                }
            }
            (None, Some(r)) => {
                if r != 0 {
                    return std::cmp::Ordering::Less;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_simple_arithmetic_and_comparisons() {
        let sandbox = Sandbox::new();
        let vars = HashMap::new();
        let result = sandbox.eval_primitive("1 + 2", &vars).unwrap();
        assert_eq!(result, Primitive::Int(3));
    }

    #[test]
    fn resolves_variable_lookups() {
        let sandbox = Sandbox::new();
        let mut vars = HashMap::new();
        vars.insert("version".to_string(), Variable(Primitive::from("1.2.3")));
        let result = sandbox.eval_primitive("version", &vars).unwrap();
        assert_eq!(result, Primitive::Str("1.2.3".to_string()));
    }

    #[test]
    fn match_compares_dotted_versions() {
        assert_eq!(compare_versions("3.6", "3.6.0"), std::cmp::Ordering::Equal);
        assert_eq!(compare_versions("3.10", "3.9"), std::cmp::Ordering::Greater);
    }

    #[test]
    fn ternary_expression_is_supported_by_minijinja_expressions() {
        let sandbox = Sandbox::new();
        let vars = HashMap::new();
        let result = sandbox.eval_primitive("1 if true else 2", &vars).unwrap();
        assert_eq!(result, Primitive::Int(1));
    }
}

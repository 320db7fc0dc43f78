use std::collections::HashMap;

use crm_types::Primitive;

use crate::sandbox::Sandbox;
use crate::variable::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `{{ expr }}`
    V0,
    /// `${{ expr }}`
    V1,
}

impl Dialect {
    fn open(self) -> &'static str {
        match self {
            Dialect::V0 => "{{",
            Dialect::V1 => "${{",
        }
    }
}

/// Finds every balanced template expression in `s` and substitutes its evaluated result in
/// place. An expression that fails to evaluate (undefined variable, evaluation error, or a
/// non-primitive result) is left intact as text and reported in the returned warning list,
/// matching the "expressions that fail to evaluate are left intact" contract.
pub fn substitute(s: &str, dialect: Dialect, sandbox: &Sandbox, vars: &HashMap<String, Variable>) -> (String, Vec<String>) {
    let mut out = String::with_capacity(s.len());
    let mut warnings = Vec::new();
    let bytes = s.as_bytes();
    let open = dialect.open();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(rel) = s[i..].find(open) {
            let start = i + rel;
            out.push_str(&s[i..start]);
            match find_close(s, start + open.len()) {
                Some((expr, end)) => {
                    match sandbox.eval_primitive(expr.trim(), vars) {
                        Ok(value) => out.push_str(&primitive_text(&value)),
                        Err(err) => {
                            out.push_str(&s[start..end]);
                            warnings.push(format!("template expression `{}` left unevaluated: {err}", expr.trim()));
                        }
                    }
                    i = end;
                }
                None => {
                    out.push_str(&s[start..]);
                    warnings.push(format!("unbalanced template delimiter at byte {start}"));
                    i = s.len();
                }
            }
        } else {
            out.push_str(&s[i..]);
            break;
        }
    }

    (out, warnings)
}

fn primitive_text(value: &Primitive) -> String {
    match value {
        Primitive::Null => String::new(),
        other => other.to_string(),
    }
}

/// Scans forward from just past an opening delimiter for the matching `}}`, tracking brace
/// depth and skipping over quoted string literals so a `}` inside a string does not close the
/// expression early. Returns the expression text and the index just past the closing `}}`.
fn find_close(s: &str, mut from: usize) -> Option<(&str, usize)> {
    let expr_start = from;
    let bytes = s.as_bytes();
    let mut depth: i32 = 0;
    let mut in_string: Option<u8> = None;

    while from < bytes.len() {
        let c = bytes[from];
        if let Some(quote) = in_string {
            if c == b'\\' {
                from += 2;
                continue;
            }
            if c == quote {
                in_string = None;
            }
            from += 1;
            continue;
        }
        match c {
            b'\'' | b'"' => in_string = Some(c),
            b'{' => depth += 1,
            b'}' => {
                if depth == 0 && bytes.get(from + 1) == Some(&b'}') {
                    return Some((&s[expr_start..from], from + 2));
                }
                depth -= 1;
            }
            _ => {}
        }
        from += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Variable;

    #[test]
    fn substitutes_v0_double_brace_expressions() {
        let sandbox = Sandbox::new();
        let mut vars = HashMap::new();
        vars.insert("version".to_string(), Variable(Primitive::from("1.2.3")));
        let (out, warnings) = substitute("pkg-{{ version }}.tar.gz", Dialect::V0, &sandbox, &vars);
        assert_eq!(out, "pkg-1.2.3.tar.gz");
        assert!(warnings.is_empty());
    }

    #[test]
    fn substitutes_v1_dollar_brace_expressions() {
        let sandbox = Sandbox::new();
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), Variable(Primitive::from("foo")));
        let (out, warnings) = substitute("${{ name }}-pkg", Dialect::V1, &sandbox, &vars);
        assert_eq!(out, "foo-pkg");
        assert!(warnings.is_empty());
    }

    #[test]
    fn leaves_unevaluatable_expressions_intact_with_a_warning() {
        let sandbox = Sandbox::new();
        let vars = HashMap::new();
        let (out, warnings) = substitute("{{ undefined_var }}", Dialect::V0, &sandbox, &vars);
        assert!(out.contains("undefined_var"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn braces_inside_string_literals_do_not_confuse_the_scanner() {
        let sandbox = Sandbox::new();
        let vars = HashMap::new();
        let (out, warnings) = substitute(r#"{{ "}}" }}"#, Dialect::V0, &sandbox, &vars);
        assert_eq!(out, "}}");
        assert!(warnings.is_empty());
    }
}

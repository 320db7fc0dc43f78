use crm_types::Primitive;

use crate::ast::SelectorExpr;
use crate::error::SelectorError;
use crate::lexer::CompareOp;

/// Evaluates a parsed selector expression against a selector context (as produced by
/// [`crate::BuildContext::selector_context`]).
///
/// An identifier not present in the context is treated as `None`/absent, which is falsy —
/// mirroring the original behaviour of defaulting unknown selector names to `None` rather than
/// erroring.
pub fn evaluate(expr: &SelectorExpr, context: &std::collections::HashMap<String, Primitive>) -> Result<bool, SelectorError> {
    match expr {
        SelectorExpr::Ident(name) => Ok(truthy(context.get(name))),
        SelectorExpr::Compare(name, op, rhs) => eval_compare(name, *op, rhs, context),
        SelectorExpr::Not(inner) => Ok(!evaluate(inner, context)?),
        SelectorExpr::And(lhs, rhs) => Ok(evaluate(lhs, context)? && evaluate(rhs, context)?),
        SelectorExpr::Or(lhs, rhs) => Ok(evaluate(lhs, context)? || evaluate(rhs, context)?),
    }
}

fn truthy(value: Option<&Primitive>) -> bool {
    match value {
        None | Some(Primitive::Null) => false,
        Some(Primitive::Bool(b)) => *b,
        Some(Primitive::Int(i)) => *i != 0,
        Some(Primitive::Float(f)) => *f != 0.0,
        Some(Primitive::Str(s)) => !s.is_empty(),
    }
}

fn eval_compare(
    name: &str,
    op: CompareOp,
    rhs: &str,
    context: &std::collections::HashMap<String, Primitive>,
) -> Result<bool, SelectorError> {
    let lhs = context.get(name);

    // Prefer numeric comparison when both sides parse as numbers (e.g. `py>=36` against the
    // precomputed integer `py` context entry); otherwise fall back to lexicographic string
    // comparison.
    let lhs_num = lhs.and_then(|v| match v {
        Primitive::Int(i) => Some(*i as f64),
        Primitive::Float(f) => Some(*f),
        Primitive::Str(s) => s.parse::<f64>().ok(),
        _ => None,
    });
    let rhs_num = rhs.parse::<f64>().ok();

    let ordering = if let (Some(l), Some(r)) = (lhs_num, rhs_num) {
        l.partial_cmp(&r)
    } else {
        let lhs_str = lhs.map(|v| v.to_string()).unwrap_or_default();
        lhs_str.as_str().partial_cmp(rhs)
    };

    let Some(ordering) = ordering else {
        return Ok(false);
    };

    Ok(match op {
        CompareOp::Eq => ordering == std::cmp::Ordering::Equal,
        CompareOp::Ne => ordering != std::cmp::Ordering::Equal,
        CompareOp::Lt => ordering == std::cmp::Ordering::Less,
        CompareOp::Le => ordering != std::cmp::Ordering::Greater,
        CompareOp::Gt => ordering == std::cmp::Ordering::Greater,
        CompareOp::Ge => ordering != std::cmp::Ordering::Less,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_identifier_is_falsy() {
        let ctx = HashMap::new();
        assert!(!truthy(ctx.get("missing")));
    }

    #[test]
    fn numeric_comparison_uses_the_py_int_context() {
        let mut ctx = HashMap::new();
        ctx.insert("py".to_string(), Primitive::Int(310));
        assert!(eval_compare("py", CompareOp::Ge, "36", &ctx).unwrap());
        assert!(!eval_compare("py", CompareOp::Lt, "36", &ctx).unwrap());
    }
}

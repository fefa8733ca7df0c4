//! Expression evaluator (spec §4.2).
//!
//! A pure, side-effect-free function: given a context document and an
//! expression string, resolve a value or a boolean. Errors never propagate
//! as `Result::Err` — an unrecognized form evaluates to `false`, with a
//! diagnostic returned alongside for the caller to surface without
//! aborting the step (spec: "a diagnostic surfaced via the execution's
//! error channel without aborting").

use serde_json::Value;

/// `${a.b.c}` or a bare literal token.
fn resolve(expr: &str, context: &Value) -> Value {
    let expr = expr.trim();
    if let Some(path) = expr.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        resolve_path(path, context)
    } else {
        Value::String(expr.to_string())
    }
}

/// Dotted path lookup; a missing segment resolves to `null`.
fn resolve_path(path: &str, context: &Value) -> Value {
    let mut current = context;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// String-form comparison: both sides are resolved to JSON values, then
/// compared by their JSON text. A `null` on either side makes the
/// comparison false for both `==` and `!=` (spec §4.1: "Null on either
/// side → comparison is false for `==` and false for `!=`").
fn compare(left: &str, right: &str, context: &Value) -> bool {
    let lv = resolve(left, context);
    let rv = resolve(right, context);
    if lv.is_null() || rv.is_null() {
        return false;
    }
    json_text(&lv) == json_text(&rv)
}

/// `!=` is not simply `!compare(...)`: a `null` operand makes `!=` false
/// too (spec §4.1: "Null on either side → comparison is false for `==`
/// and false for `!=`"), so the non-null branch is negated explicitly
/// rather than negating `compare`'s result.
fn not_equal(left: &str, right: &str, context: &Value) -> bool {
    let lv = resolve(left, context);
    let rv = resolve(right, context);
    if lv.is_null() || rv.is_null() {
        return false;
    }
    json_text(&lv) != json_text(&rv)
}

fn json_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a resolved value counts as "truthy" for a bare `${path}`
/// expression: non-null, non-empty string, not boolean `false`.
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Outcome of evaluating an expression: the resolved boolean plus an
/// optional diagnostic for unrecognized forms (spec §4.1 last bullet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalOutcome {
    pub value: bool,
    pub diagnostic: Option<String>,
}

impl EvalOutcome {
    fn ok(value: bool) -> Self {
        Self {
            value,
            diagnostic: None,
        }
    }
}

/// Evaluate an expression string against a context document to a boolean,
/// per the grammar in spec §4.1.
pub fn evaluate(expr: &str, context: &Value) -> EvalOutcome {
    let expr = expr.trim();

    if let Some(rest) = expr.strip_prefix('!') {
        let inner = evaluate(rest, context);
        return EvalOutcome {
            value: !inner.value,
            diagnostic: inner.diagnostic,
        };
    }

    if let Some((left, right)) = split_once_operator(expr, "!=") {
        return EvalOutcome::ok(not_equal(left, right, context));
    }
    if let Some((left, right)) = split_once_operator(expr, "==") {
        return EvalOutcome::ok(compare(left, right, context));
    }

    if expr.starts_with("${") && expr.ends_with('}') {
        return EvalOutcome::ok(is_truthy(&resolve(expr, context)));
    }

    EvalOutcome {
        value: false,
        diagnostic: Some(format!("unrecognized expression form: {expr:?}")),
    }
}

/// Resolve an expression to its raw value without boolean coercion
/// (used by the context projector's `${...}` substitution).
pub fn resolve_value(expr: &str, context: &Value) -> Value {
    resolve(expr, context)
}

fn split_once_operator<'a>(expr: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    expr.split_once(op)
        .map(|(l, r)| (l.trim(), r.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_path_resolves() {
        let ctx = json!({"a": {"b": {"c": 42}}});
        assert_eq!(resolve_value("${a.b.c}", &ctx), json!(42));
    }

    #[test]
    fn missing_path_is_null() {
        let ctx = json!({"a": 1});
        assert_eq!(resolve_value("${a.b.c}", &ctx), Value::Null);
    }

    #[test]
    fn bare_literal_resolves_to_itself() {
        let ctx = json!({});
        assert_eq!(resolve_value("skip", &ctx), json!("skip"));
    }

    #[test]
    fn equality_compares_by_json_text() {
        let ctx = json!({"class": {"text": "skip"}});
        assert!(evaluate("${class.text}==skip", &ctx).value);
        assert!(!evaluate("${class.text}==other", &ctx).value);
    }

    #[test]
    fn inequality_is_negated_equality() {
        let ctx = json!({"class": {"text": "skip"}});
        assert!(!evaluate("${class.text}!=skip", &ctx).value);
        assert!(evaluate("${class.text}!=other", &ctx).value);
    }

    #[test]
    fn null_operand_makes_both_comparisons_false() {
        let ctx = json!({});
        assert!(!evaluate("${missing}==anything", &ctx).value);
        assert!(!evaluate("${missing}!=anything", &ctx).value);
    }

    #[test]
    fn leading_bang_negates() {
        let ctx = json!({"flag": true});
        assert!(!evaluate("!${flag}", &ctx).value);
        assert!(evaluate("!${missing}", &ctx).value);
    }

    #[test]
    fn bare_path_truthiness() {
        let ctx = json!({"s": "", "t": "x", "b": false, "n": null});
        assert!(!evaluate("${s}", &ctx).value);
        assert!(evaluate("${t}", &ctx).value);
        assert!(!evaluate("${b}", &ctx).value);
        assert!(!evaluate("${n}", &ctx).value);
    }

    #[test]
    fn unrecognized_form_is_false_with_diagnostic() {
        let ctx = json!({});
        let outcome = evaluate("not a real expression (((", &ctx);
        assert!(!outcome.value);
        assert!(outcome.diagnostic.is_some());
    }

    #[test]
    fn pure_and_deterministic() {
        let ctx = json!({"a": {"b": 1}});
        let first = evaluate("${a.b}==1", &ctx);
        let second = evaluate("${a.b}==1", &ctx);
        assert_eq!(first, second);
    }
}

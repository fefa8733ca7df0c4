//! Context projector (spec §4.2).
//!
//! Pure function: given a JSON "input mapping" template and a context
//! document, produce the concrete input document for a step. Every string
//! leaf matching `^\$\{[^}]+\}$` is replaced by its resolved value from
//! context (which may be any JSON type); non-matching strings pass
//! through verbatim; arrays and objects are rebuilt recursively. A `null`
//! template means "pass the whole context through unchanged".

use serde_json::Value;

use crate::expression::resolve_value;

/// Project a template against a context document into a concrete input.
pub fn project(template: Option<&Value>, context: &Value) -> Value {
    match template {
        None => context.clone(),
        Some(Value::Null) => context.clone(),
        Some(t) => project_value(t, context),
    }
}

fn project_value(template: &Value, context: &Value) -> Value {
    match template {
        Value::String(s) if is_substitution(s) => resolve_value(s, context),
        Value::String(_) => template.clone(),
        Value::Array(items) => Value::Array(items.iter().map(|v| project_value(v, context)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), project_value(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// `^\$\{[^}]+\}$` — a whole-string `${...}` reference, not a partial
/// interpolation (the spec's projector substitutes the leaf entirely, it
/// does not do string templating inside a longer string).
fn is_substitution(s: &str) -> bool {
    s.starts_with("${") && s.ends_with('}') && s.len() > 3 && !s[2..s.len() - 1].contains('}')
}

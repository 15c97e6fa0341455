use serde_json::{Value, json};

/// Wraps a plain search term into a case-insensitive `$regex` clause.
///
/// Strings that start with `{` or end with `}` are treated as already
/// structured and pass through, as does every non-string value.
#[must_use]
pub fn transform_regexp_search(term: Value) -> Value {
    match term {
        Value::String(s) if !s.starts_with('{') && !s.ends_with('}') => {
            json!({ "$regex": s, "$options": "i" })
        }
        other => other,
    }
}

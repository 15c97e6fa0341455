//! Coerces raw filter and search values into typed BSON.

use crate::errors::ControllerError;
use bson::{Bson, Document};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Operators that execute server-side script and must never reach the store.
pub const FORBIDDEN_OPERATORS: [&str; 2] = ["$function", "$accumulator"];

/// Keys whose values are consumed as strings by `$dateFromString` and `$regex`.
const STRING_ONLY_KEYS: [&str; 2] = ["dateString", "$regex"];

const NAIVE_DATETIME_FORMATS: [&str; 3] =
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Normalizes a raw value into BSON.
///
/// Rules are applied in order and the first match wins:
/// 1. text containing a forbidden operator is rejected,
/// 2. `{...}` strings are parsed as JSON and normalized again,
/// 3. `true`/`false` in any case become booleans,
/// 4. the empty string stays empty,
/// 5. numeric text becomes a number,
/// 6. ISO-8601 text becomes a date,
/// 7. arrays are normalized element-wise,
/// 8. objects are normalized value-wise, except `dateString` and `$regex`
///    which are kept as strings,
/// 9. anything else is returned unchanged.
///
/// # Errors
/// `InvalidOperator` when a forbidden operator is present, `Json` when a
/// `{...}` string is not valid JSON.
pub fn normalize(value: &Value) -> Result<Bson, ControllerError> {
    let text = guard_text(value);
    if let Some(op) = FORBIDDEN_OPERATORS.iter().find(|op| text.contains(*op)) {
        log::error!("invalid operator found - {text}");
        return Err(ControllerError::InvalidOperator((*op).to_string()));
    }
    log::trace!("normalize {text}");

    if let Value::String(s) = value
        && s.starts_with('{')
        && s.ends_with('}')
    {
        let parsed: Value = serde_json::from_str(s)?;
        return normalize(&parsed);
    }
    if text.eq_ignore_ascii_case("true") {
        return Ok(Bson::Boolean(true));
    }
    if text.eq_ignore_ascii_case("false") {
        return Ok(Bson::Boolean(false));
    }
    if text.is_empty() {
        return Ok(Bson::String(String::new()));
    }
    match value {
        Value::Number(n) => return Ok(json_number_to_bson(n)),
        Value::String(s) => {
            if let Some(n) = parse_number(s) {
                return Ok(n);
            }
            if let Some(dt) = parse_iso8601(s) {
                return Ok(Bson::DateTime(bson::DateTime::from_millis(dt.timestamp_millis())));
            }
        }
        _ => {}
    }
    match value {
        Value::Array(items) => Ok(Bson::Array(items.iter().map(normalize).collect::<Result<_, _>>()?)),
        Value::Object(map) => {
            let mut out = Document::new();
            for (k, v) in map {
                let nv = if STRING_ONLY_KEYS.contains(&k.as_str()) {
                    Bson::String(plain_string(v))
                } else {
                    normalize(v)?
                };
                out.insert(k.clone(), nv);
            }
            Ok(Bson::Document(out))
        }
        Value::String(s) => Ok(Bson::String(s.clone())),
        Value::Null => Ok(Bson::Null),
        Value::Bool(b) => Ok(Bson::Boolean(*b)),
        Value::Number(n) => Ok(json_number_to_bson(n)),
    }
}

/// Textual form the security guard inspects: compact JSON for containers,
/// the plain text otherwise.
fn guard_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// String coercion for values that must stay textual.
fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(plain_string).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn json_number_to_bson(n: &serde_json::Number) -> Bson {
    if let Some(i) = n.as_i64() {
        return int_to_bson(i);
    }
    n.as_f64().map_or(Bson::Null, float_to_bson)
}

fn int_to_bson(i: i64) -> Bson {
    i32::try_from(i).map_or(Bson::Int64(i), Bson::Int32)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_bson(f: f64) -> Bson {
    // integral doubles are stored the same way integers are
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        return int_to_bson(f as i64);
    }
    Bson::Double(f)
}

/// Parses text that is entirely a finite decimal number.
fn parse_number(s: &str) -> Option<Bson> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(i) = t.parse::<i64>() {
        return Some(int_to_bson(i));
    }
    // reject the `inf`/`nan` spellings Rust accepts
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    t.parse::<f64>().ok().filter(|f| f.is_finite()).map(float_to_bson)
}

/// Accepts RFC 3339 date-times, offset-less date-times (read as UTC) and
/// plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ndt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

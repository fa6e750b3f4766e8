//! Value coercion for submitted form data.
//!
//! Every function here returns `None` for "drop this field", never an error:
//! a bad value for one column must not fail the whole submission.

use serde_json::{Number, Value};

use exped_types::{is_empty_value, lookup, Coercion};

const AFFIRMATIVE: &[&str] = &["si", "sí", "true", "1", "on", "yes"];
const NEGATIVE: &[&str] = &["no", "false", "0", "off"];

/// Parse a locale-formatted number: `.` is a thousands separator, the first
/// `,` is the decimal mark. `"1.234,56"` → `1234.56`.
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let normalized = s.replace('.', "").replacen(',', ".", 1);
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Map a yes/no token (case-insensitive) to a boolean.
pub fn parse_flag(raw: &str) -> Option<bool> {
    let s = raw.trim().to_lowercase();
    if AFFIRMATIVE.contains(&s.as_str()) {
        Some(true)
    } else if NEGATIVE.contains(&s.as_str()) {
        Some(false)
    } else {
        None
    }
}

pub fn to_number(value: &Value) -> Option<Value> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_locale_number(s)?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(number_value(n))
}

pub fn to_bool(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::String(s) => parse_flag(s).map(Value::Bool),
        _ => None,
    }
}

// Integral values go out as JSON integers so integer columns accept them.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Prepare one submitted `(column, value)` pair for writing.
///
/// Returns `None` when the column is not accepted, the value is blank, or the
/// value does not coerce to the column's type.
pub fn coerce_field(column: &str, raw: &Value) -> Option<Value> {
    let spec = lookup(column).filter(|f| f.accepted)?;

    let value = match raw {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    };
    if is_empty_value(Some(&value)) {
        return None;
    }

    match spec.coercion {
        Coercion::None => Some(value),
        Coercion::Number => to_number(&value),
        Coercion::Boolean => to_bool(&value),
    }
}

//! Defensive coercion of untrusted JSON fields received by the track endpoint.
//!
//! Every function here is total: malformed input becomes `None`, never an
//! error, so one bad field cannot reject an otherwise valid event.

use serde_json::{Map, Value};

/// Upper bound for free-text event fields.
pub const MAX_TEXT_CHARS: usize = 1000;
/// Upper bound for string values inside `metadata`.
pub const MAX_METADATA_STRING_CHARS: usize = 500;
/// Only the first N metadata entries are considered.
pub const MAX_METADATA_ENTRIES: usize = 20;

/// Convert a major-unit amount (`19.99`, `"19.99"`) to integer cents.
pub fn to_cents(value: Option<&Value>) -> Option<i64> {
    let major = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    let cents = (major * 100.0).round();
    if !cents.is_finite() || cents < i64::MIN as f64 || cents > i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}

/// Coerce an integer-ish value. Fractional numbers are truncated.
pub fn to_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Coerce to a bounded string. Null and empty strings are absent.
pub fn to_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(s) if s.is_empty() => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(truncate_chars(&text, MAX_TEXT_CHARS))
}

/// Keep at most [`MAX_METADATA_ENTRIES`] scalar entries of a JSON object.
///
/// Entries are taken in the client's order before filtering, so an object
/// with nested values among its first twenty keys keeps fewer than twenty.
pub fn sanitize_metadata(value: Option<&Value>) -> Option<Map<String, Value>> {
    let Value::Object(raw) = value? else {
        return None;
    };
    let clean: Map<String, Value> = raw
        .iter()
        .take(MAX_METADATA_ENTRIES)
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((
                k.clone(),
                Value::String(truncate_chars(s, MAX_METADATA_STRING_CHARS)),
            )),
            Value::Number(_) | Value::Bool(_) | Value::Null => Some((k.clone(), v.clone())),
            _ => None,
        })
        .collect();
    if clean.is_empty() {
        None
    } else {
        Some(clean)
    }
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

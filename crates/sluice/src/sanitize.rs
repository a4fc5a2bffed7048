//! Masking of secret-like fields for safe diagnostic logging.
//!
//! Applied to raw record values before they reach any log sink. Never
//! applied to data that is persisted or forwarded; terminal folders
//! always receive the original bytes.

use serde_json::Value;

use crate::schema::CARD_NUMBER_FIELD;

/// Replacement for card values too short to keep a visible suffix.
const SHORT_VALUE_MASK: &str = "****";

/// Produce a log-safe copy of `value`.
///
/// Any string under a key literally named `CustomerCardNumber` is masked:
/// values of eight or more characters keep only their last four, shorter
/// ones collapse to a fixed placeholder. Everything else passes through
/// unchanged, recursing into objects and arrays.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    let masked = if key == CARD_NUMBER_FIELD && item.is_string() {
                        mask_card_value(item)
                    } else {
                        sanitize(item)
                    };
                    (key.clone(), masked)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn mask_card_value(value: &Value) -> Value {
    let Some(raw) = value.as_str() else {
        return value.clone();
    };
    let length = raw.chars().count();
    if length < 8 {
        return Value::String(SHORT_VALUE_MASK.to_string());
    }
    let suffix: String = raw.chars().skip(length - 4).collect();
    Value::String(format!("{}{suffix}", "*".repeat(length - 4)))
}

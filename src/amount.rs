//! Monetary amounts are stored as decimal text (`"0"`, `"75"`, `"12.5"`) and
//! only turned into `f64` for arithmetic.

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AmountError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("amount must not be negative, got {0}")]
    Negative(String),
}

/// Parses a client supplied amount. Rejects anything that is not a finite,
/// non-negative number so the stored `raised` value can only grow.
pub fn parse_amount(raw: &str) -> Result<f64, AmountError> {
    let trimmed = raw.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| AmountError::NotANumber(raw.to_string()))?;
    if !value.is_finite() {
        return Err(AmountError::NotANumber(raw.to_string()));
    }
    if value < 0.0 {
        return Err(AmountError::Negative(raw.to_string()));
    }
    Ok(value)
}

/// Formats with the shortest representation that round-trips, so whole
/// numbers come out without a fractional part.
pub fn format_amount(value: f64) -> String {
    // -0.0 would otherwise print as "-0"
    if value == 0.0 {
        return "0".to_string();
    }
    value.to_string()
}

/// Adds `delta` to a stored amount and returns the new stored text.
pub fn add_amounts(current: &str, delta: f64) -> Result<String, AmountError> {
    let current: f64 = current
        .trim()
        .parse()
        .map_err(|_| AmountError::NotANumber(current.to_string()))?;
    Ok(format_amount(current + delta))
}

/// Accepts either a JSON string or a JSON number and yields its text form.
/// Missing and `null` values become `None`.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string or a number, got {}",
            other
        ))),
    }
}

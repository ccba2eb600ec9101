//! Parsing of loosely typed request fields.
//!
//! Clients send identifiers and quantities both as JSON numbers and as
//! numeric strings.

use crate::error::{DistributionError, DistributionResult};
use serde_json::Value;

/// A present, positive integer id, or 400 naming `field`.
pub fn positive_id(value: Option<&Value>, field: &str) -> DistributionResult<i64> {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match parsed {
        Some(id) if id > 0 => Ok(id),
        _ => Err(DistributionError::validation(format!(
            "{field} is required and must be a positive integer"
        ))),
    }
}

/// Same rule for path segments.
pub fn positive_id_str(raw: &str, field: &str) -> DistributionResult<i64> {
    positive_id(Some(&Value::String(raw.to_string())), field)
}

/// A numeric quantity if one was supplied. Anything unparseable counts as absent.
pub fn quantity(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Finite and strictly positive.
pub fn is_valid_quantity(quantity: Option<f64>) -> bool {
    matches!(quantity, Some(q) if q.is_finite() && q > 0.0)
}

/// Trimmed, non-empty text, or `None`.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

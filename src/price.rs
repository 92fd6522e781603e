//! Prices and other loosely typed numbers returned by the backend
//!
//! The backend serializes decimals either as JSON numbers or as numeric
//! strings. Anything that does not parse becomes NaN and renders as the
//! `¥-` placeholder instead of failing the whole response.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Placeholder shown for prices that are not finite numbers
pub const PRICE_PLACEHOLDER: &str = "¥-";

/// A monetary amount as returned by the backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Price(f64);

impl Price {
    /// Wrap a raw amount
    pub fn new(amount: f64) -> Self {
        Self(amount)
    }

    /// The raw amount, possibly NaN
    pub fn amount(&self) -> f64 {
        self.0
    }

    /// Whether the amount can be displayed
    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }

    /// `¥12.30`, or the placeholder when the amount is not finite
    pub fn format(&self) -> String {
        if self.is_finite() {
            format!("¥{:.2}", self.0)
        } else {
            PRICE_PLACEHOLDER.to_string()
        }
    }

    /// Amount saved buying at `sale` instead of `original`
    pub fn saving(original: Price, sale: Price) -> Price {
        Price(original.0 - sale.0)
    }
}

impl Default for Price {
    fn default() -> Self {
        Self(f64::NAN)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_finite() {
            serializer.serialize_f64(self.0)
        } else {
            serializer.serialize_none()
        }
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Price(to_number(&value)))
    }
}

/// Interpret a JSON value as a number: numbers as-is, numeric strings parsed,
/// everything else NaN.
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Deserialize an optional loosely typed integer (number or numeric string).
/// Missing, null or unparseable values become `None`.
pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        let n = to_number(&v);
        (n.is_finite() && n >= 0.0).then(|| n.trunc() as u64)
    }))
}

/// Deserialize a loosely typed number; missing or unparseable values are NaN
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map_or(f64::NAN, to_number))
}

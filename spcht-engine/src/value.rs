//! Scalar - dynamic value type at the record boundary
//!
//! Record fields are schemaless; a field value is one of the three scalar
//! kinds below, or an ordered sequence of them. Comparison follows
//! **numeric class** rules: two values that both fit an integer compare as
//! integers, two that both fit a float compare numerically, anything else
//! compares lexicographically on the string form. `Int(5)` and `Str("5")`
//! are therefore equal under [`Scalar::compare`], which is what the
//! condition evaluator needs.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single record scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// String value
    Str(String),
}

impl Scalar {
    /// Build a scalar from a JSON leaf value
    ///
    /// Returns `None` for `null` and for non-leaf values (objects, arrays).
    /// Booleans are admitted as their string form.
    pub fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Scalar::Int(i))
                } else {
                    n.as_f64().map(Scalar::Float)
                }
            }
            Value::Bool(b) => Some(Scalar::Str(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// String form of this scalar
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Str(s) => s.clone(),
        }
    }

    /// Check if this is a string scalar
    pub fn is_str(&self) -> bool {
        matches!(self, Scalar::Str(_))
    }

    /// Integer view, if this value fits one
    ///
    /// Numeric strings participate, so `Str("42")` yields `Some(42)`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Float(_) => None,
            Scalar::Str(s) => s.trim().parse::<i64>().ok(),
        }
    }

    /// Float view, if this value fits one
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Str(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Compare two scalars with numeric coercion
    ///
    /// Both sides are coerced to the narrowest of int → float → string
    /// that fits both; numeric order when both are numeric, lexicographic
    /// order on the string forms otherwise.
    pub fn compare(&self, other: &Scalar) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_int(), other.as_int()) {
            return a.cmp(&b);
        }
        if let (Some(a), Some(b)) = (self.as_float(), other.as_float()) {
            return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        }
        self.as_text().cmp(&other.as_text())
    }

    /// Equality under numeric coercion
    pub fn loosely_eq(&self, other: &Scalar) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

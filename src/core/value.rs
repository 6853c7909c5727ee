//! Purpose: Represent dataset values and their native ordering.
//! Exports: `Value`, `ValueKind`.
//! Role: Atomic unit flowing through the filter/order/paginate pipeline.
//! Invariants: A column's result set is homogeneous in kind; cross-kind
//! comparison is a `TypeMismatch` error, never a silent coercion.
//! Invariants: Numbers order by `f64::total_cmp`; text orders lexicographically.

use std::cmp::Ordering;
use std::fmt;

use serde::de::{Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Text,
    Number,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Number => "number",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Text(_) => ValueKind::Text,
            Value::Number(_) => ValueKind::Number,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text.as_str()),
            Value::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            Value::Text(_) => None,
        }
    }

    /// Compare two values of the same kind; mixed kinds fail fast.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, Error> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            (Value::Number(a), Value::Number(b)) => Ok(a.total_cmp(b)),
            (a, b) => Err(Error::new(ErrorKind::TypeMismatch).with_message(format!(
                "cannot compare {} with {}",
                a.kind().as_str(),
                b.kind().as_str()
            ))),
        }
    }

    /// Total ordering over same-kind values. Callers verify homogeneity first;
    /// mixed kinds fall back to a fixed kind rank so the comparator stays total.
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(_), Value::Number(_)) => Ordering::Less,
            (Value::Number(_), Value::Text(_)) => Ordering::Greater,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => write!(f, "{text}"),
            Value::Number(number) => write!(f, "{number}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(text) => serializer.serialize_str(text),
            Value::Number(number) => {
                // Integral values round-trip as JSON integers.
                if number.is_finite()
                    && number.fract() == 0.0
                    && *number >= i64::MIN as f64
                    && *number <= i64::MAX as f64
                {
                    serializer.serialize_i64(*number as i64)
                } else {
                    serializer.serialize_f64(*number)
                }
            }
        }
    }
}

struct ValueVisitor;

impl Visitor<'_> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a string or a number")
    }

    fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Value, E> {
        Ok(Value::Text(value.to_string()))
    }

    fn visit_string<E: serde::de::Error>(self, value: String) -> Result<Value, E> {
        Ok(Value::Text(value))
    }

    fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<Value, E> {
        Ok(Value::Number(value as f64))
    }

    fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Value, E> {
        Ok(Value::Number(value as f64))
    }

    fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<Value, E> {
        Ok(Value::Number(value))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::{Value, ValueKind};
    use crate::core::error::ErrorKind;
    use std::cmp::Ordering;

    #[test]
    fn same_kind_comparison_orders_naturally() {
        let a = Value::from("alpha");
        let b = Value::from("beta");
        assert_eq!(a.try_cmp(&b).unwrap(), Ordering::Less);

        let x = Value::from(2.5);
        let y = Value::from(10.0);
        assert_eq!(x.try_cmp(&y).unwrap(), Ordering::Less);
    }

    #[test]
    fn mixed_kind_comparison_is_type_mismatch() {
        let text = Value::from("10");
        let number = Value::from(10.0);
        let err = text.try_cmp(&number).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn integral_numbers_serialize_without_fraction() {
        let rendered = serde_json::to_string(&Value::from(5.0)).unwrap();
        assert_eq!(rendered, "5");
        let rendered = serde_json::to_string(&Value::from(0.25)).unwrap();
        assert_eq!(rendered, "0.25");
    }

    #[test]
    fn deserializes_strings_and_numbers() {
        let values: Vec<Value> = serde_json::from_str(r#"["A", 3, 1.5]"#).unwrap();
        assert_eq!(values[0].kind(), ValueKind::Text);
        assert_eq!(values[1].as_number(), Some(3.0));
        assert_eq!(values[2].as_number(), Some(1.5));
    }

    #[test]
    fn rejects_non_scalar_values() {
        let result: Result<Value, _> = serde_json::from_str("true");
        assert!(result.is_err());
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::transform::Transform;

/// Range in which the original JS client could trust an integral `number`;
/// doubles outside it stay doubles instead of converting to `Integer`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// In-memory document value tree.
///
/// Every value that can be stored in a document is one of these variants; the
/// codec and the diff engine dispatch on them exhaustively. A [`Transform`]
/// may stand in for a field value inside a map during a write (it is recorded
/// as an atomic server-side operation instead of a literal field), but never
/// inside a list and never as a whole document.
#[derive(Clone, Debug, PartialEq)]
pub enum DocValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    List(Vec<DocValue>),
    Map(BTreeMap<String, DocValue>),
    Transform(Transform),
}

impl DocValue {
    pub fn null() -> Self {
        DocValue::Null
    }

    pub fn from_bool(value: bool) -> Self {
        DocValue::Boolean(value)
    }

    pub fn from_integer(value: i64) -> Self {
        DocValue::Integer(value)
    }

    /// Converts a float, collapsing integral values into [`DocValue::Integer`].
    ///
    /// Mirrors the wire contract that an integer-valued number is encoded as an
    /// integer value (decimal string payload) rather than a double literal.
    pub fn from_double(value: f64) -> Self {
        if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
            DocValue::Integer(value as i64)
        } else {
            DocValue::Double(value)
        }
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        DocValue::String(value.into())
    }

    pub fn from_timestamp(value: DateTime<Utc>) -> Self {
        DocValue::Timestamp(value)
    }

    pub fn from_list(values: Vec<DocValue>) -> Self {
        DocValue::List(values)
    }

    pub fn from_map(fields: BTreeMap<String, DocValue>) -> Self {
        DocValue::Map(fields)
    }

    /// Builds a map value from `(key, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<DocValue>,
    {
        DocValue::Map(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, DocValue>> {
        match self {
            DocValue::Map(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DocValue]> {
        match self {
            DocValue::List(values) => Some(values),
            _ => None,
        }
    }

    /// True for the scalar variants the array diff can compare by value.
    ///
    /// Timestamps, nested lists/maps and transforms are not primitives; arrays
    /// containing them are always written wholesale.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            DocValue::Null
                | DocValue::Boolean(_)
                | DocValue::Integer(_)
                | DocValue::Double(_)
                | DocValue::String(_)
        )
    }
}

impl From<bool> for DocValue {
    fn from(value: bool) -> Self {
        DocValue::Boolean(value)
    }
}

impl From<i64> for DocValue {
    fn from(value: i64) -> Self {
        DocValue::Integer(value)
    }
}

impl From<i32> for DocValue {
    fn from(value: i32) -> Self {
        DocValue::Integer(value as i64)
    }
}

impl From<f64> for DocValue {
    fn from(value: f64) -> Self {
        DocValue::from_double(value)
    }
}

impl From<&str> for DocValue {
    fn from(value: &str) -> Self {
        DocValue::String(value.to_string())
    }
}

impl From<String> for DocValue {
    fn from(value: String) -> Self {
        DocValue::String(value)
    }
}

impl From<DateTime<Utc>> for DocValue {
    fn from(value: DateTime<Utc>) -> Self {
        DocValue::Timestamp(value)
    }
}

impl From<Vec<DocValue>> for DocValue {
    fn from(values: Vec<DocValue>) -> Self {
        DocValue::List(values)
    }
}

impl From<BTreeMap<String, DocValue>> for DocValue {
    fn from(fields: BTreeMap<String, DocValue>) -> Self {
        DocValue::Map(fields)
    }
}

impl From<Transform> for DocValue {
    fn from(transform: Transform) -> Self {
        DocValue::Transform(transform)
    }
}

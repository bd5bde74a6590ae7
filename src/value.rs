//! Column value model for declaratively-typed entity properties.
//!
//! Every core column declared in a [`Schema`](crate::schema::Schema) carries a
//! [`PropertyType`], and every stored value is a [`Value`]. The enum is kept
//! deliberately small: the entity tables this framework manages only ever hold
//! strings, integers and flags. Open-ended metadata values use
//! `serde_json::Value` instead and never pass through this type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive type of a declared core column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// Variable-length text column.
    String,
    /// Signed 64-bit integer column.
    Int,
    /// Boolean column.
    Bool,
}

impl PropertyType {
    /// The zero value for a column of this type, used when the schema
    /// declares no explicit default.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            PropertyType::String => Value::Str(String::new()),
            PropertyType::Int => Value::Int(0),
            PropertyType::Bool => Value::Bool(false),
        }
    }
}

/// A single column value.
///
/// `Value` is what [`Entity::get`](crate::entity::Entity::get) returns and
/// what the data store binds into reads and writes. Serialization is
/// untagged so values round-trip through JSON as their natural scalar form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent / SQL NULL.
    Null,
    /// Text value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
}

impl Value {
    /// Borrow the value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Read the value as an integer, if it is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Read the value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for the empty string. The external registry rejects explicit
    /// empty-string arguments, so the reformat step filters on this.
    #[must_use]
    pub fn is_empty_string(&self) -> bool {
        matches!(self, Value::Str(s) if s.is_empty())
    }

    /// Consume the value into its display string.
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Value::Str(s) => s,
            other => other.to_string(),
        }
    }

    /// Consume the value into an integer, parsing text when possible.
    #[must_use]
    pub fn into_int(self) -> i64 {
        match self {
            Value::Int(i) => i,
            Value::Bool(b) => i64::from(b),
            Value::Str(s) => s.parse().unwrap_or(0),
            Value::Null => 0,
        }
    }

    /// Coerce this value to the given column type.
    ///
    /// Reads from the physical table come back untyped, and callers may set
    /// an integer column from a string form; coercion keeps the in-memory
    /// bucket aligned with the declared type. `Null` is preserved.
    #[must_use]
    pub fn coerce(self, ty: PropertyType) -> Value {
        if self.is_null() {
            return Value::Null;
        }
        match ty {
            PropertyType::String => Value::Str(self.into_string()),
            PropertyType::Int => Value::Int(self.into_int()),
            PropertyType::Bool => Value::Bool(self.into_int() != 0),
        }
    }

    /// Convert into a JSON value, used when a non-column property is routed
    /// to the metadata bucket.
    #[must_use]
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Str(s) => serde_json::Value::String(s),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Bool(b) => serde_json::Value::Bool(b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{}", i64::from(*b)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_aligns_with_column_type() {
        assert_eq!(Value::from("42").coerce(PropertyType::Int), Value::Int(42));
        assert_eq!(Value::Int(1).coerce(PropertyType::Bool), Value::Bool(true));
        assert_eq!(
            Value::Int(7).coerce(PropertyType::String),
            Value::Str("7".to_owned())
        );
        assert_eq!(Value::Null.coerce(PropertyType::Int), Value::Null);
    }

    #[test]
    fn empty_string_detection() {
        assert!(Value::from("").is_empty_string());
        assert!(!Value::from("x").is_empty_string());
        assert!(!Value::Null.is_empty_string());
        assert!(!Value::Int(0).is_empty_string());
    }

    #[test]
    fn serde_round_trip_is_untagged() {
        let json = serde_json::to_string(&Value::Str("color".to_owned())).unwrap();
        assert_eq!(json, "\"color\"");
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Str("color".to_owned()));

        let json = serde_json::to_string(&Value::Int(5)).unwrap();
        assert_eq!(json, "5");
    }
}

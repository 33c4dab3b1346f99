//! Column values and scan destinations
//!
//! [`SqlValue`] is the owned, driver-agnostic representation of a single
//! column value. [`FromSqlValue`] is the destination-pointer contract: an
//! addressable slot a column value is written into during a row scan.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::{Result, SqlError};

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit integer
    Long(i64),
    /// 64-bit floating point
    Double(f64),
    /// Text value
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(v) => Some(*v),
            SqlValue::Long(v) => Some(*v != 0),
            SqlValue::Text(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Get the value as an i64
    pub fn as_long(&self) -> Option<i64> {
        match self {
            SqlValue::Long(v) => Some(*v),
            SqlValue::Bool(v) => Some(*v as i64),
            SqlValue::Double(v) => Some(*v as i64),
            SqlValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Get the value as an f64
    pub fn as_double(&self) -> Option<f64> {
        match self {
            SqlValue::Double(v) => Some(*v),
            SqlValue::Long(v) => Some(*v as f64),
            SqlValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Get the value as a string reference (zero-copy, `Text` only)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the value as a string (with conversion)
    pub fn as_string(&self) -> String {
        match self {
            SqlValue::Null => "null".to_string(),
            SqlValue::Bool(v) => v.to_string(),
            SqlValue::Long(v) => v.to_string(),
            SqlValue::Double(v) => v.to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }

    /// Get the value as bytes (zero-copy)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Bytes(b) => Some(b),
            SqlValue::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Check if the value is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Long(_) => "long",
            SqlValue::Double(_) => "double",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Long(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Long(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Double(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => SqlValue::Null,
        }
    }
}

/// A single row keyed by column name, as returned by single-row queries
pub type NamedRow = HashMap<String, SqlValue>;

/// A destination slot a single column value is written into during a scan
///
/// Conversions are lenient in the same way the [`SqlValue`] accessors are;
/// a value that cannot be represented in the destination type is a
/// [`SqlError::TypeMismatch`], which aborts the enclosing scan.
pub trait FromSqlValue {
    /// Accept a single column's value
    fn accept(&mut self, value: SqlValue) -> Result<()>;
}

/// Shorthand for a borrowed destination slot
pub type SqlDest<'a> = &'a mut dyn FromSqlValue;

impl FromSqlValue for SqlValue {
    fn accept(&mut self, value: SqlValue) -> Result<()> {
        *self = value;
        Ok(())
    }
}

impl FromSqlValue for i64 {
    fn accept(&mut self, value: SqlValue) -> Result<()> {
        match value.as_long() {
            Some(v) => {
                *self = v;
                Ok(())
            }
            None => Err(SqlError::type_mismatch("long", value.type_name())),
        }
    }
}

impl FromSqlValue for i32 {
    fn accept(&mut self, value: SqlValue) -> Result<()> {
        let long = value
            .as_long()
            .ok_or_else(|| SqlError::type_mismatch("long", value.type_name()))?;
        *self = i32::try_from(long).map_err(|_| SqlError::type_mismatch("int", "long"))?;
        Ok(())
    }
}

impl FromSqlValue for f64 {
    fn accept(&mut self, value: SqlValue) -> Result<()> {
        match value.as_double() {
            Some(v) => {
                *self = v;
                Ok(())
            }
            None => Err(SqlError::type_mismatch("double", value.type_name())),
        }
    }
}

impl FromSqlValue for bool {
    fn accept(&mut self, value: SqlValue) -> Result<()> {
        match value.as_bool() {
            Some(v) => {
                *self = v;
                Ok(())
            }
            None => Err(SqlError::type_mismatch("bool", value.type_name())),
        }
    }
}

impl FromSqlValue for String {
    fn accept(&mut self, value: SqlValue) -> Result<()> {
        match value {
            SqlValue::Text(s) => {
                *self = s;
                Ok(())
            }
            SqlValue::Null => Err(SqlError::type_mismatch("text", "null")),
            other => {
                *self = other.as_string();
                Ok(())
            }
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn accept(&mut self, value: SqlValue) -> Result<()> {
        match value {
            SqlValue::Bytes(b) => {
                *self = b;
                Ok(())
            }
            SqlValue::Text(s) => {
                *self = s.into_bytes();
                Ok(())
            }
            other => Err(SqlError::type_mismatch("bytes", other.type_name())),
        }
    }
}

impl<T: FromSqlValue + Default> FromSqlValue for Option<T> {
    fn accept(&mut self, value: SqlValue) -> Result<()> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        let mut slot = T::default();
        slot.accept(value)?;
        *self = Some(slot);
        Ok(())
    }
}

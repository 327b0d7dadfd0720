//! Row representation and mapping utilities.
//!
//! Rows travel through the crate as JSON objects keyed by column name. Write payloads
//! use the same shape, which lets ORM-style callers pass `serde_json::json!({...})` or any
//! `Serialize` struct.

use crate::error::{CompatError, CompatResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A single result row (or write payload row): column name -> value.
pub type Row = Map<String, Value>;

/// Trait for types that can be built from a [`Row`].
///
/// Blanket-implemented for every `DeserializeOwned` type.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> CompatResult<Self>;
}

impl<T: DeserializeOwned> FromRow for T {
    fn from_row(row: &Row) -> CompatResult<Self> {
        serde_json::from_value(Value::Object(row.clone()))
            .map_err(|e| CompatError::Serialization(e.to_string()))
    }
}

/// Typed accessors on [`Row`].
pub trait RowExt {
    /// Get a column and deserialize it into `T`.
    fn try_get_column<T: DeserializeOwned>(&self, column: &str) -> CompatResult<T>;

    /// Get a column as a string slice, if present and textual.
    fn get_str(&self, column: &str) -> Option<&str>;

    /// Get a column as an i64, if present and integral.
    fn get_i64(&self, column: &str) -> Option<i64>;
}

impl RowExt for Row {
    fn try_get_column<T: DeserializeOwned>(&self, column: &str) -> CompatResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| CompatError::Serialization(format!("missing column '{column}'")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| CompatError::Serialization(format!("column '{column}': {e}")))
    }

    fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }
}

/// One or many rows, as accepted by `insert()` and `upsert()`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    One(Row),
    Many(Vec<Row>),
}

impl Payload {
    /// Convert any serializable value into a payload.
    ///
    /// Objects become [`Payload::One`]; arrays of objects become [`Payload::Many`].
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> CompatResult<Self> {
        Self::try_from(serde_json::to_value(value)?)
    }

    /// Whether this payload was given as a list.
    pub fn is_many(&self) -> bool {
        matches!(self, Payload::Many(_))
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Payload::One(row) => vec![row],
            Payload::Many(rows) => rows,
        }
    }
}

impl TryFrom<Value> for Payload {
    type Error = CompatError;

    fn try_from(value: Value) -> CompatResult<Self> {
        match value {
            Value::Object(row) => Ok(Payload::One(row)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    other => Err(CompatError::validation(format!(
                        "payload rows must be objects, got {other}"
                    ))),
                })
                .collect::<CompatResult<Vec<_>>>()
                .map(Payload::Many),
            other => Err(CompatError::validation(format!(
                "payload must be an object or an array of objects, got {other}"
            ))),
        }
    }
}

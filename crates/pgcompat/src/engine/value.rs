//! Conversions between loosely-typed JSON values and SQLite storage classes.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

/// Convert a JSON value into something SQLite can bind.
///
/// - `bool` binds as `0`/`1`
/// - integers that fit `i64` bind as INTEGER, other numbers as REAL
/// - arrays and objects bind as JSON text
pub fn to_sqlite_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Convert a SQLite column value into JSON.
///
/// Blobs become arrays of bytes; non-finite REALs become `null`.
pub fn from_sqlite_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_bind_natively() {
        assert_eq!(to_sqlite_value(&json!(null)), SqlValue::Null);
        assert_eq!(to_sqlite_value(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sqlite_value(&json!(42)), SqlValue::Integer(42));
        assert_eq!(to_sqlite_value(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(to_sqlite_value(&json!("x")), SqlValue::Text("x".into()));
    }

    #[test]
    fn containers_bind_as_json_text() {
        assert_eq!(
            to_sqlite_value(&json!({"a": [1, 2]})),
            SqlValue::Text(r#"{"a":[1,2]}"#.into())
        );
    }

    #[test]
    fn column_values_decode() {
        assert_eq!(from_sqlite_value(ValueRef::Integer(7)), json!(7));
        assert_eq!(from_sqlite_value(ValueRef::Text(b"hi")), json!("hi"));
        assert_eq!(from_sqlite_value(ValueRef::Real(f64::NAN)), Value::Null);
        assert_eq!(from_sqlite_value(ValueRef::Blob(&[1, 2])), json!([1, 2]));
    }
}

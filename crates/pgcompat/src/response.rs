//! The `{ data, error, count }` result shape returned by every executed builder and RPC.

use crate::error::{CompatError, CompatResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `.single()` / `.maybeSingle()` matched no rows.
pub const NOT_FOUND: &str = "PGRST116";
/// `.single()` / `.maybeSingle()` matched more than one row.
pub const MULTIPLE_ROWS: &str = "PGRST117";
/// `rpc()` was called with a name outside the registry.
pub const UNKNOWN_FUNCTION: &str = "PGRST202";

/// Structured error carried inside a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ResponseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: &str) -> Self {
        Self {
            message: message.into(),
            code: Some(code.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code.as_deref() == Some(NOT_FOUND)
    }

    pub fn is_multiple_rows(&self) -> bool {
        self.code.as_deref() == Some(MULTIPLE_ROWS)
    }
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ResponseError {}

impl From<CompatError> for ResponseError {
    fn from(err: CompatError) -> Self {
        Self {
            code: err.sqlstate().map(str::to_string),
            message: err.to_string(),
        }
    }
}

/// Result of an executed query.
///
/// Invariant: `error.is_some()` implies `data.is_none()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub data: Option<Value>,
    pub error: Option<ResponseError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl Response {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            data,
            error: None,
            count: None,
        }
    }

    pub fn failed(error: ResponseError) -> Self {
        Self {
            data: None,
            error: Some(error),
            count: None,
        }
    }

    pub(crate) fn with_count(mut self, count: Option<i64>) -> Self {
        self.count = count;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result`, dropping `count`.
    pub fn into_result(self) -> Result<Option<Value>, ResponseError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }

    /// Deserialize `data` into `T`.
    ///
    /// A response error becomes [`CompatError::Other`]; `data: null` deserializes as JSON
    /// `null` (so `Option<T>` targets yield `None`).
    pub fn data_as<T: DeserializeOwned>(&self) -> CompatResult<T> {
        if let Some(err) = &self.error {
            return Err(CompatError::Other(err.to_string()));
        }
        let data = self.data.clone().unwrap_or(Value::Null);
        Ok(serde_json::from_value(data)?)
    }
}

impl From<CompatError> for Response {
    fn from(err: CompatError) -> Self {
        Response::failed(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failed_response_has_no_data() {
        let resp = Response::failed(ResponseError::with_code("no rows", NOT_FOUND));
        assert!(resp.data.is_none());
        assert!(resp.error.as_ref().unwrap().is_not_found());
        assert!(resp.into_result().is_err());
    }

    #[test]
    fn engine_errors_keep_sqlstate() {
        let resp: Response = CompatError::UniqueViolation("users.email".into()).into();
        assert_eq!(resp.error.unwrap().code.as_deref(), Some("23505"));
    }

    #[test]
    fn data_as_deserializes() {
        let resp = Response::ok(Some(json!([{"n": 1}, {"n": 2}])));
        let rows: Vec<serde_json::Map<String, Value>> = resp.data_as().unwrap();
        assert_eq!(rows.len(), 2);

        let empty = Response::ok(None);
        let none: Option<i64> = empty.data_as().unwrap();
        assert!(none.is_none());
    }
}

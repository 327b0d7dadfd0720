//! Error types for pgcompat

use thiserror::Error;

/// Result type alias for pgcompat operations
pub type CompatResult<T> = Result<T, CompatError>;

/// Error types for query building and execution.
///
/// Configuration errors (`InvalidIdentifier`, `Unsupported`, `Config`, `Parse`,
/// `Validation`) are caller bugs and are returned from `execute()` before any SQL reaches
/// the engine. Everything else comes back from the engine and is folded into a
/// [`Response`](crate::Response) by the executors.
#[derive(Debug, Error)]
pub enum CompatError {
    /// Identifier failed `[A-Za-z_][A-Za-z0-9_]*` validation
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Feature outside the supported PostgREST subset
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Builder misconfiguration (e.g. upsert without a conflict target)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filter expression parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Payload validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution error
    #[error("Engine error: {0}")]
    Engine(#[from] rusqlite::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// NOT NULL constraint violation
    #[error("Not null violation: {0}")]
    NotNullViolation(String),

    /// Row decode/encode error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl CompatError {
    /// Create an unsupported-feature error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error is a caller bug raised before any SQL was issued.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier(_)
                | Self::Unsupported(_)
                | Self::Config(_)
                | Self::Parse(_)
                | Self::Validation(_)
        )
    }

    /// Copy a configuration error. Engine-backed variants have no cheap copy.
    pub(crate) fn try_clone(&self) -> Option<Self> {
        Some(match self {
            Self::InvalidIdentifier(s) => Self::InvalidIdentifier(s.clone()),
            Self::Unsupported(s) => Self::Unsupported(s.clone()),
            Self::Config(s) => Self::Config(s.clone()),
            Self::Parse(s) => Self::Parse(s.clone()),
            Self::Validation(s) => Self::Validation(s.clone()),
            _ => return None,
        })
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// PostgreSQL-compatible SQLSTATE for classified engine errors.
    pub fn sqlstate(&self) -> Option<&'static str> {
        match self {
            Self::UniqueViolation(_) => Some("23505"),
            Self::ForeignKeyViolation(_) => Some("23503"),
            Self::CheckViolation(_) => Some("23514"),
            Self::NotNullViolation(_) => Some("23502"),
            _ => None,
        }
    }

    /// Parse a rusqlite error into a more specific CompatError
    pub fn from_engine_error(err: rusqlite::Error) -> Self {
        use rusqlite::ffi;

        if let rusqlite::Error::SqliteFailure(failure, message) = &err {
            let message = message.clone().unwrap_or_else(|| failure.to_string());
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return Self::UniqueViolation(message);
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Self::ForeignKeyViolation(message),
                ffi::SQLITE_CONSTRAINT_CHECK => return Self::CheckViolation(message),
                ffi::SQLITE_CONSTRAINT_NOTNULL => return Self::NotNullViolation(message),
                _ => {}
            }
        }
        Self::Engine(err)
    }
}

impl From<serde_json::Error> for CompatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CompatError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Other(format!("engine task failed: {err}"))
    }
}

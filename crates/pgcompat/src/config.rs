//! Client and engine configuration.

use crate::error::{CompatError, CompatResult};
use std::path::PathBuf;
use std::time::Duration;

/// Timestamp columns stamped with the current UTC time when absent from an insert payload.
pub const DEFAULT_TIMESTAMP_COLUMNS: &[&str] = &[
    "created_at",
    "updated_at",
    "requested_at",
    "downloaded_at",
    "captured_at",
];

/// Configuration for [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Allow UPDATE/DELETE without any filter (default: `false`).
    pub allow_unfiltered_mutations: bool,
    /// Column auto-populated with a fresh UUID on insert (default: `id`).
    pub id_column: String,
    /// Columns auto-populated with the current time on insert.
    pub timestamp_columns: Vec<String>,
    /// Column stamped on every update (default: `updated_at`).
    pub updated_at_column: String,
    /// Tables used by the RPC procedures.
    pub rpc_tables: RpcTables,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            allow_unfiltered_mutations: false,
            id_column: "id".to_string(),
            timestamp_columns: DEFAULT_TIMESTAMP_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            updated_at_column: "updated_at".to_string(),
            rpc_tables: RpcTables::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow or refuse UPDATE/DELETE without filters.
    pub fn allow_unfiltered_mutations(mut self, allow: bool) -> Self {
        self.allow_unfiltered_mutations = allow;
        self
    }

    /// Set the id column populated on insert.
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Replace the list of auto-populated timestamp columns.
    pub fn timestamp_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the column stamped on update.
    pub fn updated_at_column(mut self, column: impl Into<String>) -> Self {
        self.updated_at_column = column.into();
        self
    }

    /// Override the RPC table names.
    pub fn rpc_tables(mut self, tables: RpcTables) -> Self {
        self.rpc_tables = tables;
        self
    }
}

/// Table names the RPC procedures run against.
///
/// Column layouts are fixed; see the [`rpc`](crate::rpc) module docs.
#[derive(Debug, Clone)]
pub struct RpcTables {
    /// Parent-pointer tree (`id`, `leader_id`).
    pub profiles: String,
    /// Files (`id`, `owner_id`, `status`, `visibility`, `created_at`, ...).
    pub files: String,
    /// Per-user grants (`file_id`, `user_id`, `permission`).
    pub file_permissions: String,
    /// Access requests (`file_id`, `requester_id`, `status`).
    pub access_requests: String,
    /// Scheduled-job locks (`job_name`, `running`, `locked_until`, ...).
    pub job_locks: String,
}

impl Default for RpcTables {
    fn default() -> Self {
        Self {
            profiles: "profiles".to_string(),
            files: "files".to_string(),
            file_permissions: "file_permissions".to_string(),
            access_requests: "access_requests".to_string(),
            job_locks: "job_locks".to_string(),
        }
    }
}

/// Configuration for [`SqliteEngine`](crate::SqliteEngine).
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Switch file databases to WAL journaling.
    pub wal: bool,
    /// Enforce foreign keys (`PRAGMA foreign_keys = ON`).
    pub foreign_keys: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_secs(5),
            wal: true,
            foreign_keys: true,
        }
    }
}

impl SqliteConfig {
    /// Configuration for a database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Configuration for an in-memory database.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Enable or disable WAL journaling.
    pub fn wal(mut self, enabled: bool) -> Self {
        self.wal = enabled;
        self
    }

    /// Enable or disable foreign key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Read configuration from the environment.
    ///
    /// - `PGCOMPAT_DATABASE_PATH`: database file (`:memory:` or unset for in-memory)
    /// - `PGCOMPAT_BUSY_TIMEOUT_MS`: busy timeout in milliseconds
    ///
    /// With the `dotenv` feature, a `.env` file is loaded first if present.
    pub fn from_env() -> CompatResult<Self> {
        #[cfg(feature = "dotenv")]
        let _ = dotenvy::dotenv();

        let mut config = match std::env::var("PGCOMPAT_DATABASE_PATH") {
            Ok(path) if !path.is_empty() && path != ":memory:" => Self::new(path),
            _ => Self::in_memory(),
        };

        if let Ok(raw) = std::env::var("PGCOMPAT_BUSY_TIMEOUT_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                CompatError::config(format!("PGCOMPAT_BUSY_TIMEOUT_MS must be an integer, got {raw:?}"))
            })?;
            config.busy_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_defaults() {
        let config = ClientConfig::default();
        assert!(!config.allow_unfiltered_mutations);
        assert_eq!(config.id_column, "id");
        assert_eq!(config.timestamp_columns.len(), 5);
        assert!(config.timestamp_columns.iter().any(|c| c == "captured_at"));
    }

    #[test]
    fn client_builder_overrides() {
        let config = ClientConfig::new()
            .allow_unfiltered_mutations(true)
            .timestamp_columns(["inserted_at"])
            .id_column("uuid");
        assert!(config.allow_unfiltered_mutations);
        assert_eq!(config.timestamp_columns, vec!["inserted_at".to_string()]);
        assert_eq!(config.id_column, "uuid");
    }

    #[test]
    fn sqlite_builder() {
        let config = SqliteConfig::new("/tmp/app.db")
            .busy_timeout(Duration::from_millis(250))
            .wal(false);
        assert_eq!(config.path.as_deref(), Some(std::path::Path::new("/tmp/app.db")));
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(!config.wal);
        assert!(SqliteConfig::in_memory().path.is_none());
    }
}

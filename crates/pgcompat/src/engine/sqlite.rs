//! SQLite engine adapter (rusqlite).
//!
//! One connection behind `Arc<Mutex<_>>`; every call hops onto the blocking pool so the
//! async callers never block a runtime worker. SQLite serializes writes itself.

use super::Engine;
use super::value::{from_sqlite_value, to_sqlite_value};
use crate::config::SqliteConfig;
use crate::error::{CompatError, CompatResult};
use crate::row::Row;
use rusqlite::{Connection, params_from_iter};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Embedded SQLite engine.
#[derive(Clone)]
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEngine").finish_non_exhaustive()
    }
}

impl SqliteEngine {
    /// Open a database with the given configuration.
    pub fn open(config: &SqliteConfig) -> CompatResult<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| CompatError::Connection(e.to_string()))?;

        conn.busy_timeout(config.busy_timeout)?;
        if config.foreign_keys {
            conn.pragma_update(None, "foreign_keys", true)?;
        }
        if config.wal && config.path.is_some() {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            tracing::debug!(target: "pgcompat", journal_mode = %mode, "sqlite journal mode set");
        }

        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> CompatResult<Self> {
        Self::open(&SqliteConfig::in_memory())
    }

    /// Wrap an already opened connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a batch of `;`-separated statements without parameters (DDL, fixtures).
    pub async fn execute_batch(&self, sql: &str) -> CompatResult<()> {
        let sql = sql.to_string();
        self.with_conn(move |conn| {
            conn.execute_batch(&sql)
                .map_err(CompatError::from_engine_error)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> CompatResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> CompatResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| CompatError::Connection("sqlite connection mutex poisoned".into()))?;
            f(&*guard)
        })
        .await?
    }
}

fn bind(params: &[Value]) -> Vec<rusqlite::types::Value> {
    params.iter().map(to_sqlite_value).collect()
}

fn query_rows(
    conn: &Connection,
    sql: &str,
    params: Vec<rusqlite::types::Value>,
    max: Option<usize>,
) -> CompatResult<Vec<Row>> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(CompatError::from_engine_error)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut rows = stmt
        .query(params_from_iter(params))
        .map_err(CompatError::from_engine_error)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(CompatError::from_engine_error)? {
        let mut obj = Row::new();
        for (i, name) in names.iter().enumerate() {
            let value = row.get_ref(i).map_err(CompatError::from_engine_error)?;
            obj.insert(name.clone(), from_sqlite_value(value));
        }
        out.push(obj);
        if max.is_some_and(|max| out.len() >= max) {
            break;
        }
    }
    Ok(out)
}

impl Engine for SqliteEngine {
    async fn run_statement(&self, sql: &str, params: &[Value]) -> CompatResult<u64> {
        let sql = sql.to_string();
        let params = bind(params);
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare_cached(&sql)
                .map_err(CompatError::from_engine_error)?;
            let affected = stmt
                .execute(params_from_iter(params))
                .map_err(CompatError::from_engine_error)?;
            Ok(affected as u64)
        })
        .await
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> CompatResult<Vec<Row>> {
        let sql = sql.to_string();
        let params = bind(params);
        self.with_conn(move |conn| query_rows(conn, &sql, params, None))
            .await
    }

    async fn fetch_first(&self, sql: &str, params: &[Value]) -> CompatResult<Option<Row>> {
        let sql = sql.to_string();
        let params = bind(params);
        self.with_conn(move |conn| {
            Ok(query_rows(conn, &sql, params, Some(1))?.into_iter().next())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn roundtrip_rows() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL)")
            .await
            .unwrap();

        let n = engine
            .run_statement(
                "INSERT INTO t (id, name, score) VALUES (?, ?, ?)",
                &[json!(1), json!("alice"), json!(9.5)],
            )
            .await
            .unwrap();
        assert_eq!(n, 1);

        let rows = engine.fetch_all("SELECT * FROM t", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("alice"));
        assert_eq!(rows[0]["score"], json!(9.5));

        let missing = engine
            .fetch_first("SELECT * FROM t WHERE id = ?", &[json!(2)])
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn constraint_errors_are_classified() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .execute_batch("CREATE TABLE u (email TEXT UNIQUE NOT NULL)")
            .await
            .unwrap();
        engine
            .run_statement("INSERT INTO u (email) VALUES (?)", &[json!("a@x")])
            .await
            .unwrap();

        let dup = engine
            .run_statement("INSERT INTO u (email) VALUES (?)", &[json!("a@x")])
            .await
            .unwrap_err();
        assert!(dup.is_unique_violation());

        let null = engine
            .run_statement("INSERT INTO u (email) VALUES (?)", &[Value::Null])
            .await
            .unwrap_err();
        assert!(matches!(null, CompatError::NotNullViolation(_)));
    }
}

//! Introspected column sets, cached per table.
//!
//! The first lookup for a table issues `PRAGMA table_info(...)`; after that the column set
//! is served from memory for the life of the [`SchemaCache`]. Entries are never invalidated:
//! a schema change needs a process restart (or a client built on a fresh cache).
//!
//! Clients opened on the same database file share one cache through [`SchemaCache::shared`],
//! so each table is introspected at most once per process. A private in-memory database
//! gets a cache of its own.
//!
//! Two tasks racing on the first lookup of the same table may both introspect. The result is
//! identical, so the later insert simply replaces the earlier one.

use crate::engine::Engine;
use crate::error::CompatResult;
use crate::ident::Ident;
use crate::row::RowExt;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError, RwLock};

/// A set of column names for one table.
pub type ColumnSet = Arc<HashSet<String>>;

/// Caches shared by every client of a database file, keyed by the file's path.
static SHARED: LazyLock<Mutex<HashMap<PathBuf, Arc<SchemaCache>>>> = LazyLock::new(Default::default);

/// Cache of table columns for one database.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: RwLock<HashMap<String, ColumnSet>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache for the database at `path`.
    ///
    /// The path is canonicalized when it exists, so `./app.db` and its absolute form map to
    /// the same cache.
    pub fn shared(path: &Path) -> Arc<Self> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut shared = SHARED.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(shared.entry(key).or_default())
    }

    /// Cached columns for `table`, if already introspected.
    pub fn get(&self, table: &Ident) -> Option<ColumnSet> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table.as_str())
            .cloned()
    }

    /// Columns of `table`, introspecting on a cache miss.
    ///
    /// A table with no columns (i.e. one that does not exist yet) is not cached.
    pub async fn columns_of<E: Engine>(&self, engine: &E, table: &Ident) -> CompatResult<ColumnSet> {
        if let Some(columns) = self.get(table) {
            return Ok(columns);
        }

        let sql = format!("PRAGMA table_info({})", table.to_sql());
        let rows = engine.fetch_all(&sql, &[]).await?;
        let columns: HashSet<String> = rows
            .iter()
            .filter_map(|row| row.get_str("name").map(str::to_string))
            .collect();
        let columns = Arc::new(columns);

        tracing::debug!(
            target: "pgcompat",
            table = %table,
            columns = columns.len(),
            "schema cache miss"
        );

        if !columns.is_empty() {
            self.tables
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(table.as_str().to_string(), Arc::clone(&columns));
        }
        Ok(columns)
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompatResult;
    use crate::row::Row;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct PragmaEngine {
        calls: AtomicUsize,
    }

    impl Engine for PragmaEngine {
        async fn run_statement(&self, _: &str, _: &[Value]) -> CompatResult<u64> {
            Ok(0)
        }
        async fn fetch_all(&self, sql: &str, _: &[Value]) -> CompatResult<Vec<Row>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if sql.contains(r#""missing""#) {
                return Ok(vec![]);
            }
            Ok(["id", "name", "created_at"]
                .into_iter()
                .map(|name| {
                    let mut row = Row::new();
                    row.insert("name".into(), json!(name));
                    row
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn introspects_once_per_table() {
        let engine = PragmaEngine::default();
        let cache = SchemaCache::new();
        let users = Ident::parse("users").unwrap();
        let posts = Ident::parse("posts").unwrap();

        let first = cache.columns_of(&engine, &users).await.unwrap();
        let second = cache.columns_of(&engine, &users).await.unwrap();
        assert!(first.contains("created_at"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);

        cache.columns_of(&engine, &posts).await.unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn shared_cache_is_reused_for_the_same_path() {
        let dir = std::env::temp_dir();
        let a = SchemaCache::shared(&dir.join("pgcompat-schema-cache-a.db"));
        let again = SchemaCache::shared(&dir.join("pgcompat-schema-cache-a.db"));
        let b = SchemaCache::shared(&dir.join("pgcompat-schema-cache-b.db"));
        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));

        let engine = PragmaEngine::default();
        let users = Ident::parse("users").unwrap();
        a.columns_of(&engine, &users).await.unwrap();
        again.columns_of(&engine, &users).await.unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_tables_are_not_cached() {
        let engine = PragmaEngine::default();
        let cache = SchemaCache::new();
        let missing = Ident::parse("missing").unwrap();

        assert!(cache.columns_of(&engine, &missing).await.unwrap().is_empty());
        assert!(cache.columns_of(&engine, &missing).await.unwrap().is_empty());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}

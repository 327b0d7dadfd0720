//! The client handle: table builders, schema cache and RPC entry point.

use crate::config::{ClientConfig, SqliteConfig};
use crate::engine::{Engine, SqliteEngine};
use crate::error::CompatResult;
use crate::ident::{Ident, IntoIdent};
use crate::qb::QueryBuilder;
use crate::response::Response;
use crate::rpc;
use crate::schema_cache::{ColumnSet, SchemaCache};
use serde_json::Value;
use std::sync::Arc;

struct ClientInner<E> {
    engine: E,
    config: ClientConfig,
    schema: Arc<SchemaCache>,
}

/// Entry point for queries.
///
/// Cheap to clone; clones share the engine and the schema cache. Clients opened with
/// [`Client::open`] on the same database file also share the schema cache.
///
/// # Example
/// ```ignore
/// let client = Client::open(&SqliteConfig::from_env()?)?;
/// let resp = client.from("users").select("*").eq("id", id).single().execute().await?;
/// ```
pub struct Client<E = SqliteEngine> {
    inner: Arc<ClientInner<E>>,
}

impl<E> Clone for Client<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> std::fmt::Debug for Client<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("cached_tables", &self.inner.schema.len())
            .finish_non_exhaustive()
    }
}

impl Client<SqliteEngine> {
    /// Open a SQLite database and wrap it in a client with default configuration.
    pub fn open(config: &SqliteConfig) -> CompatResult<Self> {
        let engine = SqliteEngine::open(config)?;
        Ok(match &config.path {
            Some(path) => {
                Self::with_schema_cache(engine, ClientConfig::default(), SchemaCache::shared(path))
            }
            None => Self::new(engine),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> CompatResult<Self> {
        Ok(Self::new(SqliteEngine::open_in_memory()?))
    }
}

impl<E: Engine> Client<E> {
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, ClientConfig::default())
    }

    pub fn with_config(engine: E, config: ClientConfig) -> Self {
        Self::with_schema_cache(engine, config, Arc::new(SchemaCache::new()))
    }

    /// Build a client on an existing schema cache, e.g. [`SchemaCache::shared`].
    ///
    /// The cache must describe the same database as `engine`.
    pub fn with_schema_cache(engine: E, config: ClientConfig, schema: Arc<SchemaCache>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                engine,
                config,
                schema,
            }),
        }
    }

    /// Start a query against `table`.
    ///
    /// An unsafe table name does not fail here; it is reported by `execute()` before any
    /// statement is sent.
    pub fn from(&self, table: impl IntoIdent) -> QueryBuilder<E> {
        QueryBuilder::new(self.clone(), table)
    }

    /// Call a named procedure from the fixed registry.
    ///
    /// Never fails: unknown names and engine errors are reported inside the [`Response`].
    pub async fn rpc(&self, name: &str, args: Value) -> Response {
        rpc::call(self, name, args).await
    }

    /// Columns of `table`, introspected once and cached.
    pub async fn columns_of(&self, table: impl IntoIdent) -> CompatResult<ColumnSet> {
        let table: Ident = table.into_ident()?;
        self.inner.schema.columns_of(&self.inner.engine, &table).await
    }

    pub fn engine(&self) -> &E {
        &self.inner.engine
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn schema(&self) -> &SchemaCache {
        &self.inner.schema
    }
}

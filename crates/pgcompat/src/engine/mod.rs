//! Engine adapter trait.
//!
//! The query layer needs exactly three primitives from the storage backend. Anything that
//! implements [`Engine`] can sit under a [`Client`](crate::Client): the bundled
//! [`SqliteEngine`], an [`InstrumentedEngine`](crate::monitor::InstrumentedEngine) wrapper, or a
//! test double.

mod sqlite;
mod value;

pub use sqlite::SqliteEngine;
pub use value::{from_sqlite_value, to_sqlite_value};

use crate::error::CompatResult;
use crate::row::Row;
use serde_json::Value;
use std::sync::Arc;

/// The minimal statement interface the query layer is built on.
///
/// Placeholders are positional `?`. Parameters arrive in placeholder order.
pub trait Engine: Send + Sync {
    /// Run a statement and return the number of affected rows.
    fn run_statement(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = CompatResult<u64>> + Send;

    /// Run a query and return all rows.
    fn fetch_all(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = CompatResult<Vec<Row>>> + Send;

    /// Run a query and return the first row, if any.
    ///
    /// The default implementation calls [`Engine::fetch_all`] and keeps the first row.
    fn fetch_first(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = CompatResult<Option<Row>>> + Send {
        async move {
            let rows = self.fetch_all(sql, params).await?;
            Ok(rows.into_iter().next())
        }
    }
}

impl<E: Engine> Engine for &E {
    async fn run_statement(&self, sql: &str, params: &[Value]) -> CompatResult<u64> {
        (**self).run_statement(sql, params).await
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> CompatResult<Vec<Row>> {
        (**self).fetch_all(sql, params).await
    }

    async fn fetch_first(&self, sql: &str, params: &[Value]) -> CompatResult<Option<Row>> {
        (**self).fetch_first(sql, params).await
    }
}

impl<E: Engine> Engine for Arc<E> {
    async fn run_statement(&self, sql: &str, params: &[Value]) -> CompatResult<u64> {
        (**self).run_statement(sql, params).await
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> CompatResult<Vec<Row>> {
        (**self).fetch_all(sql, params).await
    }

    async fn fetch_first(&self, sql: &str, params: &[Value]) -> CompatResult<Option<Row>> {
        (**self).fetch_first(sql, params).await
    }
}

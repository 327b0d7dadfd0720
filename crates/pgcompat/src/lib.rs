//! # pgcompat
//!
//! A PostgREST-style query builder that compiles to parameterized SQL on embedded SQLite.
//!
//! ## Features
//!
//! - **Familiar surface**: `.from(table).select(..).eq(..).order(..).range(..)` plus
//!   `insert` / `update` / `upsert` / `delete`, awaited into `{ data, error, count }`
//! - **Injection-safe identifiers**: every table and column name is validated and quoted
//! - **Schema-aware writes**: unknown payload keys are dropped; `id` and timestamp columns
//!   are filled in when the table has them
//! - **Safe defaults**: UPDATE and DELETE require a filter, upsert requires a conflict target
//! - **RPC emulation**: a fixed registry of procedures (tree lookups, reports, job locks)
//! - **Query monitoring**: `tracing` events, stats and timeouts via [`InstrumentedEngine`]
//! - **Swappable engine**: anything implementing [`Engine`]'s three primitives
//!
//! ## Quick start
//!
//! ```ignore
//! use pgcompat::prelude::*;
//! use serde_json::json;
//!
//! let client = Client::open_in_memory()?;
//! client.engine().execute_batch(
//!     "CREATE TABLE notes (id TEXT PRIMARY KEY, body TEXT, created_at TEXT)",
//! ).await?;
//!
//! let created = client
//!     .from("notes")
//!     .insert(json!({ "body": "hello" }))
//!     .select("*")
//!     .single()
//!     .execute()
//!     .await?;
//!
//! let page = client
//!     .from("notes")
//!     .select_with("id, body", SelectOptions::exact_count())
//!     .ilike("body", "%hel%")
//!     .order_desc("created_at")
//!     .range(0, 9)
//!     .execute()
//!     .await?;
//!
//! if let Some(err) = page.error {
//!     eprintln!("query failed: {err}");
//! }
//!
//! let locked = client.rpc("try_job_lock", json!({ "job_name": "nightly", "ttl_seconds": 60 })).await;
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod ident;
pub mod monitor;
pub mod prelude;
pub mod qb;
pub mod response;
pub mod row;
pub mod rpc;
pub mod schema_cache;

pub use client::Client;
pub use config::{ClientConfig, RpcTables, SqliteConfig};
pub use engine::{Engine, SqliteEngine};
pub use error::{CompatError, CompatResult};
pub use ident::{Ident, IntoIdent};
pub use monitor::{
    InstrumentedEngine, MonitorConfig, NoopMonitor, QueryContext, QueryMonitor, QueryResult,
    QueryStats, QueryType, StatsMonitor,
};
pub use qb::{
    Cardinality, Count, Filter, Op, Projection, QueryBuilder, SelectOptions, Statement,
    UpsertOptions,
};
pub use response::{Response, ResponseError};
pub use row::{FromRow, Payload, Row, RowExt};
pub use rpc::Procedure;
pub use schema_cache::SchemaCache;

//! Convenient imports for typical `pgcompat` usage.
//!
//! ```ignore
//! use pgcompat::prelude::*;
//! ```

pub use crate::{
    Client, ClientConfig, CompatError, CompatResult, Engine, FromRow, Ident, IntoIdent,
    QueryBuilder, Response, ResponseError, Row, RowExt, SelectOptions, SqliteConfig,
    SqliteEngine, UpsertOptions,
};

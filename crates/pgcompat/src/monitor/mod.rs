//! Statement monitoring and logging.
//!
//! [`InstrumentedEngine`] wraps any [`Engine`](crate::Engine) and:
//! - emits a `tracing` event per statement (target `pgcompat.sql`)
//! - reports timings to a [`QueryMonitor`] such as [`StatsMonitor`]
//! - optionally enforces a query timeout
//!
//! # Example
//!
//! ```rust,ignore
//! use pgcompat::monitor::{InstrumentedEngine, MonitorConfig, StatsMonitor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let stats = Arc::new(StatsMonitor::new());
//! let engine = InstrumentedEngine::new(SqliteEngine::open_in_memory()?)
//!     .with_config(MonitorConfig::new().with_slow_query_threshold(Duration::from_millis(50)))
//!     .with_monitor_arc(stats.clone());
//!
//! let client = Client::new(engine);
//! // ...
//! println!("{} statements", stats.stats().total_queries);
//! ```

mod config;
mod instrumented;
mod monitors;
mod types;

#[cfg(test)]
mod tests;

pub use config::MonitorConfig;
pub use instrumented::InstrumentedEngine;
pub use monitors::{NoopMonitor, QueryStats, StatsMonitor};
pub use types::{QueryContext, QueryMonitor, QueryResult, QueryType};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

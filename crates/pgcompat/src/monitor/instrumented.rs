use super::config::MonitorConfig;
use super::monitors::NoopMonitor;
use super::types::{QueryContext, QueryMonitor, QueryResult};
use crate::engine::Engine;
use crate::error::{CompatError, CompatResult};
use crate::row::Row;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An engine wrapper that logs every statement via `tracing` and reports to a monitor.
///
/// Events are emitted under the `pgcompat.sql` target at `DEBUG`; statements slower than
/// [`MonitorConfig::slow_query_threshold`] are emitted at `WARN`.
pub struct InstrumentedEngine<E> {
    engine: E,
    monitor: Arc<dyn QueryMonitor>,
    config: MonitorConfig,
}

impl<E: Engine> InstrumentedEngine<E> {
    /// Wrap an engine with tracing only.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            monitor: Arc::new(NoopMonitor),
            config: MonitorConfig::default(),
        }
    }

    /// Set the monitor configuration.
    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the query monitor.
    pub fn with_monitor<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    /// Set the query monitor from an Arc (keep a clone to read stats later).
    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Get the current configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Get a reference to the inner engine.
    pub fn inner(&self) -> &E {
        &self.engine
    }

    /// Get the inner engine, consuming this wrapper.
    pub fn into_inner(self) -> E {
        self.engine
    }

    fn display_sql<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.config.max_sql_length {
            Some(max) if sql.len() > max => {
                format!("{}...", super::truncate_sql_bytes(sql, max)).into()
            }
            _ => sql.into(),
        }
    }

    fn report(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        let sql = self.display_sql(&ctx.sql);
        let elapsed_ms = duration.as_secs_f64() * 1000.0;

        let slow = self
            .config
            .slow_query_threshold
            .is_some_and(|threshold| duration > threshold);

        if slow {
            tracing::warn!(
                target: "pgcompat.sql",
                query_type = ?ctx.query_type,
                param_count = ctx.param_count,
                elapsed_ms,
                sql = %sql,
                "slow query"
            );
            self.monitor.on_slow_query(ctx, duration);
        } else {
            tracing::debug!(
                target: "pgcompat.sql",
                query_type = ?ctx.query_type,
                param_count = ctx.param_count,
                elapsed_ms,
                result = %result,
                sql = %sql,
                "statement executed"
            );
        }

        self.monitor.on_query_complete(ctx, duration, result);
    }

    async fn run<T, F>(
        &self,
        sql: &str,
        params: &[Value],
        future: F,
        summarize: impl FnOnce(&T) -> QueryResult,
    ) -> CompatResult<T>
    where
        F: std::future::Future<Output = CompatResult<T>> + Send,
    {
        let ctx = QueryContext::new(sql, params.len());
        self.monitor.on_query_start(&ctx);

        let start = Instant::now();
        let result = match self.config.query_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, future).await {
                Ok(result) => result,
                Err(_) => Err(CompatError::Timeout(timeout)),
            },
            None => future.await,
        };
        let duration = start.elapsed();

        let query_result = match &result {
            Ok(value) => summarize(value),
            Err(e) => QueryResult::error(e.to_string()),
        };
        self.report(&ctx, duration, &query_result);
        result
    }
}

impl<E: Engine> Engine for InstrumentedEngine<E> {
    async fn run_statement(&self, sql: &str, params: &[Value]) -> CompatResult<u64> {
        self.run(sql, params, self.engine.run_statement(sql, params), |n| {
            QueryResult::Affected(*n)
        })
        .await
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> CompatResult<Vec<Row>> {
        self.run(sql, params, self.engine.fetch_all(sql, params), |rows| {
            QueryResult::Rows(rows.len())
        })
        .await
    }

    async fn fetch_first(&self, sql: &str, params: &[Value]) -> CompatResult<Option<Row>> {
        self.run(sql, params, self.engine.fetch_first(sql, params), |row| {
            QueryResult::Rows(usize::from(row.is_some()))
        })
        .await
    }
}

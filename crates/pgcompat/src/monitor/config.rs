use std::time::Duration;

/// Configuration for [`InstrumentedEngine`](super::InstrumentedEngine).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Query timeout duration. `None` means no timeout (default).
    ///
    /// On timeout the caller gets [`CompatError::Timeout`](crate::CompatError::Timeout); the
    /// statement itself keeps running to completion inside the engine.
    pub query_timeout: Option<Duration>,
    /// Slow query threshold; slower statements are logged at `WARN`.
    pub slow_query_threshold: Option<Duration>,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            query_timeout: None,
            slow_query_threshold: None,
            max_sql_length: Some(200),
        }
    }
}

impl MonitorConfig {
    /// Create a new configuration with defaults (no timeout, no slow-query threshold).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query timeout duration.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Set the slow query threshold.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// Set maximum SQL length to log.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }
}

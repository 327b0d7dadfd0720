use super::*;
use crate::engine::Engine;
use crate::error::{CompatError, CompatResult};
use crate::row::Row;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

// ── Shared DummyEngine for tests ──

struct DummyEngine;
impl Engine for DummyEngine {
    async fn run_statement(&self, _: &str, _: &[Value]) -> CompatResult<u64> {
        Ok(1)
    }
    async fn fetch_all(&self, sql: &str, _: &[Value]) -> CompatResult<Vec<Row>> {
        if sql.contains("broken") {
            return Err(CompatError::Other("no such table: broken".into()));
        }
        Ok(vec![Row::new(), Row::new()])
    }
}

struct SlowEngine(Duration);
impl Engine for SlowEngine {
    async fn run_statement(&self, _: &str, _: &[Value]) -> CompatResult<u64> {
        tokio::time::sleep(self.0).await;
        Ok(0)
    }
    async fn fetch_all(&self, _: &str, _: &[Value]) -> CompatResult<Vec<Row>> {
        tokio::time::sleep(self.0).await;
        Ok(vec![])
    }
}

#[test]
fn test_query_type_detection() {
    assert_eq!(QueryType::from_sql("SELECT * FROM users"), QueryType::Select);
    assert_eq!(QueryType::from_sql("  select * FROM users"), QueryType::Select);
    assert_eq!(
        QueryType::from_sql("WITH RECURSIVE tree(id) AS (SELECT 1) SELECT id FROM tree"),
        QueryType::Select
    );
    assert_eq!(
        QueryType::from_sql(r#"INSERT INTO "users" ("name") VALUES (?)"#),
        QueryType::Insert
    );
    assert_eq!(QueryType::from_sql("UPDATE users SET name = ?"), QueryType::Update);
    assert_eq!(QueryType::from_sql("DELETE FROM users"), QueryType::Delete);
    assert_eq!(
        QueryType::from_sql(r#"PRAGMA table_info("users")"#),
        QueryType::Pragma
    );
    assert_eq!(QueryType::from_sql("CREATE TABLE t (id INT)"), QueryType::Other);
    assert_eq!(QueryType::from_sql("SELECTED"), QueryType::Other);
}

#[test]
fn test_truncate_respects_char_boundary() {
    assert_eq!(truncate_sql_bytes("héllo", 2), "h");
    assert_eq!(truncate_sql_bytes("abc", 10), "abc");
}

#[tokio::test]
async fn test_stats_monitor_counts_by_type() {
    let stats = Arc::new(StatsMonitor::new());
    let engine = InstrumentedEngine::new(DummyEngine).with_monitor_arc(stats.clone());

    engine.fetch_all("SELECT 1", &[]).await.unwrap();
    engine.fetch_first("SELECT 2", &[]).await.unwrap();
    engine
        .run_statement("INSERT INTO t (a) VALUES (?)", &[Value::from(1)])
        .await
        .unwrap();
    engine.fetch_all(r#"PRAGMA table_info("t")"#, &[]).await.unwrap();
    assert!(engine.fetch_all("SELECT * FROM broken", &[]).await.is_err());

    let snapshot = stats.stats();
    assert_eq!(snapshot.total_queries, 5);
    assert_eq!(snapshot.select_count, 3);
    assert_eq!(snapshot.insert_count, 1);
    assert_eq!(snapshot.pragma_count, 1);
    assert_eq!(snapshot.failed_queries, 1);

    stats.reset();
    assert_eq!(stats.stats().total_queries, 0);
}

#[tokio::test]
async fn test_query_timeout() {
    let engine = InstrumentedEngine::new(SlowEngine(Duration::from_millis(200)))
        .with_config(MonitorConfig::new().with_query_timeout(Duration::from_millis(10)));

    let err = engine.fetch_all("SELECT 1", &[]).await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_slow_query_is_reported() {
    struct SlowCapture(std::sync::Mutex<Option<String>>);
    impl QueryMonitor for SlowCapture {
        fn on_query_complete(&self, _: &QueryContext, _: Duration, _: &QueryResult) {}
        fn on_slow_query(&self, ctx: &QueryContext, _: Duration) {
            *self.0.lock().unwrap() = Some(ctx.sql.clone());
        }
    }

    let capture = Arc::new(SlowCapture(std::sync::Mutex::new(None)));
    let engine = InstrumentedEngine::new(SlowEngine(Duration::from_millis(20)))
        .with_config(MonitorConfig::new().with_slow_query_threshold(Duration::from_millis(1)))
        .with_monitor_arc(capture.clone());

    engine.run_statement("UPDATE t SET a = 1", &[]).await.unwrap();
    assert_eq!(
        capture.0.lock().unwrap().as_deref(),
        Some("UPDATE t SET a = 1")
    );
}

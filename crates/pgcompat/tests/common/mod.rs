#![allow(dead_code)]

use pgcompat::monitor::{InstrumentedEngine, StatsMonitor};
use pgcompat::{Client, ClientConfig, SqliteEngine};
use std::sync::Arc;

pub const SCHEMA: &str = r#"
CREATE TABLE users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    age INTEGER,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT,
    updated_at TEXT
);
CREATE TABLE settings (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE,
    theme TEXT,
    language TEXT,
    updated_at TEXT
);
CREATE TABLE items (
    n INTEGER PRIMARY KEY,
    label TEXT
);
CREATE TABLE profiles (id TEXT PRIMARY KEY, leader_id TEXT);
CREATE TABLE files (
    id TEXT PRIMARY KEY,
    owner_id TEXT,
    title TEXT,
    status TEXT,
    visibility TEXT,
    created_at TEXT
);
CREATE TABLE file_permissions (file_id TEXT, user_id TEXT, permission TEXT);
CREATE TABLE access_requests (
    id TEXT PRIMARY KEY,
    file_id TEXT,
    requester_id TEXT,
    status TEXT,
    requested_at TEXT
);
CREATE TABLE job_locks (
    job_name TEXT PRIMARY KEY,
    running INTEGER NOT NULL DEFAULT 0,
    locked_until TEXT,
    locked_by TEXT,
    last_started_at TEXT,
    last_finished_at TEXT,
    last_error TEXT
);
"#;

pub async fn client() -> Client {
    let engine = SqliteEngine::open_in_memory().unwrap();
    engine.execute_batch(SCHEMA).await.unwrap();
    Client::new(engine)
}

pub async fn client_with(config: ClientConfig) -> Client {
    let engine = SqliteEngine::open_in_memory().unwrap();
    engine.execute_batch(SCHEMA).await.unwrap();
    Client::with_config(engine, config)
}

/// Client whose engine counts every statement.
pub async fn monitored() -> (Client<InstrumentedEngine<SqliteEngine>>, Arc<StatsMonitor>) {
    let engine = SqliteEngine::open_in_memory().unwrap();
    engine.execute_batch(SCHEMA).await.unwrap();
    let stats = Arc::new(StatsMonitor::new());
    let engine = InstrumentedEngine::new(engine).with_monitor_arc(stats.clone());
    (Client::new(engine), stats)
}

pub async fn seed(client: &Client, sql: &str) {
    client.engine().execute_batch(sql).await.unwrap();
}

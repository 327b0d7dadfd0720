//! Advisory locks for scheduled jobs.
//!
//! One row per job. Acquiring upserts the row; on conflict the lock columns only move when
//! the stored lock is absent or expired. The caller then reads the row back and owns the
//! lock iff the stored `locked_until` and `locked_by` are the values it tried to write.
//! All coordination happens in the database, so it holds across processes.

use super::{Args, Tables};
use crate::engine::Engine;
use crate::error::{CompatError, CompatResult};
use crate::response::Response;
use crate::row::RowExt;
use chrono::{DateTime, Datelike, SecondsFormat, TimeDelta, Utc};
use serde_json::Value;

const DEFAULT_TTL_SECONDS: f64 = 60.0;

/// Fixed-width UTC timestamps compare correctly as text.
fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `now + ttl_seconds`, or `None` when the expiry leaves the four-digit-year range that
/// [`iso`] keeps fixed-width.
fn lock_expiry(now: DateTime<Utc>, ttl_seconds: f64) -> Option<DateTime<Utc>> {
    let micros = (ttl_seconds * 1_000_000.0).round();
    if micros >= i64::MAX as f64 {
        return None;
    }
    let until = now.checked_add_signed(TimeDelta::microseconds(micros as i64))?;
    (until.year() <= 9999).then_some(until)
}

pub(super) async fn try_job_lock<E: Engine>(
    engine: &E,
    tables: &Tables,
    args: &Args,
) -> CompatResult<Response> {
    let job_name = args.req_str("job_name")?;
    let ttl = args.opt_f64("ttl_seconds")?.unwrap_or(DEFAULT_TTL_SECONDS);
    if !ttl.is_finite() || ttl <= 0.0 {
        return Err(CompatError::validation(format!(
            "ttl_seconds must be positive, got {ttl}"
        )));
    }

    let now = Utc::now();
    let until = lock_expiry(now, ttl)
        .ok_or_else(|| CompatError::validation(format!("ttl_seconds out of range: {ttl}")))?;
    let until = iso(until);
    let token = uuid::Uuid::new_v4().to_string();

    let locks = tables.job_locks.to_sql();
    let free = format!(
        r#"{locks}."locked_until" IS NULL OR {locks}."locked_until" < excluded."last_started_at""#
    );
    let sql = format!(
        r#"INSERT INTO {locks} ("job_name", "running", "locked_until", "locked_by", "last_started_at")
VALUES (?, 1, ?, ?, ?)
ON CONFLICT ("job_name") DO UPDATE SET
    "running" = CASE WHEN {free} THEN 1 ELSE {locks}."running" END,
    "locked_until" = CASE WHEN {free} THEN excluded."locked_until" ELSE {locks}."locked_until" END,
    "locked_by" = CASE WHEN {free} THEN excluded."locked_by" ELSE {locks}."locked_by" END,
    "last_started_at" = CASE WHEN {free} THEN excluded."last_started_at" ELSE {locks}."last_started_at" END"#
    );
    engine
        .run_statement(
            &sql,
            &[
                Value::String(job_name.clone()),
                Value::String(until.clone()),
                Value::String(token.clone()),
                Value::String(iso(now)),
            ],
        )
        .await?;

    let sql = format!(r#"SELECT "locked_until", "locked_by" FROM {locks} WHERE "job_name" = ?"#);
    let row = engine.fetch_first(&sql, &[Value::String(job_name.clone())]).await?;
    let acquired = row.is_some_and(|row| {
        row.get_str("locked_until") == Some(until.as_str())
            && row.get_str("locked_by") == Some(token.as_str())
    });

    tracing::debug!(target: "pgcompat", job = %job_name, acquired, "try_job_lock");
    Ok(Response::ok(Some(Value::Bool(acquired))))
}

pub(super) async fn release_job_lock<E: Engine>(
    engine: &E,
    tables: &Tables,
    args: &Args,
) -> CompatResult<Response> {
    let job_name = args.req_str("job_name")?;
    let error = args.opt_str("error")?;

    let sql = format!(
        r#"UPDATE {} SET "running" = 0, "locked_until" = NULL, "locked_by" = NULL, "last_finished_at" = ?, "last_error" = ? WHERE "job_name" = ?"#,
        tables.job_locks.to_sql()
    );
    let affected = engine
        .run_statement(
            &sql,
            &[
                Value::String(iso(Utc::now())),
                error.map(Value::String).unwrap_or(Value::Null),
                Value::String(job_name),
            ],
        )
        .await?;
    Ok(Response::ok(Some(Value::Bool(affected > 0))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_expiry_adds_ttl() {
        let now = Utc::now();
        assert_eq!(lock_expiry(now, 1.5), Some(now + TimeDelta::milliseconds(1500)));
    }

    #[test]
    fn lock_expiry_rejects_out_of_range_ttl() {
        let now = Utc::now();
        assert_eq!(lock_expiry(now, 1e13), None);
        assert_eq!(lock_expiry(now, 1e300), None);
        assert_eq!(lock_expiry(now, 400.0 * 365.0 * 86_400.0 * 100.0), None);
    }
}

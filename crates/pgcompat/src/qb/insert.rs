//! INSERT executor and the payload preparation shared with upsert.

use super::filter::{Filter, compile, placeholders};
use super::select::select_sql;
use super::{QueryBuilder, Statement, shape};
use crate::config::ClientConfig;
use crate::engine::Engine;
use crate::error::{CompatError, CompatResult};
use crate::ident::Ident;
use crate::response::Response;
use crate::row::Row;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashSet;

/// Column/value pairs that survived schema filtering, in payload order.
pub(super) type Assignments = Vec<(Ident, Value)>;

/// Current UTC time as ISO-8601 with millisecond precision.
pub(super) fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Keep the payload keys that exist in the table, dropping (and logging) the rest.
pub(super) fn known_columns(
    table: &Ident,
    row: &Row,
    columns: &HashSet<String>,
) -> CompatResult<Assignments> {
    let mut kept = Vec::with_capacity(row.len());
    let mut dropped = Vec::new();
    for (key, value) in row {
        if columns.contains(key) {
            kept.push((Ident::parse(key)?, value.clone()));
        } else {
            dropped.push(key.as_str());
        }
    }
    if !dropped.is_empty() {
        tracing::warn!(
            target: "pgcompat",
            table = %table,
            dropped = ?dropped,
            "ignoring payload keys not present in table"
        );
    }
    Ok(kept)
}

/// Schema-filter a row and fill in the bookkeeping columns it lacks.
pub(super) fn prepare_row(
    table: &Ident,
    row: &Row,
    columns: &HashSet<String>,
    config: &ClientConfig,
    now: &str,
) -> CompatResult<Assignments> {
    let mut assignments = known_columns(table, row, columns)?;

    let id = config.id_column.as_str();
    if columns.contains(id) && !row.contains_key(id) {
        assignments.push((
            Ident::parse(id)?,
            Value::String(uuid::Uuid::new_v4().to_string()),
        ));
    }
    for column in &config.timestamp_columns {
        if columns.contains(column) && !row.contains_key(column) {
            assignments.push((Ident::parse(column)?, Value::String(now.to_string())));
        }
    }
    Ok(assignments)
}

pub(super) fn insert_statement(table: &Ident, assignments: &Assignments) -> Statement {
    if assignments.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {} DEFAULT VALUES", table.to_sql()),
            params: Vec::new(),
        };
    }
    let names: Vec<String> = assignments.iter().map(|(col, _)| col.to_sql()).collect();
    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.to_sql(),
            names.join(", "),
            placeholders(assignments.len())
        ),
        params: assignments.iter().map(|(_, v)| v.clone()).collect(),
    }
}

pub(super) async fn execute<E: Engine>(qb: &QueryBuilder<E>) -> CompatResult<Response> {
    let table = qb.table()?;
    let config = qb.client.config();
    let engine = qb.client.engine();
    let id_column = Ident::parse(&config.id_column)?;

    let columns = try_engine!(qb.client.schema().columns_of(engine, table).await);
    if qb.returning.is_some() && !columns.contains(id_column.as_str()) {
        return Err(CompatError::unsupported(format!(
            "returning rows after insert into {table} needs a {id_column} column"
        )));
    }

    let now = timestamp_now();
    let mut ids = Vec::with_capacity(qb.rows.len());
    for row in &qb.rows {
        let assignments = prepare_row(table, row, &columns, config, &now)?;
        let stmt = insert_statement(table, &assignments);
        try_engine!(engine.run_statement(&stmt.sql, &stmt.params).await);

        if let Some((_, id)) = assignments.iter().find(|(col, _)| *col == id_column) {
            ids.push(id.clone());
        }
    }

    let Some(projection) = &qb.returning else {
        return Ok(Response::ok(None));
    };

    let mut returned = Vec::with_capacity(ids.len());
    for id in ids {
        let compiled = compile(&[Filter::Eq(id_column.clone(), id)])?;
        let sql = select_sql(table, projection, &compiled);
        if let Some(row) = try_engine!(engine.fetch_first(&sql, &compiled.params).await) {
            returned.push(row);
        }
    }
    Ok(shape(returned, qb.cardinality))
}

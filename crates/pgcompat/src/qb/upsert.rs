//! UPSERT executor (`INSERT ... ON CONFLICT`).

use super::filter::{Filter, compile};
use super::insert::{Assignments, insert_statement, known_columns, prepare_row, timestamp_now};
use super::select::select_sql;
use super::{QueryBuilder, Statement, shape};
use crate::engine::Engine;
use crate::error::{CompatError, CompatResult};
use crate::ident::Ident;
use crate::response::Response;
use serde_json::Value;

/// Append the `ON CONFLICT` clause. An empty update list means `DO NOTHING`.
fn upsert_statement(
    table: &Ident,
    assignments: &Assignments,
    conflict: &[Ident],
    update: &[Ident],
) -> Statement {
    let mut stmt = insert_statement(table, assignments);
    let target: Vec<String> = conflict.iter().map(Ident::to_sql).collect();
    stmt.sql.push_str(&format!(" ON CONFLICT ({})", target.join(", ")));
    if update.is_empty() {
        stmt.sql.push_str(" DO NOTHING");
    } else {
        let set: Vec<String> = update
            .iter()
            .map(|col| {
                let col = col.to_sql();
                format!("{col} = excluded.{col}")
            })
            .collect();
        stmt.sql.push_str(" DO UPDATE SET ");
        stmt.sql.push_str(&set.join(", "));
    }
    stmt
}

pub(super) async fn execute<E: Engine>(qb: &QueryBuilder<E>) -> CompatResult<Response> {
    let table = qb.table()?;
    if qb.on_conflict.is_empty() {
        return Err(CompatError::config("upsert requires an onConflict target"));
    }
    let config = qb.client.config();
    let engine = qb.client.engine();

    let columns = try_engine!(qb.client.schema().columns_of(engine, table).await);
    let stamp = config.updated_at_column.as_str();
    let now = timestamp_now();

    let mut first: Option<Assignments> = None;
    for row in &qb.rows {
        let assignments = prepare_row(table, row, &columns, config, &now)?;

        // Only caller-supplied columns are overwritten on conflict, plus the update stamp.
        let mut update: Vec<Ident> = Vec::new();
        if !qb.ignore_duplicates {
            update = known_columns(table, row, &columns)?
                .into_iter()
                .map(|(col, _)| col)
                .filter(|col| !qb.on_conflict.contains(col))
                .collect();
            let stamped = assignments.iter().any(|(col, _)| col.as_str() == stamp);
            if !update.is_empty() && stamped && !update.iter().any(|c| c.as_str() == stamp) {
                update.push(Ident::parse(stamp)?);
            }
        }

        let stmt = upsert_statement(table, &assignments, &qb.on_conflict, &update);
        try_engine!(engine.run_statement(&stmt.sql, &stmt.params).await);
        first.get_or_insert(assignments);
    }

    let Some(projection) = &qb.returning else {
        return Ok(Response::ok(None));
    };
    let Some(first) = first else {
        return Ok(shape(Vec::new(), qb.cardinality));
    };

    // Re-read by the first row's conflict values.
    let filters: Vec<Filter> = qb
        .on_conflict
        .iter()
        .map(|col| {
            let value = first
                .iter()
                .find(|(c, _)| c == col)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null);
            Filter::Eq(col.clone(), value)
        })
        .collect();
    let compiled = compile(&filters)?;
    let sql = select_sql(table, projection, &compiled);
    let rows = try_engine!(engine.fetch_all(&sql, &compiled.params).await);
    Ok(shape(rows, qb.cardinality))
}

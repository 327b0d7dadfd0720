//! UPDATE executor.

use super::filter::compile;
use super::insert::{known_columns, timestamp_now};
use super::select::select_sql;
use super::{QueryBuilder, Statement, shape};
use crate::engine::Engine;
use crate::error::CompatResult;
use crate::ident::Ident;
use crate::response::Response;
use serde_json::Value;

pub(super) async fn execute<E: Engine>(qb: &QueryBuilder<E>) -> CompatResult<Response> {
    let table = qb.table()?;
    qb.require_filters("update")?;
    let compiled = compile(&qb.filters)?;
    let config = qb.client.config();
    let engine = qb.client.engine();

    let columns = try_engine!(qb.client.schema().columns_of(engine, table).await);
    let mut assignments = match qb.rows.first() {
        Some(patch) => known_columns(table, patch, &columns)?,
        None => Vec::new(),
    };

    let stamp = config.updated_at_column.as_str();
    let supplied = assignments.iter().any(|(col, _)| col.as_str() == stamp);
    if columns.contains(stamp) && !supplied {
        assignments.push((Ident::parse(stamp)?, Value::String(timestamp_now())));
    }

    if assignments.is_empty() {
        tracing::debug!(target: "pgcompat", table = %table, "update has nothing to set");
    } else {
        let set: Vec<String> = assignments
            .iter()
            .map(|(col, _)| format!("{} = ?", col.to_sql()))
            .collect();
        let mut params: Vec<Value> = assignments.into_iter().map(|(_, v)| v).collect();
        params.extend(compiled.params.iter().cloned());
        let stmt = Statement {
            sql: format!(
                "UPDATE {} SET {}{}",
                table.to_sql(),
                set.join(", "),
                compiled.where_sql()
            ),
            params,
        };
        try_engine!(engine.run_statement(&stmt.sql, &stmt.params).await);
    }

    let Some(projection) = &qb.returning else {
        return Ok(Response::ok(None));
    };
    let sql = select_sql(table, projection, &compiled);
    let rows = try_engine!(engine.fetch_all(&sql, &compiled.params).await);
    Ok(shape(rows, qb.cardinality))
}

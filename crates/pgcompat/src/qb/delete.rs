//! DELETE executor.

use super::filter::compile;
use super::select::select_sql;
use super::{QueryBuilder, shape};
use crate::engine::Engine;
use crate::error::CompatResult;
use crate::response::Response;

pub(super) async fn execute<E: Engine>(qb: &QueryBuilder<E>) -> CompatResult<Response> {
    let table = qb.table()?;
    qb.require_filters("delete")?;
    let compiled = compile(&qb.filters)?;
    let engine = qb.client.engine();

    // Rows to return must be captured before they are gone.
    let returned = match &qb.returning {
        Some(projection) => {
            let sql = select_sql(table, projection, &compiled);
            Some(try_engine!(engine.fetch_all(&sql, &compiled.params).await))
        }
        None => None,
    };

    let sql = format!("DELETE FROM {}{}", table.to_sql(), compiled.where_sql());
    let affected = try_engine!(engine.run_statement(&sql, &compiled.params).await);
    tracing::debug!(target: "pgcompat", table = %table, affected, "rows deleted");

    Ok(match returned {
        Some(rows) => shape(rows, qb.cardinality),
        None => Response::ok(None),
    })
}

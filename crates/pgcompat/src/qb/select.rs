//! SELECT executor.

use super::filter::{CompiledFilter, compile};
use super::{Projection, QueryBuilder, Statement, shape};
use crate::engine::Engine;
use crate::error::CompatResult;
use crate::ident::Ident;
use crate::response::Response;
use crate::row::RowExt;

pub(super) fn select_sql(table: &Ident, projection: &Projection, compiled: &CompiledFilter) -> String {
    format!(
        "SELECT {} FROM {}{}",
        projection.to_sql(),
        table.to_sql(),
        compiled.where_sql()
    )
}

/// `COUNT(*)` over the filtered set, ignoring ordering and pagination.
pub(super) async fn count_rows<E: Engine>(
    engine: &E,
    table: &Ident,
    compiled: &CompiledFilter,
) -> CompatResult<i64> {
    let sql = format!(
        r#"SELECT COUNT(*) AS "count" FROM {}{}"#,
        table.to_sql(),
        compiled.where_sql()
    );
    let row = engine.fetch_first(&sql, &compiled.params).await?;
    Ok(row.and_then(|r| r.get_i64("count")).unwrap_or(0))
}

impl<E: Engine> QueryBuilder<E> {
    /// `LIMIT`/`OFFSET` for the current pagination. `range` wins over `limit`.
    fn window(&self) -> Option<(i64, i64)> {
        match (self.range, self.limit) {
            (Some(window), _) => Some(window),
            (None, Some(limit)) => Some((limit, 0)),
            (None, None) => None,
        }
    }

    pub(super) fn rows_statement(
        &self,
        projection: &Projection,
        compiled: &CompiledFilter,
    ) -> CompatResult<Statement> {
        let mut sql = select_sql(self.table()?, projection, compiled);
        if let Some(order) = &self.order {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.column.to_sql());
            sql.push_str(if order.ascending { " ASC" } else { " DESC" });
        }
        match self.window() {
            Some((limit, 0)) => sql.push_str(&format!(" LIMIT {limit}")),
            Some((limit, offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            None => {}
        }
        Ok(Statement {
            sql,
            params: compiled.params.clone(),
        })
    }
}

pub(super) async fn execute<E: Engine>(qb: &QueryBuilder<E>) -> CompatResult<Response> {
    let table = qb.table()?;
    let compiled = compile(&qb.filters)?;
    let engine = qb.client.engine();

    if qb.head {
        let count = match qb.count {
            Some(_) => Some(try_engine!(count_rows(engine, table, &compiled).await)),
            None => None,
        };
        return Ok(Response::ok(None).with_count(count));
    }

    let stmt = qb.rows_statement(&qb.columns, &compiled)?;
    let rows = try_engine!(engine.fetch_all(&stmt.sql, &stmt.params).await);
    let response = shape(rows, qb.cardinality);
    if !response.is_ok() || qb.count.is_none() {
        return Ok(response);
    }

    let total = try_engine!(count_rows(engine, table, &compiled).await);
    Ok(response.with_count(Some(total)))
}

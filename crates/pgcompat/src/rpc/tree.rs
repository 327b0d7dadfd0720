//! Parent-pointer tree lookups and the reports scoped by them.

use super::{Args, Tables};
use crate::engine::Engine;
use crate::error::CompatResult;
use crate::response::Response;
use crate::row::RowExt;
use serde_json::{Map, Value};

/// `WITH RECURSIVE tree(id)` over `profiles.leader_id`, root included.
///
/// `UNION` discards rows already produced, so cyclic leader chains terminate.
fn tree_cte(tables: &Tables) -> String {
    format!(
        r#"WITH RECURSIVE tree(id) AS (SELECT ? UNION SELECT p."id" FROM {} p JOIN tree t ON p."leader_id" = t.id)"#,
        tables.profiles.to_sql()
    )
}

pub(super) async fn leader_tree_ids<E: Engine>(
    engine: &E,
    tables: &Tables,
    args: &Args,
) -> CompatResult<Response> {
    let root = args.req_str("root_id")?;
    let sql = format!("{} SELECT id FROM tree", tree_cte(tables));
    let rows = engine.fetch_all(&sql, &[Value::String(root)]).await?;
    let ids = rows
        .into_iter()
        .filter_map(|mut row| row.remove("id"))
        .collect();
    Ok(Response::ok(Some(Value::Array(ids))))
}

pub(super) async fn status_counts<E: Engine>(
    engine: &E,
    tables: &Tables,
    args: &Args,
) -> CompatResult<Response> {
    let files = tables.files.to_sql();
    let (sql, params) = match args.opt_str("root_id")? {
        Some(root) => (
            format!(
                r#"{} SELECT f."status" AS "status", COUNT(*) AS "count" FROM {files} f WHERE f."owner_id" IN (SELECT id FROM tree) GROUP BY f."status" ORDER BY f."status""#,
                tree_cte(tables)
            ),
            vec![Value::String(root)],
        ),
        None => (
            format!(
                r#"SELECT f."status" AS "status", COUNT(*) AS "count" FROM {files} f GROUP BY f."status" ORDER BY f."status""#
            ),
            vec![],
        ),
    };
    let rows = engine.fetch_all(&sql, &params).await?;
    Ok(Response::ok(Some(Value::Array(
        rows.into_iter().map(Value::Object).collect(),
    ))))
}

pub(super) async fn pending_request_counts<E: Engine>(
    engine: &E,
    tables: &Tables,
    args: &Args,
) -> CompatResult<Response> {
    let select = r#"SELECT COUNT(*) AS "total",
        COALESCE(SUM(CASE WHEN r."status" = 'pending' THEN 1 ELSE 0 END), 0) AS "pending",
        COALESCE(SUM(CASE WHEN r."status" = 'approved' THEN 1 ELSE 0 END), 0) AS "approved",
        COALESCE(SUM(CASE WHEN r."status" = 'rejected' THEN 1 ELSE 0 END), 0) AS "rejected""#;
    let requests = tables.access_requests.to_sql();

    let (sql, params) = match args.opt_str("root_id")? {
        Some(root) => (
            format!(
                r#"{} {select} FROM {requests} r JOIN {} f ON f."id" = r."file_id" WHERE f."owner_id" IN (SELECT id FROM tree)"#,
                tree_cte(tables),
                tables.files.to_sql()
            ),
            vec![Value::String(root)],
        ),
        None => (format!("{select} FROM {requests} r"), vec![]),
    };

    let row = engine.fetch_first(&sql, &params).await?.unwrap_or_default();
    let mut counts = Map::new();
    for key in ["total", "pending", "approved", "rejected"] {
        counts.insert(key.to_string(), Value::from(row.get_i64(key).unwrap_or(0)));
    }
    Ok(Response::ok(Some(Value::Object(counts))))
}

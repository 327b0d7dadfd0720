//! Paged listing of public files with the caller's permission and request status.

use super::{Args, Tables};
use crate::engine::Engine;
use crate::error::CompatResult;
use crate::response::Response;
use crate::row::RowExt;
use serde_json::Value;

const DEFAULT_PAGE_SIZE: i64 = 20;

/// Public files annotated with the caller's grant and request status.
///
/// Each row carries `my_permission` and `my_request_status` (null when absent); the
/// response `count` is the total number of public files, independent of the page.
pub(super) async fn list_public_files_for_me<E: Engine>(
    engine: &E,
    tables: &Tables,
    args: &Args,
) -> CompatResult<Response> {
    let user_id = args.req_str("user_id")?;
    let limit = args.opt_count("limit")?.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = args.opt_count("offset")?.unwrap_or(0);

    let sql = format!(
        r#"SELECT f.*, p."permission" AS "my_permission", r."status" AS "my_request_status", COUNT(*) OVER () AS "total_count"
FROM {files} f
LEFT JOIN {permissions} p ON p."file_id" = f."id" AND p."user_id" = ?
LEFT JOIN {requests} r ON r."file_id" = f."id" AND r."requester_id" = ?
WHERE f."visibility" = 'public'
ORDER BY f."created_at" DESC, f."id"
LIMIT ? OFFSET ?"#,
        files = tables.files.to_sql(),
        permissions = tables.file_permissions.to_sql(),
        requests = tables.access_requests.to_sql(),
    );
    let params = [
        Value::String(user_id.clone()),
        Value::String(user_id),
        Value::from(limit),
        Value::from(offset),
    ];

    let rows = engine.fetch_all(&sql, &params).await?;
    let total = rows.first().and_then(|r| r.get_i64("total_count"));
    let data = rows
        .into_iter()
        .map(|mut row| {
            row.remove("total_count");
            Value::Object(row)
        })
        .collect();

    // An empty page past the end still needs the total.
    let total = match total {
        Some(total) => total,
        None if offset > 0 || limit == 0 => {
            let sql = format!(
                r#"SELECT COUNT(*) AS "count" FROM {} WHERE "visibility" = 'public'"#,
                tables.files.to_sql()
            );
            engine
                .fetch_first(&sql, &[])
                .await?
                .and_then(|r| r.get_i64("count"))
                .unwrap_or(0)
        }
        None => 0,
    };

    Ok(Response::ok(Some(Value::Array(data))).with_count(Some(total)))
}

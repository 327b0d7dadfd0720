//! Named procedures emulated with parameterized SQL.
//!
//! The registry is fixed; see [`Procedure`]. Arguments arrive as a JSON object and may be
//! written with or without the `p_` prefix (`root_id` or `p_root_id`).
//!
//! | procedure | args | data |
//! |---|---|---|
//! | `leader_tree_ids` | `root_id` | array of ids, root included |
//! | `status_counts` | `root_id?` | `[{status, count}]` |
//! | `pending_request_counts` | `root_id?` | `{total, pending, approved, rejected}` |
//! | `list_public_files_for_me` | `user_id`, `limit?` (20), `offset?` (0) | file rows; `count` = total |
//! | `try_job_lock` | `job_name`, `ttl_seconds?` (60) | `true` if acquired |
//! | `release_job_lock` | `job_name`, `error?` | `true` if the job row existed |
//!
//! # Tables
//!
//! Names come from [`RpcTables`](crate::config::RpcTables); the columns are fixed:
//!
//! ```sql
//! CREATE TABLE profiles (id TEXT PRIMARY KEY, leader_id TEXT);
//! CREATE TABLE files (id TEXT PRIMARY KEY, owner_id TEXT, title TEXT, status TEXT,
//!                     visibility TEXT, created_at TEXT);
//! CREATE TABLE file_permissions (file_id TEXT, user_id TEXT, permission TEXT);
//! CREATE TABLE access_requests (id TEXT PRIMARY KEY, file_id TEXT, requester_id TEXT,
//!                               status TEXT, requested_at TEXT);
//! CREATE TABLE job_locks (job_name TEXT PRIMARY KEY, running INTEGER NOT NULL DEFAULT 0,
//!                         locked_until TEXT, locked_by TEXT, last_started_at TEXT,
//!                         last_finished_at TEXT, last_error TEXT);
//! ```

mod job_lock;
mod listing;
mod tree;

use crate::client::Client;
use crate::config::RpcTables;
use crate::engine::Engine;
use crate::error::{CompatError, CompatResult};
use crate::ident::Ident;
use crate::response::{Response, ResponseError, UNKNOWN_FUNCTION};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The registered procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    LeaderTreeIds,
    StatusCounts,
    PendingRequestCounts,
    ListPublicFilesForMe,
    TryJobLock,
    ReleaseJobLock,
}

impl Procedure {
    pub const ALL: [Procedure; 6] = [
        Procedure::LeaderTreeIds,
        Procedure::StatusCounts,
        Procedure::PendingRequestCounts,
        Procedure::ListPublicFilesForMe,
        Procedure::TryJobLock,
        Procedure::ReleaseJobLock,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Procedure::LeaderTreeIds => "leader_tree_ids",
            Procedure::StatusCounts => "status_counts",
            Procedure::PendingRequestCounts => "pending_request_counts",
            Procedure::ListPublicFilesForMe => "list_public_files_for_me",
            Procedure::TryJobLock => "try_job_lock",
            Procedure::ReleaseJobLock => "release_job_lock",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Procedure {
    type Err = CompatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Procedure::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| CompatError::unsupported(format!("unknown procedure {s:?}")))
    }
}

/// Loosely typed argument bag.
#[derive(Debug, Default)]
pub(crate) struct Args(Map<String, Value>);

impl Args {
    fn from_value(value: Value) -> CompatResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self(map)),
            other => Err(CompatError::validation(format!(
                "rpc arguments must be an object, got {other}"
            ))),
        }
    }

    /// Look up `name` or `p_name`; `null` counts as absent.
    fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .get(name)
            .or_else(|| self.0.get(&format!("p_{name}")))
            .filter(|v| !v.is_null())
    }

    pub(crate) fn opt_str(&self, name: &str) -> CompatResult<Option<String>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(CompatError::validation(format!(
                "argument {name} must be a string, got {other}"
            ))),
        }
    }

    pub(crate) fn req_str(&self, name: &str) -> CompatResult<String> {
        self.opt_str(name)?
            .ok_or_else(|| CompatError::validation(format!("missing argument {name}")))
    }

    pub(crate) fn opt_f64(&self, name: &str) -> CompatResult<Option<f64>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| {
                CompatError::validation(format!("argument {name} must be numeric, got {s:?}"))
            }),
            Some(other) => Err(CompatError::validation(format!(
                "argument {name} must be numeric, got {other}"
            ))),
        }
    }

    /// Non-negative integer argument.
    pub(crate) fn opt_count(&self, name: &str) -> CompatResult<Option<i64>> {
        match self.opt_f64(name)? {
            None => Ok(None),
            Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(Some(v as i64)),
            Some(v) => Err(CompatError::validation(format!(
                "argument {name} must be a non-negative integer, got {v}"
            ))),
        }
    }
}

/// RPC table names, validated.
pub(crate) struct Tables {
    pub profiles: Ident,
    pub files: Ident,
    pub file_permissions: Ident,
    pub access_requests: Ident,
    pub job_locks: Ident,
}

impl Tables {
    fn resolve(tables: &RpcTables) -> CompatResult<Self> {
        Ok(Self {
            profiles: Ident::parse(&tables.profiles)?,
            files: Ident::parse(&tables.files)?,
            file_permissions: Ident::parse(&tables.file_permissions)?,
            access_requests: Ident::parse(&tables.access_requests)?,
            job_locks: Ident::parse(&tables.job_locks)?,
        })
    }
}

pub(crate) async fn call<E: Engine>(client: &Client<E>, name: &str, args: Value) -> Response {
    let procedure = match name.parse::<Procedure>() {
        Ok(procedure) => procedure,
        Err(_) => {
            return Response::failed(ResponseError::with_code(
                format!("Could not find the function {name} in the rpc registry"),
                UNKNOWN_FUNCTION,
            ));
        }
    };

    tracing::debug!(target: "pgcompat", procedure = %procedure, "rpc call");
    match dispatch(client, procedure, args).await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(target: "pgcompat", procedure = %procedure, error = %err, "rpc failed");
            Response::from(err)
        }
    }
}

async fn dispatch<E: Engine>(
    client: &Client<E>,
    procedure: Procedure,
    args: Value,
) -> CompatResult<Response> {
    let args = Args::from_value(args)?;
    let tables = Tables::resolve(&client.config().rpc_tables)?;
    let engine = client.engine();

    match procedure {
        Procedure::LeaderTreeIds => tree::leader_tree_ids(engine, &tables, &args).await,
        Procedure::StatusCounts => tree::status_counts(engine, &tables, &args).await,
        Procedure::PendingRequestCounts => {
            tree::pending_request_counts(engine, &tables, &args).await
        }
        Procedure::ListPublicFilesForMe => {
            listing::list_public_files_for_me(engine, &tables, &args).await
        }
        Procedure::TryJobLock => job_lock::try_job_lock(engine, &tables, &args).await,
        Procedure::ReleaseJobLock => job_lock::release_job_lock(engine, &tables, &args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn procedure_names_round_trip() {
        for procedure in Procedure::ALL {
            assert_eq!(procedure.name().parse::<Procedure>().unwrap(), procedure);
        }
        assert!("drop_everything".parse::<Procedure>().is_err());
    }

    #[test]
    fn args_accept_prefixed_names() {
        let args = Args::from_value(json!({"p_root_id": "u1", "limit": "5", "offset": null})).unwrap();
        assert_eq!(args.req_str("root_id").unwrap(), "u1");
        assert_eq!(args.opt_count("limit").unwrap(), Some(5));
        assert_eq!(args.opt_count("offset").unwrap(), None);
        assert!(args.req_str("user_id").is_err());
    }

    #[test]
    fn args_reject_bad_shapes() {
        assert!(Args::from_value(json!([1, 2])).is_err());
        let args = Args::from_value(json!({"limit": -1, "user_id": true})).unwrap();
        assert!(args.opt_count("limit").is_err());
        assert!(args.opt_str("user_id").is_err());
    }
}

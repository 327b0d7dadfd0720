//! PostgREST-style query builder.
//!
//! A [`QueryBuilder`] is obtained from [`Client::from`], shaped with chained calls and
//! consumed by [`QueryBuilder::execute`]. Chained calls never touch the engine; the first
//! invalid input (unsafe identifier, bad `or()` expression, ...) is recorded and returned
//! from `execute()` before any SQL is issued.
//!
//! # Usage
//!
//! ```ignore
//! use pgcompat::prelude::*;
//!
//! let resp = client
//!     .from("files")
//!     .select("id, title, status")
//!     .eq("owner_id", user_id)
//!     .or("title.ilike.%report%,status.eq.pending")
//!     .order_desc("created_at")
//!     .range(0, 19)
//!     .execute()
//!     .await?;
//!
//! let resp = client
//!     .from("profiles")
//!     .upsert(json!({"user_id": "u1", "name": "Ann"}), UpsertOptions::on_conflict("user_id"))
//!     .select("*")
//!     .single()
//!     .execute()
//!     .await?;
//! ```
//!
//! # Op-setting calls
//!
//! `select()`, `insert()`, `update()`, `upsert()` and `delete()` set the operation; the last
//! one wins. A `select()` chained after a write op does not change the op: it requests the
//! written rows back (`returning`).

/// Unwrap an engine result, or return it from the executor as a failed [`Response`].
macro_rules! try_engine {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(target: "pgcompat", error = %err, "statement failed");
                return Ok($crate::response::Response::from(err));
            }
        }
    };
}

mod delete;
mod filter;
mod insert;
mod or_expr;
mod select;
mod update;
mod upsert;


pub use filter::{CompiledFilter, Filter, compile};
pub use or_expr::{CondOp, OrNode};

use crate::client::Client;
use crate::engine::{Engine, SqliteEngine};
use crate::error::{CompatError, CompatResult};
use crate::ident::{Ident, IntoIdent};
use crate::response::{MULTIPLE_ROWS, NOT_FOUND, Response, ResponseError};
use crate::row::{Payload, Row};
use serde::Serialize;
use serde_json::Value;

/// Parse an `or()` expression into its alternatives without compiling it.
pub fn parse_or(expr: &str) -> CompatResult<Vec<OrNode>> {
    or_expr::parse(expr)
}

/// A SQL statement with its bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Operation a builder will execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Op {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
}

/// Expected number of result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    #[default]
    Many,
    /// `.maybe_single()`: zero or one row.
    MaybeOne,
    /// `.single()`: exactly one row.
    ExactlyOne,
}

/// Row count strategy for `select_with`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Exact,
}

/// Options for [`QueryBuilder::select_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOptions {
    pub count: Option<Count>,
    /// Return only the count (`data` stays `null`).
    pub head: bool,
}

impl SelectOptions {
    /// `{ count: "exact" }`
    pub fn exact_count() -> Self {
        Self {
            count: Some(Count::Exact),
            head: false,
        }
    }

    /// `{ count: "exact", head: true }`
    pub fn head() -> Self {
        Self {
            count: Some(Count::Exact),
            head: true,
        }
    }
}

/// Options for [`QueryBuilder::upsert`].
#[derive(Debug, Clone, Default)]
pub struct UpsertOptions {
    /// Comma-separated conflict target, e.g. `"user_id"` or `"file_id,user_id"`.
    pub on_conflict: Option<String>,
    /// Skip conflicting rows instead of updating them.
    pub ignore_duplicates: bool,
}

impl UpsertOptions {
    pub fn on_conflict(columns: impl Into<String>) -> Self {
        Self {
            on_conflict: Some(columns.into()),
            ignore_duplicates: false,
        }
    }

    pub fn ignore_duplicates(mut self, ignore: bool) -> Self {
        self.ignore_duplicates = ignore;
        self
    }
}

/// Projected columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    All,
    Columns(Vec<Ident>),
}

impl Projection {
    /// Parse a `select()` column list: `"*"` or `"a, b, c"`.
    ///
    /// Nested-relation syntax (`"author(name)"`) is not supported.
    pub fn parse(columns: &str) -> CompatResult<Self> {
        let columns = columns.trim();
        if columns.contains('(') || columns.contains(')') {
            return Err(CompatError::unsupported(format!(
                "nested relation select {columns:?}"
            )));
        }
        if columns.is_empty() || columns == "*" {
            return Ok(Self::All);
        }
        columns
            .split(',')
            .map(|c| Ident::parse(c.trim()))
            .collect::<CompatResult<Vec<_>>>()
            .map(Self::Columns)
    }

    pub fn to_sql(&self) -> String {
        match self {
            Self::All => "*".to_string(),
            Self::Columns(cols) => cols
                .iter()
                .map(Ident::to_sql)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Debug, Clone)]
struct Order {
    column: Ident,
    ascending: bool,
}

/// Chainable query builder bound to one table.
///
/// Single-owner: build it, then consume it with [`execute`](Self::execute).
pub struct QueryBuilder<E: Engine = SqliteEngine> {
    client: Client<E>,
    table: Option<Ident>,
    op: Op,
    columns: Projection,
    returning: Option<Projection>,
    count: Option<Count>,
    head: bool,
    order: Option<Order>,
    /// `(row count, offset)` of a `range()` window.
    range: Option<(i64, i64)>,
    limit: Option<i64>,
    filters: Vec<Filter>,
    rows: Vec<Row>,
    on_conflict: Vec<Ident>,
    ignore_duplicates: bool,
    cardinality: Cardinality,
    build_error: Option<CompatError>,
}

impl<E: Engine> std::fmt::Debug for QueryBuilder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("table", &self.table)
            .field("op", &self.op)
            .field("filters", &self.filters)
            .field("cardinality", &self.cardinality)
            .field("build_error", &self.build_error)
            .finish_non_exhaustive()
    }
}

impl<E: Engine> QueryBuilder<E> {
    pub(crate) fn new(client: Client<E>, table: impl IntoIdent) -> Self {
        let mut qb = Self {
            client,
            table: None,
            op: Op::Select,
            columns: Projection::All,
            returning: None,
            count: None,
            head: false,
            order: None,
            range: None,
            limit: None,
            filters: Vec::new(),
            rows: Vec::new(),
            on_conflict: Vec::new(),
            ignore_duplicates: false,
            cardinality: Cardinality::Many,
            build_error: None,
        };
        match table.into_ident() {
            Ok(table) => qb.table = Some(table),
            Err(err) => qb.record(err),
        }
        qb
    }

    /// Keep the first error only.
    fn record(&mut self, err: CompatError) {
        if self.build_error.is_none() {
            self.build_error = Some(err);
        }
    }

    fn table(&self) -> CompatResult<&Ident> {
        self.table
            .as_ref()
            .ok_or_else(|| CompatError::config("builder has no table"))
    }

    fn push_filter(mut self, column: impl IntoIdent, make: impl FnOnce(Ident) -> Filter) -> Self {
        match column.into_ident() {
            Ok(col) => self.filters.push(make(col)),
            Err(err) => self.record(err),
        }
        self
    }

    fn set_payload(mut self, op: Op, payload: CompatResult<Payload>) -> Self {
        self.op = op;
        match payload {
            Ok(payload) => self.rows = payload.into_rows(),
            Err(err) => self.record(err),
        }
        self
    }

    /// Refuse to update/delete a whole table unless the client allows it.
    fn require_filters(&self, action: &str) -> CompatResult<()> {
        if self.filters.is_empty() && !self.client.config().allow_unfiltered_mutations {
            return Err(CompatError::config(format!(
                "{action} without filters on {} (enable allow_unfiltered_mutations to permit)",
                self.table()?
            )));
        }
        Ok(())
    }

    // ==================== Operations ====================

    /// Select columns (`"*"` or `"a, b"`), or request returned rows after a write.
    pub fn select(self, columns: &str) -> Self {
        self.select_with(columns, SelectOptions::default())
    }

    /// [`select`](Self::select) with count/head options.
    pub fn select_with(mut self, columns: &str, options: SelectOptions) -> Self {
        match Projection::parse(columns) {
            Ok(projection) if self.op == Op::Select => self.columns = projection,
            Ok(projection) => self.returning = Some(projection),
            Err(err) => self.record(err),
        }
        self.count = options.count;
        self.head = options.head;
        self
    }

    /// Insert one row (object) or many (array of objects).
    pub fn insert<T: Serialize>(self, payload: T) -> Self {
        let payload = Payload::from_serialize(&payload);
        self.set_payload(Op::Insert, payload)
    }

    /// Update the filtered rows with `patch`.
    pub fn update<T: Serialize>(self, patch: T) -> Self {
        let payload = Payload::from_serialize(&patch).and_then(|payload| match payload {
            Payload::One(row) => Ok(Payload::One(row)),
            Payload::Many(_) => Err(CompatError::validation("update() expects a single object")),
        });
        self.set_payload(Op::Update, payload)
    }

    /// Insert rows, resolving conflicts on `options.on_conflict`.
    pub fn upsert<T: Serialize>(self, payload: T, options: UpsertOptions) -> Self {
        let payload = Payload::from_serialize(&payload);
        let mut qb = self.set_payload(Op::Upsert, payload);
        qb.ignore_duplicates = options.ignore_duplicates;

        let target = options.on_conflict.unwrap_or_default();
        let target: CompatResult<Vec<Ident>> = target
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(Ident::parse)
            .collect();
        match target {
            Ok(cols) if cols.is_empty() => qb.record(CompatError::config(
                "upsert requires an onConflict target",
            )),
            Ok(cols) => qb.on_conflict = cols,
            Err(err) => qb.record(err),
        }
        qb
    }

    /// Delete the filtered rows.
    pub fn delete(mut self) -> Self {
        self.op = Op::Delete;
        self
    }

    // ==================== Filters ====================

    /// `column = value` (`IS NULL` when `value` is null).
    pub fn eq(self, column: impl IntoIdent, value: impl Into<Value>) -> Self {
        self.push_filter(column, |col| Filter::Eq(col, value.into()))
    }

    /// `column != value` (`IS NOT NULL` when `value` is null).
    pub fn neq(self, column: impl IntoIdent, value: impl Into<Value>) -> Self {
        self.push_filter(column, |col| Filter::Neq(col, value.into()))
    }

    /// `column > value`
    pub fn gt(self, column: impl IntoIdent, value: impl Into<Value>) -> Self {
        self.push_filter(column, |col| Filter::Gt(col, value.into()))
    }

    /// `column >= value`
    pub fn gte(self, column: impl IntoIdent, value: impl Into<Value>) -> Self {
        self.push_filter(column, |col| Filter::Gte(col, value.into()))
    }

    /// `column < value`
    pub fn lt(self, column: impl IntoIdent, value: impl Into<Value>) -> Self {
        self.push_filter(column, |col| Filter::Lt(col, value.into()))
    }

    /// `column <= value`
    pub fn lte(self, column: impl IntoIdent, value: impl Into<Value>) -> Self {
        self.push_filter(column, |col| Filter::Lte(col, value.into()))
    }

    /// `column IN (...)`. An empty list matches nothing.
    pub fn in_list<I, V>(self, column: impl IntoIdent, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.push_filter(column, |col| Filter::In(col, values))
    }

    /// `column IS value` (null, true or false).
    pub fn is(mut self, column: impl IntoIdent, value: impl Into<Value>) -> Self {
        let value = value.into();
        if let Err(err) = filter::check_is_operand(&value) {
            self.record(err);
            return self;
        }
        self.push_filter(column, |col| Filter::Is(col, value))
    }

    /// Case-insensitive `LIKE`; `pattern` carries its own `%` wildcards.
    pub fn ilike(self, column: impl IntoIdent, pattern: impl Into<String>) -> Self {
        self.push_filter(column, |col| Filter::ILike(col, pattern.into()))
    }

    /// PostgREST `or` expression, e.g. `"a.eq.1,and(b.eq.2,c.ilike.%x%)"`.
    pub fn or(mut self, expr: impl Into<String>) -> Self {
        let expr = expr.into();
        match or_expr::parse(&expr) {
            Ok(_) => self.filters.push(Filter::Or(expr)),
            Err(err) => self.record(err),
        }
        self
    }

    /// Negated filter: `op` is one of `eq`, `is`, `ilike`, `in`, `gt`, `gte`, `lt`, `lte`.
    pub fn not(mut self, column: impl IntoIdent, op: &str, value: impl Into<Value>) -> Self {
        match column
            .into_ident()
            .and_then(|col| Filter::negated(col, op, value.into()))
        {
            Ok(filter) => self.filters.push(filter),
            Err(err) => self.record(err),
        }
        self
    }

    // ==================== Shape ====================

    /// Order ascending by `column`. Replaces any earlier ordering.
    pub fn order(self, column: impl IntoIdent) -> Self {
        self.order_by(column, true)
    }

    /// Order descending by `column`.
    pub fn order_desc(self, column: impl IntoIdent) -> Self {
        self.order_by(column, false)
    }

    pub fn order_by(mut self, column: impl IntoIdent, ascending: bool) -> Self {
        match column.into_ident() {
            Ok(column) => self.order = Some(Order { column, ascending }),
            Err(err) => self.record(err),
        }
        self
    }

    /// Inclusive row window. Takes precedence over [`limit`](Self::limit).
    pub fn range(mut self, from: i64, to: i64) -> Self {
        let size = to.checked_sub(from).and_then(|d| d.checked_add(1));
        match size {
            Some(size) if from >= 0 && to >= from => self.range = Some((size, from)),
            _ => self.record(CompatError::config(format!("invalid range({from}, {to})"))),
        }
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        if n < 0 {
            self.record(CompatError::config(format!("invalid limit({n})")));
        } else {
            self.limit = Some(n);
        }
        self
    }

    /// Expect exactly one row.
    pub fn single(mut self) -> Self {
        self.cardinality = Cardinality::ExactlyOne;
        self
    }

    /// Expect zero or one row.
    pub fn maybe_single(mut self) -> Self {
        self.cardinality = Cardinality::MaybeOne;
        self
    }

    // ==================== Execution ====================

    /// The rows query this builder would run for a select.
    pub fn to_sql(&self) -> CompatResult<Statement> {
        if let Some(err) = &self.build_error {
            return Err(err
                .try_clone()
                .unwrap_or_else(|| CompatError::Other(err.to_string())));
        }
        let compiled = compile(&self.filters)?;
        self.rows_statement(&self.columns, &compiled)
    }

    /// Run the query.
    ///
    /// Returns `Err` only for configuration errors, which are raised before any statement
    /// is sent. Cardinality and engine errors come back inside the [`Response`].
    pub async fn execute(mut self) -> CompatResult<Response> {
        if let Some(err) = self.build_error.take() {
            return Err(err);
        }
        match self.op {
            Op::Select => select::execute(&self).await,
            Op::Insert => insert::execute(&self).await,
            Op::Update => update::execute(&self).await,
            Op::Delete => delete::execute(&self).await,
            Op::Upsert => upsert::execute(&self).await,
        }
    }
}

/// Shape fetched rows according to the cardinality expectation.
fn shape(rows: Vec<Row>, cardinality: Cardinality) -> Response {
    let n = rows.len();
    match (cardinality, n) {
        (Cardinality::Many, _) => Response::ok(Some(Value::Array(
            rows.into_iter().map(Value::Object).collect(),
        ))),
        (Cardinality::MaybeOne, 0) => Response::ok(None),
        (Cardinality::ExactlyOne, 0) => Response::failed(ResponseError::with_code(
            "JSON object requested, no rows returned",
            NOT_FOUND,
        ))
        .with_count(Some(0)),
        (_, 1) => Response::ok(rows.into_iter().next().map(Value::Object)),
        (_, n) => Response::failed(ResponseError::with_code(
            format!("JSON object requested, {n} rows returned"),
            MULTIPLE_ROWS,
        ))
        .with_count(i64::try_from(n).ok()),
    }
}

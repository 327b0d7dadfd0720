//! Filter predicates and their compilation into a `WHERE` clause.

use super::or_expr;
use crate::error::{CompatError, CompatResult};
use crate::ident::Ident;
use serde_json::Value;

/// One predicate in a builder's filter list.
///
/// Every variant except `Raw` carries a validated column. `Raw` fragments are only produced
/// inside the crate (by `.not()`), from quoted identifiers and `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Raw { sql: String, params: Vec<Value> },
    Eq(Ident, Value),
    Neq(Ident, Value),
    In(Ident, Vec<Value>),
    Is(Ident, Value),
    Gt(Ident, Value),
    Gte(Ident, Value),
    Lt(Ident, Value),
    Lte(Ident, Value),
    ILike(Ident, String),
    Or(String),
}

/// `is` only compares against `null`, `true` or `false`.
pub(crate) fn check_is_operand(value: &Value) -> CompatResult<()> {
    match value {
        Value::Null | Value::Bool(_) => Ok(()),
        other => Err(CompatError::validation(format!(
            "is expects null, true or false, got {other}"
        ))),
    }
}

impl Filter {
    /// Build the negated form used by `.not(column, op, value)`.
    pub(crate) fn negated(column: Ident, op: &str, value: Value) -> CompatResult<Self> {
        let col = column.to_sql();
        let (sql, params) = match (op, value) {
            ("eq", Value::Null) | ("is", Value::Null) => (format!("{col} IS NOT NULL"), vec![]),
            ("eq", v) => (format!("{col} != ?"), vec![v]),
            ("is", v) => {
                check_is_operand(&v)?;
                (format!("{col} IS NOT ?"), vec![v])
            }
            ("ilike", v) => (format!("NOT (LOWER({col}) LIKE LOWER(?))"), vec![v]),
            ("in", Value::Array(values)) if values.is_empty() => ("1=1".to_string(), vec![]),
            ("in", Value::Array(values)) => {
                (format!("{col} NOT IN ({})", placeholders(values.len())), values)
            }
            ("in", other) => {
                return Err(CompatError::validation(format!(
                    "not(.., \"in\", ..) expects an array, got {other}"
                )));
            }
            ("gt", v) => (format!("NOT ({col} > ?)"), vec![v]),
            ("gte", v) => (format!("NOT ({col} >= ?)"), vec![v]),
            ("lt", v) => (format!("NOT ({col} < ?)"), vec![v]),
            ("lte", v) => (format!("NOT ({col} <= ?)"), vec![v]),
            (other, _) => {
                return Err(CompatError::unsupported(format!(
                    "operator {other:?} in not()"
                )));
            }
        };
        Ok(Filter::Raw { sql, params })
    }

    fn write_sql(&self, out: &mut String, params: &mut Vec<Value>) -> CompatResult<()> {
        match self {
            Filter::Raw { sql, params: values } => {
                out.push_str(sql);
                params.extend(values.iter().cloned());
            }
            Filter::Eq(col, Value::Null) | Filter::Is(col, Value::Null) => {
                col.write_sql(out);
                out.push_str(" IS NULL");
            }
            Filter::Eq(col, v) => compare(out, params, col, "=", v),
            Filter::Neq(col, Value::Null) => {
                col.write_sql(out);
                out.push_str(" IS NOT NULL");
            }
            Filter::Neq(col, v) => compare(out, params, col, "!=", v),
            Filter::Is(col, v) => compare(out, params, col, "IS", v),
            Filter::Gt(col, v) => compare(out, params, col, ">", v),
            Filter::Gte(col, v) => compare(out, params, col, ">=", v),
            Filter::Lt(col, v) => compare(out, params, col, "<", v),
            Filter::Lte(col, v) => compare(out, params, col, "<=", v),
            Filter::In(_, values) if values.is_empty() => out.push_str("1=0"),
            Filter::In(col, values) => {
                col.write_sql(out);
                out.push_str(" IN (");
                out.push_str(&placeholders(values.len()));
                out.push(')');
                params.extend(values.iter().cloned());
            }
            Filter::ILike(col, pattern) => {
                out.push_str("LOWER(");
                col.write_sql(out);
                out.push_str(") LIKE LOWER(?)");
                params.push(Value::String(pattern.clone()));
            }
            Filter::Or(expr) => {
                let (sql, values) = or_expr::compile(expr)?;
                out.push_str(&sql);
                params.extend(values);
            }
        }
        Ok(())
    }
}

fn compare(out: &mut String, params: &mut Vec<Value>, col: &Ident, op: &str, value: &Value) {
    col.write_sql(out);
    out.push(' ');
    out.push_str(op);
    out.push_str(" ?");
    params.push(value.clone());
}

pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Output of [`compile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    /// Clause body without the `WHERE` keyword; empty when there are no filters.
    pub where_clause: String,
    /// Bound values in placeholder order.
    pub params: Vec<Value>,
}

impl CompiledFilter {
    /// `" WHERE ..."`, or an empty string.
    pub fn where_sql(&self) -> String {
        if self.where_clause.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_clause)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.where_clause.is_empty()
    }
}

/// Compile a filter list: one parenthesized clause per filter, joined with `AND`.
pub fn compile(filters: &[Filter]) -> CompatResult<CompiledFilter> {
    let mut compiled = CompiledFilter::default();
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            compiled.where_clause.push_str(" AND ");
        }
        compiled.where_clause.push('(');
        filter.write_sql(&mut compiled.where_clause, &mut compiled.params)?;
        compiled.where_clause.push(')');
    }
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn col(name: &str) -> Ident {
        Ident::parse(name).unwrap()
    }

    #[test]
    fn empty_list_has_no_where() {
        let compiled = compile(&[]).unwrap();
        assert!(compiled.is_empty());
        assert_eq!(compiled.where_sql(), "");
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn eq_null_becomes_is_null() {
        let compiled = compile(&[Filter::Eq(col("deleted_at"), Value::Null)]).unwrap();
        assert_eq!(compiled.where_clause, r#"("deleted_at" IS NULL)"#);
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn empty_in_is_always_false() {
        let compiled = compile(&[
            Filter::Eq(col("a"), json!(1)),
            Filter::In(col("id"), vec![]),
            Filter::Gt(col("b"), json!(2)),
        ])
        .unwrap();
        assert_eq!(compiled.where_clause, r#"("a" = ?) AND (1=0) AND ("b" > ?)"#);
        assert_eq!(compiled.params, vec![json!(1), json!(2)]);
    }

    #[test]
    fn in_list_binds_each_value() {
        let compiled = compile(&[Filter::In(col("id"), vec![json!("x"), json!("y")])]).unwrap();
        assert_eq!(compiled.where_sql(), r#" WHERE ("id" IN (?, ?))"#);
        assert_eq!(compiled.params, vec![json!("x"), json!("y")]);
    }

    #[test]
    fn ilike_lowercases_both_sides() {
        let compiled = compile(&[Filter::ILike(col("name"), "%Ann%".into())]).unwrap();
        assert_eq!(compiled.where_clause, r#"(LOWER("name") LIKE LOWER(?))"#);
    }

    #[test]
    fn or_is_one_group() {
        let compiled = compile(&[
            Filter::Eq(col("owner_id"), json!("u1")),
            Filter::Or("a.eq.1,b.eq.2".into()),
        ])
        .unwrap();
        assert_eq!(
            compiled.where_clause,
            r#"("owner_id" = ?) AND (("a" = ?) OR ("b" = ?))"#
        );
        assert_eq!(compiled.params, vec![json!("u1"), json!("1"), json!("2")]);
    }

    #[test]
    fn or_parse_errors_propagate() {
        assert!(compile(&[Filter::Or("a.neq.1".into())]).is_err());
    }

    #[test]
    fn negations() {
        let cases = [
            ("is", Value::Null, r#"("x" IS NOT NULL)"#, 0),
            ("eq", json!(3), r#"("x" != ?)"#, 1),
            ("ilike", json!("%a%"), r#"(NOT (LOWER("x") LIKE LOWER(?)))"#, 1),
            ("in", json!([1, 2]), r#"("x" NOT IN (?, ?))"#, 2),
            ("in", json!([]), "(1=1)", 0),
            ("lt", json!(5), r#"(NOT ("x" < ?))"#, 1),
        ];
        for (op, value, expected, n) in cases {
            let filter = Filter::negated(col("x"), op, value).unwrap();
            let compiled = compile(&[filter]).unwrap();
            assert_eq!(compiled.where_clause, expected, "op {op}");
            assert_eq!(compiled.params.len(), n, "op {op}");
        }
    }

    #[test]
    fn unsupported_negation_fails_loudly() {
        let err = Filter::negated(col("x"), "cs", json!("{a}")).unwrap_err();
        assert!(matches!(err, CompatError::Unsupported(_)));
        assert!(Filter::negated(col("x"), "in", json!("a,b")).is_err());
    }

    #[test]
    fn is_accepts_only_null_and_booleans() {
        assert!(check_is_operand(&Value::Null).is_ok());
        assert!(check_is_operand(&json!(false)).is_ok());
        for value in [json!(1), json!("null"), json!([true])] {
            let err = check_is_operand(&value).unwrap_err();
            assert!(matches!(err, CompatError::Validation(_)), "{value}");
        }
        let negated = Filter::negated(col("x"), "is", json!(true)).unwrap();
        assert_eq!(compile(&[negated]).unwrap().where_clause, r#"("x" IS NOT ?)"#);
        assert!(Filter::negated(col("x"), "is", json!("yes")).is_err());
    }
}

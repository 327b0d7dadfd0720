//! Parser for PostgREST-style `or()` expressions.
//!
//! Supported grammar:
//!
//! ```text
//! expr    := segment ("," segment)*
//! segment := "and(" expr ")" | cond
//! cond    := column "." op "." value      op ∈ { eq, ilike }
//! ```
//!
//! Commas only split at paren depth 0. The value is everything after the second dot and is
//! bound as a string. Segments combine with `OR`; the interior of an `and(...)` group
//! combines with `AND`.

use crate::error::{CompatError, CompatResult};
use crate::ident::Ident;
use serde_json::Value;

/// Operator inside an `or()` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondOp {
    Eq,
    ILike,
}

impl CondOp {
    fn parse(op: &str) -> CompatResult<Self> {
        match op {
            "eq" => Ok(Self::Eq),
            "ilike" => Ok(Self::ILike),
            other => Err(CompatError::parse(format!(
                "unsupported operator {other:?} in or() (expected eq or ilike)"
            ))),
        }
    }
}

/// A parsed `or()` node.
#[derive(Debug, Clone, PartialEq)]
pub enum OrNode {
    Cond {
        column: Ident,
        op: CondOp,
        value: String,
    },
    AndGroup(Vec<OrNode>),
}

impl OrNode {
    /// Render this node as one parenthesized clause, appending bound values to `params`.
    pub(crate) fn write_sql(&self, out: &mut String, params: &mut Vec<Value>) {
        out.push('(');
        match self {
            OrNode::Cond { column, op, value } => {
                match op {
                    CondOp::Eq => {
                        column.write_sql(out);
                        out.push_str(" = ?");
                    }
                    CondOp::ILike => {
                        out.push_str("LOWER(");
                        column.write_sql(out);
                        out.push_str(") LIKE LOWER(?)");
                    }
                }
                params.push(Value::String(value.clone()));
            }
            OrNode::AndGroup(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" AND ");
                    }
                    child.write_sql(out, params);
                }
            }
        }
        out.push(')');
    }
}

/// Parse an `or()` expression into its top-level alternatives.
pub fn parse(expr: &str) -> CompatResult<Vec<OrNode>> {
    let segments = split_top_level(expr)?;
    segments.into_iter().map(parse_segment).collect()
}

/// Parse and render an `or()` expression as `(..) OR (..)`.
pub fn compile(expr: &str) -> CompatResult<(String, Vec<Value>)> {
    let nodes = parse(expr)?;
    let mut sql = String::new();
    let mut params = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            sql.push_str(" OR ");
        }
        node.write_sql(&mut sql, &mut params);
    }
    Ok((sql, params))
}

fn split_top_level(input: &str) -> CompatResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| CompatError::parse(format!("unbalanced ')' in {input:?}")))?;
            }
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(CompatError::parse(format!("unbalanced '(' in {input:?}")));
    }
    parts.push(&input[start..]);
    Ok(parts)
}

fn parse_segment(segment: &str) -> CompatResult<OrNode> {
    let segment = segment.trim();
    if segment.is_empty() {
        return Err(CompatError::parse("empty condition in or()"));
    }

    if let Some(inner) = segment
        .strip_prefix("and(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let children = split_top_level(inner)?
            .into_iter()
            .map(parse_segment)
            .collect::<CompatResult<Vec<_>>>()?;
        return Ok(OrNode::AndGroup(children));
    }

    let mut parts = segment.splitn(3, '.');
    let (Some(column), Some(op), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CompatError::parse(format!(
            "expected column.op.value, got {segment:?}"
        )));
    };

    Ok(OrNode::Cond {
        column: Ident::parse(column)?,
        op: CondOp::parse(op)?,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_alternatives() {
        let (sql, params) = compile("a.eq.1,b.eq.2").unwrap();
        assert_eq!(sql, r#"("a" = ?) OR ("b" = ?)"#);
        assert_eq!(params, vec![json!("1"), json!("2")]);
    }

    #[test]
    fn and_groups() {
        let (sql, params) = compile("and(a.eq.1,b.eq.2),and(a.eq.3,b.eq.4)").unwrap();
        assert_eq!(
            sql,
            r#"(("a" = ?) AND ("b" = ?)) OR (("a" = ?) AND ("b" = ?))"#
        );
        assert_eq!(params, vec![json!("1"), json!("2"), json!("3"), json!("4")]);
    }

    #[test]
    fn ilike_keeps_dots_in_value() {
        let (sql, params) = compile("title.ilike.%v1.2%,email.ilike.%@example.com").unwrap();
        assert_eq!(
            sql,
            r#"(LOWER("title") LIKE LOWER(?)) OR (LOWER("email") LIKE LOWER(?))"#
        );
        assert_eq!(params, vec![json!("%v1.2%"), json!("%@example.com")]);
    }

    #[test]
    fn segments_are_trimmed() {
        let nodes = parse(" a.eq.x , and( b.eq.y )").unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(matches!(&nodes[1], OrNode::AndGroup(children) if children.len() == 1));
    }

    #[test]
    fn unknown_operator_fails() {
        let err = compile("a.gt.1").unwrap_err();
        assert!(matches!(err, CompatError::Parse(_)));
    }

    #[test]
    fn malformed_inputs_fail() {
        assert!(compile("").is_err());
        assert!(compile("a.eq").is_err());
        assert!(compile("a.eq.1,").is_err());
        assert!(compile("and(a.eq.1").is_err());
        assert!(compile("a.eq.1)").is_err());
    }

    #[test]
    fn unsafe_column_is_rejected() {
        let err = compile(r#"a"b.eq.1"#).unwrap_err();
        assert!(matches!(err, CompatError::InvalidIdentifier(_)));
    }
}

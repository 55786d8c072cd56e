//! SQL Translation of Block Queries
//!
//! Turns a [`BlockQuery`] into one parameterized SELECT using SQLite's JSON1
//! functions. Each leaf is wrapped in `COALESCE(..., 0)` so SQL's three-valued
//! logic never leaks: a missing path is plain false and `NOT` inverts it.
//!
//! Paths are embedded as quoted JSON path literals (`$."groups"[0]`). Segments
//! are restricted to `[A-Za-z0-9_]` at parse time, so quoting cannot be broken.

use crate::db::database::BLOCK_COLUMNS;
use crate::models::{
    BlockQuery, FieldMatch, FilterExpression, FilterOperator, PathSegment, PropertyFilter,
    PropertyPath, RelatedFilter, Scalar, WhereClause,
};
use libsql::Value;

/// A statement and its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Accumulates positional parameters while conditions are rendered
#[derive(Debug, Default)]
struct SqlBuilder {
    params: Vec<Value>,
}

impl SqlBuilder {
    fn bind(&mut self, value: Value) -> &'static str {
        self.params.push(value);
        "?"
    }

    fn bind_scalar(&mut self, scalar: &Scalar) -> &'static str {
        let value = match scalar {
            Scalar::String(s) => Value::Text(s.clone()),
            Scalar::Bool(b) => Value::Integer(i64::from(*b)),
            Scalar::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
        };
        self.bind(value)
    }

    /// Structural and visibility conditions for rows aliased `alias`
    fn structural(&mut self, alias: &str, clause: &WhereClause, include_trashed: bool) -> Vec<String> {
        let mut conditions = Vec::new();
        if let Some(types) = &clause.block_type {
            let values: Vec<String> = types.values().iter().map(|t| t.as_str().to_string()).collect();
            conditions.push(self.field_match(alias, "block_type", &values));
        }
        for (column, field) in [
            ("parent_id", &clause.parent_id),
            ("root_id", &clause.root_id),
            ("workspace_id", &clause.workspace_id),
        ] {
            if let Some(field) = field {
                let values: Vec<String> = match field {
                    FieldMatch::Equals(v) => vec![v.clone()],
                    FieldMatch::In(set) => set.clone(),
                };
                conditions.push(self.field_match(alias, column, &values));
            }
        }
        if !include_trashed {
            conditions.push(format!("{}.in_trash = 0", alias));
        }
        conditions
    }

    fn field_match(&mut self, alias: &str, column: &str, values: &[String]) -> String {
        let placeholders: Vec<&str> = values
            .iter()
            .map(|v| self.bind(Value::Text(v.clone())))
            .collect();
        if placeholders.len() == 1 {
            format!("{}.{} = ?", alias, column)
        } else {
            format!("{}.{} IN ({})", alias, column, placeholders.join(", "))
        }
    }

    fn expression(&mut self, alias: &str, expression: &FilterExpression) -> String {
        match expression {
            FilterExpression::Property(leaf) => self.leaf(alias, leaf),
            FilterExpression::And(operands) => self.join(alias, operands, " AND "),
            FilterExpression::Or(operands) => self.join(alias, operands, " OR "),
            FilterExpression::Not(operand) => format!("(NOT {})", self.expression(alias, operand)),
        }
    }

    fn join(&mut self, alias: &str, operands: &[FilterExpression], separator: &str) -> String {
        let parts: Vec<String> = operands
            .iter()
            .map(|op| self.expression(alias, op))
            .collect();
        format!("({})", parts.join(separator))
    }

    fn leaf(&mut self, alias: &str, leaf: &PropertyFilter) -> String {
        let column = column_ref(alias, &leaf.path);
        let path = json_path(&leaf.path);
        let body = match leaf.operator {
            FilterOperator::Equals | FilterOperator::In => {
                let options: Vec<String> = leaf
                    .scalars()
                    .iter()
                    .map(|s| self.scalar_equals(&column, &path, s))
                    .collect();
                options.join(" OR ")
            }
            FilterOperator::NotEquals => {
                let options: Vec<String> = leaf
                    .scalars()
                    .iter()
                    .map(|s| self.scalar_equals(&column, &path, s))
                    .collect();
                format!(
                    "json_type({c}, '{p}') IS NOT NULL AND json_type({c}, '{p}') != 'null' AND NOT ({o})",
                    c = column,
                    p = path,
                    o = options.join(" OR ")
                )
            }
            FilterOperator::Contains => {
                let options: Vec<String> = leaf
                    .scalars()
                    .iter()
                    .map(|s| self.scalar_contains(&column, &path, s))
                    .collect();
                options.join(" OR ")
            }
        };
        format!("COALESCE(({}), 0)", body)
    }

    fn scalar_equals(&mut self, column: &str, path: &str, scalar: &Scalar) -> String {
        match scalar {
            Scalar::String(_) => format!(
                "(json_type({c}, '{p}') = 'text' AND json_extract({c}, '{p}') = {v})",
                c = column,
                p = path,
                v = self.bind_scalar(scalar)
            ),
            Scalar::Number(_) => format!(
                "(json_type({c}, '{p}') IN ('integer', 'real') AND json_extract({c}, '{p}') = {v})",
                c = column,
                p = path,
                v = self.bind_scalar(scalar)
            ),
            Scalar::Bool(b) => format!(
                "(json_type({}, '{}') = '{}')",
                column,
                path,
                if *b { "true" } else { "false" }
            ),
        }
    }

    fn scalar_contains(&mut self, column: &str, path: &str, scalar: &Scalar) -> String {
        // Placeholders are bound in the order they appear in the rendered SQL
        let substring = match scalar {
            Scalar::String(_) => Some(format!(
                "(json_type({c}, '{p}') = 'text' AND instr(json_extract({c}, '{p}'), {v}) > 0)",
                c = column,
                p = path,
                v = self.bind_scalar(scalar)
            )),
            _ => None,
        };
        let element = match scalar {
            Scalar::String(_) => format!("(je.type = 'text' AND je.value = {})", self.bind_scalar(scalar)),
            Scalar::Number(_) => format!(
                "(je.type IN ('integer', 'real') AND je.value = {})",
                self.bind_scalar(scalar)
            ),
            Scalar::Bool(b) => format!("(je.type = '{}')", if *b { "true" } else { "false" }),
        };
        let membership = format!(
            "(json_type({c}, '{p}') = 'array' AND EXISTS (SELECT 1 FROM json_each({c}, '{p}') AS je WHERE {e}))",
            c = column,
            p = path,
            e = element
        );
        match substring {
            Some(substring) => format!("{} OR {}", substring, membership),
            None => membership,
        }
    }

    /// Condition tying `alias.link_column` to a related row matching `related`
    fn related(
        &mut self,
        alias: &str,
        link_column: &str,
        related_alias: &str,
        related: &RelatedFilter,
        include_trashed: bool,
    ) -> String {
        let mut conditions = self.structural(related_alias, &related.where_clause, include_trashed);
        if let Some(filter) = &related.filter {
            conditions.push(self.expression(related_alias, filter));
        }
        let where_sql = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        format!(
            "{}.{} IN (SELECT {r}.id FROM blocks {r}{w})",
            alias,
            link_column,
            r = related_alias,
            w = where_sql
        )
    }
}

fn column_ref(alias: &str, path: &PropertyPath) -> String {
    format!("{}.{}", alias, path.root().column())
}

/// JSON path literal for SQLite, always quoting keys
pub fn json_path(path: &PropertyPath) -> String {
    let mut out = String::from("$");
    for segment in path.segments() {
        match segment {
            PathSegment::Key(key) => {
                out.push_str(".\"");
                out.push_str(key);
                out.push('"');
            }
            PathSegment::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// SELECT for the matches of `query`, ordered by id
pub fn select_query(query: &BlockQuery) -> SqlQuery {
    let mut builder = SqlBuilder::default();
    let mut conditions = builder.structural("b", &query.where_clause, query.include_trashed);
    if let Some(filter) = &query.filter {
        conditions.push(builder.expression("b", filter));
    }
    if let Some(parent) = &query.parent {
        conditions.push(builder.related("b", "parent_id", "p", parent, query.include_trashed));
    }
    if let Some(root) = &query.root {
        conditions.push(builder.related("b", "root_id", "r", root, query.include_trashed));
    }

    let columns: Vec<String> = BLOCK_COLUMNS
        .split(", ")
        .map(|c| format!("b.{}", c))
        .collect();
    let mut sql = format!("SELECT {} FROM blocks b", columns.join(", "));
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY b.id");
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    SqlQuery {
        sql,
        params: builder.params,
    }
}

/// One probe per `contains` leaf: does any in-scope row hold a number there?
///
/// Returns `(path, query)` pairs; a probe that yields a row means the leaf
/// targets a numeric value.
pub fn numeric_contains_probes(query: &BlockQuery) -> Vec<(String, SqlQuery)> {
    let scopes = [
        Some((&query.where_clause, query.filter.as_ref())),
        query.parent.as_ref().map(|r| (&r.where_clause, r.filter.as_ref())),
        query.root.as_ref().map(|r| (&r.where_clause, r.filter.as_ref())),
    ];

    let mut probes = Vec::new();
    for (clause, filter) in scopes.into_iter().flatten() {
        let Some(filter) = filter else { continue };
        for leaf in filter.leaves() {
            if leaf.operator != FilterOperator::Contains {
                continue;
            }
            let mut builder = SqlBuilder::default();
            let mut conditions = builder.structural("b", clause, query.include_trashed);
            conditions.push(format!(
                "json_type({}, '{}') IN ('integer', 'real')",
                column_ref("b", &leaf.path),
                json_path(&leaf.path)
            ));
            probes.push((
                leaf.path.to_string(),
                SqlQuery {
                    sql: format!(
                        "SELECT 1 FROM blocks b WHERE {} LIMIT 1",
                        conditions.join(" AND ")
                    ),
                    params: builder.params,
                },
            ));
        }
    }
    probes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockType, FilterExpression, PropertyFilter};
    use serde_json::json;

    #[test]
    fn test_json_path_quotes_keys() {
        let path = PropertyPath::parse("content.data.rows.0.amount").unwrap();
        assert_eq!(json_path(&path), "$.\"rows\"[0].\"amount\"");
    }

    #[test]
    fn test_select_binds_structural_values() {
        let query = BlockQuery::new(
            WhereClause::new()
                .block_type(BlockType::Paragraph)
                .roots(["doc-1", "doc-2"]),
        )
        .with_limit(5);
        let built = select_query(&query);
        assert!(built.sql.contains("b.block_type = ?"));
        assert!(built.sql.contains("b.root_id IN (?, ?)"));
        assert!(built.sql.contains("b.in_trash = 0"));
        assert!(built.sql.ends_with("ORDER BY b.id LIMIT 5"));
        assert_eq!(built.params.len(), 3);
    }

    #[test]
    fn test_leaves_are_two_valued() {
        let query = BlockQuery::default().with_filter(FilterExpression::negate(
            PropertyFilter::equals("status", json!("done")).unwrap().into(),
        ));
        let built = select_query(&query);
        assert!(built.sql.contains("(NOT COALESCE(("));
    }

    #[test]
    fn test_probe_per_contains_leaf() {
        let filter = FilterExpression::and(vec![
            FilterExpression::in_group("page-1"),
            PropertyFilter::contains("content.data.tags", json!("x")).unwrap().into(),
            PropertyFilter::equals("title", json!("t")).unwrap().into(),
        ])
        .unwrap();
        let probes = numeric_contains_probes(&BlockQuery::default().with_filter(filter));
        let paths: Vec<_> = probes.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["properties.groups", "content.data.tags"]);
    }

    #[test]
    fn test_related_filters_use_subqueries() {
        let query = BlockQuery::default().with_parent(
            RelatedFilter::new(WhereClause::new().block_type(BlockType::BulletedListItem)),
        );
        let built = select_query(&query);
        assert!(built
            .sql
            .contains("b.parent_id IN (SELECT p.id FROM blocks p WHERE p.block_type = ?"));
    }
}

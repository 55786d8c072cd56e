//! SurrealQL Translation of Block Queries
//!
//! Renders a [`BlockQuery`] as a SurrealQL SELECT over the `blocks` table.
//! Every leaf is guarded by a `type::is::*` check, so a missing (`NONE`) or
//! `null` value is false rather than an error, matching the SQL backend.
//!
//! Field segments are wrapped in backticks; keys are restricted to
//! `[A-Za-z0-9_]` at parse time.

use crate::models::{
    BlockQuery, FieldMatch, FilterExpression, FilterOperator, PathSegment, PropertyFilter,
    PropertyPath, RelatedFilter, Scalar, WhereClause,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// A SurrealQL statement and its named bindings
#[derive(Debug, Clone, PartialEq)]
pub struct SurrealQuery {
    pub sql: String,
    pub bindings: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct SurrealBuilder {
    bindings: BTreeMap<String, Value>,
}

impl SurrealBuilder {
    fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.bindings.len());
        self.bindings.insert(name.clone(), value);
        format!("${}", name)
    }

    fn structural(&mut self, clause: &WhereClause, include_trashed: bool) -> Vec<String> {
        let mut conditions = Vec::new();
        if let Some(types) = &clause.block_type {
            let values = types.values().iter().map(|t| t.as_str().to_string()).collect();
            conditions.push(self.field_match("block_type", values));
        }
        for (field_name, field) in [
            ("parent_id", &clause.parent_id),
            ("root_id", &clause.root_id),
            ("workspace_id", &clause.workspace_id),
        ] {
            if let Some(field) = field {
                let values = match field {
                    FieldMatch::Equals(v) => vec![v.clone()],
                    FieldMatch::In(set) => set.clone(),
                };
                conditions.push(self.field_match(field_name, values));
            }
        }
        if !include_trashed {
            conditions.push("in_trash = false".to_string());
        }
        conditions
    }

    fn field_match(&mut self, field: &str, mut values: Vec<String>) -> String {
        if values.len() == 1 {
            let param = self.bind(Value::String(values.remove(0)));
            format!("{} = {}", field, param)
        } else {
            let param = self.bind(Value::from(values));
            format!("{} INSIDE {}", field, param)
        }
    }

    fn expression(&mut self, expression: &FilterExpression) -> String {
        match expression {
            FilterExpression::Property(leaf) => self.leaf(leaf),
            FilterExpression::And(operands) => self.join(operands, " AND "),
            FilterExpression::Or(operands) => self.join(operands, " OR "),
            FilterExpression::Not(operand) => format!("!({})", self.expression(operand)),
        }
    }

    fn join(&mut self, operands: &[FilterExpression], separator: &str) -> String {
        let parts: Vec<String> = operands.iter().map(|op| self.expression(op)).collect();
        format!("({})", parts.join(separator))
    }

    fn leaf(&mut self, leaf: &PropertyFilter) -> String {
        let field = field_ref(&leaf.path);
        match leaf.operator {
            FilterOperator::Equals | FilterOperator::In => {
                let options: Vec<String> = leaf
                    .scalars()
                    .iter()
                    .map(|s| self.scalar_equals(&field, s))
                    .collect();
                format!("({})", options.join(" OR "))
            }
            FilterOperator::NotEquals => {
                let options: Vec<String> = leaf
                    .scalars()
                    .iter()
                    .map(|s| self.scalar_equals(&field, s))
                    .collect();
                format!(
                    "(!type::is::none({f}) AND !type::is::null({f}) AND !({o}))",
                    f = field,
                    o = options.join(" OR ")
                )
            }
            FilterOperator::Contains => {
                let options: Vec<String> = leaf
                    .scalars()
                    .iter()
                    .map(|s| {
                        let param = self.bind(s.to_value());
                        format!(
                            "((type::is::string({f}) OR type::is::array({f})) AND {f} CONTAINS {p})",
                            f = field,
                            p = param
                        )
                    })
                    .collect();
                format!("({})", options.join(" OR "))
            }
        }
    }

    fn scalar_equals(&mut self, field: &str, scalar: &Scalar) -> String {
        let check = match scalar {
            Scalar::String(_) => "type::is::string",
            Scalar::Number(_) => "type::is::number",
            Scalar::Bool(_) => "type::is::bool",
        };
        let param = self.bind(scalar.to_value());
        format!("({}({f}) AND {f} = {p})", check, f = field, p = param)
    }

    fn related(&mut self, link_field: &str, related: &RelatedFilter, include_trashed: bool) -> String {
        let mut conditions = self.structural(&related.where_clause, include_trashed);
        if let Some(filter) = &related.filter {
            conditions.push(self.expression(filter));
        }
        let where_sql = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        format!(
            "{} INSIDE (SELECT VALUE uuid FROM blocks{})",
            link_field, where_sql
        )
    }
}

/// Field reference for a path, e.g. ``content.`data`.`rows`[0]``
pub fn field_ref(path: &PropertyPath) -> String {
    let mut out = String::from(path.root().column());
    for segment in path.segments() {
        match segment {
            PathSegment::Key(key) => {
                out.push_str(".`");
                out.push_str(key);
                out.push('`');
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
pub fn select_query(query: &BlockQuery) -> SurrealQuery {
    let mut builder = SurrealBuilder::default();
    let mut conditions = builder.structural(&query.where_clause, query.include_trashed);
    if let Some(filter) = &query.filter {
        conditions.push(builder.expression(filter));
    }
    if let Some(parent) = &query.parent {
        conditions.push(builder.related("parent_id", parent, query.include_trashed));
    }
    if let Some(root) = &query.root {
        conditions.push(builder.related("root_id", root, query.include_trashed));
    }

    let mut sql = String::from("SELECT * FROM blocks");
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY uuid ASC");
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    sql.push(';');
    SurrealQuery {
        sql,
        bindings: builder.bindings,
    }
}

/// One probe per `contains` leaf, yielding a row if the leaf targets a number
pub fn numeric_contains_probes(query: &BlockQuery) -> Vec<(String, SurrealQuery)> {
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
            let mut builder = SurrealBuilder::default();
            let mut conditions = builder.structural(clause, query.include_trashed);
            conditions.push(format!("type::is::number({})", field_ref(&leaf.path)));
            probes.push((
                leaf.path.to_string(),
                SurrealQuery {
                    sql: format!(
                        "SELECT VALUE uuid FROM blocks WHERE {} LIMIT 1;",
                        conditions.join(" AND ")
                    ),
                    bindings: builder.bindings,
                },
            ));
        }
    }
    probes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockType, PropertyFilter};
    use serde_json::json;

    #[test]
    fn test_field_ref_quotes_segments() {
        let path = PropertyPath::parse("content.data.rows.0").unwrap();
        assert_eq!(field_ref(&path), "content.`data`.`rows`[0]");
        let path = PropertyPath::parse("groups").unwrap();
        assert_eq!(field_ref(&path), "properties.`groups`");
    }

    #[test]
    fn test_select_uses_named_bindings() {
        let query = BlockQuery::new(WhereClause::new().block_types([BlockType::Paragraph, BlockType::Heading]))
            .with_filter(PropertyFilter::equals("level", json!(2)).unwrap());
        let built = select_query(&query);
        assert!(built.sql.starts_with("SELECT * FROM blocks WHERE block_type INSIDE $p0"));
        assert!(built.sql.contains("type::is::number(properties.`level`) AND properties.`level` = $p1"));
        assert_eq!(built.bindings["p1"], json!(2));
    }

    #[test]
    fn test_include_trashed_drops_visibility_condition() {
        let query = BlockQuery::default().include_trashed(true);
        assert_eq!(select_query(&query).sql, "SELECT * FROM blocks ORDER BY uuid ASC;");
    }
}

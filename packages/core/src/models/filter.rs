//! Query Value Types
//!
//! Structural clauses ([`WhereClause`]), semantic clause trees
//! ([`FilterExpression`]) and the [`BlockQuery`] that combines them.
//!
//! These types only describe a query. Evaluation lives in
//! [`crate::operations::FilterEngine`]; each storage backend translates the same
//! tree into its native JSON operators.
//!
//! # Path syntax
//!
//! Paths are dot separated. The first segment may name one of the JSON columns
//! (`properties`, `content`, `metadata`); a path without one of those roots is
//! resolved under `properties`. Segments are `[A-Za-z0-9_]+`, and an all-digit
//! segment indexes into an array:
//!
//! - `groups` is the same as `properties.groups`
//! - `content.data.rows.0.amount`
//! - `metadata.source`
//!
//! ```rust
//! use blockstore_core::models::{PathRoot, PropertyPath};
//!
//! let path = PropertyPath::parse("content.data.rows.0").unwrap();
//! assert_eq!(path.root(), PathRoot::Content);
//! assert_eq!(path.segments().len(), 3);
//!
//! assert!(PropertyPath::parse("content.body").is_err());
//! assert!(PropertyPath::parse("title; DROP").is_err());
//! ```

use crate::models::block::CONTENT_KEYS;
use crate::models::properties::{json_kind, GROUPS_KEY};
use crate::models::BlockType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

const SEGMENT_PATTERN: &str = r"^[A-Za-z0-9_]+$";

/// Errors for malformed filters and operator/type mismatches
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Filter path cannot be empty")]
    EmptyPath,

    #[error("Invalid segment '{segment}' in filter path '{path}'")]
    InvalidPathSegment { path: String, segment: String },

    #[error("Unknown field '{field}' in filter path '{path}'")]
    UnknownField { path: String, field: String },

    #[error("Invalid value for '{operator}': {reason}")]
    InvalidValue {
        operator: FilterOperator,
        reason: String,
    },

    #[error("'{operator}' requires {expected} operands, got {found}")]
    InvalidOperands {
        operator: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("Operator '{operator}' is not supported on {found} values at '{path}'")]
    UnsupportedOperator {
        operator: FilterOperator,
        path: String,
        found: String,
    },
}

/// Comparison operator for semantic filter leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Type-aware equality
    Equals,
    /// Present, and not equal (a different type counts as different)
    NotEquals,
    /// Equal to any member of a finite, non-empty set
    In,
    /// Substring on strings, membership on arrays
    Contains,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::In => "in",
            Self::Contains => "contains",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality or set-membership on one structural field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMatch<T> {
    Equals(T),
    In(Vec<T>),
}

impl<T: PartialEq> FieldMatch<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::Equals(expected) => expected == value,
            Self::In(set) => set.contains(value),
        }
    }

    /// All candidate values, in declaration order
    pub fn values(&self) -> Vec<&T> {
        match self {
            Self::Equals(v) => vec![v],
            Self::In(set) => set.iter().collect(),
        }
    }
}

/// Structural clause over the block's columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub block_type: Option<FieldMatch<BlockType>>,
    pub parent_id: Option<FieldMatch<String>>,
    pub root_id: Option<FieldMatch<String>>,
    pub workspace_id: Option<FieldMatch<String>>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_type(mut self, block_type: BlockType) -> Self {
        self.block_type = Some(FieldMatch::Equals(block_type));
        self
    }

    pub fn block_types(mut self, block_types: impl IntoIterator<Item = BlockType>) -> Self {
        self.block_type = Some(FieldMatch::In(block_types.into_iter().collect()));
        self
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(FieldMatch::Equals(parent_id.into()));
        self
    }

    pub fn parents<I, S>(mut self, parent_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_id = Some(FieldMatch::In(
            parent_ids.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn root(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = Some(FieldMatch::Equals(root_id.into()));
        self
    }

    pub fn roots<I, S>(mut self, root_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.root_id = Some(FieldMatch::In(root_ids.into_iter().map(Into::into).collect()));
        self
    }

    pub fn workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(FieldMatch::Equals(workspace_id.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.block_type.is_none()
            && self.parent_id.is_none()
            && self.root_id.is_none()
            && self.workspace_id.is_none()
    }

    /// An empty `In` set can never match; it is treated as a caller error
    pub fn validate(&self) -> Result<(), FilterError> {
        let empty_set = matches!(&self.block_type, Some(FieldMatch::In(s)) if s.is_empty())
            || [&self.parent_id, &self.root_id, &self.workspace_id]
                .iter()
                .any(|m| matches!(m, Some(FieldMatch::In(s)) if s.is_empty()));
        if empty_set {
            return Err(FilterError::InvalidValue {
                operator: FilterOperator::In,
                reason: "structural set-membership requires at least one value".to_string(),
            });
        }
        Ok(())
    }
}

/// JSON column a path starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathRoot {
    Properties,
    Content,
    Metadata,
}

impl PathRoot {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Properties => "properties",
            Self::Content => "content",
            Self::Metadata => "metadata",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parsed, validated dot path into one of the JSON columns
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    raw: String,
    root: PathRoot,
    segments: Vec<PathSegment>,
}

impl PropertyPath {
    pub fn parse(path: &str) -> Result<Self, FilterError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(FilterError::EmptyPath);
        }

        static SEGMENT_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
        let segment_regex = SEGMENT_REGEX.get_or_init(|| Regex::new(SEGMENT_PATTERN).ok());

        let parts: Vec<&str> = trimmed.split('.').collect();
        for part in &parts {
            let valid = segment_regex.as_ref().is_some_and(|re| re.is_match(part));
            if !valid {
                return Err(FilterError::InvalidPathSegment {
                    path: trimmed.to_string(),
                    segment: part.to_string(),
                });
            }
        }

        let (root, rest) = match parts[0] {
            "properties" => (PathRoot::Properties, &parts[1..]),
            "content" => (PathRoot::Content, &parts[1..]),
            "metadata" => (PathRoot::Metadata, &parts[1..]),
            _ => (PathRoot::Properties, &parts[..]),
        };

        if rest.is_empty() {
            return Err(FilterError::UnknownField {
                path: trimmed.to_string(),
                field: parts[0].to_string(),
            });
        }

        if root == PathRoot::Content && !CONTENT_KEYS.contains(&rest[0]) {
            return Err(FilterError::UnknownField {
                path: trimmed.to_string(),
                field: format!("content.{}", rest[0]),
            });
        }

        let segments = rest
            .iter()
            .map(|part| {
                if part.chars().all(|c| c.is_ascii_digit()) {
                    part.parse::<usize>()
                        .map(PathSegment::Index)
                        .map_err(|_| FilterError::InvalidPathSegment {
                            path: trimmed.to_string(),
                            segment: part.to_string(),
                        })
                } else {
                    Ok(PathSegment::Key(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: trimmed.to_string(),
            root,
            segments,
        })
    }

    pub fn root(&self) -> PathRoot {
        self.root
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Walk the path inside an already-selected column value
    pub fn lookup<'a>(&self, column: &'a Value) -> Option<&'a Value> {
        let mut current = column;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
                (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
                _ => return None,
            };
        }
        match current {
            Value::Null => None,
            value => Some(value),
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Literal a filter leaf compares against
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(Number),
    Bool(bool),
}

impl Scalar {
    fn from_value(operator: FilterOperator, value: Value) -> Result<Self, FilterError> {
        match value {
            Value::String(s) => Ok(Self::String(s)),
            Value::Number(n) => Ok(Self::Number(n)),
            Value::Bool(b) => Ok(Self::Bool(b)),
            other => Err(FilterError::InvalidValue {
                operator,
                reason: format!("expected a string, number or boolean, got {}", json_kind(&other)),
            }),
        }
    }

    /// Type-aware equality against a JSON value. Numbers compare numerically.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String(expected), Value::String(actual)) => expected == actual,
            (Self::Bool(expected), Value::Bool(actual)) => expected == actual,
            (Self::Number(expected), Value::Number(actual)) => numbers_equal(expected, actual),
            _ => false,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Bool(b) => Value::Bool(*b),
        }
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Right-hand operand of a leaf
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(Scalar),
    Set(Vec<Scalar>),
}

/// One semantic leaf: `path operator value`
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub path: PropertyPath,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl PropertyFilter {
    /// Build a leaf, validating the path and the operand shape
    ///
    /// `in` needs a non-empty array of scalars; every other operator needs a
    /// single string, number or boolean. `null` is never a valid operand.
    pub fn new(path: &str, operator: FilterOperator, value: Value) -> Result<Self, FilterError> {
        let path = PropertyPath::parse(path)?;
        let value = match operator {
            FilterOperator::In => match value {
                Value::Array(items) if items.is_empty() => {
                    return Err(FilterError::InvalidValue {
                        operator,
                        reason: "requires at least one value".to_string(),
                    })
                }
                Value::Array(items) => FilterValue::Set(
                    items
                        .into_iter()
                        .map(|item| Scalar::from_value(operator, item))
                        .collect::<Result<_, _>>()?,
                ),
                other => {
                    return Err(FilterError::InvalidValue {
                        operator,
                        reason: format!("expected an array of values, got {}", json_kind(&other)),
                    })
                }
            },
            _ => FilterValue::Scalar(Scalar::from_value(operator, value)?),
        };
        Ok(Self {
            path,
            operator,
            value,
        })
    }

    pub fn equals(path: &str, value: Value) -> Result<Self, FilterError> {
        Self::new(path, FilterOperator::Equals, value)
    }

    pub fn not_equals(path: &str, value: Value) -> Result<Self, FilterError> {
        Self::new(path, FilterOperator::NotEquals, value)
    }

    pub fn is_in(path: &str, values: Vec<Value>) -> Result<Self, FilterError> {
        Self::new(path, FilterOperator::In, Value::Array(values))
    }

    pub fn contains(path: &str, value: Value) -> Result<Self, FilterError> {
        Self::new(path, FilterOperator::Contains, value)
    }

    /// Scalars of this leaf, one for most operators, several for `in`
    pub fn scalars(&self) -> &[Scalar] {
        match &self.value {
            FilterValue::Scalar(s) => std::slice::from_ref(s),
            FilterValue::Set(set) => set,
        }
    }
}

/// Boolean composition of [`PropertyFilter`] leaves
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Property(PropertyFilter),
    And(Vec<FilterExpression>),
    Or(Vec<FilterExpression>),
    Not(Box<FilterExpression>),
}

impl FilterExpression {
    /// `and` of two or more operands
    pub fn and(operands: Vec<FilterExpression>) -> Result<Self, FilterError> {
        check_arity("and", &operands)?;
        Ok(Self::And(operands))
    }

    /// `or` of two or more operands
    pub fn or(operands: Vec<FilterExpression>) -> Result<Self, FilterError> {
        check_arity("or", &operands)?;
        Ok(Self::Or(operands))
    }

    pub fn negate(operand: FilterExpression) -> Self {
        Self::Not(Box::new(operand))
    }

    /// `properties.groups contains <group>`
    pub fn in_group(group: &str) -> Self {
        Self::Property(PropertyFilter {
            path: PropertyPath {
                raw: format!("properties.{}", GROUPS_KEY),
                root: PathRoot::Properties,
                segments: vec![PathSegment::Key(GROUPS_KEY.to_string())],
            },
            operator: FilterOperator::Contains,
            value: FilterValue::Scalar(Scalar::String(group.to_string())),
        })
    }

    /// Re-check operand counts for trees built from the enum variants directly
    pub fn validate(&self) -> Result<(), FilterError> {
        match self {
            Self::Property(_) => Ok(()),
            Self::And(operands) => {
                check_arity("and", operands)?;
                operands.iter().try_for_each(Self::validate)
            }
            Self::Or(operands) => {
                check_arity("or", operands)?;
                operands.iter().try_for_each(Self::validate)
            }
            Self::Not(operand) => operand.validate(),
        }
    }

    /// Every leaf in the tree, in depth-first order
    pub fn leaves(&self) -> Vec<&PropertyFilter> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a PropertyFilter>) {
        match self {
            Self::Property(leaf) => out.push(leaf),
            Self::And(operands) | Self::Or(operands) => {
                operands.iter().for_each(|op| op.collect_leaves(out))
            }
            Self::Not(operand) => operand.collect_leaves(out),
        }
    }
}

impl From<PropertyFilter> for FilterExpression {
    fn from(leaf: PropertyFilter) -> Self {
        Self::Property(leaf)
    }
}

fn check_arity(operator: &'static str, operands: &[FilterExpression]) -> Result<(), FilterError> {
    if operands.len() < 2 {
        return Err(FilterError::InvalidOperands {
            operator,
            expected: "two or more",
            found: operands.len(),
        });
    }
    Ok(())
}

/// Clause applied to a block's parent or root instead of the block itself
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelatedFilter {
    pub where_clause: WhereClause,
    pub filter: Option<FilterExpression>,
}

impl RelatedFilter {
    pub fn new(where_clause: WhereClause) -> Self {
        Self {
            where_clause,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<FilterExpression>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn validate(&self) -> Result<(), FilterError> {
        self.where_clause.validate()?;
        if let Some(filter) = &self.filter {
            filter.validate()?;
        }
        Ok(())
    }
}

/// Full query: structural + semantic + related clauses, visibility and limit
///
/// # Examples
///
/// ```rust
/// use blockstore_core::models::{BlockQuery, BlockType, FilterExpression, WhereClause};
///
/// let query = BlockQuery::new(WhereClause::new().block_type(BlockType::Paragraph).root("doc-1"))
///     .with_filter(FilterExpression::in_group("page-2"))
///     .with_limit(50);
/// assert!(query.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockQuery {
    pub where_clause: WhereClause,
    pub filter: Option<FilterExpression>,
    pub parent: Option<RelatedFilter>,
    pub root: Option<RelatedFilter>,
    pub limit: Option<usize>,
    pub include_trashed: bool,
}

impl BlockQuery {
    pub fn new(where_clause: WhereClause) -> Self {
        Self {
            where_clause,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<FilterExpression>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_parent(mut self, parent: RelatedFilter) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_root(mut self, root: RelatedFilter) -> Self {
        self.root = Some(root);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn include_trashed(mut self, include_trashed: bool) -> Self {
        self.include_trashed = include_trashed;
        self
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.where_clause.validate()?;
        if let Some(filter) = &self.filter {
            filter.validate()?;
        }
        if let Some(parent) = &self.parent {
            parent.validate()?;
        }
        if let Some(root) = &self.root {
            root.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_path_defaults_to_properties() {
        let path = PropertyPath::parse("groups").unwrap();
        assert_eq!(path.root(), PathRoot::Properties);
        assert_eq!(path.segments(), &[PathSegment::Key("groups".to_string())]);
    }

    #[test]
    fn test_numeric_segments_index_arrays() {
        let path = PropertyPath::parse("metadata.tags.1").unwrap();
        assert_eq!(path.root(), PathRoot::Metadata);
        assert_eq!(
            path.segments(),
            &[PathSegment::Key("tags".to_string()), PathSegment::Index(1)]
        );
        let doc = json!({"tags": ["a", "b"]});
        assert_eq!(path.lookup(&doc), Some(&json!("b")));
    }

    #[test]
    fn test_invalid_paths() {
        assert_eq!(PropertyPath::parse("  "), Err(FilterError::EmptyPath));
        assert!(matches!(
            PropertyPath::parse("a..b"),
            Err(FilterError::InvalidPathSegment { .. })
        ));
        assert!(matches!(
            PropertyPath::parse("a.b-c"),
            Err(FilterError::InvalidPathSegment { .. })
        ));
        assert!(matches!(
            PropertyPath::parse("metadata"),
            Err(FilterError::UnknownField { .. })
        ));
        assert!(matches!(
            PropertyPath::parse("content.html"),
            Err(FilterError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_segment_pattern_compiles_and_accepts_identifiers() {
        assert!(Regex::new(SEGMENT_PATTERN).is_ok());
        let path = PropertyPath::parse("content.data.Row_2.10").unwrap();
        assert_eq!(path.segments().len(), 3);
        assert!(matches!(
            PropertyPath::parse("rank.é"),
            Err(FilterError::InvalidPathSegment { .. })
        ));
    }

    #[test]
    fn test_lookup_through_non_object_is_missing() {
        let path = PropertyPath::parse("data.x").unwrap();
        assert_eq!(path.lookup(&json!({"data": "text"})), None);
        assert_eq!(path.lookup(&json!({"data": {"x": null}})), None);
        assert_eq!(path.lookup(&json!({"data": {"x": 0}})), Some(&json!(0)));
    }

    #[test]
    fn test_scalar_matching_is_type_aware() {
        let one = Scalar::Number(Number::from(1));
        assert!(one.matches(&json!(1)));
        assert!(one.matches(&json!(1.0)));
        assert!(!one.matches(&json!("1")));
        assert!(!Scalar::Bool(true).matches(&json!(1)));
        assert!(Scalar::String("a".into()).matches(&json!("a")));
    }

    #[test]
    fn test_operand_validation() {
        assert!(PropertyFilter::new("status", FilterOperator::In, json!([])).is_err());
        assert!(PropertyFilter::new("status", FilterOperator::In, json!("open")).is_err());
        assert!(PropertyFilter::new("status", FilterOperator::Equals, json!(null)).is_err());
        assert!(PropertyFilter::new("status", FilterOperator::Equals, json!({"a": 1})).is_err());
        let leaf = PropertyFilter::is_in("status", vec![json!("open"), json!(3)]).unwrap();
        assert_eq!(leaf.scalars().len(), 2);
    }

    #[test]
    fn test_boolean_arity() {
        let leaf: FilterExpression = PropertyFilter::equals("a", json!(1)).unwrap().into();
        assert!(FilterExpression::and(vec![leaf.clone()]).is_err());
        assert!(FilterExpression::or(vec![]).is_err());
        assert!(FilterExpression::and(vec![leaf.clone(), leaf.clone()]).is_ok());
        assert!(FilterExpression::And(vec![leaf.clone()]).validate().is_err());

        let tree = FilterExpression::negate(
            FilterExpression::or(vec![leaf.clone(), FilterExpression::in_group("g")]).unwrap(),
        );
        assert_eq!(tree.leaves().len(), 2);
    }

    #[test]
    fn test_empty_structural_set_rejected() {
        let clause = WhereClause::new().parents(Vec::<String>::new());
        assert!(clause.validate().is_err());
        assert!(BlockQuery::new(clause).validate().is_err());
    }
}

//! In-memory Filter Evaluation
//!
//! Reference semantics for [`BlockQuery`]. The storage backends translate the
//! same trees into SQL or SurrealQL and are expected to return exactly the ids
//! this engine returns for the same data.
//!
//! Rules:
//!
//! - a missing or `null` value matches nothing, for every operator
//! - `not_equals` requires the value to be present
//! - `not` is plain boolean negation of its operand
//! - numbers compare numerically, `1` equals `1.0`
//! - `contains` is substring on strings and membership on arrays; on a number
//!   it is an error, reported before any row is returned

use crate::models::{
    Block, BlockQuery, FilterError, FilterExpression, FilterOperator, PathRoot, PropertyFilter,
    PropertyPath, RelatedFilter, Scalar, WhereClause,
};
use crate::operations::BlockLookup;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEngine;

impl FilterEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run `query` over `blocks`, returning matches ordered by id
    ///
    /// `blocks` is the whole universe: related parent/root clauses are
    /// resolved against it as well.
    pub fn filter<'a, I>(&self, query: &BlockQuery, blocks: I) -> Result<Vec<&'a Block>, FilterError>
    where
        I: IntoIterator<Item = &'a Block>,
    {
        query.validate()?;
        let universe: HashMap<&str, &Block> = blocks.into_iter().map(|b| (b.id.as_str(), b)).collect();

        self.check_contains_targets(query, universe.values().copied())?;

        let mut matches: Vec<&Block> = universe
            .values()
            .copied()
            .filter(|block| self.matches_query(query, block, &universe))
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    /// Reject `contains` whose target is numeric on any block in structural scope
    pub fn check_contains_targets<'a>(
        &self,
        query: &BlockQuery,
        blocks: impl Iterator<Item = &'a Block> + Clone,
    ) -> Result<(), FilterError> {
        let scopes = [
            Some((&query.where_clause, query.filter.as_ref())),
            query.parent.as_ref().map(related_scope),
            query.root.as_ref().map(related_scope),
        ];
        for (where_clause, filter) in scopes.into_iter().flatten() {
            let Some(filter) = filter else { continue };
            for leaf in filter.leaves() {
                if leaf.operator != FilterOperator::Contains {
                    continue;
                }
                let numeric = blocks.clone().any(|block| {
                    self.visible(query, block)
                        && self.matches_where(where_clause, block)
                        && matches!(resolve_path(block, &leaf.path), Some(Value::Number(_)))
                });
                if numeric {
                    return Err(FilterError::UnsupportedOperator {
                        operator: FilterOperator::Contains,
                        path: leaf.path.to_string(),
                        found: "number".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn visible(&self, query: &BlockQuery, block: &Block) -> bool {
        query.include_trashed || !block.in_trash
    }

    fn matches_query(&self, query: &BlockQuery, block: &Block, lookup: &dyn BlockLookup) -> bool {
        if !self.visible(query, block) || !self.matches_where(&query.where_clause, block) {
            return false;
        }
        if let Some(filter) = &query.filter {
            if !self.evaluate(filter, block) {
                return false;
            }
        }
        if let Some(related) = &query.parent {
            let parent = block.parent_id.as_deref().and_then(|id| lookup.lookup(id));
            if !self.matches_related(query, related, parent) {
                return false;
            }
        }
        if let Some(related) = &query.root {
            if !self.matches_related(query, related, lookup.lookup(&block.root_id)) {
                return false;
            }
        }
        true
    }

    fn matches_related(&self, query: &BlockQuery, related: &RelatedFilter, target: Option<&Block>) -> bool {
        let Some(target) = target else { return false };
        self.visible(query, target)
            && self.matches_where(&related.where_clause, target)
            && related
                .filter
                .as_ref()
                .map_or(true, |filter| self.evaluate(filter, target))
    }

    /// Structural clause check against the block's columns
    pub fn matches_where(&self, clause: &WhereClause, block: &Block) -> bool {
        if let Some(types) = &clause.block_type {
            if !types.matches(&block.block_type()) {
                return false;
            }
        }
        if let Some(parents) = &clause.parent_id {
            match &block.parent_id {
                Some(parent_id) if parents.matches(parent_id) => {}
                _ => return false,
            }
        }
        if let Some(roots) = &clause.root_id {
            if !roots.matches(&block.root_id) {
                return false;
            }
        }
        if let Some(workspaces) = &clause.workspace_id {
            if !workspaces.matches(&block.workspace_id) {
                return false;
            }
        }
        true
    }

    /// Two-valued evaluation of a semantic clause tree
    pub fn evaluate(&self, expression: &FilterExpression, block: &Block) -> bool {
        match expression {
            FilterExpression::Property(leaf) => self.evaluate_leaf(leaf, block),
            FilterExpression::And(operands) => operands.iter().all(|op| self.evaluate(op, block)),
            FilterExpression::Or(operands) => operands.iter().any(|op| self.evaluate(op, block)),
            FilterExpression::Not(operand) => !self.evaluate(operand, block),
        }
    }

    fn evaluate_leaf(&self, leaf: &PropertyFilter, block: &Block) -> bool {
        let Some(actual) = resolve_path(block, &leaf.path) else {
            return false;
        };
        let scalars = leaf.scalars();
        match leaf.operator {
            FilterOperator::Equals | FilterOperator::In => scalars.iter().any(|s| s.matches(&actual)),
            FilterOperator::NotEquals => !scalars.iter().any(|s| s.matches(&actual)),
            FilterOperator::Contains => scalars.iter().any(|s| contains(&actual, s)),
        }
    }
}

fn related_scope(related: &RelatedFilter) -> (&WhereClause, Option<&FilterExpression>) {
    (&related.where_clause, related.filter.as_ref())
}

fn contains(haystack: &Value, needle: &Scalar) -> bool {
    match (haystack, needle) {
        (Value::String(text), Scalar::String(fragment)) => text.contains(fragment.as_str()),
        (Value::Array(items), needle) => items.iter().any(|item| needle.matches(item)),
        _ => false,
    }
}

/// Value at `path` on `block`, `None` when missing or `null`
pub fn resolve_path(block: &Block, path: &PropertyPath) -> Option<Value> {
    let column = match path.root() {
        PathRoot::Properties => block.properties().to_value(),
        PathRoot::Content => block.content.as_ref()?.to_value(),
        PathRoot::Metadata => Value::Object(block.metadata.clone()),
    };
    path.lookup(&column).cloned()
}

//! Filter expression grammar.
//!
//! ```text
//! filters := leaf | group | [filters, ...]        (a bare list is an `all` group)
//! leaf    := [path, operator, value, ...]
//! group   := {"filter_operator": "all" | "any", "filters": [filters, ...]}
//! ```

use serde_json::Value;

use super::ops::{FilterOperator, GroupOperator};
use crate::error::{QueryError, QueryResult};

/// A parsed filter tree. Values stay untyped until the compiler knows the
/// field they apply to.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Leaf {
        path: String,
        operator: FilterOperator,
        values: Vec<Value>,
    },
    Group {
        op: GroupOperator,
        filters: Vec<FilterExpr>,
    },
}

impl FilterExpr {
    pub fn leaf(path: &str, operator: FilterOperator, values: Vec<Value>) -> Self {
        FilterExpr::Leaf {
            path: path.to_string(),
            operator,
            values,
        }
    }

    pub fn all(filters: Vec<FilterExpr>) -> Self {
        FilterExpr::Group {
            op: GroupOperator::All,
            filters,
        }
    }

    pub fn any(filters: Vec<FilterExpr>) -> Self {
        FilterExpr::Group {
            op: GroupOperator::Any,
            filters,
        }
    }

    /// Matches everything.
    pub fn empty() -> Self {
        Self::all(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FilterExpr::Group { filters, .. } if filters.is_empty())
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            FilterExpr::Leaf { .. } => 1,
            FilterExpr::Group { filters, .. } => filters.iter().map(|f| f.leaf_count()).sum(),
        }
    }

    /// Parse the wire form of a filter tree. `null` is the empty filter.
    pub fn from_json(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Null => Ok(Self::empty()),
            Value::Object(map) => {
                let op = match map.get("filter_operator") {
                    None | Some(Value::Null) => GroupOperator::All,
                    Some(Value::String(s)) => s.parse().map_err(QueryError::InvalidFilter)?,
                    Some(other) => {
                        return Err(QueryError::InvalidFilter(format!(
                            "filter_operator must be a string, got {other}"
                        )))
                    }
                };
                let filters = match map.get("filters") {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(Self::from_json)
                        .collect::<QueryResult<Vec<_>>>()?,
                    None | Some(Value::Null) => Vec::new(),
                    Some(other) => {
                        return Err(QueryError::InvalidFilter(format!(
                            "group filters must be a list, got {other}"
                        )))
                    }
                };
                Ok(FilterExpr::Group { op, filters })
            }
            Value::Array(items) if items.iter().all(|i| i.is_array() || i.is_object()) => {
                let filters = items
                    .iter()
                    .map(Self::from_json)
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(Self::all(filters))
            }
            Value::Array(items) => Self::parse_leaf(items),
            other => Err(QueryError::InvalidFilter(format!(
                "expected a filter list or group, got {other}"
            ))),
        }
    }

    fn parse_leaf(items: &[Value]) -> QueryResult<Self> {
        let (Some(Value::String(path)), Some(Value::String(operator))) = (items.first(), items.get(1))
        else {
            return Err(QueryError::InvalidFilter(format!(
                "a filter must start with a field path and an operator, got {}",
                Value::Array(items.to_vec())
            )));
        };
        let operator = operator.parse().map_err(QueryError::InvalidFilter)?;
        Ok(FilterExpr::Leaf {
            path: path.clone(),
            operator,
            values: items[2..].to_vec(),
        })
    }
}

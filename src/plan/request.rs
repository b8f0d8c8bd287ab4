//! Find request as received at the query boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::filter::{FilterExpr, GroupOperator};

/// Sort direction of an order term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderTerm {
    pub field_name: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderTerm {
    pub fn asc(field_name: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field_name: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// `find(entity_type, filters, fields, order, ...)`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FindRequest {
    pub entity_type: String,
    #[serde(default)]
    pub filters: Value,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub order: Vec<OrderTerm>,
    /// Wraps `filters` in a group of this operator.
    #[serde(default)]
    pub filter_operator: Option<String>,
    /// 0 means no limit.
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub retired_only: bool,
    #[serde(default = "default_true")]
    pub include_archived_projects: bool,
}

fn default_true() -> bool {
    true
}

impl FindRequest {
    pub fn new(entity_type: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            filters: Value::Array(Vec::new()),
            fields: Vec::new(),
            order: Vec::new(),
            filter_operator: None,
            limit: 0,
            page: 0,
            retired_only: false,
            include_archived_projects: true,
        }
    }

    pub fn filters(mut self, filters: Value) -> Self {
        self.filters = filters;
        self
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn order(mut self, order: Vec<OrderTerm>) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn retired_only(mut self, retired_only: bool) -> Self {
        self.retired_only = retired_only;
        self
    }

    /// The filter tree, honoring a top-level `filter_operator`.
    pub fn filter_expr(&self) -> QueryResult<FilterExpr> {
        let expr = FilterExpr::from_json(&self.filters)?;
        let Some(op) = &self.filter_operator else {
            return Ok(expr);
        };
        let op: GroupOperator = op.parse().map_err(QueryError::InvalidFilter)?;
        Ok(match expr {
            FilterExpr::Group { filters, .. } if self.filters.is_array() => {
                FilterExpr::Group { op, filters }
            }
            other => FilterExpr::Group {
                op,
                filters: vec![other],
            },
        })
    }

    /// Rows skipped before the first returned row.
    pub fn offset(&self) -> usize {
        self.limit.saturating_mul(self.page)
    }
}

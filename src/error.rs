//! Error types for query compilation.
//!
//! Resolution-time errors are fatal to the single path, filter, or query
//! being compiled. Relationship-inference problems are not errors; they are
//! reported as [`crate::resolver::Diagnostic`] values alongside the schema.

use crate::filter::FilterOperator;
use crate::schema::FieldType;

/// Result type for compile-time operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while resolving field paths, compiling filters, or
/// assembling a query plan.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// Referenced an entity type that doesn't exist in the schema.
    #[error("Unknown entity: '{0}'")]
    UnknownEntity(String),

    /// Referenced a field that doesn't exist on an entity.
    #[error("Unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    /// A path segment's field cannot be traversed to the requested entity.
    #[error("Invalid relation '{entity}.{field}': {reason}")]
    InvalidRelation {
        entity: String,
        field: String,
        reason: String,
    },

    /// The operator is not in the field type's allow-list.
    #[error(
        "Operator '{operator}' is not supported for {field_type} field '{entity}.{field}' (valid: {})",
        format_operators(.valid)
    )]
    UnsupportedOperator {
        entity: String,
        field: String,
        field_type: FieldType,
        operator: String,
        valid: Vec<FilterOperator>,
    },

    /// The dot-path itself is malformed (empty token, wrong token count, too deep).
    #[error("Invalid field path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The filter expression does not follow the filter grammar.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// A filter value has the wrong shape for the field type or operator.
    #[error("Invalid value for '{entity}.{field}' with operator '{operator}': {reason}")]
    InvalidValue {
        entity: String,
        field: String,
        operator: String,
        reason: String,
    },
}

impl QueryError {
    pub(crate) fn unknown_field(entity: &str, field: &str) -> Self {
        QueryError::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub(crate) fn invalid_relation(entity: &str, field: &str, reason: impl Into<String>) -> Self {
        QueryError::InvalidRelation {
            entity: entity.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        QueryError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

fn format_operators(ops: &[FilterOperator]) -> String {
    if ops.is_empty() {
        return "none".to_string();
    }
    ops.iter()
        .map(|op| op.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

//! Storage backend seam.
//!
//! The compiler stops at a [`QueryPlan`]; a backend executes it and returns
//! one [`Record`] per matching root row, keyed by the requested paths plus
//! `id` and `type`. [`MemoryBackend`] is a reference implementation over
//! rows held in memory.

mod memory;

pub use memory::MemoryBackend;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::plan::QueryPlan;

/// One returned row: `{"id": 1, "type": "Shot", "<path>": value, ...}`.
pub type Record = Map<String, Value>;

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// A row was not a JSON object.
    #[error("rows of '{entity}' must be JSON objects, got {found}")]
    InvalidRow { entity: String, found: String },

    /// A column reference names an alias no join or subquery binds.
    #[error("alias '{0}' is not bound")]
    UnboundAlias(String),

    /// A stored value cannot take part in a comparison.
    #[error("column '{column}' holds a value that cannot be compared: {found}")]
    Incomparable { column: String, found: String },
}

/// Executes query plans.
pub trait StorageBackend {
    fn find(&self, plan: &QueryPlan) -> BackendResult<Vec<Record>>;
}

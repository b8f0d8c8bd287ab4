//! # gridquery
//!
//! Query core of a production-tracking service emulator: infers the entity
//! relationship graph from incomplete schema metadata, then compiles dot-path
//! filter queries against it into backend-neutral query plans.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Schema sources (schema_read, reverse hints,       │
//! │             display-name history)                        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [resolver]
//! ┌─────────────────────────────────────────────────────────┐
//! │   conventions → defaults → hints → display names →       │
//! │   connections → validation         (+ diagnostics)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ frozen, shared read-only
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Schema                             │
//! └─────────────────────────────────────────────────────────┘
//!            │                              │
//!            ▼ [path]                       ▼ [filter]
//! ┌──────────────────────┐      ┌──────────────────────────┐
//! │  FieldPathResolver   │◀─────│     FilterCompiler        │
//! │  hops + terminals    │      │  predicate tree (expr)    │
//! └──────────────────────┘      └──────────────────────────┘
//!            │                              │
//!            └──────────────┬───────────────┘
//!                           ▼ [plan]
//! ┌─────────────────────────────────────────────────────────┐
//! │                     QueryPlan                            │
//! └─────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼ [backend]
//! ┌─────────────────────────────────────────────────────────┐
//! │        StorageBackend (MemoryBackend for tests)          │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod expr;
pub mod filter;
pub mod path;
pub mod plan;
pub mod resolver;
pub mod schema;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::backend::{MemoryBackend, Record, StorageBackend};
    pub use crate::config::{QuerySettings, ResolverSettings, Settings};
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::expr::{and, not, or, table_col, Expr, ExprExt, Join, Literal};
    pub use crate::filter::{
        Clock, EntityRef, FilterCompiler, FilterExpr, FilterOperator, FixedClock, SystemClock,
    };
    pub use crate::path::{AliasGenerator, FieldPathResolver, TraversalPlan};
    pub use crate::plan::{FindRequest, LinkSync, OrderTerm, QueryPlan, QueryPlanner};
    pub use crate::resolver::{Diagnostic, DiagnosticKind, RelationshipResolver, Resolution};
    pub use crate::schema::{
        Entity, Field, FieldType, ReverseHints, Schema, SchemaSource, SchemaSources,
    };
}

pub use error::{QueryError, QueryResult};
pub use plan::{FindRequest, QueryPlan, QueryPlanner};
pub use resolver::{RelationshipResolver, Resolution};
pub use schema::Schema;

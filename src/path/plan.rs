//! Traversal plans produced by the field path resolver.

use serde::Serialize;

use crate::expr::{ColumnRef, Expr, Join};
use crate::schema::FieldId;

/// How a hop reaches its target entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HopKind {
    /// Through the shadow id/type columns of a single-entity field.
    SingleEntity,
    /// Through a connection entity row.
    Connection { connection: String },
    /// Through the single-entity field on the target that points back.
    Reverse { parent_field: String },
}

/// One step from an entity row to a linked entity row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hop {
    pub field: FieldId,
    /// Api name of the traversed field.
    pub field_name: String,
    /// Alias of the row the hop starts from.
    pub from_alias: String,
    /// Target entity type.
    pub target: String,
    /// Alias of the target row.
    pub alias: String,
    pub kind: HopKind,
    /// Joins, outermost first; the last one binds `alias`.
    pub joins: Vec<Join>,
}

impl Hop {
    /// Wrap `inner` (a predicate over the target row) in one correlated
    /// existence check per join.
    pub fn wrap_exists(&self, inner: Expr) -> Expr {
        self.joins
            .iter()
            .rev()
            .fold(inner, |acc, join| join.exists(acc))
    }
}

/// Where the entity type of a linked-entity read comes from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeSource {
    Column(ColumnRef),
    /// Every row of a reverse table has the same type.
    Literal(String),
}

/// A multi-entity field read through its connection or reverse table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiEntityRead {
    pub field: FieldId,
    /// Join to the connection or reverse table (one row per linked entity).
    pub join: Join,
    pub id: ColumnRef,
    pub entity_type: TypeSource,
    pub name: Option<ColumnRef>,
}

/// The final field of a path, read on the last hop's row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Terminal {
    /// A plain column.
    Column { field: FieldId, column: ColumnRef },
    /// A single-entity field read from its shadow columns; needs no join.
    EntityLink {
        field: FieldId,
        id: ColumnRef,
        entity_type: ColumnRef,
        name: ColumnRef,
    },
    MultiEntity(MultiEntityRead),
}

impl Terminal {
    pub fn field(&self) -> FieldId {
        match self {
            Terminal::Column { field, .. } | Terminal::EntityLink { field, .. } => *field,
            Terminal::MultiEntity(read) => read.field,
        }
    }
}

/// A resolved dot-path: the hops to walk plus the terminal read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraversalPlan {
    pub path: String,
    pub base: String,
    pub root_alias: String,
    pub hops: Vec<Hop>,
    /// Entity the terminal field belongs to.
    pub entity: String,
    /// Alias of the row the terminal field is read from.
    pub alias: String,
    pub terminal: Terminal,
}

impl TraversalPlan {
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Every join of every hop, in order.
    pub fn joins(&self) -> impl Iterator<Item = &Join> {
        self.hops.iter().flat_map(|h| h.joins.iter())
    }

    pub fn is_dotted(&self) -> bool {
        !self.hops.is_empty()
    }
}

//! Resolved relationships between fields.

use serde::{Deserialize, Serialize};

use super::{EntityId, FieldId};

/// The resolved relationship attached to a link-capable field.
///
/// The variants are mutually exclusive. A field carrying no link is either
/// `one_sided` (intentionally unlinked) or an orphan the resolver reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// A single-entity field paired with the multi-entity fields that mirror it.
    OneToMany(OneToManyLink),
    /// A multi-entity field stored through a connection entity.
    ManyToMany(ManyToManyLink),
    /// A field on a connection entity pointing back at one side.
    ConnectionEndpoint(ConnectionEndpointLink),
}

impl Link {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Link::OneToMany(_) => "one_to_many",
            Link::ManyToMany(_) => "many_to_many",
            Link::ConnectionEndpoint(_) => "connection_endpoint",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneToManyLink {
    /// The single-entity field holding the reference.
    pub parent: FieldId,
    /// Multi-entity fields on the referenced entities, sorted.
    pub children: Vec<FieldId>,
}

/// One side of a many-to-many relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSide {
    /// The multi-entity field on this side, if the side has one.
    pub field: Option<FieldId>,
    /// Endpoint on the connection entity referencing this side's owner.
    pub endpoint: FieldId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManyToManyLink {
    pub connection: EntityId,
    pub left: ConnectionSide,
    pub right: ConnectionSide,
}

impl ManyToManyLink {
    /// Endpoints as `(this side, other side)` when seen from `field`.
    pub fn endpoints_for(&self, field: FieldId) -> Option<(FieldId, FieldId)> {
        if self.left.field == Some(field) {
            Some((self.left.endpoint, self.right.endpoint))
        } else if self.right.field == Some(field) {
            Some((self.right.endpoint, self.left.endpoint))
        } else {
            None
        }
    }

    /// The field on the opposite side of `field`, if that side has one.
    pub fn reverse_of(&self, field: FieldId) -> Option<FieldId> {
        if self.left.field == Some(field) {
            self.right.field
        } else if self.right.field == Some(field) {
            self.left.field
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEndpointLink {
    /// The side field this endpoint stores links for, when known.
    pub side_field: Option<FieldId>,
}

/// Serializable form of a link, keyed by qualified names instead of handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkSnapshot {
    OneToMany {
        parent: String,
        children: Vec<String>,
    },
    ManyToMany {
        connection: String,
        this_endpoint: String,
        other_endpoint: String,
        reverse: Option<String>,
    },
    ConnectionEndpoint {
        side_field: Option<String>,
    },
}

//! Schema model - entities, fields, and resolved links.
//!
//! Entities and fields live in arenas owned by [`Schema`] and reference each
//! other through [`EntityId`] / [`FieldId`] handles, so the bidirectional
//! parent/child and field/connection relationships need no ownership cycles.
//!
//! A schema is produced once by the [`crate::resolver::RelationshipResolver`]
//! and is read-only afterwards: it can be shared across threads and queried
//! concurrently without locking.

mod entity;
mod field;
pub mod inflection;
mod link;
pub mod source;
mod types;

pub use entity::Entity;
pub use field::{Field, IDENTITY_FIELD};
pub use link::{
    ConnectionEndpointLink, ConnectionSide, Link, LinkSnapshot, ManyToManyLink, OneToManyLink,
};
pub use source::{
    DisplayNameChange, EntitySource, FieldHint, FieldSource, ReverseHints, ReverseOf,
    SchemaSource, SchemaSources, SourceError,
};
pub use types::{FieldType, LinkKind, LinkProperties, TypedField};

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{QueryError, QueryResult};

/// Handle of an entity inside a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub(crate) u32);

/// Handle of a field inside a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FieldId(pub(crate) u32);

impl EntityId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl FieldId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// The entity map of a tracking site.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: Vec<Entity>,
    fields: Vec<Field>,
    by_name: HashMap<String, EntityId>,
    /// Sorted name lookup, built on first use.
    entity_map: OnceLock<BTreeMap<String, EntityId>>,
}

impl Schema {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Construction (resolver only)
    // ========================================================================

    pub(crate) fn add_entity(&mut self, api_name: &str, display_name: &str, real: bool) -> EntityId {
        if let Some(id) = self.by_name.get(api_name) {
            return *id;
        }
        let id = EntityId(self.entities.len() as u32);
        self.entities
            .push(Entity::new(id, api_name, display_name, real));
        self.by_name.insert(api_name.to_string(), id);
        self.entity_map = OnceLock::new();
        id
    }

    /// Attach a field to an entity. Adding a name that already exists
    /// returns the existing handle unchanged.
    pub(crate) fn add_field(&mut self, entity: EntityId, mut field: Field) -> FieldId {
        if let Some(existing) = self.entities[entity.index()].field_id(&field.api_name) {
            return existing;
        }
        let id = FieldId(self.fields.len() as u32);
        field.id = id;
        field.entity = entity;
        let owner = &mut self.entities[entity.index()];
        owner.fields.push(id);
        owner.field_index.insert(field.api_name.clone(), id);
        self.fields.push(field);
        id
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.index()]
    }

    pub(crate) fn field_mut(&mut self, id: FieldId) -> &mut Field {
        &mut self.fields[id.index()]
    }

    pub(crate) fn set_link(&mut self, id: FieldId, link: Link) {
        self.fields[id.index()].link = Some(link);
    }

    pub(crate) fn mark_one_sided(&mut self, id: FieldId) {
        self.fields[id.index()].one_sided = true;
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities, in creation order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Entity handles keyed by api name, sorted.
    pub fn entity_map(&self) -> &BTreeMap<String, EntityId> {
        self.entity_map.get_or_init(|| {
            self.by_name
                .iter()
                .map(|(name, id)| (name.clone(), *id))
                .collect()
        })
    }

    pub fn entity_id(&self, api_name: &str) -> Option<EntityId> {
        self.by_name.get(api_name).copied()
    }

    pub fn entity(&self, api_name: &str) -> Option<&Entity> {
        self.entity_id(api_name).map(|id| &self.entities[id.index()])
    }

    /// Look up an entity, failing with `UnknownEntity`.
    pub fn require_entity(&self, api_name: &str) -> QueryResult<&Entity> {
        self.entity(api_name)
            .ok_or_else(|| QueryError::UnknownEntity(api_name.to_string()))
    }

    pub fn entity_at(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.index()]
    }

    /// Owning entity of a field.
    pub fn owner(&self, id: FieldId) -> &Entity {
        self.entity_at(self.field(id).entity)
    }

    pub fn field_of(&self, entity: &Entity, api_name: &str) -> Option<&Field> {
        entity.field_id(api_name).map(|id| self.field(id))
    }

    /// Look up a field, failing with `UnknownField`.
    pub fn require_field(&self, entity: &Entity, api_name: &str) -> QueryResult<&Field> {
        self.field_of(entity, api_name)
            .ok_or_else(|| QueryError::unknown_field(&entity.api_name, api_name))
    }

    /// Fields of an entity in the order they were added.
    pub fn fields_of<'a>(&'a self, entity: &'a Entity) -> impl Iterator<Item = &'a Field> + 'a {
        entity.fields.iter().map(move |id| self.field(*id))
    }

    /// `Entity.field` form of a field handle.
    pub fn qualified_name(&self, id: FieldId) -> String {
        let field = self.field(id);
        format!("{}.{}", self.entity_at(field.entity).api_name, field.api_name)
    }

    // ========================================================================
    // Structural comparison
    // ========================================================================

    /// Structural summary of the schema, independent of arena order.
    pub fn snapshot(&self) -> SchemaSnapshot {
        let mut entities: Vec<EntitySnapshot> = self
            .entities
            .iter()
            .map(|entity| {
                let mut fields: Vec<FieldSnapshot> = self
                    .fields_of(entity)
                    .map(|field| FieldSnapshot {
                        api_name: field.api_name.clone(),
                        field_type: field.field_type(),
                        valid_types: field.valid_types().to_vec(),
                        one_sided: field.one_sided,
                        link: field.link.as_ref().map(|l| self.link_snapshot(field.id, l)),
                    })
                    .collect();
                fields.sort_by(|a, b| a.api_name.cmp(&b.api_name));
                EntitySnapshot {
                    api_name: entity.api_name.clone(),
                    display_name: entity.display_name.clone(),
                    real: entity.real,
                    visible: entity.visible,
                    fields,
                }
            })
            .collect();
        entities.sort_by(|a, b| a.api_name.cmp(&b.api_name));
        SchemaSnapshot { entities }
    }

    /// SHA-256 hex digest of [`Schema::snapshot`].
    pub fn fingerprint(&self) -> String {
        let snapshot = self.snapshot();
        // Snapshot only holds strings, bools, and enums; serialization cannot fail.
        let json = serde_json::to_string(&snapshot).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn link_snapshot(&self, field: FieldId, link: &Link) -> LinkSnapshot {
        match link {
            Link::OneToMany(o2m) => LinkSnapshot::OneToMany {
                parent: self.qualified_name(o2m.parent),
                children: o2m
                    .children
                    .iter()
                    .map(|c| self.qualified_name(*c))
                    .collect(),
            },
            Link::ManyToMany(m2m) => {
                let (this, other) = m2m
                    .endpoints_for(field)
                    .unwrap_or((m2m.left.endpoint, m2m.right.endpoint));
                LinkSnapshot::ManyToMany {
                    connection: self.entity_at(m2m.connection).api_name.clone(),
                    this_endpoint: self.field(this).api_name.clone(),
                    other_endpoint: self.field(other).api_name.clone(),
                    reverse: m2m.reverse_of(field).map(|r| self.qualified_name(r)),
                }
            }
            Link::ConnectionEndpoint(endpoint) => LinkSnapshot::ConnectionEndpoint {
                side_field: endpoint.side_field.map(|f| self.qualified_name(f)),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub entities: Vec<EntitySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub api_name: String,
    pub display_name: String,
    pub real: bool,
    pub visible: bool,
    pub fields: Vec<FieldSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub api_name: String,
    pub field_type: FieldType,
    pub valid_types: Vec<String>,
    pub one_sided: bool,
    pub link: Option<LinkSnapshot>,
}

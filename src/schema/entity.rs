//! Entities (record kinds) of the schema.

use std::collections::HashMap;

use super::{EntityId, FieldId};

/// An entity type: a table in the tracking service.
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) id: EntityId,
    /// Unique key of the entity (`Shot`, `HumanUser`, `AssetShotConnection`).
    pub api_name: String,
    /// Display name shown to users.
    pub display_name: String,
    /// True for entities that exist in the source system, false for
    /// connection entities synthesized during resolution.
    pub real: bool,
    pub visible: bool,
    pub(crate) fields: Vec<FieldId>,
    pub(crate) field_index: HashMap<String, FieldId>,
    pub(crate) name_field: Option<FieldId>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, api_name: &str, display_name: &str, real: bool) -> Self {
        Self {
            id,
            api_name: api_name.to_string(),
            display_name: display_name.to_string(),
            real,
            visible: true,
            fields: Vec::new(),
            field_index: HashMap::new(),
            name_field: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Field handles in the order they were added.
    pub fn field_ids(&self) -> &[FieldId] {
        &self.fields
    }

    pub fn field_id(&self, api_name: &str) -> Option<FieldId> {
        self.field_index.get(api_name).copied()
    }

    pub fn has_field(&self, api_name: &str) -> bool {
        self.field_index.contains_key(api_name)
    }

    /// The field summarizing this entity as the `name` of a link, if any.
    pub fn name_field(&self) -> Option<FieldId> {
        self.name_field
    }
}

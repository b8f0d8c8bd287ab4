//! Fields (typed attributes) of an entity.

use serde_json::{Map, Value};

use super::link::Link;
use super::types::{FieldType, LinkKind, LinkProperties, TypedField};
use super::{EntityId, FieldId};

/// Api name of every entity's identity field.
pub const IDENTITY_FIELD: &str = "id";

/// A typed, named attribute of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub(crate) id: FieldId,
    pub(crate) entity: EntityId,
    /// Unique within the owning entity.
    pub api_name: String,
    pub display_name: String,
    pub data: TypedField,
    /// Untyped metadata carried over from the source.
    pub properties: Map<String, Value>,
    pub mandatory: bool,
    pub editable: bool,
    pub unique: bool,
    pub(crate) link: Option<Link>,
    pub(crate) one_sided: bool,
}

impl Field {
    /// Create a detached field; the schema assigns its handles when added.
    pub fn new(api_name: &str, display_name: &str, data: TypedField) -> Self {
        Self {
            id: FieldId(0),
            entity: EntityId(0),
            api_name: api_name.to_string(),
            display_name: display_name.to_string(),
            data,
            properties: Map::new(),
            mandatory: false,
            editable: true,
            unique: false,
            link: None,
            one_sided: false,
        }
    }

    pub(crate) fn identity() -> Self {
        let mut field = Self::new(IDENTITY_FIELD, "Id", TypedField::Scalar(FieldType::Number));
        field.editable = false;
        field.unique = true;
        field
    }

    pub(crate) fn endpoint(api_name: &str, valid_types: Vec<String>) -> Self {
        Self::new(
            api_name,
            api_name,
            TypedField::Link {
                kind: LinkKind::Entity,
                properties: LinkProperties {
                    valid_types,
                    join_entity: None,
                },
            },
        )
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    /// Handle of the owning entity.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn field_type(&self) -> FieldType {
        self.data.field_type()
    }

    pub fn link_kind(&self) -> Option<LinkKind> {
        match &self.data {
            TypedField::Link { kind, .. } => Some(*kind),
            TypedField::Scalar(_) => None,
        }
    }

    /// Entity types this link field may point at (empty for scalars).
    pub fn valid_types(&self) -> &[String] {
        self.data
            .link_properties()
            .map(|p| p.valid_types.as_slice())
            .unwrap_or(&[])
    }

    pub fn accepts(&self, entity: &str) -> bool {
        self.valid_types().iter().any(|t| t == entity)
    }

    pub fn is_single_entity(&self) -> bool {
        self.field_type() == FieldType::Entity
    }

    pub fn is_multi_entity(&self) -> bool {
        self.field_type().is_multi_entity_family()
    }

    pub fn is_identity(&self) -> bool {
        self.api_name == IDENTITY_FIELD
    }

    pub fn link(&self) -> Option<&Link> {
        self.link.as_ref()
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// True when the field intentionally has no reverse field.
    pub fn is_one_sided(&self) -> bool {
        self.one_sided
    }

    /// A link field that still needs a resolver decision.
    pub(crate) fn is_unresolved(&self) -> bool {
        self.data.link_properties().is_some() && self.link.is_none() && !self.one_sided
    }

    /// Name of the shadow column holding the linked id of a single-entity field.
    pub fn id_column(&self) -> String {
        format!("{}_id", self.api_name)
    }

    pub fn type_column(&self) -> String {
        format!("{}_type", self.api_name)
    }

    pub fn name_column(&self) -> String {
        format!("{}_name", self.api_name)
    }
}

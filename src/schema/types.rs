//! Field type definitions.
//!
//! The source metadata describes every field with a `data_type` string and an
//! untyped bag of properties. Parsing turns that into a closed [`FieldType`]
//! plus, for link-capable types, a typed [`LinkProperties`] payload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Data type of a field, as named by the tracking service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Float,
    Checkbox,
    Color,
    Currency,
    Date,
    DateTime,
    Duration,
    Entity,
    MultiEntity,
    Addressing,
    TagList,
    List,
    Password,
    Percent,
    Serializable,
    StatusList,
    Summary,
    Timecode,
    Url,
    EntityType,
    PivotColumn,
    Uuid,
    #[serde(rename = "jsonb")]
    JsonB,
    Calculated,
    Footage,
    Image,
}

impl FieldType {
    /// Every field type, in declaration order.
    pub const ALL: [FieldType; 28] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Float,
        FieldType::Checkbox,
        FieldType::Color,
        FieldType::Currency,
        FieldType::Date,
        FieldType::DateTime,
        FieldType::Duration,
        FieldType::Entity,
        FieldType::MultiEntity,
        FieldType::Addressing,
        FieldType::TagList,
        FieldType::List,
        FieldType::Password,
        FieldType::Percent,
        FieldType::Serializable,
        FieldType::StatusList,
        FieldType::Summary,
        FieldType::Timecode,
        FieldType::Url,
        FieldType::EntityType,
        FieldType::PivotColumn,
        FieldType::Uuid,
        FieldType::JsonB,
        FieldType::Calculated,
        FieldType::Footage,
        FieldType::Image,
    ];

    /// The name used by the source metadata (`data_type.value`).
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Float => "float",
            FieldType::Checkbox => "checkbox",
            FieldType::Color => "color",
            FieldType::Currency => "currency",
            FieldType::Date => "date",
            FieldType::DateTime => "date_time",
            FieldType::Duration => "duration",
            FieldType::Entity => "entity",
            FieldType::MultiEntity => "multi_entity",
            FieldType::Addressing => "addressing",
            FieldType::TagList => "tag_list",
            FieldType::List => "list",
            FieldType::Password => "password",
            FieldType::Percent => "percent",
            FieldType::Serializable => "serializable",
            FieldType::StatusList => "status_list",
            FieldType::Summary => "summary",
            FieldType::Timecode => "timecode",
            FieldType::Url => "url",
            FieldType::EntityType => "entity_type",
            FieldType::PivotColumn => "pivot_column",
            FieldType::Uuid => "uuid",
            FieldType::JsonB => "jsonb",
            FieldType::Calculated => "calculated",
            FieldType::Footage => "footage",
            FieldType::Image => "image",
        }
    }

    /// Returns true for the types that can carry a link to another entity.
    pub fn is_link(&self) -> bool {
        self.link_kind().is_some()
    }

    /// Returns true for link types that hold many linked entities.
    pub fn is_multi_entity_family(&self) -> bool {
        matches!(
            self,
            FieldType::MultiEntity | FieldType::Addressing | FieldType::TagList
        )
    }

    pub fn link_kind(&self) -> Option<LinkKind> {
        match self {
            FieldType::Entity => Some(LinkKind::Entity),
            FieldType::MultiEntity => Some(LinkKind::MultiEntity),
            FieldType::Addressing => Some(LinkKind::Addressing),
            FieldType::TagList => Some(LinkKind::TagList),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// The link-capable subset of [`FieldType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LinkKind {
    Entity,
    MultiEntity,
    Addressing,
    TagList,
}

impl LinkKind {
    pub fn field_type(&self) -> FieldType {
        match self {
            LinkKind::Entity => FieldType::Entity,
            LinkKind::MultiEntity => FieldType::MultiEntity,
            LinkKind::Addressing => FieldType::Addressing,
            LinkKind::TagList => FieldType::TagList,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, LinkKind::Entity)
    }
}

/// Typed properties of a link-capable field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkProperties {
    /// Entity types this field may point at, in source order.
    pub valid_types: Vec<String>,
    /// Join entity declared by the source for a multi-entity field, if any.
    pub join_entity: Option<String>,
}

impl LinkProperties {
    pub fn targets(types: &[&str]) -> Self {
        Self {
            valid_types: types.iter().map(|t| t.to_string()).collect(),
            join_entity: None,
        }
    }

    pub fn accepts(&self, entity: &str) -> bool {
        self.valid_types.iter().any(|t| t == entity)
    }
}

/// A field type together with its typed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypedField {
    /// A plain value column.
    Scalar(FieldType),
    /// A link to one or more entities.
    Link {
        kind: LinkKind,
        properties: LinkProperties,
    },
}

impl TypedField {
    /// Build a typed field, attaching link properties only to link-capable types.
    pub fn new(field_type: FieldType, properties: LinkProperties) -> Self {
        match field_type.link_kind() {
            Some(kind) => TypedField::Link { kind, properties },
            None => TypedField::Scalar(field_type),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            TypedField::Scalar(t) => *t,
            TypedField::Link { kind, .. } => kind.field_type(),
        }
    }

    pub fn link_properties(&self) -> Option<&LinkProperties> {
        match self {
            TypedField::Link { properties, .. } => Some(properties),
            TypedField::Scalar(_) => None,
        }
    }
}

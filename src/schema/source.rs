//! Raw schema sources.
//!
//! The tracking service describes its schema through several partially
//! overlapping documents:
//!
//! - `schema_read`: every field of every entity, with data type and
//!   properties but no reverse-link information;
//! - `schema_entity_read`: entity display names and visibility;
//! - reverse hints: for some fields, explicit pointers to their reverse
//!   field or to the join entity storing them;
//! - display-name history: the audit trail of field display-name edits.
//!
//! Every map here is ordered so that resolution walks the sources in a
//! stable order.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::{FieldType, LinkProperties, TypedField};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Unknown data type '{data_type}' for field '{entity}.{field}'")]
    UnknownFieldType {
        entity: String,
        field: String,
        data_type: String,
    },

    #[error("Malformed schema source for '{entity}': {reason}")]
    Malformed { entity: String, reason: String },

    #[error("Invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Every source metadata value is wrapped as `{"value": ...}`.
#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct RawField {
    data_type: Wrapped<String>,
    #[serde(default)]
    name: Option<Wrapped<String>>,
    #[serde(default)]
    mandatory: Option<Wrapped<Option<bool>>>,
    #[serde(default)]
    editable: Option<Wrapped<Option<bool>>>,
    #[serde(default)]
    unique: Option<Wrapped<Option<bool>>>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    #[serde(default)]
    name: Option<Wrapped<String>>,
    #[serde(default)]
    visible: Option<Wrapped<Option<bool>>>,
}

fn flag(raw: Option<Wrapped<Option<bool>>>, default: bool) -> bool {
    raw.and_then(|w| w.value).unwrap_or(default)
}

/// One field as described by the primary source.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSource {
    pub api_name: String,
    pub display_name: String,
    pub data: TypedField,
    pub mandatory: bool,
    pub editable: bool,
    pub unique: bool,
    /// The raw `properties` object, kept for callers that need more than the
    /// typed payload.
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitySource {
    pub api_name: String,
    pub display_name: String,
    pub visible: bool,
    pub fields: BTreeMap<String, FieldSource>,
}

/// The primary schema source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSource {
    pub entities: BTreeMap<String, EntitySource>,
}

impl SchemaSource {
    /// Parse a `schema_read` document.
    pub fn from_json(schema_read: Value) -> Result<Self, SourceError> {
        let raw: BTreeMap<String, BTreeMap<String, RawField>> = serde_json::from_value(schema_read)?;
        let mut entities = BTreeMap::new();
        for (entity_name, raw_fields) in raw {
            let mut fields = BTreeMap::new();
            for (field_name, raw_field) in raw_fields {
                let field = parse_field(&entity_name, &field_name, raw_field)?;
                fields.insert(field_name, field);
            }
            entities.insert(
                entity_name.clone(),
                EntitySource {
                    display_name: entity_name.clone(),
                    api_name: entity_name,
                    visible: true,
                    fields,
                },
            );
        }
        Ok(Self { entities })
    }

    pub fn from_json_str(text: &str) -> Result<Self, SourceError> {
        Self::from_json(serde_json::from_str(text)?)
    }

    /// Apply a `schema_entity_read` document (display names and visibility).
    ///
    /// Entities unknown to the field source are ignored.
    pub fn with_entity_read(mut self, entity_read: Value) -> Result<Self, SourceError> {
        let raw: BTreeMap<String, RawEntity> = serde_json::from_value(entity_read)?;
        for (entity_name, raw_entity) in raw {
            if let Some(entity) = self.entities.get_mut(&entity_name) {
                if let Some(name) = raw_entity.name {
                    entity.display_name = name.value;
                }
                entity.visible = flag(raw_entity.visible, true);
            }
        }
        Ok(self)
    }

    pub fn entity(&self, api_name: &str) -> Option<&EntitySource> {
        self.entities.get(api_name)
    }
}

fn parse_field(entity: &str, field: &str, raw: RawField) -> Result<FieldSource, SourceError> {
    let field_type: FieldType =
        raw.data_type
            .value
            .parse()
            .map_err(|data_type| SourceError::UnknownFieldType {
                entity: entity.to_string(),
                field: field.to_string(),
                data_type,
            })?;

    let valid_types = match raw
        .properties
        .get("valid_types")
        .and_then(|p| p.get("value"))
    {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SourceError::Malformed {
                        entity: entity.to_string(),
                        reason: format!("valid_types of '{field}' must be strings"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(SourceError::Malformed {
                entity: entity.to_string(),
                reason: format!("valid_types of '{field}' must be a list, got {other}"),
            })
        }
    };

    Ok(FieldSource {
        api_name: field.to_string(),
        display_name: raw
            .name
            .map(|n| n.value)
            .unwrap_or_else(|| field.to_string()),
        data: TypedField::new(
            field_type,
            LinkProperties {
                valid_types,
                join_entity: None,
            },
        ),
        mandatory: flag(raw.mandatory, false),
        editable: flag(raw.editable, true),
        unique: flag(raw.unique, false),
        properties: raw.properties,
    })
}

/// `reverse_of` pointer of a reverse hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseOf {
    pub entity_type_name: String,
    pub name: String,
}

/// Reverse-link hints for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldHint {
    #[serde(default)]
    pub reverse_of: Option<ReverseOf>,
    /// `"Entity.field"` of the inverse side.
    #[serde(default)]
    pub inverse_association: Option<String>,
    /// Join entity storing this multi-entity field.
    #[serde(default)]
    pub through_join_entity_type: Option<String>,
}

impl FieldHint {
    /// The `(entity, field)` this hint names as its reverse, from either pointer.
    pub fn reverse_target(&self) -> Option<(&str, &str)> {
        if let Some(reverse) = &self.reverse_of {
            return Some((reverse.entity_type_name.as_str(), reverse.name.as_str()));
        }
        self.inverse_association
            .as_deref()
            .and_then(|assoc| assoc.split_once('.'))
            .filter(|(entity, field)| !entity.is_empty() && !field.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.reverse_of.is_none()
            && self.inverse_association.is_none()
            && self.through_join_entity_type.is_none()
    }
}

/// The secondary source: reverse hints keyed by entity then field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReverseHints {
    pub entities: BTreeMap<String, BTreeMap<String, FieldHint>>,
}

impl ReverseHints {
    pub fn from_json(value: Value) -> Result<Self, SourceError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn field(&self, entity: &str, field: &str) -> Option<&FieldHint> {
        self.entities.get(entity).and_then(|fields| fields.get(field))
    }

    /// Every `(entity, field, hint)` triple, sorted.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &FieldHint)> {
        self.entities.iter().flat_map(|(entity, fields)| {
            fields
                .iter()
                .map(move |(field, hint)| (entity.as_str(), field.as_str(), hint))
        })
    }
}

/// One entry of the display-name audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayNameChange {
    pub entity_type: String,
    pub field_name: String,
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Everything the resolver reads.
#[derive(Debug, Clone, Default)]
pub struct SchemaSources {
    pub primary: SchemaSource,
    pub hints: ReverseHints,
    pub history: Vec<DisplayNameChange>,
}

impl SchemaSources {
    pub fn new(primary: SchemaSource) -> Self {
        Self {
            primary,
            ..Default::default()
        }
    }

    pub fn with_hints(mut self, hints: ReverseHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_history(mut self, history: Vec<DisplayNameChange>) -> Self {
        self.history = history;
        self
    }

    /// Previous display names of a field with the time each was renamed
    /// away, most recent rename first.
    pub fn previous_display_names(&self, entity: &str, field: &str) -> Vec<(&str, NaiveDateTime)> {
        let mut changes: Vec<&DisplayNameChange> = self
            .history
            .iter()
            .filter(|c| c.entity_type == entity && c.field_name == field)
            .collect();
        changes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        changes
            .into_iter()
            .filter_map(|c| c.old_value.as_deref().map(|old| (old, c.created_at)))
            .collect()
    }
}

//! Write path for multi-entity fields.
//!
//! Assigning a new list of linked entities to a multi-entity field does not
//! rewrite the field; it edits the rows the links are stored in. This module
//! decides which rows those are and which of them to keep, delete or insert.
//! Applying the decision atomically is the backend's job.

use serde::Serialize;
use serde_json::{json, Value};

use super::request::FindRequest;
use crate::backend::Record;
use crate::error::{QueryError, QueryResult};
use crate::filter::EntityRef;
use crate::resolver::connections::OTHER_ENDPOINT;
use crate::schema::inflection::snake_case;
use crate::schema::{Entity, Field, Link, ManyToManyLink, Schema};

/// Where the links of a multi-entity field live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LinkStorage {
    /// One connection row per link.
    Connection {
        connection: String,
        /// Endpoint referencing the owner of the field.
        this_endpoint: String,
        /// Endpoints that may reference a linked entity.
        other_endpoints: Vec<String>,
    },
    /// The linked rows point back through a single-entity field.
    Reverse { entity: String, parent_field: String },
}

/// A live row currently storing one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingLink {
    /// Id of the connection row (or of the linked row for reverse storage).
    pub row: i64,
    pub linked: EntityRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkInsert {
    pub linked: EntityRef,
    /// Connection endpoint storing the linked entity; `None` for reverse
    /// storage, where the linked row's parent field is set instead.
    pub endpoint: Option<String>,
}

/// Rows to keep, delete and insert for one field assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkUpdate {
    pub storage: LinkStorage,
    pub keep: Vec<ExistingLink>,
    pub delete: Vec<ExistingLink>,
    pub insert: Vec<LinkInsert>,
}

impl LinkUpdate {
    pub fn is_noop(&self) -> bool {
        self.delete.is_empty() && self.insert.is_empty()
    }
}

/// Plans link updates against a resolved schema.
pub struct LinkSync<'a> {
    schema: &'a Schema,
}

impl<'a> LinkSync<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Storage of the multi-entity field `entity.field`.
    pub fn storage(&self, entity: &str, field: &str) -> QueryResult<LinkStorage> {
        let (owner, field) = self.multi_field(entity, field)?;
        match field.link() {
            Some(Link::ManyToMany(m2m)) => {
                let (this, _) = m2m.endpoints_for(field.id()).ok_or_else(|| unstored(owner, field))?;
                let connection = self.schema.entity_at(m2m.connection);
                let this = self.schema.field(this);
                let other_endpoints = self
                    .schema
                    .fields_of(connection)
                    .filter(|f| f.is_single_entity() && f.id() != this.id())
                    .map(|f| f.api_name.clone())
                    .collect();
                Ok(LinkStorage::Connection {
                    connection: connection.api_name.clone(),
                    this_endpoint: this.api_name.clone(),
                    other_endpoints,
                })
            }
            Some(Link::OneToMany(o2m)) if o2m.parent != field.id() => Ok(LinkStorage::Reverse {
                entity: self.schema.owner(o2m.parent).api_name.clone(),
                parent_field: self.schema.field(o2m.parent).api_name.clone(),
            }),
            _ => Err(unstored(owner, field)),
        }
    }

    /// The connection endpoint storing links to `linked_type`: the generic
    /// `linked_entity` endpoint, else the endpoint named after the type, else
    /// an endpoint accepting it.
    pub fn other_endpoint(&self, entity: &str, field: &str, linked_type: &str) -> QueryResult<String> {
        let (owner, field) = self.multi_field(entity, field)?;
        let Some(Link::ManyToMany(m2m)) = field.link() else {
            return Err(unstored(owner, field));
        };
        self.pick_endpoint(owner, field, m2m, linked_type)
    }

    fn pick_endpoint(
        &self,
        owner: &Entity,
        field: &Field,
        m2m: &ManyToManyLink,
        linked_type: &str,
    ) -> QueryResult<String> {
        let (this, other) = m2m
            .endpoints_for(field.id())
            .ok_or_else(|| unstored(owner, field))?;
        let connection = self.schema.entity_at(m2m.connection);
        let candidates: Vec<&Field> = self
            .schema
            .fields_of(connection)
            .filter(|f| f.is_single_entity() && f.id() != this)
            .collect();
        let snake = snake_case(linked_type);
        candidates
            .iter()
            .find(|f| f.api_name == OTHER_ENDPOINT)
            .or_else(|| candidates.iter().find(|f| f.id() == other && f.accepts(linked_type)))
            .or_else(|| candidates.iter().find(|f| f.api_name == snake))
            .or_else(|| candidates.iter().find(|f| f.accepts(linked_type)))
            .map(|f| f.api_name.clone())
            .ok_or_else(|| {
                QueryError::invalid_relation(
                    &owner.api_name,
                    &field.api_name,
                    format!("connection '{}' has no endpoint for '{linked_type}'", connection.api_name),
                )
            })
    }

    /// A find request for the live rows storing the links of `owner_ref`'s
    /// `field`.
    pub fn existing_request(&self, storage: &LinkStorage, owner_ref: &EntityRef) -> FindRequest {
        let owner_value = json!({"type": owner_ref.entity_type, "id": owner_ref.id});
        match storage {
            LinkStorage::Connection {
                connection,
                this_endpoint,
                other_endpoints,
            } => {
                let fields: Vec<&str> = other_endpoints.iter().map(String::as_str).collect();
                FindRequest::new(connection)
                    .filters(json!([[this_endpoint, "is", owner_value]]))
                    .fields(&fields)
            }
            LinkStorage::Reverse {
                entity,
                parent_field,
            } => FindRequest::new(entity).filters(json!([[parent_field, "is", owner_value]])),
        }
    }

    /// Read the links out of the records returned for [`Self::existing_request`].
    pub fn existing_links(&self, storage: &LinkStorage, records: &[Record]) -> Vec<ExistingLink> {
        records
            .iter()
            .filter_map(|record| {
                let row = record.get("id")?.as_i64()?;
                let linked = match storage {
                    LinkStorage::Connection {
                        other_endpoints, ..
                    } => other_endpoints
                        .iter()
                        .filter_map(|e| record.get(e))
                        .find(|v| !v.is_null())
                        .and_then(|v| serde_json::from_value::<EntityRef>(v.clone()).ok())?,
                    LinkStorage::Reverse { .. } => EntityRef {
                        entity_type: record.get("type").and_then(Value::as_str)?.to_string(),
                        id: row,
                        name: None,
                    },
                };
                Some(ExistingLink { row, linked })
            })
            .collect()
    }

    /// Decide the row changes that make `entity.field` link exactly
    /// `requested`, given the rows currently storing its links.
    pub fn plan(
        &self,
        entity: &str,
        field: &str,
        existing: &[ExistingLink],
        requested: &[EntityRef],
    ) -> QueryResult<LinkUpdate> {
        let storage = self.storage(entity, field)?;
        let (owner, field) = self.multi_field(entity, field)?;
        for linked in requested {
            if !field.accepts(&linked.entity_type) {
                return Err(QueryError::invalid_relation(
                    &owner.api_name,
                    &field.api_name,
                    format!("'{}' is not a valid target type", linked.entity_type),
                ));
            }
        }

        let (keep, delete, insert) = reconcile(existing, requested);
        let insert = insert
            .into_iter()
            .map(|linked| {
                let endpoint = match (&storage, field.link()) {
                    (LinkStorage::Connection { .. }, Some(Link::ManyToMany(m2m))) => {
                        Some(self.pick_endpoint(owner, field, m2m, &linked.entity_type)?)
                    }
                    _ => None,
                };
                Ok(LinkInsert { linked, endpoint })
            })
            .collect::<QueryResult<Vec<_>>>()?;

        tracing::debug!(
            entity = %owner.api_name,
            field = %field.api_name,
            keep = keep.len(),
            delete = delete.len(),
            insert = insert.len(),
            "planned link update"
        );
        Ok(LinkUpdate {
            storage,
            keep,
            delete,
            insert,
        })
    }

    fn multi_field(&self, entity: &str, field: &str) -> QueryResult<(&'a Entity, &'a Field)> {
        let owner = self.schema.require_entity(entity)?;
        let field = self.schema.require_field(owner, field)?;
        if !field.is_multi_entity() {
            return Err(QueryError::invalid_relation(
                entity,
                &field.api_name,
                "not a multi-entity field",
            ));
        }
        Ok((owner, field))
    }
}

/// Split `existing` into rows to keep and delete, and collect the requested
/// links no row stores yet. Links match on `(type, id)`; duplicates in the
/// request collapse, duplicate rows beyond the first are deleted.
pub fn reconcile(
    existing: &[ExistingLink],
    requested: &[EntityRef],
) -> (Vec<ExistingLink>, Vec<ExistingLink>, Vec<EntityRef>) {
    let key = |r: &EntityRef| (r.entity_type.clone(), r.id);
    let mut wanted: Vec<(String, i64)> = Vec::new();
    let mut insert = Vec::new();
    for linked in requested {
        if !wanted.contains(&key(linked)) {
            wanted.push(key(linked));
            insert.push(EntityRef::new(&linked.entity_type, linked.id));
        }
    }

    let mut keep: Vec<ExistingLink> = Vec::new();
    let mut delete = Vec::new();
    for row in existing {
        let k = key(&row.linked);
        let already_kept = keep.iter().any(|kept| key(&kept.linked) == k);
        if wanted.contains(&k) && !already_kept {
            keep.push(row.clone());
        } else {
            delete.push(row.clone());
        }
    }
    insert.retain(|linked| !keep.iter().any(|kept| key(&kept.linked) == key(linked)));
    (keep, delete, insert)
}

fn unstored(owner: &Entity, field: &Field) -> QueryError {
    QueryError::invalid_relation(&owner.api_name, &field.api_name, "links are not stored anywhere")
}

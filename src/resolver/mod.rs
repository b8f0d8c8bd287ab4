//! Relationship resolver.
//!
//! Turns the raw schema sources into a [`Schema`] in which every link field is
//! either paired with its reverse, stored through a connection entity, or
//! explicitly one-sided.
//!
//! # Stages
//!
//! Each stage only touches fields the previous stages left unresolved:
//!
//! 1. [`conventions`] - naming conventions (`sequence` <-> `shots`)
//! 2. [`defaults`] - static table of well-known reverses and one-sided fields
//! 3. [`hints`] - explicit reverse metadata and declared connection entities
//! 4. [`display_names`] - display-name correlation for renamed fields
//! 5. [`connections`] - connection entity reuse or synthesis
//! 6. validation - orphan diagnostics and entity name fields
//!
//! Fields and entities are always visited in name order, so two runs over the
//! same sources produce the same graph.

pub mod connections;
pub mod conventions;
pub mod defaults;
mod diagnostics;
pub mod display_names;
pub mod hints;
pub mod rules;

pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};

use std::collections::{BTreeSet, HashSet};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{Settings, SettingsError};
use crate::schema::{
    Entity, EntityId, Field, FieldId, Link, OneToManyLink, Schema, SchemaSources, TypedField,
    IDENTITY_FIELD,
};

/// A resolved schema together with everything the resolver had to report.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// Returns only the warning diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}

/// Infers the complete relationship graph of a schema.
#[derive(Debug, Clone)]
pub struct RelationshipResolver {
    settings: Settings,
    renamed: Vec<Regex>,
}

impl RelationshipResolver {
    pub fn new(settings: &Settings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            renamed: settings.resolver.renamed_patterns()?,
            settings: settings.clone(),
        })
    }

    /// Run every stage over the sources and return the frozen schema.
    pub fn resolve(&self, sources: &SchemaSources) -> Resolution {
        let mut ctx = ResolutionContext::new(sources, &self.settings, &self.renamed);

        let links = conventions::run(&mut ctx);
        debug!(stage = "conventions", links, "resolver stage complete");
        let links = defaults::run(&mut ctx);
        debug!(stage = "defaults", links, "resolver stage complete");
        let links = hints::run(&mut ctx);
        debug!(stage = "hints", links, "resolver stage complete");
        let links = display_names::run(&mut ctx);
        debug!(stage = "display_names", links, "resolver stage complete");
        let links = connections::run(&mut ctx);
        debug!(stage = "connections", links, "resolver stage complete");
        ctx.validate();
        ctx.assign_name_fields();

        for diagnostic in &ctx.diagnostics {
            match diagnostic.severity {
                Severity::Warning => warn!(
                    kind = diagnostic.kind.as_str(),
                    entity = %diagnostic.entity,
                    field = %diagnostic.field,
                    "{}",
                    diagnostic.message
                ),
                Severity::Info => debug!(
                    kind = diagnostic.kind.as_str(),
                    entity = %diagnostic.entity,
                    field = %diagnostic.field,
                    "{}",
                    diagnostic.message
                ),
            }
        }
        info!(
            entities = ctx.schema.len(),
            synthesized = ctx.schema.entities().filter(|e| !e.real).count(),
            diagnostics = ctx.diagnostics.len(),
            "schema resolved"
        );

        Resolution {
            schema: ctx.schema,
            diagnostics: ctx.diagnostics,
        }
    }
}

/// Mutable state shared by the stages of one resolution run.
pub(crate) struct ResolutionContext<'a> {
    pub(crate) schema: Schema,
    pub(crate) sources: &'a SchemaSources,
    pub(crate) settings: &'a Settings,
    pub(crate) renamed: &'a [Regex],
    /// Multi-entity fields found to be reverses of each other; they share a
    /// connection entity built in the connections stage.
    pub(crate) pending: Vec<(FieldId, FieldId)>,
    pub(crate) claimed: HashSet<FieldId>,
    pub(crate) connection_entities: BTreeSet<EntityId>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'a> ResolutionContext<'a> {
    pub(crate) fn new(sources: &'a SchemaSources, settings: &'a Settings, renamed: &'a [Regex]) -> Self {
        let schema = build_schema(sources);
        let connection_entities = detect_connection_entities(&schema, sources);
        Self {
            schema,
            sources,
            settings,
            renamed,
            pending: Vec::new(),
            claimed: HashSet::new(),
            connection_entities,
            diagnostics: Vec::new(),
        }
    }

    /// Link-capable fields of non-connection entities, ordered by
    /// `(entity, field)` name.
    pub(crate) fn link_fields(&self) -> Vec<FieldId> {
        let mut ids: Vec<(&str, &str, FieldId)> = self
            .schema
            .entities()
            .filter(|e| !self.connection_entities.contains(&e.id()))
            .flat_map(|e| {
                self.schema
                    .fields_of(e)
                    .filter(|f| f.link_kind().is_some())
                    .map(move |f| (e.api_name.as_str(), f.api_name.as_str(), f.id()))
            })
            .collect();
        ids.sort();
        ids.into_iter().map(|(_, _, id)| id).collect()
    }

    pub(crate) fn field(&self, id: FieldId) -> &Field {
        self.schema.field(id)
    }

    pub(crate) fn owner(&self, id: FieldId) -> &Entity {
        self.schema.owner(id)
    }

    pub(crate) fn field_on(&self, entity: &str, field: &str) -> Option<FieldId> {
        self.schema.entity(entity)?.field_id(field)
    }

    pub(crate) fn is_connection_field(&self, id: FieldId) -> bool {
        self.connection_entities.contains(&self.field(id).entity())
    }

    /// Unresolved and not yet promised to a connection.
    pub(crate) fn is_open(&self, id: FieldId) -> bool {
        self.field(id).is_unresolved() && !self.claimed.contains(&id) && !self.is_connection_field(id)
    }

    /// A single-entity field that may still gain children.
    fn can_parent(&self, id: FieldId) -> bool {
        let field = self.field(id);
        field.is_single_entity()
            && !field.is_one_sided()
            && !self.is_connection_field(id)
            && match field.link() {
                None => true,
                Some(link) => matches!(link, Link::OneToMany(_)),
            }
    }

    /// Whether `a` and `b` could be linked as reverses of each other.
    pub(crate) fn can_pair(&self, a: FieldId, b: FieldId) -> bool {
        if a == b {
            return false;
        }
        let (fa, fb) = (self.field(a), self.field(b));
        if !fa.accepts(&self.owner(b).api_name) || !fb.accepts(&self.owner(a).api_name) {
            return false;
        }
        match (fa.is_single_entity(), fb.is_single_entity()) {
            (true, false) => self.can_parent(a) && self.is_open(b),
            (false, true) => self.is_open(a) && self.can_parent(b),
            (false, false) => self.is_open(a) && self.is_open(b),
            (true, true) => false,
        }
    }

    /// Link two reverse fields. Returns false (and changes nothing) when they
    /// cannot be paired.
    pub(crate) fn pair(&mut self, a: FieldId, b: FieldId) -> bool {
        if !self.can_pair(a, b) {
            return false;
        }
        match (self.field(a).is_single_entity(), self.field(b).is_single_entity()) {
            (true, false) => self.attach_child(a, b),
            (false, true) => self.attach_child(b, a),
            _ => {
                self.claimed.insert(a);
                self.claimed.insert(b);
                self.pending.push((a, b));
            }
        }
        true
    }

    /// Add `child` to the one-to-many link of `parent`, keeping the same link
    /// value on the parent and every child.
    fn attach_child(&mut self, parent: FieldId, child: FieldId) {
        let mut children = match self.field(parent).link() {
            Some(Link::OneToMany(o2m)) => o2m.children.clone(),
            _ => Vec::new(),
        };
        children.push(child);
        children.sort_by_key(|c| self.schema.qualified_name(*c));
        children.dedup();

        let link = Link::OneToMany(OneToManyLink {
            parent,
            children: children.clone(),
        });
        self.schema.set_link(parent, link.clone());
        for c in children {
            self.schema.set_link(c, link.clone());
        }
    }

    /// Stage 6: every link field outside connection entities must now be
    /// linked or one-sided.
    fn validate(&mut self) {
        for id in self.link_fields() {
            let field = self.field(id);
            if !field.is_linked() && !field.is_one_sided() {
                let diagnostic = Diagnostic::orphan(&self.owner(id).api_name, &field.api_name);
                if !self.diagnostics.contains(&diagnostic) {
                    self.diagnostics.push(diagnostic);
                }
            }
        }
    }

    fn assign_name_fields(&mut self) {
        let names = &self.settings.query.name_fields;
        let assignments: Vec<(EntityId, Option<FieldId>)> = self
            .schema
            .entities()
            .map(|e| (e.id(), names.iter().find_map(|name| e.field_id(name))))
            .collect();
        for (entity, name_field) in assignments {
            self.schema.entity_mut(entity).name_field = name_field;
        }
    }
}

/// Build the unresolved schema from the primary source.
fn build_schema(sources: &SchemaSources) -> Schema {
    let mut schema = Schema::new();
    for entity_source in sources.primary.entities.values() {
        let entity = schema.add_entity(
            &entity_source.api_name,
            &entity_source.display_name,
            true,
        );
        schema.entity_mut(entity).visible = entity_source.visible;
        if !entity_source.fields.contains_key(IDENTITY_FIELD) {
            schema.add_field(entity, Field::identity());
        }

        for field_source in entity_source.fields.values() {
            let mut data = field_source.data.clone();
            if let TypedField::Link { properties, .. } = &mut data {
                if let Some(join) = sources
                    .hints
                    .field(&entity_source.api_name, &field_source.api_name)
                    .and_then(|h| h.through_join_entity_type.as_ref())
                {
                    properties.join_entity = Some(join.clone());
                }
            }
            let mut field = Field::new(&field_source.api_name, &field_source.display_name, data);
            field.mandatory = field_source.mandatory;
            field.editable = field_source.editable;
            field.unique = field_source.unique;
            field.properties = field_source.properties.clone();
            schema.add_field(entity, field);
        }
    }
    schema
}

/// Entities named `*Connection` plus every declared join entity.
fn detect_connection_entities(schema: &Schema, sources: &SchemaSources) -> BTreeSet<EntityId> {
    let mut found: BTreeSet<EntityId> = schema
        .entities()
        .filter(|e| e.api_name.ends_with("Connection"))
        .map(|e| e.id())
        .collect();
    for (entity, field, hint) in sources.hints.iter() {
        if let Some(join) = &hint.through_join_entity_type {
            match schema.entity_id(join) {
                Some(id) => {
                    found.insert(id);
                }
                None => debug!(entity, field, join = %join, "declared join entity not in schema"),
            }
        }
    }
    found
}

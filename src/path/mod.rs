//! Field path resolver.
//!
//! A dot-path alternates field and entity-type tokens and always ends in a
//! field: `sg_task.Task.step.Step.code`. Every `field.EntityType` pair is one
//! hop to a linked row; the last token is read on the row the final hop
//! reaches.
//!
//! ```text
//! single-entity  prev.F_id / prev.F_type            -> target.id
//! multi-entity   prev.id -> conn.this_id/_type      -> target.id = conn.other_id
//! reverse        prev.id -> target.P_id / P_type    (P = single-entity parent on target)
//! ```
//!
//! The resolver is pure with respect to the schema; all per-query state is
//! the [`AliasGenerator`] passed in by the caller.

mod alias;
mod plan;

pub use alias::AliasGenerator;
pub use plan::{Hop, HopKind, MultiEntityRead, Terminal, TraversalPlan, TypeSource};

use crate::config::QuerySettings;
use crate::error::{QueryError, QueryResult};
use crate::expr::{and, table_col, ColumnRef, Expr, ExprExt, Join};
use crate::schema::{Entity, Field, Link, Schema, IDENTITY_FIELD};

/// A dot-path split into its field and entity-type tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTokens<'p> {
    /// `(field, entity type)` pairs walked in order.
    pub hops: Vec<(&'p str, &'p str)>,
    pub terminal: &'p str,
}

impl<'p> PathTokens<'p> {
    /// Validate the shape of `path` without looking at the schema.
    pub fn parse(path: &'p str, max_depth: usize) -> QueryResult<Self> {
        let tokens: Vec<&str> = path.split('.').collect();
        if tokens.iter().any(|t| t.trim().is_empty()) {
            return Err(QueryError::invalid_path(path, "empty segment"));
        }
        if tokens.len() % 2 == 0 {
            return Err(QueryError::invalid_path(
                path,
                "expected alternating field and entity tokens ending in a field",
            ));
        }
        let depth = tokens.len() / 2 + 1;
        if depth > max_depth {
            return Err(QueryError::invalid_path(
                path,
                format!("{depth} fields exceed the maximum depth of {max_depth}"),
            ));
        }
        let hops = tokens[..tokens.len() - 1]
            .chunks(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        Ok(Self {
            hops,
            terminal: tokens[tokens.len() - 1],
        })
    }

    /// The path up to and including hop `n` (`field.Type`), used as a key
    /// for sharing joins between paths.
    pub fn prefix(&self, n: usize) -> String {
        self.hops[..=n]
            .iter()
            .map(|(field, entity)| format!("{field}.{entity}"))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Resolves dot-paths against a frozen schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldPathResolver<'a> {
    schema: &'a Schema,
    settings: &'a QuerySettings,
}

impl<'a> FieldPathResolver<'a> {
    pub fn new(schema: &'a Schema, settings: &'a QuerySettings) -> Self {
        Self { schema, settings }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn settings(&self) -> &'a QuerySettings {
        self.settings
    }

    /// Resolve `path` starting from the row `base_alias` of `base`.
    pub fn resolve(
        &self,
        base: &str,
        base_alias: &str,
        path: &str,
        aliases: &mut AliasGenerator,
    ) -> QueryResult<TraversalPlan> {
        let tokens = PathTokens::parse(path, self.settings.max_path_depth)?;
        let mut entity = self.schema.require_entity(base)?;
        let mut alias = base_alias.to_string();
        let mut hops = Vec::with_capacity(tokens.hops.len());

        for (field_name, target) in &tokens.hops {
            let hop = self.hop(entity, &alias, field_name, target, aliases)?;
            entity = self.schema.require_entity(&hop.target)?;
            alias = hop.alias.clone();
            hops.push(hop);
        }

        let terminal = self.terminal(entity, &alias, tokens.terminal, aliases)?;
        tracing::trace!(base, path, hops = hops.len(), "resolved field path");
        Ok(TraversalPlan {
            path: path.to_string(),
            base: base.to_string(),
            root_alias: base_alias.to_string(),
            hops,
            entity: entity.api_name.clone(),
            alias,
            terminal,
        })
    }

    /// One `field.Target` hop from the row `from_alias` of `entity`.
    pub fn hop(
        &self,
        entity: &Entity,
        from_alias: &str,
        field_name: &str,
        target: &str,
        aliases: &mut AliasGenerator,
    ) -> QueryResult<Hop> {
        let field = self.schema.require_field(entity, field_name)?;
        let target_entity = self.schema.require_entity(target)?;
        if field.link_kind().is_none() {
            return Err(QueryError::invalid_relation(
                &entity.api_name,
                field_name,
                "not a link field, cannot traverse further",
            ));
        }
        if !field.accepts(target) {
            return Err(QueryError::invalid_relation(
                &entity.api_name,
                field_name,
                format!("'{target}' is not a valid target type"),
            ));
        }
        let retired = &self.settings.retired_column;

        if field.is_single_entity() {
            let alias = aliases.next_alias();
            let on = and(vec![
                table_col(&alias, IDENTITY_FIELD).eq(table_col(from_alias, &field.id_column())),
                table_col(from_alias, &field.type_column()).eq(target),
            ]);
            return Ok(Hop {
                field: field.id(),
                field_name: field_name.to_string(),
                from_alias: from_alias.to_string(),
                target: target.to_string(),
                alias: alias.clone(),
                kind: HopKind::SingleEntity,
                joins: vec![Join::new(target, &alias, on)],
            });
        }

        match field.link() {
            Some(Link::ManyToMany(m2m)) => {
                let (this, other) = m2m.endpoints_for(field.id()).ok_or_else(|| {
                    QueryError::invalid_relation(&entity.api_name, field_name, "connection does not include this field")
                })?;
                let (this, other) = (self.schema.field(this), self.schema.field(other));
                let connection = &self.schema.entity_at(m2m.connection).api_name;

                let conn_alias = aliases.next_alias();
                let conn_on = and(vec![
                    table_col(&conn_alias, &this.id_column()).eq(table_col(from_alias, IDENTITY_FIELD)),
                    table_col(&conn_alias, &this.type_column()).eq(entity.api_name.as_str()),
                    table_col(&conn_alias, retired).eq(false),
                ]);
                let alias = aliases.next_alias();
                let target_on = and(vec![
                    table_col(&alias, IDENTITY_FIELD).eq(table_col(&conn_alias, &other.id_column())),
                    table_col(&conn_alias, &other.type_column()).eq(target),
                ]);
                Ok(Hop {
                    field: field.id(),
                    field_name: field_name.to_string(),
                    from_alias: from_alias.to_string(),
                    target: target.to_string(),
                    alias: alias.clone(),
                    kind: HopKind::Connection {
                        connection: connection.clone(),
                    },
                    joins: vec![
                        Join::new(connection, &conn_alias, conn_on),
                        Join::new(target, &alias, target_on),
                    ],
                })
            }
            Some(Link::OneToMany(o2m)) => {
                let parent = self.schema.field(o2m.parent);
                let parent_owner = &self.schema.owner(o2m.parent).api_name;
                if parent_owner != target {
                    return Err(QueryError::invalid_relation(
                        &entity.api_name,
                        field_name,
                        format!("reverse field lives on '{parent_owner}', not '{target}'"),
                    ));
                }
                let alias = aliases.next_alias();
                let on = self.reverse_condition(&alias, parent, from_alias, &entity.api_name);
                Ok(Hop {
                    field: field.id(),
                    field_name: field_name.to_string(),
                    from_alias: from_alias.to_string(),
                    target: target.to_string(),
                    alias: alias.clone(),
                    kind: HopKind::Reverse {
                        parent_field: parent.api_name.clone(),
                    },
                    joins: vec![Join::new(target, &alias, on)],
                })
            }
            _ => Err(unlinked(entity, field)),
        }
    }

    /// Read `field_name` on the row `alias` of `entity`.
    pub fn terminal(
        &self,
        entity: &Entity,
        alias: &str,
        field_name: &str,
        aliases: &mut AliasGenerator,
    ) -> QueryResult<Terminal> {
        let field = self.schema.require_field(entity, field_name)?;
        if field.is_single_entity() {
            return Ok(Terminal::EntityLink {
                field: field.id(),
                id: ColumnRef::new(alias, &field.id_column()),
                entity_type: ColumnRef::new(alias, &field.type_column()),
                name: ColumnRef::new(alias, &field.name_column()),
            });
        }
        if !field.is_multi_entity() {
            return Ok(Terminal::Column {
                field: field.id(),
                column: ColumnRef::new(alias, field_name),
            });
        }
        self.multi_entity_read(entity, alias, field, aliases)
            .map(Terminal::MultiEntity)
    }

    /// The connection or reverse table join of a multi-entity field, with the
    /// columns describing each linked entity.
    pub fn multi_entity_read(
        &self,
        entity: &Entity,
        alias: &str,
        field: &Field,
        aliases: &mut AliasGenerator,
    ) -> QueryResult<MultiEntityRead> {
        let retired = &self.settings.retired_column;
        match field.link() {
            Some(Link::ManyToMany(m2m)) => {
                let (this, other) = m2m
                    .endpoints_for(field.id())
                    .ok_or_else(|| unlinked(entity, field))?;
                let (this, other) = (self.schema.field(this), self.schema.field(other));
                let connection = &self.schema.entity_at(m2m.connection).api_name;
                let conn_alias = aliases.next_alias();
                let on = and(vec![
                    table_col(&conn_alias, &this.id_column()).eq(table_col(alias, IDENTITY_FIELD)),
                    table_col(&conn_alias, &this.type_column()).eq(entity.api_name.as_str()),
                    table_col(&conn_alias, retired).eq(false),
                ]);
                Ok(MultiEntityRead {
                    field: field.id(),
                    join: Join::new(connection, &conn_alias, on),
                    id: ColumnRef::new(&conn_alias, &other.id_column()),
                    entity_type: TypeSource::Column(ColumnRef::new(&conn_alias, &other.type_column())),
                    name: Some(ColumnRef::new(&conn_alias, &other.name_column())),
                })
            }
            Some(Link::OneToMany(o2m)) if o2m.parent != field.id() => {
                let parent = self.schema.field(o2m.parent);
                let reverse_entity = self.schema.owner(o2m.parent);
                let reverse_alias = aliases.next_alias();
                let on = self.reverse_condition(&reverse_alias, parent, alias, &entity.api_name);
                Ok(MultiEntityRead {
                    field: field.id(),
                    join: Join::new(&reverse_entity.api_name, &reverse_alias, on),
                    id: ColumnRef::new(&reverse_alias, IDENTITY_FIELD),
                    entity_type: TypeSource::Literal(reverse_entity.api_name.clone()),
                    name: reverse_entity
                        .name_field()
                        .map(|id| ColumnRef::new(&reverse_alias, &self.schema.field(id).api_name)),
                })
            }
            _ => Err(unlinked(entity, field)),
        }
    }

    /// `child.P_id = parent.id AND child.P_type = 'Entity' AND NOT retired`.
    fn reverse_condition(
        &self,
        child_alias: &str,
        parent_field: &Field,
        parent_alias: &str,
        parent_entity: &str,
    ) -> Expr {
        and(vec![
            table_col(child_alias, &parent_field.id_column()).eq(table_col(parent_alias, IDENTITY_FIELD)),
            table_col(child_alias, &parent_field.type_column()).eq(parent_entity),
            table_col(child_alias, &self.settings.retired_column).eq(false),
        ])
    }
}

fn unlinked(entity: &Entity, field: &Field) -> QueryError {
    QueryError::invalid_relation(
        &entity.api_name,
        &field.api_name,
        "multi-entity field has no resolved link",
    )
}

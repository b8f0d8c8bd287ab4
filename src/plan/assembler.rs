//! Query plan assembly.
//!
//! A [`QueryPlan`] is everything a backend needs to answer one find request:
//! the root entity, left joins for dotted return fields and order terms, the
//! compiled predicate, the columns to read and paging. Joins are keyed by
//! their path prefix so `sg_task.Task.content` and `sg_task.Task.step.Step.code`
//! share the join to `Task`.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::request::{FindRequest, SortDirection};
use crate::config::QuerySettings;
use crate::error::{QueryError, QueryResult};
use crate::expr::{and, table_col, ColumnRef, Expr, ExprExt, Join};
use crate::filter::{Clock, FilterCompiler};
use crate::path::{AliasGenerator, FieldPathResolver, PathTokens, Terminal};
use crate::schema::{Entity, Schema, IDENTITY_FIELD};

/// Where a returned value comes from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColumnSource {
    /// The root row's identity.
    Id(ColumnRef),
    /// The literal entity type name.
    EntityType(String),
    /// A (possibly dotted) field read.
    Read(Terminal),
}

/// One value of every returned record, keyed by the requested path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanColumn {
    pub key: String,
    pub source: ColumnSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOrder {
    pub path: String,
    pub column: ColumnRef,
    pub direction: SortDirection,
}

/// The contract handed to a storage backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    pub entity: String,
    pub root_alias: String,
    /// Left joins in path order. A join that crosses a multi-entity hop
    /// can match several rows; the backend reads the first one.
    pub joins: Vec<Join>,
    pub predicate: Expr,
    pub columns: Vec<PlanColumn>,
    pub order: Vec<PlanOrder>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub retired_only: bool,
    /// Forwarded to the backend untouched.
    pub include_archived_projects: bool,
}

impl QueryPlan {
    pub fn column(&self, key: &str) -> Option<&PlanColumn> {
        self.columns.iter().find(|c| c.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.key.as_str())
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.keys().collect();
        writeln!(f, "SELECT {}", keys.join(", "))?;
        writeln!(f, "FROM {} {}", self.entity, self.root_alias)?;
        for join in &self.joins {
            writeln!(f, "{join}")?;
        }
        writeln!(f, "WHERE {}", self.predicate)?;
        let order: Vec<String> = self
            .order
            .iter()
            .map(|o| {
                let direction = match o.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("{} {direction}", o.column)
            })
            .collect();
        write!(f, "ORDER BY {}", order.join(", "))?;
        if let Some(limit) = self.limit {
            write!(f, "\nLIMIT {limit}")?;
        }
        if self.offset > 0 {
            write!(f, "\nOFFSET {}", self.offset)?;
        }
        Ok(())
    }
}

/// Turns find requests into query plans.
pub struct QueryPlanner<'a> {
    schema: &'a Schema,
    settings: &'a QuerySettings,
    clock: &'a dyn Clock,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(schema: &'a Schema, settings: &'a QuerySettings, clock: &'a dyn Clock) -> Self {
        Self {
            schema,
            settings,
            clock,
        }
    }

    pub fn plan(&self, request: &FindRequest) -> QueryResult<QueryPlan> {
        let entity = self.schema.require_entity(&request.entity_type)?;
        let mut aliases = AliasGenerator::new();
        let root = aliases.next_alias();
        let mut joins = JoinTree::new(FieldPathResolver::new(self.schema, self.settings), &root);

        let mut columns = vec![
            PlanColumn {
                key: IDENTITY_FIELD.to_string(),
                source: ColumnSource::Id(ColumnRef::new(&root, IDENTITY_FIELD)),
            },
            PlanColumn {
                key: "type".to_string(),
                source: ColumnSource::EntityType(entity.api_name.clone()),
            },
        ];
        for path in &request.fields {
            if columns.iter().any(|c| &c.key == path) {
                continue;
            }
            let terminal = joins.read(entity, path, &mut aliases)?;
            columns.push(PlanColumn {
                key: path.clone(),
                source: ColumnSource::Read(terminal),
            });
        }

        let mut order = Vec::with_capacity(request.order.len().max(1));
        for term in &request.order {
            let column = match joins.read(entity, &term.field_name, &mut aliases)? {
                Terminal::Column { column, .. } => column,
                Terminal::EntityLink { name, .. } => name,
                Terminal::MultiEntity(read) => {
                    let field = self.schema.field(read.field);
                    return Err(QueryError::invalid_relation(
                        &self.schema.owner(read.field).api_name,
                        &field.api_name,
                        "cannot order by a multi-entity field",
                    ));
                }
            };
            order.push(PlanOrder {
                path: term.field_name.clone(),
                column,
                direction: term.direction,
            });
        }
        if order.is_empty() {
            order.push(PlanOrder {
                path: IDENTITY_FIELD.to_string(),
                column: ColumnRef::new(&root, IDENTITY_FIELD),
                direction: SortDirection::Asc,
            });
        }

        let filter = request.filter_expr()?;
        let compiled = FilterCompiler::new(self.schema, self.settings, self.clock).compile(
            &entity.api_name,
            &root,
            &filter,
            &mut aliases,
        )?;
        let predicate = and(vec![
            table_col(&root, &self.settings.retired_column).eq(request.retired_only),
            compiled.predicate,
        ]);

        let plan = QueryPlan {
            entity: entity.api_name.clone(),
            root_alias: root,
            joins: joins.into_joins(),
            predicate,
            columns,
            order,
            limit: (request.limit > 0).then_some(request.limit),
            offset: request.offset(),
            retired_only: request.retired_only,
            include_archived_projects: request.include_archived_projects,
        };
        tracing::trace!(
            entity = %plan.entity,
            joins = plan.joins.len(),
            columns = plan.columns.len(),
            filter_leaves = compiled.leaves,
            "planned query"
        );
        Ok(plan)
    }
}

/// Joins planned so far, keyed by path prefix.
struct JoinTree<'a> {
    paths: FieldPathResolver<'a>,
    root: String,
    joins: Vec<Join>,
    /// `field.Type[.field.Type...]` -> alias of the row it reaches.
    reached: HashMap<String, String>,
}

impl<'a> JoinTree<'a> {
    fn new(paths: FieldPathResolver<'a>, root: &str) -> Self {
        Self {
            paths,
            root: root.to_string(),
            joins: Vec::new(),
            reached: HashMap::new(),
        }
    }

    /// Plan the joins of `path` (reusing known prefixes) and return its
    /// terminal read.
    fn read(&mut self, base: &Entity, path: &str, aliases: &mut AliasGenerator) -> QueryResult<Terminal> {
        let schema = self.paths.schema();
        let tokens = PathTokens::parse(path, self.paths.settings().max_path_depth)?;
        let mut entity = base;
        let mut alias = self.root.clone();
        for (n, (field, target)) in tokens.hops.iter().enumerate() {
            let prefix = tokens.prefix(n);
            alias = match self.reached.get(&prefix) {
                Some(known) => known.clone(),
                None => {
                    let hop = self.paths.hop(entity, &alias, field, target, aliases)?;
                    self.joins.extend(hop.joins.iter().cloned());
                    self.reached.insert(prefix, hop.alias.clone());
                    hop.alias
                }
            };
            entity = schema.require_entity(target)?;
        }
        self.paths.terminal(entity, &alias, tokens.terminal, aliases)
    }

    fn into_joins(self) -> Vec<Join> {
        self.joins
    }
}

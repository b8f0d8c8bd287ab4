//! Filter compiler: [`FilterExpr`] trees to [`Expr`] predicates.
//!
//! Leaves are compiled against the row of the entity they apply to. Dotted
//! leaves walk the path one hop at a time and wrap the terminal predicate in
//! one correlated EXISTS per join, so a filter never widens the row set of
//! the query it belongs to. Negative operators compile their positive
//! counterpart and wrap the whole result in NOT; on scalar and single-entity
//! fields the value must still be present, so null rows never match.

use serde_json::Value;

use super::grammar::FilterExpr;
use super::ops::{allowed_operators, FilterOperator, GroupOperator};
use super::time::{calendar_window, relative_window, CalendarUnit, Clock, Direction, Window};
use super::values::ValueCoercer;
use crate::config::QuerySettings;
use crate::error::{QueryError, QueryResult};
use crate::expr::{and, not, or, ColumnRef, CompareOp, Expr, ExprExt, LikeKind, Literal};
use crate::path::{AliasGenerator, FieldPathResolver, MultiEntityRead, PathTokens, TypeSource};
use crate::schema::{Entity, Field, FieldType, Schema};

/// A compiled filter tree.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    /// Predicate over the root row; `Expr::True` for an empty filter.
    pub predicate: Expr,
    pub leaves: usize,
}

/// Compiles filters against a resolved schema.
pub struct FilterCompiler<'a> {
    paths: FieldPathResolver<'a>,
    clock: &'a dyn Clock,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(schema: &'a Schema, settings: &'a QuerySettings, clock: &'a dyn Clock) -> Self {
        Self {
            paths: FieldPathResolver::new(schema, settings),
            clock,
        }
    }

    /// Compile `filter` against rows of `entity` bound to `root_alias`.
    pub fn compile(
        &self,
        entity: &str,
        root_alias: &str,
        filter: &FilterExpr,
        aliases: &mut AliasGenerator,
    ) -> QueryResult<CompiledFilter> {
        let entity = self.paths.schema().require_entity(entity)?;
        let predicate = self.compile_expr(entity, root_alias, filter, aliases)?;
        Ok(CompiledFilter {
            predicate,
            leaves: filter.leaf_count(),
        })
    }

    fn compile_expr(
        &self,
        entity: &Entity,
        alias: &str,
        filter: &FilterExpr,
        aliases: &mut AliasGenerator,
    ) -> QueryResult<Expr> {
        match filter {
            FilterExpr::Leaf {
                path,
                operator,
                values,
            } => self.compile_leaf(entity, alias, path, *operator, values, aliases),
            FilterExpr::Group { filters, .. } if filters.is_empty() => Ok(Expr::True),
            FilterExpr::Group { op, filters } => {
                let compiled = filters
                    .iter()
                    .map(|f| self.compile_expr(entity, alias, f, aliases))
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(match op {
                    GroupOperator::All => and(compiled),
                    GroupOperator::Any => or(compiled),
                })
            }
        }
    }

    /// Compile one `[path, operator, values...]` leaf.
    pub fn compile_leaf(
        &self,
        entity: &Entity,
        alias: &str,
        path: &str,
        operator: FilterOperator,
        values: &[Value],
        aliases: &mut AliasGenerator,
    ) -> QueryResult<Expr> {
        let schema = self.paths.schema();
        let tokens = PathTokens::parse(path, self.paths.settings().max_path_depth)?;

        let mut hops = Vec::with_capacity(tokens.hops.len());
        let mut current = entity;
        let mut current_alias = alias.to_string();
        for (field, target) in &tokens.hops {
            let hop = self.paths.hop(current, &current_alias, field, target, aliases)?;
            current = schema.require_entity(&hop.target)?;
            current_alias = hop.alias.clone();
            hops.push(hop);
        }

        let field = schema.require_field(current, tokens.terminal)?;
        let coercer = ValueCoercer {
            entity: &current.api_name,
            field: &field.api_name,
            field_type: field.field_type(),
            operator,
        };
        if !allowed_operators(field.field_type()).contains(&operator) {
            return Err(unsupported(&coercer));
        }

        let positive = operator.negates().unwrap_or(operator);
        let inner = self.compile_field(current, &current_alias, field, positive, &coercer, values, aliases)?;
        let along_path = |expr: Expr| hops.iter().rev().fold(expr, |acc, hop| hop.wrap_exists(acc));
        let predicate = if !operator.is_negated() {
            along_path(inner)
        } else {
            match presence(field, &current_alias, positive, values) {
                Some(present) => and(vec![along_path(present), not(along_path(inner))]),
                None => not(along_path(inner)),
            }
        };

        tracing::trace!(
            entity = %entity.api_name,
            path,
            operator = %operator,
            hops = hops.len(),
            "compiled filter leaf"
        );
        Ok(predicate)
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_field(
        &self,
        entity: &Entity,
        alias: &str,
        field: &Field,
        op: FilterOperator,
        c: &ValueCoercer<'_>,
        values: &[Value],
        aliases: &mut AliasGenerator,
    ) -> QueryResult<Expr> {
        if field.is_single_entity() {
            let columns = EntityColumns {
                id: ColumnRef::new(alias, &field.id_column()),
                entity_type: ColumnRef::new(alias, &field.type_column()),
                name: ColumnRef::new(alias, &field.name_column()),
            };
            return entity_predicate(&columns, op, c, values);
        }
        if field.is_multi_entity() {
            let read = self.paths.multi_entity_read(entity, alias, field, aliases)?;
            return multi_entity_predicate(&read, op, c, values);
        }
        self.scalar_predicate(ColumnRef::new(alias, &field.api_name), op, c, values)
    }

    fn scalar_predicate(
        &self,
        column: ColumnRef,
        op: FilterOperator,
        c: &ValueCoercer<'_>,
        values: &[Value],
    ) -> QueryResult<Expr> {
        let present = column.clone().is_not_null();
        let predicate = match op {
            FilterOperator::Is => match c.literal(c.single(values)?)? {
                Literal::Null => return Ok(column.is_null()),
                literal => column.eq(literal),
            },
            FilterOperator::In => {
                let (nulls, literals): (Vec<_>, Vec<_>) = c
                    .literals(values)?
                    .into_iter()
                    .partition(|l| *l == Literal::Null);
                let matched = and(vec![present, column.clone().in_list(literals)]);
                return Ok(if nulls.is_empty() {
                    matched
                } else {
                    or(vec![matched, column.is_null()])
                });
            }
            FilterOperator::Contains => column.like(LikeKind::Contains, &c.text(c.single(values)?)?),
            FilterOperator::StartsWith => {
                column.like(LikeKind::StartsWith, &c.text(c.single(values)?)?)
            }
            FilterOperator::EndsWith => column.like(LikeKind::EndsWith, &c.text(c.single(values)?)?),
            FilterOperator::GreaterThan | FilterOperator::LessThan => {
                let bound = match c.literal(c.single(values)?)? {
                    Literal::Null => return Err(c.error("cannot compare against null")),
                    literal => literal,
                };
                let cmp = if op == FilterOperator::GreaterThan {
                    CompareOp::Gt
                } else {
                    CompareOp::Lt
                };
                column.compare(cmp, bound)
            }
            FilterOperator::Between => {
                let (low, high) = c.pair(values)?;
                and(vec![
                    bounded(&column, CompareOp::Gte, c.literal(low)?),
                    bounded(&column, CompareOp::Lte, c.literal(high)?),
                ])
            }
            FilterOperator::InLast | FilterOperator::InNext => {
                let (amount, unit) = c.relative(values)?;
                let direction = if op == FilterOperator::InLast {
                    Direction::Past
                } else {
                    Direction::Future
                };
                let window = relative_window(self.clock.now(), amount, unit, direction)
                    .ok_or_else(|| c.error("time window out of range"))?;
                window_predicate(&column, c.field_type, window, direction)
            }
            FilterOperator::InCalendarDay
            | FilterOperator::InCalendarWeek
            | FilterOperator::InCalendarMonth
            | FilterOperator::InCalendarYear => {
                let unit = match op {
                    FilterOperator::InCalendarDay => CalendarUnit::Day,
                    FilterOperator::InCalendarWeek => CalendarUnit::Week,
                    FilterOperator::InCalendarMonth => CalendarUnit::Month,
                    _ => CalendarUnit::Year,
                };
                let offset = c.integer(c.single(values)?)?;
                let window = calendar_window(unit, offset, self.clock.now())
                    .ok_or_else(|| c.error("calendar offset out of range"))?;
                inclusive(&column, c.field_type, window)
            }
            _ => return Err(unsupported(c)),
        };
        Ok(and(vec![present, predicate]))
    }
}

/// The value a negated leaf still requires to be present, so null rows stay
/// excluded. `None` when the leaf tests presence itself (`is_not null`,
/// `type_is_not null`) or ranges over a multi-entity field.
fn presence(field: &Field, alias: &str, positive: FilterOperator, values: &[Value]) -> Option<Expr> {
    if field.is_multi_entity() {
        return None;
    }
    let tests_null = matches!(positive, FilterOperator::Is | FilterOperator::TypeIs)
        && matches!(values, [Value::Null]);
    if tests_null {
        return None;
    }
    let column = if field.is_single_entity() {
        match positive {
            FilterOperator::Is | FilterOperator::In => field.id_column(),
            FilterOperator::TypeIs => field.type_column(),
            _ => field.name_column(),
        }
    } else {
        field.api_name.clone()
    };
    Some(ColumnRef::new(alias, &column).is_not_null())
}

/// Shadow columns of a single-entity field.
struct EntityColumns {
    id: ColumnRef,
    entity_type: ColumnRef,
    name: ColumnRef,
}

fn entity_predicate(
    columns: &EntityColumns,
    op: FilterOperator,
    c: &ValueCoercer<'_>,
    values: &[Value],
) -> QueryResult<Expr> {
    let linked = columns.id.clone().is_not_null();
    match op {
        FilterOperator::Is => match c.single(values)? {
            Value::Null => Ok(columns.id.clone().is_null()),
            value => {
                let target = c.entity_ref(value)?;
                Ok(and(vec![
                    linked,
                    columns.id.clone().eq(target.id),
                    columns.entity_type.clone().eq(target.entity_type.as_str()),
                ]))
            }
        },
        FilterOperator::In => {
            let arms = c
                .entity_refs(values)?
                .into_iter()
                .map(|target| match target {
                    None => columns.id.clone().is_null(),
                    Some(target) => and(vec![
                        linked.clone(),
                        columns.id.clone().eq(target.id),
                        columns.entity_type.clone().eq(target.entity_type.as_str()),
                    ]),
                })
                .collect();
            Ok(or(arms))
        }
        FilterOperator::TypeIs => match c.single(values)? {
            Value::Null => Ok(columns.entity_type.clone().is_null()),
            value => Ok(and(vec![
                columns.entity_type.clone().is_not_null(),
                columns.entity_type.clone().eq(c.text(value)?.as_str()),
            ])),
        },
        _ => {
            let name = name_predicate(&columns.name, op, c, values)?;
            Ok(and(vec![columns.name.clone().is_not_null(), name]))
        }
    }
}

/// Multi-entity predicates are existence checks over the connection or
/// reverse rows of the field.
fn multi_entity_predicate(
    read: &MultiEntityRead,
    op: FilterOperator,
    c: &ValueCoercer<'_>,
    values: &[Value],
) -> QueryResult<Expr> {
    match op {
        // `is` with a list, and `contains` on addressing, behave as `in`
        FilterOperator::Is | FilterOperator::Contains | FilterOperator::In => {
            if values.is_empty() {
                return Err(c.error("missing value"));
            }
            let mut wants_none = false;
            let mut arms = Vec::new();
            for target in c.entity_refs(values)? {
                match target {
                    None => wants_none = true,
                    Some(target) => arms.push(and(vec![
                        read.id.clone().eq(target.id),
                        type_matches(read, &target.entity_type),
                    ])),
                }
            }
            let mut matched = Vec::new();
            if !arms.is_empty() {
                matched.push(read.join.exists(or(arms)));
            }
            if wants_none {
                matched.push(not(read.join.exists(Expr::True)));
            }
            Ok(or(matched))
        }
        FilterOperator::TypeIs => {
            let entity_type = c.text(c.single(values)?)?;
            Ok(read.join.exists(type_matches(read, &entity_type)))
        }
        _ => {
            let Some(name) = &read.name else {
                return Err(QueryError::invalid_relation(
                    c.entity,
                    c.field,
                    "linked entities have no name field",
                ));
            };
            let predicate = name_predicate(name, op, c, values)?;
            Ok(read.join.exists(and(vec![name.clone().is_not_null(), predicate])))
        }
    }
}

fn type_matches(read: &MultiEntityRead, entity_type: &str) -> Expr {
    match &read.entity_type {
        TypeSource::Column(column) => column.clone().eq(entity_type),
        TypeSource::Literal(literal) if literal == entity_type => Expr::True,
        TypeSource::Literal(_) => Expr::False,
    }
}

fn name_predicate(
    name: &ColumnRef,
    op: FilterOperator,
    c: &ValueCoercer<'_>,
    values: &[Value],
) -> QueryResult<Expr> {
    let kind = match op {
        FilterOperator::NameIs => {
            return Ok(name.clone().eq(c.text(c.single(values)?)?.as_str()));
        }
        FilterOperator::NameContains => LikeKind::Contains,
        FilterOperator::NameStartsWith => LikeKind::StartsWith,
        FilterOperator::NameEndsWith => LikeKind::EndsWith,
        _ => return Err(unsupported(c)),
    };
    Ok(name.clone().like(kind, &c.text(c.single(values)?)?))
}

/// One side of a range; a null bound leaves that side open.
fn bounded(column: &ColumnRef, op: CompareOp, bound: Literal) -> Expr {
    match bound {
        Literal::Null => Expr::True,
        bound => column.clone().compare(op, bound),
    }
}

fn window_predicate(column: &ColumnRef, field_type: FieldType, window: Window, direction: Direction) -> Expr {
    if field_type == FieldType::Date {
        return inclusive(column, field_type, window);
    }
    let (start, end) = (Literal::DateTime(window.start), Literal::DateTime(window.end));
    match direction {
        Direction::Past => and(vec![column.clone().gt(start), column.clone().lte(end)]),
        Direction::Future => and(vec![column.clone().gte(start), column.clone().lt(end)]),
    }
}

/// `start <= column <= end`, compared as dates on date fields.
fn inclusive(column: &ColumnRef, field_type: FieldType, window: Window) -> Expr {
    let (start, end) = if field_type == FieldType::Date {
        (Literal::Date(window.start.date()), Literal::Date(window.end.date()))
    } else {
        (Literal::DateTime(window.start), Literal::DateTime(window.end))
    };
    and(vec![column.clone().gte(start), column.clone().lte(end)])
}

fn unsupported(c: &ValueCoercer<'_>) -> QueryError {
    QueryError::UnsupportedOperator {
        entity: c.entity.to_string(),
        field: c.field.to_string(),
        field_type: c.field_type,
        operator: c.operator.as_str().to_string(),
        valid: allowed_operators(c.field_type).to_vec(),
    }
}

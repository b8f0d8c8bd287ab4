//! In-memory reference backend.
//!
//! Rows are flat JSON objects per entity, single-entity fields stored in
//! their `<field>_id` / `<field>_type` / `<field>_name` shadow columns.
//! Evaluation uses two-valued logic: any comparison involving null is false.
//! Left joins bind the first matching row in insertion order, or an empty
//! row when nothing matches.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};

use super::{BackendError, BackendResult, Record, StorageBackend};
use crate::config::QuerySettings;
use crate::expr::{ColumnRef, CompareOp, Expr, LikeKind, Literal};
use crate::filter::{parse_date, parse_datetime};
use crate::path::{MultiEntityRead, Terminal, TypeSource};
use crate::plan::{ColumnSource, QueryPlan, SortDirection};

/// Rows per entity type, held in memory.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    retired_column: String,
    tables: BTreeMap<String, Vec<Record>>,
}

impl MemoryBackend {
    pub fn new(settings: &QuerySettings) -> Self {
        Self {
            retired_column: settings.retired_column.clone(),
            tables: BTreeMap::new(),
        }
    }

    /// Store a row. A missing retirement flag is stored as `false`.
    pub fn insert(&mut self, entity: &str, row: Value) -> BackendResult<()> {
        let Value::Object(mut row) = row else {
            return Err(BackendError::InvalidRow {
                entity: entity.to_string(),
                found: row.to_string(),
            });
        };
        row.entry(self.retired_column.clone())
            .or_insert(Value::Bool(false));
        self.tables.entry(entity.to_string()).or_default().push(row);
        Ok(())
    }

    pub fn insert_all(&mut self, entity: &str, rows: Vec<Value>) -> BackendResult<()> {
        rows.into_iter().try_for_each(|row| self.insert(entity, row))
    }

    pub fn rows(&self, entity: &str) -> &[Record] {
        self.tables.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    fn bind_joins<'r>(
        &'r self,
        plan: &'r QueryPlan,
        root: &'r Record,
        empty: &'r Record,
    ) -> BackendResult<Scope<'r>> {
        let mut scope = Scope::default().with(&plan.root_alias, root);
        for join in &plan.joins {
            let mut bound = empty;
            for row in self.rows(&join.entity) {
                if self.eval(&join.on, &scope.with(&join.alias, row))? {
                    bound = row;
                    break;
                }
            }
            scope = scope.with(&join.alias, bound);
        }
        Ok(scope)
    }

    fn eval(&self, expr: &Expr, scope: &Scope<'_>) -> BackendResult<bool> {
        Ok(match expr {
            Expr::True => true,
            Expr::False => false,
            Expr::And(exprs) => {
                for e in exprs {
                    if !self.eval(e, scope)? {
                        return Ok(false);
                    }
                }
                true
            }
            Expr::Or(exprs) => {
                for e in exprs {
                    if self.eval(e, scope)? {
                        return Ok(true);
                    }
                }
                false
            }
            Expr::Not(inner) => !self.eval(inner, scope)?,
            Expr::Compare { left, op, right } => {
                let (left, right) = (self.operand(left, scope)?, self.operand(right, scope)?);
                match left.compare(&right) {
                    None => false,
                    Some(ordering) => match op {
                        CompareOp::Eq => ordering == Ordering::Equal,
                        CompareOp::Ne => ordering != Ordering::Equal,
                        CompareOp::Lt => ordering == Ordering::Less,
                        CompareOp::Lte => ordering != Ordering::Greater,
                        CompareOp::Gt => ordering == Ordering::Greater,
                        CompareOp::Gte => ordering != Ordering::Less,
                    },
                }
            }
            Expr::IsNull { expr, negated } => {
                let is_null = matches!(self.operand(expr, scope)?, Operand::Null);
                is_null != *negated
            }
            Expr::In { expr, values } => {
                let value = self.operand(expr, scope)?;
                values.iter().any(|lit| {
                    value.compare(&Operand::from_literal(lit)) == Some(Ordering::Equal)
                })
            }
            Expr::Like { expr, kind, text } => match self.operand(expr, scope)? {
                Operand::Text(value) => {
                    let (value, text) = (value.to_lowercase(), text.to_lowercase());
                    match kind {
                        LikeKind::Contains => value.contains(&text),
                        LikeKind::StartsWith => value.starts_with(&text),
                        LikeKind::EndsWith => value.ends_with(&text),
                    }
                }
                _ => false,
            },
            Expr::Exists(sub) => {
                for row in self.rows(&sub.entity) {
                    if self.eval(&sub.predicate, &scope.with(&sub.alias, row))? {
                        return Ok(true);
                    }
                }
                false
            }
            Expr::Column(column) => scope.operand(column)? == Operand::Bool(true),
            Expr::Literal(lit) => *lit == Literal::Bool(true),
        })
    }

    fn operand(&self, expr: &Expr, scope: &Scope<'_>) -> BackendResult<Operand> {
        match expr {
            Expr::Column(column) => scope.operand(column),
            Expr::Literal(lit) => Ok(Operand::from_literal(lit)),
            predicate => self.eval(predicate, scope).map(Operand::Bool),
        }
    }

    fn read(&self, source: &ColumnSource, scope: &Scope<'_>) -> BackendResult<Value> {
        match source {
            ColumnSource::Id(column) => scope.value(column),
            ColumnSource::EntityType(name) => Ok(Value::String(name.clone())),
            ColumnSource::Read(Terminal::Column { column, .. }) => scope.value(column),
            ColumnSource::Read(Terminal::EntityLink {
                id,
                entity_type,
                name,
                ..
            }) => {
                let id = scope.value(id)?;
                if id.is_null() {
                    return Ok(Value::Null);
                }
                Ok(json!({
                    "id": id,
                    "type": scope.value(entity_type)?,
                    "name": scope.value(name)?,
                }))
            }
            ColumnSource::Read(Terminal::MultiEntity(read)) => self.read_multi(read, scope),
        }
    }

    /// `[{id, type, name}, ...]` of every connection / reverse row linked to
    /// the current row.
    fn read_multi(&self, read: &MultiEntityRead, scope: &Scope<'_>) -> BackendResult<Value> {
        let mut linked = Vec::new();
        for row in self.rows(&read.join.entity) {
            let inner = scope.with(&read.join.alias, row);
            if !self.eval(&read.join.on, &inner)? {
                continue;
            }
            let entity_type = match &read.entity_type {
                TypeSource::Column(column) => inner.value(column)?,
                TypeSource::Literal(name) => Value::String(name.clone()),
            };
            let name = match &read.name {
                Some(column) => inner.value(column)?,
                None => Value::Null,
            };
            linked.push(json!({
                "id": inner.value(&read.id)?,
                "type": entity_type,
                "name": name,
            }));
        }
        Ok(Value::Array(linked))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(&QuerySettings::default())
    }
}

impl StorageBackend for MemoryBackend {
    fn find(&self, plan: &QueryPlan) -> BackendResult<Vec<Record>> {
        let empty = Record::new();
        let mut matched = Vec::new();
        for row in self.rows(&plan.entity) {
            let scope = self.bind_joins(plan, row, &empty)?;
            if self.eval(&plan.predicate, &scope)? {
                let keys = plan
                    .order
                    .iter()
                    .map(|o| scope.operand(&o.column))
                    .collect::<BackendResult<Vec<_>>>()?;
                matched.push((keys, scope));
            }
        }

        matched.sort_by(|(a, _), (b, _)| {
            plan.order
                .iter()
                .zip(a.iter().zip(b.iter()))
                .map(|(order, (a, b))| {
                    let ordering = a.sort_cmp(b);
                    match order.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let limit = plan.limit.unwrap_or(usize::MAX);
        let mut records = Vec::new();
        for (_, scope) in matched.iter().skip(plan.offset).take(limit) {
            let mut record = Record::new();
            for column in &plan.columns {
                record.insert(column.key.clone(), self.read(&column.source, scope)?);
            }
            records.push(record);
        }
        tracing::trace!(entity = %plan.entity, rows = records.len(), "memory backend find");
        Ok(records)
    }
}

/// Rows bound to aliases, innermost last.
#[derive(Debug, Clone, Default)]
struct Scope<'r> {
    bindings: Vec<(&'r str, &'r Record)>,
}

impl<'r> Scope<'r> {
    fn with(&self, alias: &'r str, row: &'r Record) -> Scope<'r> {
        let mut bindings = self.bindings.clone();
        bindings.push((alias, row));
        Scope { bindings }
    }

    fn value(&self, column: &ColumnRef) -> BackendResult<Value> {
        let (_, row) = self
            .bindings
            .iter()
            .rev()
            .find(|(alias, _)| *alias == column.alias)
            .ok_or_else(|| BackendError::UnboundAlias(column.alias.clone()))?;
        Ok(row.get(&column.column).cloned().unwrap_or(Value::Null))
    }

    fn operand(&self, column: &ColumnRef) -> BackendResult<Operand> {
        let value = self.value(column)?;
        Operand::from_value(&value).ok_or_else(|| BackendError::Incomparable {
            column: column.to_string(),
            found: value.to_string(),
        })
    }
}

/// A comparable value. Stored dates are strings, so text is parsed on
/// demand when compared with a date or datetime.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Operand {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Operand::Null),
            Value::Bool(b) => Some(Operand::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Operand::Number),
            Value::String(s) => Some(Operand::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn from_literal(lit: &Literal) -> Self {
        match lit {
            Literal::Null => Operand::Null,
            Literal::Bool(b) => Operand::Bool(*b),
            Literal::Int(n) => Operand::Number(*n as f64),
            Literal::Float(x) => Operand::Number(*x),
            Literal::Text(s) => Operand::Text(s.clone()),
            Literal::Date(d) => Operand::Date(*d),
            Literal::DateTime(dt) => Operand::DateTime(*dt),
        }
    }

    /// `None` when either side is null or the types do not compare.
    fn compare(&self, other: &Operand) -> Option<Ordering> {
        match (self, other) {
            (Operand::Null, _) | (_, Operand::Null) => None,
            (Operand::Bool(a), Operand::Bool(b)) => Some(a.cmp(b)),
            (Operand::Number(a), Operand::Number(b)) => a.partial_cmp(b),
            (Operand::Text(a), Operand::Text(b)) => Some(a.cmp(b)),
            (Operand::Date(a), Operand::Date(b)) => Some(a.cmp(b)),
            (Operand::DateTime(a), Operand::DateTime(b)) => Some(a.cmp(b)),
            (Operand::Text(text), Operand::Date(_)) | (Operand::Text(text), Operand::DateTime(_)) => {
                Operand::parse_like(text, other)?.compare(other)
            }
            (Operand::Date(_), Operand::Text(_)) | (Operand::DateTime(_), Operand::Text(_)) => {
                other.compare(self).map(Ordering::reverse)
            }
            _ => None,
        }
    }

    fn parse_like(text: &str, target: &Operand) -> Option<Operand> {
        match target {
            Operand::Date(_) => parse_date(text)
                .or_else(|| parse_datetime(text).map(|dt| dt.date()))
                .map(Operand::Date),
            _ => parse_datetime(text)
                .or_else(|| parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
                .map(Operand::DateTime),
        }
    }

    /// Total order for sorting: nulls first, mismatched types equal.
    fn sort_cmp(&self, other: &Operand) -> Ordering {
        match (self, other) {
            (Operand::Null, Operand::Null) => Ordering::Equal,
            (Operand::Null, _) => Ordering::Less,
            (_, Operand::Null) => Ordering::Greater,
            _ => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }
}

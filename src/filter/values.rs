//! Filter value coercion.
//!
//! Wire values are JSON; the compiler needs typed literals. Coercion is
//! driven by the field type and the operator, and every mismatch is an
//! [`QueryError::InvalidValue`] naming the field and operator.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ops::FilterOperator;
use super::time::RelativeUnit;
use crate::error::{QueryError, QueryResult};
use crate::expr::Literal;
use crate::schema::FieldType;

/// A linked-entity value: `{"type": "Shot", "id": 42}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EntityRef {
    pub fn new(entity_type: &str, id: i64) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            id,
            name: None,
        }
    }
}

/// Coerces the values of one filter leaf.
#[derive(Debug, Clone, Copy)]
pub struct ValueCoercer<'a> {
    pub entity: &'a str,
    pub field: &'a str,
    pub field_type: FieldType,
    pub operator: FilterOperator,
}

impl<'a> ValueCoercer<'a> {
    pub fn error(&self, reason: impl Into<String>) -> QueryError {
        QueryError::InvalidValue {
            entity: self.entity.to_string(),
            field: self.field.to_string(),
            operator: self.operator.as_str().to_string(),
            reason: reason.into(),
        }
    }

    /// Accept both `[f, op, a, b]` and `[f, op, [a, b]]`.
    pub fn spread<'v>(&self, values: &'v [Value]) -> &'v [Value] {
        match values {
            [Value::Array(inner)] => inner.as_slice(),
            _ => values,
        }
    }

    pub fn single<'v>(&self, values: &'v [Value]) -> QueryResult<&'v Value> {
        match values {
            [value] => Ok(value),
            [] => Err(self.error("missing value")),
            _ => Err(self.error(format!("expected one value, got {}", values.len()))),
        }
    }

    /// Exactly two values, spread or nested.
    pub fn pair<'v>(&self, values: &'v [Value]) -> QueryResult<(&'v Value, &'v Value)> {
        match self.spread(values) {
            [a, b] => Ok((a, b)),
            other => Err(self.error(format!("expected two values, got {}", other.len()))),
        }
    }

    /// A scalar literal for this field's type; `null` stays `Null`.
    pub fn literal(&self, value: &Value) -> QueryResult<Literal> {
        if value.is_null() {
            return Ok(Literal::Null);
        }
        match self.field_type {
            FieldType::Number | FieldType::Duration | FieldType::Timecode => {
                self.integer(value).map(Literal::Int)
            }
            FieldType::Float | FieldType::Currency | FieldType::Percent => value
                .as_f64()
                .map(Literal::Float)
                .ok_or_else(|| self.error(format!("expected a number, got {value}"))),
            FieldType::Checkbox => value
                .as_bool()
                .map(Literal::Bool)
                .ok_or_else(|| self.error(format!("expected a boolean, got {value}"))),
            FieldType::Date => self.date(value).map(Literal::Date),
            FieldType::DateTime => self.datetime(value).map(Literal::DateTime),
            _ => self.text(value).map(Literal::Text),
        }
    }

    /// Literals for a list operator; nulls are kept so the caller can decide.
    pub fn literals(&self, values: &[Value]) -> QueryResult<Vec<Literal>> {
        self.spread(values).iter().map(|v| self.literal(v)).collect()
    }

    pub fn text(&self, value: &Value) -> QueryResult<String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.error(format!("expected a string, got {value}")))
    }

    pub fn integer(&self, value: &Value) -> QueryResult<i64> {
        value
            .as_i64()
            .ok_or_else(|| self.error(format!("expected an integer, got {value}")))
    }

    pub fn entity_ref(&self, value: &Value) -> QueryResult<EntityRef> {
        EntityRef::deserialize(value)
            .map_err(|e| self.error(format!("expected an entity {{type, id}}, got {value}: {e}")))
    }

    /// Entity references of a list operator; `None` marks a null entry.
    pub fn entity_refs(&self, values: &[Value]) -> QueryResult<Vec<Option<EntityRef>>> {
        self.spread(values)
            .iter()
            .map(|v| match v {
                Value::Null => Ok(None),
                other => self.entity_ref(other).map(Some),
            })
            .collect()
    }

    /// `(amount, unit)` of `in_last` / `in_next`.
    pub fn relative(&self, values: &[Value]) -> QueryResult<(i64, RelativeUnit)> {
        let (amount, unit) = self.pair(values)?;
        let amount = self.integer(amount)?;
        let unit = self.text(unit)?.parse::<RelativeUnit>().map_err(|e| self.error(e))?;
        Ok((amount, unit))
    }

    pub fn date(&self, value: &Value) -> QueryResult<NaiveDate> {
        let text = self.text(value)?;
        parse_date(&text)
            .or_else(|| parse_datetime(&text).map(|dt| dt.date()))
            .ok_or_else(|| self.error(format!("'{text}' is not a date (YYYY-MM-DD)")))
    }

    /// Datetimes also accept a bare date, read as midnight.
    pub fn datetime(&self, value: &Value) -> QueryResult<NaiveDateTime> {
        let text = self.text(value)?;
        parse_datetime(&text)
            .or_else(|| parse_date(&text).and_then(|d| d.and_hms_opt(0, 0, 0)))
            .ok_or_else(|| self.error(format!("'{text}' is not an ISO-8601 datetime")))
    }
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// ISO-8601 with `T` or a space, optional fraction, optional `Z` or offset.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    let text = text.strip_suffix('Z').unwrap_or(text);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

//! Filter operators and the per-field-type allow-lists.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::schema::FieldType;

/// Relation operator of a filter leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Is,
    IsNot,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Between,
    NotBetween,
    In,
    NotIn,
    InLast,
    NotInLast,
    InNext,
    NotInNext,
    InCalendarDay,
    InCalendarWeek,
    InCalendarMonth,
    InCalendarYear,
    TypeIs,
    TypeIsNot,
    NameContains,
    NameNotContains,
    NameIs,
    NameStartsWith,
    NameEndsWith,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 27] = [
        FilterOperator::Is,
        FilterOperator::IsNot,
        FilterOperator::Contains,
        FilterOperator::NotContains,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::GreaterThan,
        FilterOperator::LessThan,
        FilterOperator::Between,
        FilterOperator::NotBetween,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::InLast,
        FilterOperator::NotInLast,
        FilterOperator::InNext,
        FilterOperator::NotInNext,
        FilterOperator::InCalendarDay,
        FilterOperator::InCalendarWeek,
        FilterOperator::InCalendarMonth,
        FilterOperator::InCalendarYear,
        FilterOperator::TypeIs,
        FilterOperator::TypeIsNot,
        FilterOperator::NameContains,
        FilterOperator::NameNotContains,
        FilterOperator::NameIs,
        FilterOperator::NameStartsWith,
        FilterOperator::NameEndsWith,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Is => "is",
            FilterOperator::IsNot => "is_not",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "not_contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::LessThan => "less_than",
            FilterOperator::Between => "between",
            FilterOperator::NotBetween => "not_between",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not_in",
            FilterOperator::InLast => "in_last",
            FilterOperator::NotInLast => "not_in_last",
            FilterOperator::InNext => "in_next",
            FilterOperator::NotInNext => "not_in_next",
            FilterOperator::InCalendarDay => "in_calendar_day",
            FilterOperator::InCalendarWeek => "in_calendar_week",
            FilterOperator::InCalendarMonth => "in_calendar_month",
            FilterOperator::InCalendarYear => "in_calendar_year",
            FilterOperator::TypeIs => "type_is",
            FilterOperator::TypeIsNot => "type_is_not",
            FilterOperator::NameContains => "name_contains",
            FilterOperator::NameNotContains => "name_not_contains",
            FilterOperator::NameIs => "name_is",
            FilterOperator::NameStartsWith => "name_starts_with",
            FilterOperator::NameEndsWith => "name_ends_with",
        }
    }

    /// The positive operator this one negates, if it is a negative operator.
    pub fn negates(&self) -> Option<FilterOperator> {
        match self {
            FilterOperator::IsNot => Some(FilterOperator::Is),
            FilterOperator::NotIn => Some(FilterOperator::In),
            FilterOperator::NotContains => Some(FilterOperator::Contains),
            FilterOperator::NotBetween => Some(FilterOperator::Between),
            FilterOperator::TypeIsNot => Some(FilterOperator::TypeIs),
            FilterOperator::NameNotContains => Some(FilterOperator::NameContains),
            FilterOperator::NotInNext => Some(FilterOperator::InNext),
            FilterOperator::NotInLast => Some(FilterOperator::InLast),
            _ => None,
        }
    }

    pub fn is_negated(&self) -> bool {
        self.negates().is_some()
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOperator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown filter operator '{s}'"))
    }
}

/// How a group combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOperator {
    #[default]
    All,
    Any,
}

impl GroupOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupOperator::All => "all",
            GroupOperator::Any => "any",
        }
    }
}

impl FromStr for GroupOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" | "and" => Ok(GroupOperator::All),
            "any" | "or" => Ok(GroupOperator::Any),
            other => Err(format!("unsupported filter_operator '{other}'")),
        }
    }
}

use FilterOperator::*;

const EQUALITY: &[FilterOperator] = &[Is, IsNot];
const LISTED: &[FilterOperator] = &[Is, IsNot, In, NotIn];
const TEXT: &[FilterOperator] = &[
    Is, IsNot, Contains, NotContains, StartsWith, EndsWith, In, NotIn,
];
const RANGED: &[FilterOperator] = &[Is, IsNot, GreaterThan, LessThan, Between, In, NotIn];
const RANGED_NEGATABLE: &[FilterOperator] = &[
    Is, IsNot, LessThan, GreaterThan, Between, NotBetween, In, NotIn,
];
const TEMPORAL: &[FilterOperator] = &[
    Is,
    IsNot,
    GreaterThan,
    LessThan,
    InLast,
    NotInLast,
    InNext,
    NotInNext,
    InCalendarDay,
    InCalendarWeek,
    InCalendarMonth,
    InCalendarYear,
    Between,
    In,
    NotIn,
];
const ENTITY: &[FilterOperator] = &[
    Is,
    IsNot,
    TypeIs,
    TypeIsNot,
    NameContains,
    NameNotContains,
    NameIs,
    In,
    NotIn,
];
const ADDRESSING: &[FilterOperator] = &[
    Is,
    IsNot,
    Contains,
    NotContains,
    In,
    TypeIs,
    TypeIsNot,
    NameContains,
    NameNotContains,
    NameStartsWith,
    NameEndsWith,
];
const TAGS: &[FilterOperator] = &[Is, IsNot, NameContains, NameNotContains, NameIs];

/// Operators accepted by a field type, in a stable order.
pub fn allowed_operators(field_type: FieldType) -> &'static [FilterOperator] {
    match field_type {
        FieldType::Text => TEXT,
        FieldType::Float
        | FieldType::Duration
        | FieldType::Percent
        | FieldType::Timecode => RANGED,
        FieldType::Number | FieldType::Currency => RANGED_NEGATABLE,
        FieldType::Date | FieldType::DateTime => TEMPORAL,
        FieldType::Entity | FieldType::MultiEntity => ENTITY,
        FieldType::Addressing => ADDRESSING,
        FieldType::TagList => TAGS,
        FieldType::Checkbox | FieldType::Footage | FieldType::Image => EQUALITY,
        FieldType::Color
        | FieldType::List
        | FieldType::StatusList
        | FieldType::EntityType
        | FieldType::Uuid => LISTED,
        FieldType::Password
        | FieldType::Serializable
        | FieldType::Summary
        | FieldType::Url
        | FieldType::PivotColumn
        | FieldType::JsonB
        | FieldType::Calculated => &[],
    }
}

pub fn is_allowed(field_type: FieldType, operator: FilterOperator) -> bool {
    allowed_operators(field_type).contains(&operator)
}

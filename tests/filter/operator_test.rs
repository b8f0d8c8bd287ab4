//! Operator allow-lists and the shape of compiled leaves, per field type.

#[path = "../common/mod.rs"]
mod common;

use gridquery::filter::allowed_operators;
use gridquery::prelude::*;
use serde_json::{json, Map, Value};

/// `Thing` carries one field of every type, named after the type; link
/// fields point at `Other`.
fn every_type_schema() -> Schema {
    let mut fields = Map::new();
    for field_type in FieldType::ALL {
        let mut field = json!({"data_type": {"value": field_type.as_str()}});
        if field_type.is_link() {
            field["properties"] = json!({"valid_types": {"value": ["Other"]}});
        }
        fields.insert(format!("f_{}", field_type.as_str()), field);
    }
    let sources = SchemaSources::new(
        SchemaSource::from_json(json!({
            "Thing": Value::Object(fields),
            "Other": {"name": {"data_type": {"value": "text"}}}
        }))
        .unwrap(),
    );
    common::resolve(&sources).schema
}

fn scalar_value(field_type: FieldType) -> Value {
    match field_type {
        FieldType::Number | FieldType::Duration | FieldType::Timecode => json!(1),
        FieldType::Float | FieldType::Currency | FieldType::Percent => json!(1.5),
        FieldType::Checkbox => json!(true),
        FieldType::Date => json!("2021-03-01"),
        FieldType::DateTime => json!("2021-03-01T09:00:00"),
        _ => json!("abc"),
    }
}

/// Well-typed values for `op` on a field of `field_type`.
fn values_for(field_type: FieldType, op: FilterOperator) -> Vec<Value> {
    let other = json!({"type": "Other", "id": 1});
    let value = if field_type.is_link() {
        other
    } else {
        scalar_value(field_type)
    };
    let positive = op.negates().unwrap_or(op);
    match positive {
        FilterOperator::In => vec![json!([value])],
        FilterOperator::Between => vec![value.clone(), value],
        FilterOperator::InLast | FilterOperator::InNext => vec![json!(1), json!("DAY")],
        FilterOperator::InCalendarDay
        | FilterOperator::InCalendarWeek
        | FilterOperator::InCalendarMonth
        | FilterOperator::InCalendarYear => vec![json!(0)],
        FilterOperator::TypeIs => vec![json!("Other")],
        FilterOperator::NameIs
        | FilterOperator::NameContains
        | FilterOperator::NameStartsWith
        | FilterOperator::NameEndsWith => vec![json!("abc")],
        FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith
            if !field_type.is_link() =>
        {
            vec![json!("abc")]
        }
        _ => vec![value],
    }
}

fn compile_leaf(
    schema: &Schema,
    entity: &str,
    path: &str,
    op: FilterOperator,
    values: Vec<Value>,
) -> QueryResult<Expr> {
    let settings = QuerySettings::default();
    let clock = common::clock();
    let mut aliases = AliasGenerator::new();
    let root = aliases.next_alias();
    let filter = FilterExpr::leaf(path, op, values);
    FilterCompiler::new(schema, &settings, &clock)
        .compile(entity, &root, &filter, &mut aliases)
        .map(|c| c.predicate)
}

fn compile(schema: &Schema, entity: &str, filters: Value) -> QueryResult<String> {
    let settings = QuerySettings::default();
    let clock = common::clock();
    let mut aliases = AliasGenerator::new();
    let root = aliases.next_alias();
    let filter = FilterExpr::from_json(&filters)?;
    FilterCompiler::new(schema, &settings, &clock)
        .compile(entity, &root, &filter, &mut aliases)
        .map(|c| c.predicate.to_string())
}

#[test]
fn test_every_type_and_operator() {
    let schema = every_type_schema();
    for field_type in FieldType::ALL {
        let path = format!("f_{}", field_type.as_str());
        for op in FilterOperator::ALL {
            let result = compile_leaf(&schema, "Thing", &path, op, values_for(field_type, op));
            if allowed_operators(field_type).contains(&op) {
                assert!(result.is_ok(), "{field_type} {op}: {:?}", result.err());
            } else {
                match result {
                    Err(QueryError::UnsupportedOperator { operator, valid, .. }) => {
                        assert_eq!(operator, op.as_str());
                        assert_eq!(valid, allowed_operators(field_type));
                    }
                    other => panic!("{field_type} {op}: expected unsupported, got {other:?}"),
                }
            }
        }
    }
}

#[test]
fn test_negative_operators_negate_their_positive() {
    let schema = every_type_schema();
    for field_type in FieldType::ALL {
        let path = format!("f_{}", field_type.as_str());
        for op in allowed_operators(field_type) {
            let Some(positive) = op.negates() else {
                continue;
            };
            let values = values_for(field_type, *op);
            let negative = compile_leaf(&schema, "Thing", &path, *op, values.clone()).unwrap();
            let expected = not(compile_leaf(&schema, "Thing", &path, positive, values).unwrap());
            if field_type.is_multi_entity_family() {
                assert_eq!(negative, expected, "{field_type} {op}");
                continue;
            }
            // scalar and single-entity negations still require a value
            match negative {
                Expr::And(parts) => {
                    assert!(
                        matches!(parts.first(), Some(Expr::IsNull { negated: true, .. })),
                        "{field_type} {op}: {parts:?}"
                    );
                    assert_eq!(parts.last(), Some(&expected), "{field_type} {op}");
                }
                other => panic!("{field_type} {op}: expected a guarded negation, got {other}"),
            }
        }
    }
}

#[test]
fn test_unsupported_operator_message_lists_valid_operators() {
    let schema = every_type_schema();
    let err = compile_leaf(
        &schema,
        "Thing",
        "f_checkbox",
        FilterOperator::GreaterThan,
        vec![json!(true)],
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Operator 'greater_than' is not supported for checkbox field 'Thing.f_checkbox' (valid: is, is_not)"
    );
}

#[test]
fn test_scalar_predicates() {
    let schema = common::schema();
    let cases = [
        (
            json!(["sg_cut_in", "is", 1001]),
            "t0.sg_cut_in IS NOT NULL AND t0.sg_cut_in = 1001",
        ),
        (json!(["sg_cut_in", "is", null]), "t0.sg_cut_in IS NULL"),
        (
            json!(["sg_cut_in", "is_not", 1001]),
            "t0.sg_cut_in IS NOT NULL AND NOT (t0.sg_cut_in IS NOT NULL AND t0.sg_cut_in = 1001)",
        ),
        (json!(["sg_cut_in", "is_not", null]), "NOT (t0.sg_cut_in IS NULL)"),
        (
            json!(["sg_sequence", "type_is_not", "Sequence"]),
            "t0.sg_sequence_type IS NOT NULL AND NOT (t0.sg_sequence_type IS NOT NULL AND t0.sg_sequence_type = 'Sequence')",
        ),
        (
            json!(["sg_cut_in", "between", null, 1005]),
            "t0.sg_cut_in IS NOT NULL AND t0.sg_cut_in <= 1005",
        ),
        (
            json!(["sg_cut_in", "between", [1000, 1005]]),
            "t0.sg_cut_in IS NOT NULL AND t0.sg_cut_in >= 1000 AND t0.sg_cut_in <= 1005",
        ),
        (
            json!(["sg_status_list", "in", ["ip", null]]),
            "(t0.sg_status_list IS NOT NULL AND t0.sg_status_list IN ('ip')) OR t0.sg_status_list IS NULL",
        ),
        (
            json!(["sg_status_list", "in", []]),
            "FALSE",
        ),
        (
            json!(["code", "starts_with", "SQ010"]),
            "t0.code IS NOT NULL AND t0.code ILIKE 'SQ010%'",
        ),
        (
            json!(["sg_due", "in_calendar_month", 0]),
            "t0.sg_due IS NOT NULL AND t0.sg_due >= DATE '2021-03-01' AND t0.sg_due <= DATE '2021-03-31'",
        ),
        (
            json!(["created_at", "in_last", 2, "HOUR"]),
            "t0.created_at IS NOT NULL AND t0.created_at > TIMESTAMP '2021-03-01 07:00:00' AND t0.created_at <= TIMESTAMP '2021-03-01 09:00:00'",
        ),
    ];
    for (filter, expected) in cases {
        assert_eq!(compile(&schema, "Shot", filter.clone()).unwrap(), expected, "{filter}");
    }
}

#[test]
fn test_groups() {
    let schema = common::schema();
    assert_eq!(compile(&schema, "Shot", json!([])).unwrap(), "TRUE");
    assert_eq!(compile(&schema, "Shot", Value::Null).unwrap(), "TRUE");
    assert_eq!(
        compile(
            &schema,
            "Shot",
            json!({
                "filter_operator": "any",
                "filters": [
                    ["code", "is", "a"],
                    {"filter_operator": "all", "filters": [["sg_cut_in", "is", null], ["description", "is", null]]}
                ]
            })
        )
        .unwrap(),
        "(t0.code IS NOT NULL AND t0.code = 'a') OR (t0.sg_cut_in IS NULL AND t0.description IS NULL)"
    );
}

#[test]
fn test_invalid_values() {
    let schema = common::schema();
    let invalid = |filters: Value| match compile(&schema, "Shot", filters) {
        Err(QueryError::InvalidValue { reason, .. }) => reason,
        other => panic!("expected an invalid value, got {other:?}"),
    };
    assert!(invalid(json!(["sg_cut_in", "is", "ten"])).contains("expected an integer"));
    assert!(invalid(json!(["sg_cut_in", "greater_than", null])).contains("null"));
    assert!(invalid(json!(["sg_cut_in", "between", 1])).contains("two values"));
    assert!(invalid(json!(["created_at", "in_last", 1, "FORTNIGHT"])).contains("unknown time unit"));
    assert!(invalid(json!(["created_at", "is", "yesterday"])).contains("not an ISO-8601 datetime"));
    assert!(invalid(json!(["sg_sequence", "is", {"id": 1}])).contains("expected an entity"));
    assert!(invalid(json!(["code", "is"])).contains("missing value"));
}

#[test]
fn test_invalid_filters() {
    let schema = common::schema();
    assert!(matches!(
        compile(&schema, "Shot", json!(["code", "like", "a"])),
        Err(QueryError::InvalidFilter(_))
    ));
    assert!(matches!(
        compile(&schema, "Shot", json!({"filter_operator": "xor", "filters": []})),
        Err(QueryError::InvalidFilter(_))
    ));
    assert!(matches!(
        compile(&schema, "Shot", json!("code")),
        Err(QueryError::InvalidFilter(_))
    ));
    assert!(matches!(
        compile(&schema, "Shot", json!([["nope", "is", 1]])),
        Err(QueryError::UnknownField { .. })
    ));
}

//! Find requests planned and executed against the memory backend.

#[path = "../common/mod.rs"]
mod common;

use gridquery::plan::ColumnSource;
use gridquery::prelude::*;
use serde_json::{json, Value};

fn plan(request: &FindRequest) -> QueryResult<QueryPlan> {
    let schema = common::schema();
    let settings = QuerySettings::default();
    let clock = common::clock();
    QueryPlanner::new(&schema, &settings, &clock).plan(request)
}

fn find(request: FindRequest) -> Vec<Record> {
    common::find(&common::schema(), &common::backend(), &request)
}

fn ids_of(records: &[Record]) -> Vec<i64> {
    records.iter().filter_map(|r| r["id"].as_i64()).collect()
}

#[test]
fn test_retired_rows_are_excluded_unless_requested() {
    assert_eq!(ids_of(&find(FindRequest::new("Shot"))), vec![1, 2, 3, 4]);
    assert_eq!(ids_of(&find(FindRequest::new("Shot").retired_only(true))), vec![5]);
}

#[test]
fn test_ordering() {
    assert_eq!(
        ids_of(&find(FindRequest::new("Shot").order(vec![OrderTerm::desc("id")]))),
        vec![4, 3, 2, 1]
    );
    // nulls sort first ascending, last descending
    assert_eq!(
        ids_of(&find(FindRequest::new("Shot").order(vec![OrderTerm::asc("sg_cut_in")]))),
        vec![3, 4, 1, 2]
    );
    assert_eq!(
        ids_of(&find(FindRequest::new("Shot").order(vec![OrderTerm::desc("sg_cut_in")]))),
        vec![2, 1, 3, 4]
    );
    // single-entity fields order by the linked name
    assert_eq!(
        ids_of(&find(FindRequest::new("Shot").order(vec![OrderTerm::asc("sg_sequence")]))),
        vec![4, 1, 2, 3]
    );
    assert_eq!(
        ids_of(&find(FindRequest::new("Shot").order(vec![
            OrderTerm::desc("sg_sequence.Sequence.code"),
            OrderTerm::desc("id"),
        ]))),
        vec![3, 2, 1, 4]
    );
}

#[test]
fn test_paging() {
    assert_eq!(ids_of(&find(FindRequest::new("Shot").limit(2))), vec![1, 2]);
    assert_eq!(ids_of(&find(FindRequest::new("Shot").limit(2).page(1))), vec![3, 4]);
    assert!(find(FindRequest::new("Shot").limit(2).page(2)).is_empty());
}

#[test]
fn test_records_carry_requested_fields() {
    let records = find(
        FindRequest::new("Shot")
            .fields(&["code", "sg_sequence", "assets", "tasks", "sg_sequence.Sequence.code"])
            .filters(json!([["id", "in", [1, 4]]])),
    );
    assert_eq!(records.len(), 2);
    assert_eq!(
        Value::Object(records[0].clone()),
        json!({
            "id": 1,
            "type": "Shot",
            "code": "SQ010_0010",
            "sg_sequence": {"id": 1, "type": "Sequence", "name": "SQ010"},
            "sg_sequence.Sequence.code": "SQ010",
            "assets": [
                {"id": 1, "type": "Asset", "name": "tree"},
                {"id": 2, "type": "Asset", "name": "rock"}
            ],
            "tasks": [
                {"id": 1, "type": "Task", "name": "Animate"},
                {"id": 2, "type": "Task", "name": "Composite"}
            ]
        })
    );
    assert_eq!(records[1]["sg_sequence"], Value::Null);
    assert_eq!(records[1]["sg_sequence.Sequence.code"], Value::Null);
    assert_eq!(records[1]["assets"], json!([]));
}

#[test]
fn test_connection_reads_from_both_sides() {
    let records = find(FindRequest::new("Asset").fields(&["shots"]));
    assert_eq!(
        records[0]["shots"],
        json!([
            {"id": 1, "type": "Shot", "name": "SQ010_0010"},
            {"id": 3, "type": "Shot", "name": "SQ020_0010"}
        ])
    );
    let records = find(FindRequest::new("Project").fields(&["users"]));
    assert_eq!(records[0]["users"].as_array().map(Vec::len), Some(2));
    assert_eq!(records[1]["users"], json!([]));
}

#[test]
fn test_paths_share_join_prefixes() {
    let plan = plan(
        &FindRequest::new("Version")
            .fields(&["sg_task.Task.content", "sg_task.Task.step.Step.code"])
            .order(vec![OrderTerm::asc("sg_task.Task.content")]),
    )
    .unwrap();
    assert_eq!(
        plan.joins.iter().map(|j| j.alias.as_str()).collect::<Vec<_>>(),
        vec!["t1", "t2"]
    );
    assert!(matches!(
        plan.column("sg_task.Task.step.Step.code").map(|c| &c.source),
        Some(ColumnSource::Read(_))
    ));

    let records = find(
        FindRequest::new("Version").fields(&["sg_task.Task.content", "sg_task.Task.step.Step.code"]),
    );
    let values: Vec<_> = records
        .iter()
        .map(|r| (r["sg_task.Task.content"].clone(), r["sg_task.Task.step.Step.code"].clone()))
        .collect();
    assert_eq!(
        values,
        vec![
            (json!("Animate"), json!("anim")),
            (json!("Composite"), json!("comp")),
            (Value::Null, Value::Null),
        ]
    );
}

#[test]
fn test_duplicate_fields_are_read_once() {
    let plan = plan(&FindRequest::new("Shot").fields(&["code", "code", "id"])).unwrap();
    assert_eq!(plan.keys().collect::<Vec<_>>(), vec!["id", "type", "code"]);
}

#[test]
fn test_plan_errors() {
    assert!(matches!(
        plan(&FindRequest::new("Shot").order(vec![OrderTerm::asc("assets")])),
        Err(QueryError::InvalidRelation { ref reason, .. }) if reason.contains("multi-entity")
    ));
    assert_eq!(
        plan(&FindRequest::new("Nope")).unwrap_err(),
        QueryError::UnknownEntity("Nope".into())
    );
    assert!(matches!(
        plan(&FindRequest::new("Shot").fields(&["sg_sequence.Sequence.nope"])),
        Err(QueryError::UnknownField { .. })
    ));
}

#[test]
fn test_request_from_json() {
    let request: FindRequest = serde_json::from_value(json!({
        "entity_type": "Shot",
        "filters": [["sg_status_list", "is", "ip"], ["sg_status_list", "is", "fin"]],
        "filter_operator": "any",
        "order": [{"field_name": "code", "direction": "desc"}],
        "limit": 2
    }))
    .unwrap();
    assert_eq!(ids_of(&find(request)), vec![2, 1]);
}

#[test]
fn test_plan_display() {
    let plan = plan(
        &FindRequest::new("Version")
            .fields(&["code", "sg_task.Task.content"])
            .filters(json!([["sg_task.Task.step.Step.code", "is", "anim"]]))
            .limit(10),
    )
    .unwrap();
    insta::assert_snapshot!(plan.to_string(), @r"
    SELECT id, type, code, sg_task.Task.content
    FROM Version t0
    LEFT JOIN Task t1 ON t1.id = t0.sg_task_id AND t0.sg_task_type = 'Task'
    WHERE t0.is_retired = FALSE AND EXISTS (Task t2 WHERE t2.id = t0.sg_task_id AND t0.sg_task_type = 'Task' AND EXISTS (Step t3 WHERE t3.id = t2.step_id AND t2.step_type = 'Step' AND t3.code IS NOT NULL AND t3.code = 'anim'))
    ORDER BY t0.id ASC
    LIMIT 10
    ");
}

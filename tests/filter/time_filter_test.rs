//! Relative and calendar time filters, evaluated against a fixed clock.

#[path = "../common/mod.rs"]
mod common;

use gridquery::prelude::*;
use serde_json::{json, Value};

/// Shots around Monday 2021-03-01 09:00.
fn backend() -> MemoryBackend {
    let mut backend = MemoryBackend::default();
    backend
        .insert_all(
            "Shot",
            vec![
                json!({"id": 1, "created_at": "2020-02-15T12:00:00", "sg_due": "2021-02-27"}),
                json!({"id": 2, "created_at": "2021-01-01T00:00:00", "sg_due": "2021-02-28"}),
                json!({"id": 3, "created_at": "2021-02-01T00:00:00", "sg_due": "2021-03-01"}),
                json!({"id": 4, "created_at": "2021-03-01T00:00:00", "sg_due": "2021-03-02"}),
                json!({"id": 5, "created_at": "2021-03-01T09:00:00", "sg_due": null}),
                json!({"id": 6, "created_at": "2021-03-01T09:30:00"}),
            ],
        )
        .unwrap();
    backend
}

fn matching(filter: Value) -> Vec<i64> {
    common::ids(&common::schema(), &backend(), "Shot", json!([filter]))
}

#[test]
fn test_in_last() {
    assert_eq!(matching(json!(["created_at", "in_last", 1, "HOUR"])), vec![5]);
    assert_eq!(matching(json!(["created_at", "in_last", 1, "DAY"])), vec![4, 5]);
    assert_eq!(matching(json!(["created_at", "in_last", 1, "WEEK"])), vec![4, 5]);
    // a month is thirty days, a year 365
    assert_eq!(matching(json!(["created_at", "in_last", 1, "MONTH"])), vec![3, 4, 5]);
    assert_eq!(matching(json!(["created_at", "in_last", [1, "YEAR"]])), vec![2, 3, 4, 5]);
}

#[test]
fn test_in_next() {
    assert_eq!(matching(json!(["created_at", "in_next", 1, "HOUR"])), vec![5, 6]);
    assert_eq!(matching(json!(["created_at", "not_in_next", 1, "DAY"])), vec![1, 2, 3, 4]);
}

#[test]
fn test_calendar_windows() {
    let cases = [
        ("in_calendar_day", 0, vec![4, 5, 6]),
        ("in_calendar_day", -28, vec![3]),
        ("in_calendar_week", 0, vec![4, 5, 6]),
        ("in_calendar_week", -4, vec![3]),
        ("in_calendar_month", 0, vec![4, 5, 6]),
        ("in_calendar_month", -1, vec![3]),
        ("in_calendar_year", 0, vec![2, 3, 4, 5, 6]),
        ("in_calendar_year", -1, vec![1]),
    ];
    for (op, offset, expected) in cases {
        assert_eq!(
            matching(json!(["created_at", op, offset])),
            expected,
            "{op} {offset}"
        );
    }
}

#[test]
fn test_absolute_comparisons() {
    assert_eq!(matching(json!(["created_at", "greater_than", "2021-02-01"])), vec![4, 5, 6]);
    assert_eq!(matching(json!(["created_at", "less_than", "2021-02-01"])), vec![1, 2]);
    assert_eq!(
        matching(json!(["created_at", "between", "2021-01-01", "2021-03-01"])),
        vec![2, 3, 4]
    );
    assert_eq!(
        matching(json!(["created_at", "not_between", ["2021-01-01", "2021-03-01"]])),
        vec![1, 5, 6]
    );
    assert_eq!(
        matching(json!(["created_at", "in", ["2021-01-01", "2021-03-01T00:00:00Z"]])),
        vec![2, 4]
    );
    assert_eq!(
        matching(json!(["created_at", "not_in", "2021-01-01", "2021-03-01"])),
        vec![1, 3, 5, 6]
    );
    assert_eq!(
        matching(json!(["created_at", "is_not", "2021-02-01"])),
        vec![1, 2, 4, 5, 6]
    );
}

#[test]
fn test_date_fields_compare_whole_days() {
    assert_eq!(matching(json!(["sg_due", "in_last", 1, "DAY"])), vec![2, 3]);
    assert_eq!(matching(json!(["sg_due", "in_next", 1, "DAY"])), vec![3, 4]);
    assert_eq!(matching(json!(["sg_due", "in_calendar_month", 0])), vec![3, 4]);
    assert_eq!(matching(json!(["sg_due", "is", null])), vec![5, 6]);
    assert_eq!(matching(json!(["sg_due", "less_than", "2021-03-01"])), vec![1, 2]);
}

#[test]
fn test_offsets_beyond_the_calendar_are_rejected() {
    let schema = common::schema();
    let settings = QuerySettings::default();
    let clock = common::clock();
    let planner = QueryPlanner::new(&schema, &settings, &clock);
    for op in ["in_calendar_day", "in_calendar_week", "in_calendar_month", "in_calendar_year"] {
        for offset in [i64::MAX, i64::MIN] {
            let request = FindRequest::new("Shot").filters(json!([["created_at", op, offset]]));
            assert!(
                matches!(
                    planner.plan(&request),
                    Err(QueryError::InvalidValue { ref reason, .. }) if reason == "calendar offset out of range"
                ),
                "{op} {offset}"
            );
        }
    }
}

#[test]
fn test_system_clock_is_close_to_now() {
    let before = chrono::Utc::now().naive_utc();
    let now = SystemClock.now();
    assert!(now >= before);
}

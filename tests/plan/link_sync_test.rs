//! Planning multi-entity field assignments.

#[path = "../common/mod.rs"]
mod common;

use gridquery::plan::{ExistingLink, LinkInsert, LinkStorage};
use gridquery::prelude::*;
use serde_json::json;

fn existing(schema: &Schema, entity: &str, field: &str, owner: EntityRef) -> Vec<ExistingLink> {
    let sync = LinkSync::new(schema);
    let storage = sync.storage(entity, field).unwrap();
    let request = sync.existing_request(&storage, &owner);
    let records = common::find(schema, &common::backend(), &request);
    sync.existing_links(&storage, &records)
}

#[test]
fn test_storage() {
    let schema = common::schema();
    let sync = LinkSync::new(&schema);
    assert_eq!(
        sync.storage("Asset", "shots").unwrap(),
        LinkStorage::Connection {
            connection: "FakeAssetShotsConnection".into(),
            this_endpoint: "entity".into(),
            other_endpoints: vec!["linked_entity".into()],
        }
    );
    assert_eq!(
        sync.storage("Shot", "assets").unwrap(),
        LinkStorage::Connection {
            connection: "FakeAssetShotsConnection".into(),
            this_endpoint: "linked_entity".into(),
            other_endpoints: vec!["entity".into()],
        }
    );
    assert_eq!(
        sync.storage("Sequence", "shots").unwrap(),
        LinkStorage::Reverse {
            entity: "Shot".into(),
            parent_field: "sg_sequence".into(),
        }
    );
    assert_eq!(
        sync.other_endpoint("Project", "users", "HumanUser").unwrap(),
        "linked_entity"
    );
}

#[test]
fn test_existing_connection_rows() {
    let schema = common::schema();
    let links = existing(&schema, "Asset", "shots", EntityRef::new("Asset", 1));
    assert_eq!(
        links
            .iter()
            .map(|l| (l.row, l.linked.entity_type.as_str(), l.linked.id))
            .collect::<Vec<_>>(),
        vec![(1, "Shot", 1), (2, "Shot", 3)]
    );
    assert_eq!(links[0].linked.name.as_deref(), Some("SQ010_0010"));

    // the retired row is not live
    let links = existing(&schema, "Project", "users", EntityRef::new("Project", 2));
    assert!(links.is_empty());
}

#[test]
fn test_connection_update() {
    let schema = common::schema();
    let sync = LinkSync::new(&schema);
    let current = existing(&schema, "Asset", "shots", EntityRef::new("Asset", 1));
    let update = sync
        .plan(
            "Asset",
            "shots",
            &current,
            &[EntityRef::new("Shot", 3), EntityRef::new("Shot", 4)],
        )
        .unwrap();
    assert_eq!(update.keep.iter().map(|l| l.row).collect::<Vec<_>>(), vec![2]);
    assert_eq!(update.delete.iter().map(|l| l.row).collect::<Vec<_>>(), vec![1]);
    assert_eq!(
        update.insert,
        vec![LinkInsert {
            linked: EntityRef::new("Shot", 4),
            endpoint: Some("linked_entity".into()),
        }]
    );
    assert!(!update.is_noop());

    let unchanged = sync
        .plan("Asset", "shots", &current, &[EntityRef::new("Shot", 1), EntityRef::new("Shot", 3)])
        .unwrap();
    assert!(unchanged.is_noop());
}

#[test]
fn test_reverse_update() {
    let schema = common::schema();
    let sync = LinkSync::new(&schema);
    let current = existing(&schema, "Sequence", "shots", EntityRef::new("Sequence", 1));
    assert_eq!(
        current,
        vec![
            ExistingLink { row: 1, linked: EntityRef::new("Shot", 1) },
            ExistingLink { row: 2, linked: EntityRef::new("Shot", 2) },
        ]
    );

    let update = sync
        .plan("Sequence", "shots", &current, &[EntityRef::new("Shot", 2), EntityRef::new("Shot", 3)])
        .unwrap();
    assert_eq!(update.keep, vec![current[1].clone()]);
    assert_eq!(update.delete, vec![current[0].clone()]);
    assert_eq!(
        update.insert,
        vec![LinkInsert {
            linked: EntityRef::new("Shot", 3),
            endpoint: None,
        }]
    );

    let cleared = sync.plan("Sequence", "shots", &current, &[]).unwrap();
    assert_eq!(cleared.delete.len(), 2);
    assert!(cleared.insert.is_empty());
}

#[test]
fn test_declared_connection_endpoints() {
    let hints = ReverseHints::from_json(json!({
        "Asset": {"shots": {"through_join_entity_type": "AssetShotConnection"}},
        "Shot": {"assets": {"through_join_entity_type": "AssetShotConnection"}}
    }))
    .unwrap();
    let multi = |target: &str| {
        json!({"data_type": {"value": "multi_entity"}, "properties": {"valid_types": {"value": [target]}}})
    };
    let single = |target: &str| {
        json!({"data_type": {"value": "entity"}, "properties": {"valid_types": {"value": [target]}}})
    };
    let sources = SchemaSources::new(
        SchemaSource::from_json(json!({
            "Asset": {"shots": multi("Shot")},
            "Shot": {"assets": multi("Asset")},
            "AssetShotConnection": {"asset": single("Asset"), "shot": single("Shot")}
        }))
        .unwrap(),
    )
    .with_hints(hints);
    let schema = common::resolve(&sources).schema;
    let sync = LinkSync::new(&schema);

    assert_eq!(
        sync.storage("Asset", "shots").unwrap(),
        LinkStorage::Connection {
            connection: "AssetShotConnection".into(),
            this_endpoint: "asset".into(),
            other_endpoints: vec!["shot".into()],
        }
    );
    assert_eq!(sync.other_endpoint("Asset", "shots", "Shot").unwrap(), "shot");
    assert_eq!(sync.other_endpoint("Shot", "assets", "Asset").unwrap(), "asset");
}

#[test]
fn test_invalid_assignments() {
    let schema = common::schema();
    let sync = LinkSync::new(&schema);
    assert!(matches!(
        sync.plan("Asset", "shots", &[], &[EntityRef::new("Asset", 1)]),
        Err(QueryError::InvalidRelation { ref reason, .. }) if reason.contains("not a valid target type")
    ));
    assert!(matches!(
        sync.storage("Shot", "code"),
        Err(QueryError::InvalidRelation { ref reason, .. }) if reason == "not a multi-entity field"
    ));
    assert!(matches!(
        sync.storage("Shot", "nope"),
        Err(QueryError::UnknownField { .. })
    ));
}

//! Integration tests for relationship resolution.

#[path = "../common/mod.rs"]
mod common;

use gridquery::prelude::*;
use gridquery::schema::source::{DisplayNameChange, FieldHint, ReverseOf};
use gridquery::schema::{Link, LinkSnapshot};
use serde_json::json;

fn field<'s>(schema: &'s Schema, entity: &str, name: &str) -> &'s Field {
    let entity = schema.require_entity(entity).unwrap();
    schema.require_field(entity, name).unwrap()
}

fn link_of(schema: &Schema, entity: &str, name: &str) -> LinkSnapshot {
    let snapshot = schema.snapshot();
    snapshot
        .entities
        .into_iter()
        .find(|e| e.api_name == entity)
        .and_then(|e| e.fields.into_iter().find(|f| f.api_name == name))
        .and_then(|f| f.link)
        .unwrap_or_else(|| panic!("{entity}.{name} is not linked"))
}

fn sources_of(schema_read: serde_json::Value) -> SchemaSources {
    SchemaSources::new(SchemaSource::from_json(schema_read).unwrap())
}

fn multi(targets: &[&str]) -> serde_json::Value {
    json!({"data_type": {"value": "multi_entity"}, "properties": {"valid_types": {"value": targets}}})
}

fn named_multi(display: &str, targets: &[&str]) -> serde_json::Value {
    json!({
        "data_type": {"value": "multi_entity"},
        "name": {"value": display},
        "properties": {"valid_types": {"value": targets}}
    })
}

// =============================================================================
// Fixture schema
// =============================================================================

#[test]
fn test_fixture_resolves_cleanly() {
    let resolution = common::resolve(&common::sources());
    assert!(
        resolution.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        resolution.diagnostics
    );
    let schema = &resolution.schema;
    for entity in schema.entities() {
        for field in schema.fields_of(entity) {
            if field.link_kind().is_some() {
                assert!(
                    field.is_linked() || field.is_one_sided(),
                    "{} left unresolved",
                    schema.qualified_name(field.id())
                );
            }
        }
    }
}

#[test]
fn test_convention_links_parent_and_children() {
    let schema = common::schema();
    assert_eq!(
        link_of(&schema, "Shot", "sg_sequence"),
        LinkSnapshot::OneToMany {
            parent: "Shot.sg_sequence".into(),
            children: vec!["Sequence.shots".into()],
        }
    );
    assert_eq!(
        link_of(&schema, "Sequence", "shots"),
        link_of(&schema, "Shot", "sg_sequence")
    );
    assert_eq!(
        link_of(&schema, "Task", "versions"),
        LinkSnapshot::OneToMany {
            parent: "Version.sg_task".into(),
            children: vec!["Task.versions".into()],
        }
    );
}

#[test]
fn test_default_table_links_and_one_sided_fields() {
    let schema = common::schema();
    assert_eq!(
        link_of(&schema, "Shot", "tasks"),
        LinkSnapshot::OneToMany {
            parent: "Task.entity".into(),
            children: vec!["Shot.tasks".into()],
        }
    );
    for (entity, name) in [("Shot", "project"), ("Asset", "project"), ("Task", "step")] {
        let f = field(&schema, entity, name);
        assert!(f.is_one_sided(), "{entity}.{name}");
        assert!(!f.is_linked(), "{entity}.{name}");
    }
}

#[test]
fn test_mutual_multi_entity_fields_share_a_synthesized_connection() {
    let schema = common::schema();
    let connection = schema.require_entity("FakeAssetShotsConnection").unwrap();
    assert!(!connection.real);
    let names: Vec<_> = schema
        .fields_of(connection)
        .map(|f| f.api_name.as_str())
        .collect();
    assert_eq!(names, vec!["id", "entity", "linked_entity"]);
    assert_eq!(field(&schema, "FakeAssetShotsConnection", "entity").valid_types(), &["Asset"]);
    assert_eq!(
        field(&schema, "FakeAssetShotsConnection", "linked_entity").valid_types(),
        &["Shot"]
    );

    assert_eq!(
        link_of(&schema, "Asset", "shots"),
        LinkSnapshot::ManyToMany {
            connection: "FakeAssetShotsConnection".into(),
            this_endpoint: "entity".into(),
            other_endpoint: "linked_entity".into(),
            reverse: Some("Shot.assets".into()),
        }
    );
    assert_eq!(
        link_of(&schema, "Shot", "assets"),
        LinkSnapshot::ManyToMany {
            connection: "FakeAssetShotsConnection".into(),
            this_endpoint: "linked_entity".into(),
            other_endpoint: "entity".into(),
            reverse: Some("Asset.shots".into()),
        }
    );
    assert!(schema.entity("FakeShotAssetsConnection").is_none());
}

#[test]
fn test_one_sided_multi_entity_field_gets_its_own_connection() {
    let schema = common::schema();
    assert_eq!(
        link_of(&schema, "Project", "users"),
        LinkSnapshot::ManyToMany {
            connection: "FakeProjectUsersConnection".into(),
            this_endpoint: "entity".into(),
            other_endpoint: "linked_entity".into(),
            reverse: None,
        }
    );
    let Some(Link::ManyToMany(m2m)) = field(&schema, "Project", "users").link() else {
        panic!("expected a many-to-many link");
    };
    assert_eq!(m2m.right.field, None);
}

#[test]
fn test_name_fields_follow_priority() {
    let schema = common::schema();
    let name_of = |entity: &str| {
        schema
            .entity(entity)
            .and_then(|e| e.name_field())
            .map(|id| schema.field(id).api_name.clone())
    };
    assert_eq!(name_of("Project").as_deref(), Some("name"));
    assert_eq!(name_of("Shot").as_deref(), Some("code"));
    assert_eq!(name_of("Task").as_deref(), Some("content"));
    assert_eq!(name_of("FakeAssetShotsConnection"), None);
}

// =============================================================================
// Hints
// =============================================================================

#[test]
fn test_reverse_hint_pairs_unconventional_names() {
    let sources = sources_of(json!({
        "Shot": {"sg_plates": multi(&["Element"])},
        "Element": {"sg_used_in": multi(&["Shot"])}
    }))
    .with_hints(ReverseHints::from_json(json!({
        "Shot": {"sg_plates": {"reverse_of": {"entity_type_name": "Element", "name": "sg_used_in"}}}
    }))
    .unwrap());
    let resolution = common::resolve(&sources);
    let schema = &resolution.schema;

    assert_eq!(
        link_of(schema, "Shot", "sg_plates"),
        LinkSnapshot::ManyToMany {
            connection: "FakeElementSgUsedInConnection".into(),
            this_endpoint: "linked_entity".into(),
            other_endpoint: "entity".into(),
            reverse: Some("Element.sg_used_in".into()),
        }
    );
    assert_eq!(resolution.diagnostics_of(DiagnosticKind::LowConfidenceMatch).count(), 0);
}

#[test]
fn test_declared_join_entity_is_reused() {
    let mut hints = ReverseHints::default();
    for (entity, name) in [("Asset", "shots"), ("Shot", "assets")] {
        hints.entities.entry(entity.into()).or_default().insert(
            name.into(),
            FieldHint {
                through_join_entity_type: Some("AssetShotConnection".into()),
                ..Default::default()
            },
        );
    }
    let sources = sources_of(json!({
        "Asset": {"shots": multi(&["Shot"])},
        "Shot": {"assets": multi(&["Asset"])},
        "AssetShotConnection": {
            "asset": {"data_type": {"value": "entity"}, "properties": {"valid_types": {"value": ["Asset"]}}},
            "shot": {"data_type": {"value": "entity"}, "properties": {"valid_types": {"value": ["Shot"]}}}
        }
    }))
    .with_hints(hints);
    let resolution = common::resolve(&sources);
    let schema = &resolution.schema;

    assert!(resolution.diagnostics.is_empty());
    assert!(schema.entities().all(|e| e.real));
    assert_eq!(
        link_of(schema, "Asset", "shots"),
        LinkSnapshot::ManyToMany {
            connection: "AssetShotConnection".into(),
            this_endpoint: "asset".into(),
            other_endpoint: "shot".into(),
            reverse: Some("Shot.assets".into()),
        }
    );
    assert_eq!(
        link_of(schema, "AssetShotConnection", "shot"),
        LinkSnapshot::ConnectionEndpoint {
            side_field: Some("Shot.assets".into()),
        }
    );
}

#[test]
fn test_hint_naming_a_missing_field_is_ignored() {
    let sources = sources_of(json!({
        "Shot": {"sg_plates": multi(&["Element"])},
        "Element": {}
    }))
    .with_hints(ReverseHints::from_json(json!({
        "Shot": {"sg_plates": {"inverse_association": "Element.sg_gone"}}
    }))
    .unwrap());
    let resolution = common::resolve(&sources);
    assert!(matches!(
        field(&resolution.schema, "Shot", "sg_plates").link(),
        Some(Link::ManyToMany(_))
    ));
}

// =============================================================================
// Display names and diagnostics
// =============================================================================

fn plates_sources(current: &str) -> SchemaSources {
    sources_of(json!({
        "Asset": {"sg_plates": multi(&["Element"])},
        "Element": {"sg_source_assets": named_multi(current, &["Asset"])}
    }))
}

#[test]
fn test_single_display_name_candidate_is_linked_with_low_confidence() {
    let resolution = common::resolve(&plates_sources("Plates"));
    let diagnostics: Vec<_> = resolution.diagnostics_of(DiagnosticKind::LowConfidenceMatch).collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].qualified_field(), "Asset.sg_plates");
    assert_eq!(diagnostics[0].candidates, vec!["Element.sg_source_assets"]);
    assert_eq!(resolution.warnings().count(), 0);

    let LinkSnapshot::ManyToMany { reverse, .. } = link_of(&resolution.schema, "Asset", "sg_plates")
    else {
        panic!("expected a many-to-many link");
    };
    assert_eq!(reverse.as_deref(), Some("Element.sg_source_assets"));
}

#[test]
fn test_previous_display_names_are_consulted() {
    let sources = plates_sources("Source Material").with_history(vec![DisplayNameChange {
        entity_type: "Element".into(),
        field_name: "sg_source_assets".into(),
        old_value: Some("Plates".into()),
        new_value: Some("Source Material".into()),
        created_at: "2020-01-01T00:00:00".parse().unwrap(),
    }]);
    let resolution = common::resolve(&sources);
    let LinkSnapshot::ManyToMany { reverse, .. } = link_of(&resolution.schema, "Asset", "sg_plates")
    else {
        panic!("expected a many-to-many link");
    };
    assert_eq!(reverse.as_deref(), Some("Element.sg_source_assets"));
}

fn renamed_shot_fields(a_renamed_at: &str, b_renamed_at: &str) -> SchemaSources {
    let rename = |field: &str, new: &str, at: &str| DisplayNameChange {
        entity_type: "Shot".into(),
        field_name: field.into(),
        old_value: Some("Linked Shots".into()),
        new_value: Some(new.into()),
        created_at: at.parse().unwrap(),
    };
    sources_of(json!({
        "Asset": {"sg_linked_shots": multi(&["Shot"])},
        "Shot": {
            "sg_a": named_multi("Cuts", &["Asset"]),
            "sg_b": named_multi("Edits", &["Asset"])
        }
    }))
    .with_history(vec![
        rename("sg_b", "Edits", b_renamed_at),
        rename("sg_a", "Cuts", a_renamed_at),
    ])
}

#[test]
fn test_most_recent_rename_wins() {
    let resolution = common::resolve(&renamed_shot_fields("2019-06-01T00:00:00", "2021-02-01T00:00:00"));
    assert_eq!(resolution.diagnostics_of(DiagnosticKind::AmbiguousReverseLink).count(), 0);
    let LinkSnapshot::ManyToMany { reverse, .. } =
        link_of(&resolution.schema, "Asset", "sg_linked_shots")
    else {
        panic!("expected a many-to-many link");
    };
    assert_eq!(reverse.as_deref(), Some("Shot.sg_b"));

    let resolution = common::resolve(&renamed_shot_fields("2021-03-01T00:00:00", "2021-02-01T00:00:00"));
    let LinkSnapshot::ManyToMany { reverse, .. } =
        link_of(&resolution.schema, "Asset", "sg_linked_shots")
    else {
        panic!("expected a many-to-many link");
    };
    assert_eq!(reverse.as_deref(), Some("Shot.sg_a"));
}

#[test]
fn test_renames_at_the_same_time_stay_ambiguous() {
    let at = "2021-02-01T00:00:00";
    let resolution = common::resolve(&renamed_shot_fields(at, at));
    let ambiguous: Vec<_> = resolution
        .diagnostics_of(DiagnosticKind::AmbiguousReverseLink)
        .collect();
    assert_eq!(ambiguous.len(), 1);
    assert_eq!(ambiguous[0].candidates, vec!["Shot.sg_a", "Shot.sg_b"]);
}

#[test]
fn test_single_candidate_only_reported_when_not_accepted() {
    let mut settings = Settings::default();
    settings.resolver.accept_single_candidate = false;
    let resolution = RelationshipResolver::new(&settings)
        .unwrap()
        .resolve(&plates_sources("Plates"));

    let diagnostic = resolution
        .diagnostics_of(DiagnosticKind::LowConfidenceMatch)
        .next()
        .unwrap();
    assert!(diagnostic.message.contains("not linked"));
    let LinkSnapshot::ManyToMany { reverse, connection, .. } =
        link_of(&resolution.schema, "Asset", "sg_plates")
    else {
        panic!("expected a many-to-many link");
    };
    assert_eq!(reverse, None);
    assert_eq!(connection, "FakeAssetSgPlatesConnection");
}

#[test]
fn test_display_name_fallback_can_be_disabled() {
    let mut settings = Settings::default();
    settings.resolver.display_name_fallback = false;
    let resolution = RelationshipResolver::new(&settings)
        .unwrap()
        .resolve(&plates_sources("Plates"));
    assert!(resolution.diagnostics.is_empty());
}

#[test]
fn test_ambiguous_candidates_leave_field_unpaired() {
    let sources = sources_of(json!({
        "Asset": {"sg_linked_shots": multi(&["Shot"])},
        "Shot": {
            "sg_a": named_multi("Linked Shots", &["Asset"]),
            "sg_b": named_multi("Linked Shots", &["Asset"])
        }
    }));
    let resolution = common::resolve(&sources);

    let ambiguous: Vec<_> = resolution
        .diagnostics_of(DiagnosticKind::AmbiguousReverseLink)
        .collect();
    assert_eq!(ambiguous.len(), 1);
    assert_eq!(ambiguous[0].qualified_field(), "Asset.sg_linked_shots");
    assert_eq!(ambiguous[0].candidates, vec!["Shot.sg_a", "Shot.sg_b"]);
    assert_eq!(resolution.warnings().count(), 1);

    let LinkSnapshot::ManyToMany { reverse, .. } =
        link_of(&resolution.schema, "Asset", "sg_linked_shots")
    else {
        panic!("expected a many-to-many link");
    };
    assert_eq!(reverse, None);
}

#[test]
fn test_unpaired_single_entity_field_is_an_orphan() {
    let sources = sources_of(json!({
        "Shot": {
            "sg_lead": {"data_type": {"value": "entity"}, "properties": {"valid_types": {"value": ["HumanUser"]}}}
        },
        "HumanUser": {}
    }));
    let resolution = common::resolve(&sources);
    let orphans: Vec<String> = resolution
        .diagnostics_of(DiagnosticKind::OrphanLinkField)
        .map(|d| d.qualified_field())
        .collect();
    assert_eq!(orphans, vec!["Shot.sg_lead"]);
    let f = field(&resolution.schema, "Shot", "sg_lead");
    assert!(!f.is_linked() && !f.is_one_sided());
}

#[test]
fn test_synthesized_names_avoid_collisions() {
    let sources = sources_of(json!({
        "Project": {"users": multi(&["HumanUser"])},
        "HumanUser": {},
        "FakeProjectUsersConnection": {}
    }));
    let schema = common::resolve(&sources).schema;
    let LinkSnapshot::ManyToMany { connection, .. } = link_of(&schema, "Project", "users") else {
        panic!("expected a many-to-many link");
    };
    assert_eq!(connection, "FakeProjectUsersConnection2");
}

#[test]
fn test_reverse_of_hint_struct_matches_json() {
    let hint = FieldHint {
        reverse_of: Some(ReverseOf {
            entity_type_name: "Element".into(),
            name: "sg_used_in".into(),
        }),
        ..Default::default()
    };
    assert_eq!(
        serde_json::to_value(&hint).unwrap()["reverse_of"],
        json!({"entity_type_name": "Element", "name": "sg_used_in"})
    );
}

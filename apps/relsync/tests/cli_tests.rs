//! Integration tests for configuration loading and CLI commands.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use relsync::cli::{
    Context, cmd_audit, cmd_check_config, cmd_delete, cmd_export, cmd_import_config, cmd_init,
    cmd_label, cmd_load, cmd_relations, load_entries, open_session, parse_load_entries,
    snapshot_of,
};
use relsync::config::{load_site_config, parse_site_config};
use relsync_core::{
    EntityId, EntityStore, EntityType, RelsyncError, SchemaRegistry, Session, store_from_bytes,
};
use std::path::Path;
use tempfile::TempDir;

const SITE: &str = include_str!("../demos/site.toml");
const ENTITIES: &str = include_str!("../demos/entities.json");

fn context(dir: &Path, backend: &str) -> Context {
    let config = dir.join("relsync.toml");
    std::fs::write(&config, SITE).unwrap();
    Context {
        config,
        database: dir.join("relsync.db"),
        backend: backend.to_string(),
        json_mode: false,
        verbose: false,
    }
}

fn demo_session() -> Session {
    let registry = SchemaRegistry::new(parse_site_config(SITE).unwrap());
    let mut session = Session::new(registry);
    let entries = parse_load_entries(ENTITIES.as_bytes()).unwrap();
    load_entries(&mut session, entries).unwrap();
    session
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[test]
fn test_demo_config_is_valid() {
    let config = parse_site_config(SITE).unwrap();
    let registry = SchemaRegistry::new(config);

    assert!(registry.validate_all().is_empty());
    assert!(registry.is_relation_bundle("relation_partnership"));
    assert!(registry.is_relation_bundle("relation_employment"));
    assert!(registry.resolve_mirror_schema("selfrelation_roles").is_some());
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = parse_site_config("").unwrap();
    assert_eq!(config.settings.related_entity_field_1, "rn_related_entity_1");
    assert!(config.bundles.is_empty());
}

#[test]
fn test_invalid_config_rejected() {
    let result = parse_site_config("[bundles.company\nrelation_enabled = true");
    assert!(matches!(result, Err(RelsyncError::DeserializationError(_))));
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_site_config(&dir.path().join("absent.toml")).unwrap();
    assert!(config.vocabularies.is_empty());
}

// =============================================================================
// ENTITY LOADING
// =============================================================================

#[test]
fn test_load_entries_runs_hooks() {
    let session = demo_session();

    let partnership = session.load(EntityType::Node, EntityId(3)).unwrap().unwrap();
    assert_eq!(partnership.label, "Relationship Company A - Company B");

    // Nested employment record is bound to Ann after her save
    let employment = session.load(EntityType::Node, EntityId(4)).unwrap().unwrap();
    assert_eq!(employment.first_reference("rn_related_entity_1"), Some(EntityId(5)));
    assert_eq!(employment.label, "Relationship Ann - Company A");
    assert!(session.pending_bindings().is_empty());

    // Employee -> Employer mirrored back
    let employer = session.load(EntityType::Term, EntityId(1)).unwrap().unwrap();
    assert_eq!(employer.first_reference("rn_mirror_reference"), Some(EntityId(2)));
}

#[test]
fn test_load_rejects_self_referencing_relation() {
    let registry = SchemaRegistry::new(parse_site_config(SITE).unwrap());
    let mut session = Session::new(registry);
    let entries = parse_load_entries(
        br#"[
            { "entity_type": "node", "bundle": "company", "label": "Solo" },
            {
                "entity_type": "node",
                "bundle": "relation_partnership",
                "label": "",
                "fields": {
                    "rn_related_entity_1": { "references": [1] },
                    "rn_related_entity_2": { "references": [1] }
                }
            }
        ]"#,
    )
    .unwrap();

    let result = load_entries(&mut session, entries);
    assert!(matches!(result, Err(RelsyncError::ValidationFailed(_))));
    assert_eq!(session.store().count(EntityType::Node).unwrap(), 1);
}

#[test]
fn test_malformed_entity_file_rejected() {
    let result = parse_load_entries(br#"[{ "bundle": "company" }]"#);
    assert!(matches!(result, Err(RelsyncError::DeserializationError(_))));
}

// =============================================================================
// COMMANDS: FILE BACKEND
// =============================================================================

#[test]
fn test_file_backend_load_and_cascade_delete() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path(), "file");
    let entities = dir.path().join("entities.json");
    std::fs::write(&entities, ENTITIES).unwrap();

    cmd_init(&ctx, false).unwrap();
    cmd_load(&ctx, &entities).unwrap();
    cmd_relations(&ctx, 1).unwrap();
    cmd_label(&ctx, 3).unwrap();
    cmd_audit(&ctx).unwrap();

    cmd_delete(&ctx, EntityType::Node, 1).unwrap();

    let registry = SchemaRegistry::new(load_site_config(&ctx.config).unwrap());
    let session = open_session(&ctx.database, "file", registry).unwrap();
    assert!(session.load(EntityType::Node, EntityId(3)).unwrap().is_none());
    assert!(session.load(EntityType::Node, EntityId(4)).unwrap().is_none());
    assert!(session.load(EntityType::Node, EntityId(2)).unwrap().is_some());
}

#[test]
fn test_init_refuses_existing_store() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path(), "file");

    cmd_init(&ctx, false).unwrap();
    assert!(cmd_init(&ctx, false).is_err());
    cmd_init(&ctx, true).unwrap();
}

#[test]
fn test_delete_missing_entity_fails() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path(), "file");

    let result = cmd_delete(&ctx, EntityType::Term, 42);
    assert!(matches!(result, Err(RelsyncError::EntityNotFound(_))));
}

// =============================================================================
// COMMANDS: REDB BACKEND
// =============================================================================

#[test]
fn test_redb_backend_failed_nested_entry_leaves_no_drafts() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path(), "redb");
    let entities = dir.path().join("entities.json");
    std::fs::write(
        &entities,
        br#"[
            { "entity_type": "node", "bundle": "company", "label": "Company A" },
            {
                "entity_type": "node",
                "bundle": "person",
                "label": "Ann",
                "nested": [
                    {
                        "host_field": "rn_related_entity_1",
                        "entity_type": "node",
                        "bundle": "relation_employment",
                        "label": "",
                        "fields": { "rn_related_entity_2": { "references": [1] } }
                    },
                    {
                        "host_field": "field_bogus",
                        "entity_type": "node",
                        "bundle": "relation_employment",
                        "label": "",
                        "fields": { "rn_related_entity_2": { "references": [1] } }
                    }
                ]
            }
        ]"#,
    )
    .unwrap();

    cmd_init(&ctx, false).unwrap();
    assert!(cmd_load(&ctx, &entities).is_err());
    cmd_audit(&ctx).unwrap();

    let registry = SchemaRegistry::new(load_site_config(&ctx.config).unwrap());
    let session = open_session(&ctx.database, "redb", registry).unwrap();
    assert_eq!(session.store().count(EntityType::Node).unwrap(), 1);
}

#[test]
fn test_redb_backend_export_snapshot() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path(), "redb");
    let entities = dir.path().join("entities.json");
    std::fs::write(&entities, ENTITIES).unwrap();

    cmd_init(&ctx, false).unwrap();
    cmd_load(&ctx, &entities).unwrap();

    let output = dir.path().join("export.rels");
    cmd_export(&ctx, &output, "snapshot").unwrap();

    let store = store_from_bytes(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(store.count(EntityType::Node).unwrap(), 5);
    assert_eq!(store.count(EntityType::Term).unwrap(), 2);

    let registry = SchemaRegistry::new(load_site_config(&ctx.config).unwrap());
    let session = open_session(&ctx.database, "redb", registry).unwrap();
    assert!(session.is_persistent());
    assert_eq!(snapshot_of(&session).unwrap().entities().count(), 7);
}

#[test]
fn test_unknown_export_format_rejected() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path(), "file");
    let result = cmd_export(&ctx, &dir.path().join("out.bin"), "xml");
    assert!(matches!(result, Err(RelsyncError::SerializationError(_))));
}

// =============================================================================
// COMMANDS: CONFIGURATION
// =============================================================================

#[test]
fn test_check_config_reports_broken_bundle() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path(), "file");
    cmd_check_config(&ctx).unwrap();

    std::fs::write(
        &ctx.config,
        "[bundles.relation_broken]\nrelation_enabled = true\n",
    )
    .unwrap();
    assert!(matches!(
        cmd_check_config(&ctx),
        Err(RelsyncError::ValidationFailed(_))
    ));
}

#[test]
fn test_import_config_blocks_endpoint_removal() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path(), "file");
    let proposed = dir.path().join("proposed.toml");
    let without_endpoint = SITE.replace(
        "[bundles.relation_partnership.fields.rn_related_entity_2]",
        "[bundles.relation_partnership.fields.rn_unrelated]",
    );
    std::fs::write(&proposed, without_endpoint).unwrap();

    let result = cmd_import_config(&ctx, &proposed, false);
    assert!(matches!(result, Err(RelsyncError::ImportBlocked(_))));
    assert_eq!(std::fs::read_to_string(&ctx.config).unwrap(), SITE);
}

#[test]
fn test_import_config_applies_valid_change() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path(), "file");
    let proposed = dir.path().join("proposed.toml");
    let extended = format!("{SITE}\n[bundles.event]\n");
    std::fs::write(&proposed, &extended).unwrap();

    cmd_import_config(&ctx, &proposed, true).unwrap();
    assert_eq!(std::fs::read_to_string(&ctx.config).unwrap(), SITE);

    cmd_import_config(&ctx, &proposed, false).unwrap();
    assert_eq!(std::fs::read_to_string(&ctx.config).unwrap(), extended);
}

//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::{load_site_config, read_site_config};
use relsync_core::{
    ConfigDiff, Entity, EntityId, EntityKey, EntityType, MemoryStore, RelsyncError,
    SchemaRegistry, SerializableStore, Session, StorageBackend, VocabularyRole, import_config,
    primitives::MAX_LOAD_BATCH, store_from_bytes, store_to_bytes,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: PathBuf,
    pub database: PathBuf,
    pub backend: String,
    pub json_mode: bool,
    pub verbose: bool,
}

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for entity loading (100 MB).
const MAX_LOAD_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), RelsyncError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| RelsyncError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(RelsyncError::DeserializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, RelsyncError> {
    let canonical = path.canonicalize().map_err(|e| {
        RelsyncError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(RelsyncError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path; its parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, RelsyncError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        RelsyncError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(RelsyncError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| RelsyncError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty store.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), RelsyncError> {
    let db_path = &ctx.database;
    if db_path.exists() {
        if !force {
            return Err(RelsyncError::IoError(
                "Store already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| RelsyncError::IoError(format!("Remove store: {}", e)))?;
    }

    let registry = SchemaRegistry::new(load_site_config(&ctx.config)?);
    let session = open_session(db_path, &ctx.backend, registry)?;
    save_session(&session, db_path)?;

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "database": db_path.to_string_lossy(),
            "backend": ctx.backend,
        }));
    } else {
        println!("Initialized new {} store at {:?}", ctx.backend, db_path);
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store and schema status.
pub fn cmd_status(ctx: &Context) -> Result<(), RelsyncError> {
    let session = load_or_create_session(ctx)?;
    let store = session.store();
    let registry = session.registry();

    let node_count = store.count(EntityType::Node)?;
    let term_count = store.count(EntityType::Term)?;
    let mut relation_records = 0;
    for schema in registry.relation_bundles() {
        relation_records += store.ids(EntityType::Node, Some(&schema.bundle))?.len();
    }
    let relation_bundles: Vec<&str> = registry
        .relation_bundles()
        .map(|schema| schema.bundle.as_str())
        .collect();
    let config_errors = registry.validate_all().len();

    if ctx.json_mode {
        let mut status = serde_json::json!({
            "database": ctx.database.to_string_lossy(),
            "backend": ctx.backend,
            "config": ctx.config.to_string_lossy(),
            "node_count": node_count,
            "term_count": term_count,
            "relation_records": relation_records,
            "relation_bundles": relation_bundles,
            "config_errors": config_errors,
        });
        if ctx.verbose {
            let schemas: Vec<_> = registry.relation_bundles().collect();
            let roles: BTreeMap<&str, VocabularyRole> = registry
                .config()
                .vocabularies
                .keys()
                .filter_map(|name| {
                    registry
                        .classify_vocabulary(name)
                        .map(|role| (name.as_str(), role))
                })
                .collect();
            status["schemas"] = serde_json::json!(schemas);
            status["vocabularies"] = serde_json::json!(roles);
        }
        print_json(&status);
        return Ok(());
    }

    println!("relsync Store Status");
    println!("====================");
    println!("Database: {:?}", ctx.database);
    println!("Backend:  {}", ctx.backend);
    println!("Config:   {:?}", ctx.config);
    println!();
    println!("Nodes:            {}", node_count);
    println!("Terms:            {}", term_count);
    println!("Relation records: {}", relation_records);
    println!("Relation bundles: {}", relation_bundles.len());
    println!("Config errors:    {}", config_errors);

    if ctx.verbose {
        println!();
        for bundle in &relation_bundles {
            println!("  relation bundle: {}", bundle);
        }
        for name in registry.config().vocabularies.keys() {
            if let Some(role) = registry.classify_vocabulary(name) {
                println!("  vocabulary {}: {:?}", name, role);
            }
        }
    }

    Ok(())
}

// =============================================================================
// CONFIGURATION COMMANDS
// =============================================================================

/// Validate the active site configuration.
pub fn cmd_check_config(ctx: &Context) -> Result<(), RelsyncError> {
    let registry = SchemaRegistry::new(load_site_config(&ctx.config)?);
    let report = registry.validate_all();

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "valid": report.is_empty(),
            "errors": report.errors(),
        }));
    } else if report.is_empty() {
        println!("Configuration is valid");
    } else {
        println!("Configuration has {} error(s):", report.len());
        for error in report.errors() {
            println!("  {}", error);
        }
    }

    if report.is_empty() {
        Ok(())
    } else {
        Err(RelsyncError::ValidationFailed(report.message()))
    }
}

/// Validate a proposed configuration and make it the active one.
pub fn cmd_import_config(ctx: &Context, proposed: &Path, dry_run: bool) -> Result<(), RelsyncError> {
    let validated_path = validate_file_path(proposed)?;
    let current = load_site_config(&ctx.config)?;
    let proposed_config = read_site_config(&validated_path)?;
    let diff = ConfigDiff::between(&current, &proposed_config);

    import_config(&current, proposed_config)?;

    if !dry_run && !diff.is_empty() {
        std::fs::copy(&validated_path, &ctx.config)
            .map_err(|e| RelsyncError::IoError(format!("Write configuration: {}", e)))?;
        tracing::info!("Configuration imported from {:?}", validated_path);
    }

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "applied": !dry_run && !diff.is_empty(),
            "diff": diff,
        }));
        return Ok(());
    }

    if diff.is_empty() {
        println!("No configuration changes");
        return Ok(());
    }
    println!("Configuration changes:");
    if diff.settings_changed {
        println!("  settings changed");
    }
    for name in &diff.changed_bundles {
        println!("  bundle changed:     {}", name);
    }
    for name in &diff.deleted_bundles {
        println!("  bundle deleted:     {}", name);
    }
    for name in &diff.changed_vocabularies {
        println!("  vocabulary changed: {}", name);
    }
    for name in &diff.deleted_vocabularies {
        println!("  vocabulary deleted: {}", name);
    }
    if dry_run {
        println!("Dry run: active configuration left unchanged");
    } else {
        println!("Configuration imported");
    }
    Ok(())
}

// =============================================================================
// LOAD COMMAND
// =============================================================================

/// One entry of an entity file.
///
/// `nested` relation records are created as part of the entity's form: they
/// are saved first and receive the entity's id in `host_field` once the
/// entity itself is saved.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadEntry {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(default)]
    pub nested: Vec<NestedRelation>,
}

/// Relation record created inside a host entity's form.
#[derive(Debug, Clone, Deserialize)]
pub struct NestedRelation {
    pub host_field: String,
    #[serde(flatten)]
    pub relation: Entity,
}

/// Parse an entity file.
pub fn parse_load_entries(data: &[u8]) -> Result<Vec<LoadEntry>, RelsyncError> {
    let entries: Vec<LoadEntry> = serde_json::from_slice(data)
        .map_err(|e| RelsyncError::DeserializationError(format!("Invalid entity file: {}", e)))?;

    if entries.len() > MAX_LOAD_BATCH {
        return Err(RelsyncError::DeserializationError(format!(
            "Entity count {} exceeds maximum allowed {}",
            entries.len(),
            MAX_LOAD_BATCH
        )));
    }
    Ok(entries)
}

/// Save every entry through the session. Returns the keys of saved hosts.
pub fn load_entries(session: &mut Session, entries: Vec<LoadEntry>) -> Result<Vec<EntityKey>, RelsyncError> {
    let mut saved = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut entity = entry.entity;
        let id = if entry.nested.is_empty() {
            session.save(&mut entity)?
        } else {
            for nested in entry.nested {
                let mut relation = nested.relation;
                if let Err(e) = session.save_nested_relation(&mut relation, &nested.host_field) {
                    session.rollback_pending();
                    return Err(e);
                }
            }
            session.save_host(&mut entity)?
        };
        saved.push(EntityKey::new(entity.entity_type, id));
    }

    let unbound = session.finish_request();
    if !unbound.is_empty() {
        tracing::warn!("{} relation record(s) left without host", unbound.len());
    }
    Ok(saved)
}

/// Save entities from a JSON file.
pub fn cmd_load(ctx: &Context, file: &Path) -> Result<(), RelsyncError> {
    tracing::info!("Loading entities from {:?}", file);

    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_LOAD_FILE_SIZE)?;
    let data = std::fs::read(&validated_path)
        .map_err(|e| RelsyncError::IoError(format!("Read file: {}", e)))?;
    let entries = parse_load_entries(&data)?;

    let mut session = load_or_create_session(ctx)?;
    let saved = load_entries(&mut session, entries)?;
    save_session(&session, &ctx.database)?;

    if ctx.json_mode {
        let keys: Vec<String> = saved.iter().map(ToString::to_string).collect();
        print_json(&serde_json::json!({ "saved": keys.len(), "entities": keys }));
    } else {
        println!("Saved {} entities", saved.len());
        if ctx.verbose {
            for key in &saved {
                println!("  {}", key);
            }
        }
    }
    Ok(())
}

// =============================================================================
// RELATION COMMANDS
// =============================================================================

/// List relation records referencing a node.
pub fn cmd_relations(ctx: &Context, id: u64) -> Result<(), RelsyncError> {
    let session = load_or_create_session(ctx)?;
    let key = EntityKey::node(id);
    let target = session.store().load_required(key)?;

    let graph = session.relation_graph();
    let mut rows = Vec::new();
    for (bundle, records) in session.find_referencing_relations(&target)? {
        for record_id in records {
            let Some(record) = session.load(EntityType::Node, record_id)? else {
                continue;
            };
            let field = graph.resolve_join_field(&record, key.id)?;
            rows.push((bundle.clone(), record_id, field, record.label));
        }
    }

    if ctx.json_mode {
        let json: Vec<serde_json::Value> = rows
            .iter()
            .map(|(bundle, record, field, label)| {
                serde_json::json!({
                    "bundle": bundle,
                    "id": record.0,
                    "join_field": field,
                    "label": label,
                })
            })
            .collect();
        print_json(&serde_json::json!({ "node": id, "relations": json }));
        return Ok(());
    }

    if rows.is_empty() {
        println!("Node {} has no relation records", id);
        return Ok(());
    }
    println!("Relation records referencing node {}:", id);
    for (bundle, record, field, label) in &rows {
        println!(
            "  {}:{} via {} - {}",
            bundle,
            record,
            field.as_deref().unwrap_or("?"),
            label
        );
    }
    Ok(())
}

/// Show the stored and generated label of a relation record.
pub fn cmd_label(ctx: &Context, id: u64) -> Result<(), RelsyncError> {
    let session = load_or_create_session(ctx)?;
    let key = EntityKey::node(id);
    let record = session.store().load_required(key)?;

    let generated = session.generate_label(&record)?;
    let graph = session.relation_graph();
    let status = graph.validate_endpoints(&record, session.pending_bindings());
    let state = graph.relation_state(&record);
    let endpoints = graph.endpoint_values(&record);

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "id": id,
            "bundle": record.bundle,
            "label": record.label,
            "generated_label": generated,
            "status": status,
            "state": state,
            "endpoints": endpoints,
        }));
        return Ok(());
    }

    println!("Relation {}:{}", record.bundle, id);
    println!("  Stored label:    {}", record.label);
    println!("  Generated label: {}", generated);
    if let Some(status) = status {
        println!("  Endpoints:       {:?}", status);
    }
    if let Some(state) = state {
        println!("  State:           {:?}", state);
    }
    for endpoint in endpoints.iter().flatten() {
        match endpoint.target {
            Some(target) => println!("    {} -> node {}", endpoint.field, target),
            None => println!("    {} -> (empty)", endpoint.field),
        }
    }
    Ok(())
}

// =============================================================================
// DELETE COMMAND
// =============================================================================

/// Delete an entity and run its delete hooks.
pub fn cmd_delete(ctx: &Context, entity_type: EntityType, id: u64) -> Result<(), RelsyncError> {
    let mut session = load_or_create_session(ctx)?;
    let key = EntityKey::new(entity_type, EntityId(id));
    let entity = session.store().load_required(key)?;

    let cascaded: usize = session
        .find_referencing_relations(&entity)?
        .values()
        .map(|records| records.len())
        .sum();

    session.delete(key.entity_type, key.id)?;
    save_session(&session, &ctx.database)?;

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "deleted": key.to_string(),
            "relation_records_deleted": cascaded,
        }));
    } else if cascaded > 0 {
        println!("Deleted {} and {} relation record(s)", key, cascaded);
    } else {
        println!("Deleted {}", key);
    }
    Ok(())
}

// =============================================================================
// AUDIT COMMAND
// =============================================================================

/// Report relation records in an invalid state.
pub fn cmd_audit(ctx: &Context) -> Result<(), RelsyncError> {
    let session = load_or_create_session(ctx)?;
    let report = session.audit()?;

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "clean": report.is_empty(),
            "errors": report.errors(),
        }));
    } else if report.is_empty() {
        println!("All relation records are consistent");
    } else {
        println!("{} relation record problem(s):", report.len());
        for error in report.errors() {
            println!("  {}", error);
        }
    }

    if report.is_empty() {
        Ok(())
    } else {
        Err(RelsyncError::ValidationFailed(report.message()))
    }
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export the store as a snapshot or JSON.
///
/// Works with both backends: a redb store is copied into memory first.
pub fn cmd_export(ctx: &Context, output: &Path, format: &str) -> Result<(), RelsyncError> {
    let validated_output = validate_output_path(output)?;
    let session = load_or_create_session(ctx)?;
    let store = snapshot_of(&session)?;

    let data = match format {
        "snapshot" => store_to_bytes(&store)?,
        "json" => serde_json::to_vec_pretty(&SerializableStore::from(&store))
            .map_err(|e| RelsyncError::SerializationError(e.to_string()))?,
        _ => {
            return Err(RelsyncError::SerializationError(format!(
                "Unknown format: {}. Use: snapshot, json",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| RelsyncError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Load the configured registry and open the store.
pub fn load_or_create_session(ctx: &Context) -> Result<Session, RelsyncError> {
    let registry = SchemaRegistry::new(load_site_config(&ctx.config)?);
    open_session(&ctx.database, &ctx.backend, registry)
}

/// Open a store with the specified backend.
pub fn open_session(db_path: &Path, backend: &str, registry: SchemaRegistry) -> Result<Session, RelsyncError> {
    match backend {
        "redb" => Session::with_redb(db_path, registry),
        "file" => {
            if db_path.exists() {
                let data = std::fs::read(db_path)
                    .map_err(|e| RelsyncError::IoError(format!("Read store: {}", e)))?;
                Ok(Session::with_store(store_from_bytes(&data)?, registry))
            } else {
                Ok(Session::new(registry))
            }
        }
        other => Err(RelsyncError::IoError(format!(
            "Unknown backend: {}. Use: redb, file",
            other
        ))),
    }
}

/// Write an in-memory session back to its snapshot file.
pub fn save_session(session: &Session, db_path: &Path) -> Result<(), RelsyncError> {
    let Some(store) = session.memory_store() else {
        // redb commits on every write
        return Ok(());
    };
    let data = store_to_bytes(store)?;
    std::fs::write(db_path, &data).map_err(|e| RelsyncError::IoError(format!("Write store: {}", e)))
}

/// Copy the session's store into memory.
pub fn snapshot_of(session: &Session) -> Result<MemoryStore, RelsyncError> {
    match session.backend() {
        StorageBackend::InMemory(store) => Ok(store.clone()),
        StorageBackend::Persistent(redb) => redb.to_memory(),
    }
}

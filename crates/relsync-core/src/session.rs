//! # Session Module
//!
//! Entry point for every write. A `Session` owns the entity store, the
//! schema registry built from the active configuration, and the state of
//! the current request (pending bind-back writes and terms being synced).
//!
//! Saves and deletes run the lifecycle hooks of the engine:
//! - relation records get their label regenerated before save;
//! - self-referencing terms propagate mirror changes after save and delete;
//! - deleting a node deletes every relation record that references it.
//!
//! ## Storage Backends
//!
//! - `InMemory`: `MemoryStore`, volatile unless written out as a snapshot
//! - `Persistent`: `RedbStore`, disk-backed ACID storage

use crate::binding::BindingQueue;
use crate::mirror::MirrorSync;
use crate::relation::{EndpointStatus, ReferencingRelations, RelationGraph, describe};
use crate::schema::SchemaRegistry;
use crate::settings::SiteConfig;
use crate::storage::RedbStore;
use crate::store::{EntityStore, MemoryStore};
use crate::types::{Entity, EntityId, EntityType, FieldValue, RelsyncError};
use crate::validation::{ErrorCode, ValidationReport};
use std::collections::BTreeSet;
use std::path::Path;

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    fn store(&self) -> &dyn EntityStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(redb) => redb,
        }
    }

    fn store_mut(&mut self) -> &mut dyn EntityStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(redb) => redb,
        }
    }
}

/// Point in an entity's lifecycle at which hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleHook {
    Insert,
    Update,
    Delete,
}

/// State scoped to one request. Never persisted.
#[derive(Debug, Default)]
struct RequestState {
    bindings: BindingQueue,
    syncing: BTreeSet<EntityId>,
}

/// Store, schema and request state behind every engine operation.
#[derive(Debug, Default)]
pub struct Session {
    backend: StorageBackend,
    registry: SchemaRegistry,
    request: RequestState,
}

impl Session {
    /// Create an empty in-memory session for `registry`.
    #[must_use]
    pub fn new(registry: SchemaRegistry) -> Self {
        Self::with_store(MemoryStore::new(), registry)
    }

    /// Create a session over an existing in-memory store.
    #[must_use]
    pub fn with_store(store: MemoryStore, registry: SchemaRegistry) -> Self {
        Self {
            backend: StorageBackend::InMemory(store),
            registry,
            request: RequestState::default(),
        }
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    pub fn with_redb(path: impl AsRef<Path>, registry: SchemaRegistry) -> Result<Self, RelsyncError> {
        let redb = RedbStore::open(path)?;
        Ok(Self {
            backend: StorageBackend::Persistent(redb),
            registry,
            request: RequestState::default(),
        })
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// In-memory store, `None` for persistent backends.
    #[must_use]
    pub fn memory_store(&self) -> Option<&MemoryStore> {
        match &self.backend {
            StorageBackend::InMemory(store) => Some(store),
            StorageBackend::Persistent(_) => None,
        }
    }

    /// Read access to the store, whatever the backend.
    #[must_use]
    pub fn store(&self) -> &dyn EntityStore {
        self.backend.store()
    }

    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    #[must_use]
    pub fn relation_graph(&self) -> RelationGraph<'_> {
        RelationGraph::new(&self.registry)
    }

    /// Bind-back writes still waiting for a host id.
    #[must_use]
    pub fn pending_bindings(&self) -> &BindingQueue {
        &self.request.bindings
    }

    /// Swap in a new configuration. Schemas are resolved again once.
    pub fn reload_config(&mut self, config: SiteConfig) {
        self.registry = SchemaRegistry::new(config);
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn load(&self, entity_type: EntityType, id: EntityId) -> Result<Option<Entity>, RelsyncError> {
        self.backend.store().load(entity_type, id)
    }

    /// Relation records referencing `target`, grouped by relation bundle.
    pub fn find_referencing_relations(&self, target: &Entity) -> Result<ReferencingRelations, RelsyncError> {
        self.relation_graph()
            .find_referencing_relations(self.backend.store(), target)
    }

    /// Display label the engine would assign to a relation record.
    pub fn generate_label(&self, record: &Entity) -> Result<String, RelsyncError> {
        self.relation_graph().generate_label(self.backend.store(), record)
    }

    /// Check a relation record as a form submission would.
    ///
    /// Records persisted with a missing endpoint are accepted only while a
    /// bind-back write is pending for them.
    #[must_use]
    pub fn check(&self, record: &Entity) -> ValidationReport {
        let mut report = ValidationReport::new();
        let context = describe(record);
        match self
            .relation_graph()
            .validate_endpoints(record, &self.request.bindings)
        {
            Some(EndpointStatus::SelfReferencing) => report.push(ErrorCode::SelfReferring, context),
            Some(EndpointStatus::Incomplete) => report.push(ErrorCode::Incomplete, context),
            _ => {}
        }
        report
    }

    /// Validate every stored relation record.
    pub fn audit(&self) -> Result<ValidationReport, RelsyncError> {
        self.relation_graph()
            .audit(self.backend.store(), &self.request.bindings)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Save an entity and run its lifecycle hooks.
    ///
    /// Relation records referencing the same entity twice, or missing an
    /// endpoint, are rejected with `RelsyncError::ValidationFailed`. Use
    /// `save_nested_relation` for records whose host is not saved yet.
    pub fn save(&mut self, entity: &mut Entity) -> Result<EntityId, RelsyncError> {
        self.save_with(entity, false)
    }

    fn save_with(&mut self, entity: &mut Entity, allow_incomplete: bool) -> Result<EntityId, RelsyncError> {
        let mut report = self.check(entity);
        if !allow_incomplete && entity.is_new() && self.missing_endpoint(entity) {
            report.push(ErrorCode::Incomplete, describe(entity));
        }
        let blocking = report.contains(ErrorCode::SelfReferring)
            || (!allow_incomplete && report.contains(ErrorCode::Incomplete));
        if blocking {
            return Err(RelsyncError::ValidationFailed(report.message()));
        }

        let original = match entity.id {
            Some(id) => self.load(entity.entity_type, id)?,
            None => None,
        };

        self.presave(entity)?;
        let id = self.backend.store_mut().save(entity)?;

        let hook = if original.is_some() {
            LifecycleHook::Update
        } else {
            LifecycleHook::Insert
        };
        self.dispatch(entity, original.as_ref(), hook)?;
        Ok(id)
    }

    fn missing_endpoint(&self, record: &Entity) -> bool {
        self.relation_graph()
            .endpoint_values(record)
            .is_some_and(|endpoints| endpoints.iter().any(|e| e.target.is_none()))
    }

    /// Regenerate the title of auto-titled relation records.
    fn presave(&self, entity: &mut Entity) -> Result<(), RelsyncError> {
        let graph = self.relation_graph();
        if graph.schema_of(entity).is_some_and(|schema| schema.auto_title) {
            entity.label = graph.generate_label(self.backend.store(), entity)?;
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        entity: &Entity,
        original: Option<&Entity>,
        hook: LifecycleHook,
    ) -> Result<(), RelsyncError> {
        match (entity.entity_type, hook) {
            (EntityType::Term, _) => MirrorSync::set_mirror_term_link(self, entity, original, hook),
            (EntityType::Node, LifecycleHook::Delete) => self.delete_referencing_relations(entity),
            (EntityType::Node, _) => Ok(()),
        }
    }

    /// Delete an entity and run its delete hooks.
    ///
    /// Returns `false` when nothing was stored under the id.
    pub fn delete(&mut self, entity_type: EntityType, id: EntityId) -> Result<bool, RelsyncError> {
        let Some(entity) = self.load(entity_type, id)? else {
            return Ok(false);
        };
        self.backend.store_mut().delete(entity_type, id)?;
        if entity_type == EntityType::Node {
            self.request.bindings.remove(id);
        }
        self.dispatch(&entity, None, LifecycleHook::Delete)?;
        Ok(true)
    }

    fn delete_referencing_relations(&mut self, entity: &Entity) -> Result<(), RelsyncError> {
        let found = self.find_referencing_relations(entity)?;
        for (bundle, records) in found {
            tracing::info!(
                entity = ?entity.key(),
                bundle = %bundle,
                count = records.len(),
                "deleting relation records of deleted entity"
            );
            for record in records {
                self.delete(EntityType::Node, record)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // NESTED RELATION FORMS
    // =========================================================================

    /// Save a relation record created inside the form of an unsaved host.
    ///
    /// The record is persisted with `host_field` empty; the host id is
    /// written once `save_host` succeeds.
    pub fn save_nested_relation(
        &mut self,
        relation: &mut Entity,
        host_field: &str,
    ) -> Result<EntityId, RelsyncError> {
        let schema = self
            .relation_graph()
            .schema_of(relation)
            .ok_or_else(|| RelsyncError::NotARelation(relation.bundle.clone()))?;
        if !schema.has_endpoint(host_field) {
            return Err(RelsyncError::UnknownEndpointField {
                bundle: relation.bundle.clone(),
                field: host_field.to_string(),
            });
        }

        relation.clear_field(host_field);
        let id = self.save_with(relation, true)?;
        self.request.bindings.queue(id, host_field);
        tracing::debug!(relation = %id, field = host_field, "queued bind-back");
        Ok(id)
    }

    /// Save the host of a nested relation form and bind pending records to it.
    ///
    /// All or nothing: if the host cannot be saved, or any queued record
    /// cannot take the host id, every queued draft is deleted and the error
    /// is returned. An existing host is checked against every binding before
    /// it is written.
    pub fn save_host(&mut self, host: &mut Entity) -> Result<EntityId, RelsyncError> {
        if let Some(id) = host.id {
            if let Err(e) = self.check_bindings(id) {
                self.rollback_pending();
                return Err(e);
            }
        }
        match self.save(host) {
            Ok(id) => {
                self.bind_pending(id)?;
                Ok(id)
            }
            Err(e) => {
                self.rollback_pending();
                Err(e)
            }
        }
    }

    /// Validate every queued record as if `host` were already written into it.
    fn check_bindings(&self, host: EntityId) -> Result<(), RelsyncError> {
        let mut report = ValidationReport::new();
        for (relation, field) in self.request.bindings.iter() {
            let Some(mut record) = self.load(EntityType::Node, relation)? else {
                continue;
            };
            record.set_field_value(field, FieldValue::reference(host));
            report.merge(self.check(&record));
        }
        if report.is_empty() {
            Ok(())
        } else {
            Err(RelsyncError::ValidationFailed(report.message()))
        }
    }

    fn bind_pending(&mut self, host: EntityId) -> Result<(), RelsyncError> {
        let mut queued = self.request.bindings.drain().into_iter();
        while let Some((relation, field)) = queued.next() {
            let bound = self.bind_one(relation, &field, host);
            if let Err(e) = bound {
                let unbound: Vec<EntityId> = std::iter::once(relation)
                    .chain(queued.map(|(relation, _)| relation))
                    .collect();
                tracing::warn!(relation = %relation, error = %e, "bind-back failed, discarding drafts");
                self.discard_drafts(unbound);
                return Err(e);
            }
        }
        Ok(())
    }

    fn bind_one(&mut self, relation: EntityId, field: &str, host: EntityId) -> Result<(), RelsyncError> {
        let Some(mut record) = self.load(EntityType::Node, relation)? else {
            tracing::warn!(relation = %relation, "pending relation vanished before bind-back");
            return Ok(());
        };
        record.set_field_value(field, FieldValue::reference(host));
        self.save(&mut record)?;
        tracing::debug!(relation = %relation, host = %host, field = field, "bound relation to host");
        Ok(())
    }

    /// Delete every relation draft still waiting for its host.
    ///
    /// Call when a nested form is abandoned part way, e.g. because one of
    /// its relation records was rejected.
    pub fn rollback_pending(&mut self) {
        let drafts: Vec<EntityId> = self
            .request
            .bindings
            .drain()
            .into_iter()
            .map(|(relation, _)| relation)
            .collect();
        self.discard_drafts(drafts);
    }

    fn discard_drafts(&mut self, drafts: Vec<EntityId>) {
        for relation in drafts {
            if let Err(e) = self.delete(EntityType::Node, relation) {
                tracing::warn!(relation = %relation, error = %e, "failed to roll back relation draft");
            }
        }
    }

    /// End the current request.
    ///
    /// Returns the relation records left without their host binding; they
    /// stay stored as incomplete records.
    pub fn finish_request(&mut self) -> Vec<EntityId> {
        let unbound: Vec<EntityId> = self
            .request
            .bindings
            .drain()
            .into_iter()
            .map(|(relation, _)| relation)
            .collect();
        if !unbound.is_empty() {
            tracing::warn!(count = unbound.len(), "request ended with unbound relation records");
        }
        self.request.syncing.clear();
        unbound
    }

    // =========================================================================
    // RE-ENTRANCY GUARD
    // =========================================================================

    /// Mark a term as syncing. `false` if it already is.
    pub(crate) fn begin_sync(&mut self, term: EntityId) -> bool {
        self.request.syncing.insert(term)
    }

    pub(crate) fn end_sync(&mut self, term: EntityId) {
        self.request.syncing.remove(&term);
    }

    pub(crate) fn is_syncing(&self, term: EntityId) -> bool {
        self.request.syncing.contains(&term)
    }
}

// =============================================================================
// TESTS
// =============================================================================

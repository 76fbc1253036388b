//! # Entity Store
//!
//! The content-entity store the engine runs against.
//!
//! This module defines the `EntityStore` trait and `MemoryStore`, the
//! in-memory implementation. All data structures use `BTreeMap` so that
//! query results come back in id order on every backend.

use crate::types::{Entity, EntityId, EntityKey, EntityType, RelsyncError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// ENTITYSTORE TRAIT
// =============================================================================

/// CRUD operations on content entities.
///
/// All fallible operations return `Result<T, RelsyncError>` so that in-memory
/// and persistent backends can be used interchangeably.
pub trait EntityStore {
    /// Load a single entity. Missing entities are `Ok(None)`.
    fn load(&self, entity_type: EntityType, id: EntityId) -> Result<Option<Entity>, RelsyncError>;

    /// Load several entities, skipping ids that do not exist. Input order is kept.
    fn load_multiple(
        &self,
        entity_type: EntityType,
        ids: &[EntityId],
    ) -> Result<Vec<Entity>, RelsyncError> {
        let mut entities = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(entity) = self.load(entity_type, id)? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Persist an entity. New entities get the next id, which is also written
    /// back into `entity.id`.
    fn save(&mut self, entity: &mut Entity) -> Result<EntityId, RelsyncError>;

    /// Delete an entity. Returns whether it existed.
    fn delete(&mut self, entity_type: EntityType, id: EntityId) -> Result<bool, RelsyncError>;

    /// Ids of entities in `bundle` whose `field` references `target`.
    fn query_references(
        &self,
        entity_type: EntityType,
        bundle: &str,
        field: &str,
        target: EntityId,
    ) -> Result<Vec<EntityId>, RelsyncError>;

    /// Ids of all entities of a type, optionally restricted to one bundle.
    fn ids(&self, entity_type: EntityType, bundle: Option<&str>) -> Result<Vec<EntityId>, RelsyncError>;

    /// Number of stored entities of a type.
    fn count(&self, entity_type: EntityType) -> Result<usize, RelsyncError>;

    /// Load an entity that must exist.
    fn load_required(&self, key: EntityKey) -> Result<Entity, RelsyncError> {
        self.load(key.entity_type, key.id)?
            .ok_or(RelsyncError::EntityNotFound(key))
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory entity store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entities: BTreeMap<EntityKey, Entity>,
    /// Next id per entity type. Ids are never reused.
    next_ids: BTreeMap<EntityType, u64>,
    /// Number of successful saves; lets callers observe write amplification.
    save_count: u64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entities in key order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of saves performed since creation.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.save_count
    }

    /// Next id that would be assigned for `entity_type`.
    #[must_use]
    pub fn next_id(&self, entity_type: EntityType) -> u64 {
        self.next_ids.get(&entity_type).copied().unwrap_or(1)
    }

    fn allocate(&mut self, entity_type: EntityType) -> EntityId {
        let next = self.next_id(entity_type);
        self.next_ids.insert(entity_type, next.saturating_add(1));
        EntityId(next)
    }
}

impl EntityStore for MemoryStore {
    fn load(&self, entity_type: EntityType, id: EntityId) -> Result<Option<Entity>, RelsyncError> {
        Ok(self.entities.get(&EntityKey::new(entity_type, id)).cloned())
    }

    fn save(&mut self, entity: &mut Entity) -> Result<EntityId, RelsyncError> {
        let id = match entity.id {
            Some(id) => {
                // Keep the counter ahead of explicitly assigned ids.
                if id.0 >= self.next_id(entity.entity_type) {
                    self.next_ids.insert(entity.entity_type, id.0.saturating_add(1));
                }
                id
            }
            None => self.allocate(entity.entity_type),
        };
        entity.id = Some(id);
        self.entities
            .insert(EntityKey::new(entity.entity_type, id), entity.clone());
        self.save_count = self.save_count.saturating_add(1);
        Ok(id)
    }

    fn delete(&mut self, entity_type: EntityType, id: EntityId) -> Result<bool, RelsyncError> {
        Ok(self.entities.remove(&EntityKey::new(entity_type, id)).is_some())
    }

    fn query_references(
        &self,
        entity_type: EntityType,
        bundle: &str,
        field: &str,
        target: EntityId,
    ) -> Result<Vec<EntityId>, RelsyncError> {
        Ok(self
            .entities
            .iter()
            .filter(|(key, entity)| {
                key.entity_type == entity_type
                    && entity.bundle == bundle
                    && entity.references(field).contains(&target)
            })
            .map(|(key, _)| key.id)
            .collect())
    }

    fn ids(&self, entity_type: EntityType, bundle: Option<&str>) -> Result<Vec<EntityId>, RelsyncError> {
        Ok(self
            .entities
            .iter()
            .filter(|(key, entity)| {
                key.entity_type == entity_type && bundle.is_none_or(|bundle| entity.bundle == bundle)
            })
            .map(|(key, _)| key.id)
            .collect())
    }

    fn count(&self, entity_type: EntityType) -> Result<usize, RelsyncError> {
        Ok(self
            .entities
            .keys()
            .filter(|key| key.entity_type == entity_type)
            .count())
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable form of a `MemoryStore`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SerializableStore {
    pub entities: Vec<Entity>,
    pub next_node_id: u64,
    pub next_term_id: u64,
}

impl From<&MemoryStore> for SerializableStore {
    fn from(store: &MemoryStore) -> Self {
        Self {
            entities: store.entities.values().cloned().collect(),
            next_node_id: store.next_id(EntityType::Node),
            next_term_id: store.next_id(EntityType::Term),
        }
    }
}

impl From<SerializableStore> for MemoryStore {
    fn from(serialized: SerializableStore) -> Self {
        let mut store = Self::new();
        store.next_ids.insert(EntityType::Node, serialized.next_node_id);
        store.next_ids.insert(EntityType::Term, serialized.next_term_id);
        for entity in serialized.entities {
            if let Some(key) = entity.key() {
                store.entities.insert(key, entity);
            }
        }
        store
    }
}

// =============================================================================
// TESTS
// =============================================================================

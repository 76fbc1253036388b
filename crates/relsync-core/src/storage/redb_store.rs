//! # redb-backed Entity Storage
//!
//! A disk-backed entity store using the redb embedded database.
//!
//! Every `save` and `delete` commits its own write transaction, which makes
//! the host store's last-write-wins behaviour explicit: a record is either
//! fully written or not at all. Entities are stored postcard-encoded under a
//! `(type tag, id)` key so one range scan covers one entity type.

use crate::store::{EntityStore, MemoryStore, SerializableStore};
use crate::types::{Entity, EntityId, EntityType, RelsyncError};
use redb::{Database, ReadableDatabase, TableDefinition};
use std::path::Path;

/// Table for entities: (type tag, id) -> serialized Entity bytes
const ENTITIES: TableDefinition<(u8, u64), &[u8]> = TableDefinition::new("entities");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const fn next_id_key(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Node => "next_node_id",
        EntityType::Term => "next_term_id",
    }
}

/// A disk-backed entity store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Cached id counters, written through on every allocation.
    next_node_id: u64,
    next_term_id: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("next_node_id", &self.next_node_id)
            .field("next_term_id", &self.next_term_id)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create an entity database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RelsyncError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| RelsyncError::IoError(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| RelsyncError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(ENTITIES)
                .map_err(|e| RelsyncError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| RelsyncError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| RelsyncError::IoError(e.to_string()))?;
        }

        let read_txn = db
            .begin_read()
            .map_err(|e| RelsyncError::IoError(e.to_string()))?;
        let (next_node_id, next_term_id) = {
            let table = read_txn
                .open_table(METADATA)
                .map_err(|e| RelsyncError::IoError(e.to_string()))?;
            let read = |key: &str| -> Result<u64, RelsyncError> {
                Ok(table
                    .get(key)
                    .map_err(|e| RelsyncError::IoError(e.to_string()))?
                    .map(|v| v.value())
                    .unwrap_or(1))
            };
            (
                read(next_id_key(EntityType::Node))?,
                read(next_id_key(EntityType::Term))?,
            )
        };

        Ok(Self {
            db,
            next_node_id,
            next_term_id,
        })
    }

    /// Next id that would be assigned for `entity_type`.
    #[must_use]
    pub fn next_id(&self, entity_type: EntityType) -> u64 {
        match entity_type {
            EntityType::Node => self.next_node_id,
            EntityType::Term => self.next_term_id,
        }
    }

    fn set_next_id(&mut self, entity_type: EntityType, value: u64) {
        match entity_type {
            EntityType::Node => self.next_node_id = value,
            EntityType::Term => self.next_term_id = value,
        }
    }

    /// All entities of a type in id order.
    pub fn entities(&self, entity_type: EntityType) -> Result<Vec<Entity>, RelsyncError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| RelsyncError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(ENTITIES)
            .map_err(|e| RelsyncError::IoError(e.to_string()))?;

        let tag = entity_type.tag();
        let mut entities = Vec::new();
        for entry in table
            .range((tag, 0u64)..=(tag, u64::MAX))
            .map_err(|e| RelsyncError::IoError(e.to_string()))?
        {
            let (_, data) = entry.map_err(|e| RelsyncError::IoError(e.to_string()))?;
            let entity: Entity = postcard::from_bytes(data.value())
                .map_err(|e| RelsyncError::DeserializationError(e.to_string()))?;
            entities.push(entity);
        }
        Ok(entities)
    }

    /// Copy every entity and counter into an in-memory store.
    pub fn to_memory(&self) -> Result<MemoryStore, RelsyncError> {
        let mut entities = self.entities(EntityType::Node)?;
        entities.extend(self.entities(EntityType::Term)?);
        Ok(MemoryStore::from(SerializableStore {
            entities,
            next_node_id: self.next_node_id,
            next_term_id: self.next_term_id,
        }))
    }
}

// =============================================================================
// ENTITYSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl EntityStore for RedbStore {
    fn load(&self, entity_type: EntityType, id: EntityId) -> Result<Option<Entity>, RelsyncError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| RelsyncError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(ENTITIES)
            .map_err(|e| RelsyncError::IoError(e.to_string()))?;

        match table
            .get((entity_type.tag(), id.0))
            .map_err(|e| RelsyncError::IoError(e.to_string()))?
        {
            Some(data) => {
                let entity: Entity = postcard::from_bytes(data.value())
                    .map_err(|e| RelsyncError::DeserializationError(e.to_string()))?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    fn save(&mut self, entity: &mut Entity) -> Result<EntityId, RelsyncError> {
        let entity_type = entity.entity_type;
        let current_next = self.next_id(entity_type);
        let (id, next) = match entity.id {
            Some(id) if id.0 >= current_next => (id, id.0.saturating_add(1)),
            Some(id) => (id, current_next),
            None => (EntityId(current_next), current_next.saturating_add(1)),
        };

        let mut stored = entity.clone();
        stored.id = Some(id);
        let bytes = postcard::to_allocvec(&stored)
            .map_err(|e| RelsyncError::SerializationError(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| RelsyncError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(ENTITIES)
                .map_err(|e| RelsyncError::IoError(e.to_string()))?;
            table
                .insert((entity_type.tag(), id.0), bytes.as_slice())
                .map_err(|e| RelsyncError::IoError(e.to_string()))?;
        }
        if next != current_next {
            let mut meta_table = write_txn
                .open_table(METADATA)
                .map_err(|e| RelsyncError::IoError(e.to_string()))?;
            meta_table
                .insert(next_id_key(entity_type), next)
                .map_err(|e| RelsyncError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| RelsyncError::IoError(e.to_string()))?;

        // Update in-memory state only after successful commit.
        self.set_next_id(entity_type, next);
        entity.id = Some(id);
        Ok(id)
    }

    fn delete(&mut self, entity_type: EntityType, id: EntityId) -> Result<bool, RelsyncError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| RelsyncError::IoError(e.to_string()))?;
        let existed = {
            let mut table = write_txn
                .open_table(ENTITIES)
                .map_err(|e| RelsyncError::IoError(e.to_string()))?;
            table
                .remove((entity_type.tag(), id.0))
                .map_err(|e| RelsyncError::IoError(e.to_string()))?
                .is_some()
        };
        write_txn
            .commit()
            .map_err(|e| RelsyncError::IoError(e.to_string()))?;
        Ok(existed)
    }

    fn query_references(
        &self,
        entity_type: EntityType,
        bundle: &str,
        field: &str,
        target: EntityId,
    ) -> Result<Vec<EntityId>, RelsyncError> {
        Ok(self
            .entities(entity_type)?
            .into_iter()
            .filter(|entity| entity.bundle == bundle && entity.references(field).contains(&target))
            .filter_map(|entity| entity.id)
            .collect())
    }

    fn ids(&self, entity_type: EntityType, bundle: Option<&str>) -> Result<Vec<EntityId>, RelsyncError> {
        Ok(self
            .entities(entity_type)?
            .into_iter()
            .filter(|entity| bundle.is_none_or(|bundle| entity.bundle == bundle))
            .filter_map(|entity| entity.id)
            .collect())
    }

    fn count(&self, entity_type: EntityType) -> Result<usize, RelsyncError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| RelsyncError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(ENTITIES)
            .map_err(|e| RelsyncError::IoError(e.to_string()))?;

        let tag = entity_type.tag();
        let mut count = 0usize;
        for entry in table
            .range((tag, 0u64)..=(tag, u64::MAX))
            .map_err(|e| RelsyncError::IoError(e.to_string()))?
        {
            entry.map_err(|e| RelsyncError::IoError(e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }
}

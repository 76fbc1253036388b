//! # Bind-back Queue
//!
//! Request-scoped record of relation records created from a nested form
//! whose host entity did not have an id yet. Each entry names the endpoint
//! field that must receive the host id once the host is persisted.

use crate::types::EntityId;
use std::collections::BTreeMap;

/// Pending bind-back writes, keyed by relation record id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingQueue {
    pending: BTreeMap<EntityId, String>,
}

impl BindingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `relation` waits for the host id in `field`.
    pub fn queue(&mut self, relation: EntityId, field: impl Into<String>) {
        self.pending.insert(relation, field.into());
    }

    /// Forget a pending binding, e.g. because the record was deleted.
    pub fn remove(&mut self, relation: EntityId) -> Option<String> {
        self.pending.remove(&relation)
    }

    #[must_use]
    pub fn is_pending(&self, relation: EntityId) -> bool {
        self.pending.contains_key(&relation)
    }

    /// Field awaiting the host id for `relation`.
    #[must_use]
    pub fn field_for(&self, relation: EntityId) -> Option<&str> {
        self.pending.get(&relation).map(String::as_str)
    }

    /// Pending bindings in relation id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &str)> {
        self.pending
            .iter()
            .map(|(relation, field)| (*relation, field.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Take every pending binding, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<(EntityId, String)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}

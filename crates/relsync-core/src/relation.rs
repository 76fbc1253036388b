//! # Relation Graph
//!
//! Looks up relation records touching an entity, checks the endpoint state
//! of a record and computes its display label.
//!
//! A relation record is a node of a relation bundle. Its two endpoint fields
//! each reference one node; together they form one undirected edge of the
//! relation graph.

use crate::binding::BindingQueue;
use crate::primitives::{EMPTY_LABEL, LABEL_FIELD_SEPARATOR, LABEL_PREFIX, LABEL_TITLE_SEPARATOR};
use crate::schema::{RelationSchema, SchemaRegistry};
use crate::store::EntityStore;
use crate::types::{Entity, EntityId, EntityType, RelsyncError};
use crate::validation::{ErrorCode, ValidationReport};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Relation records per relation bundle.
pub type ReferencingRelations = BTreeMap<String, BTreeSet<EntityId>>;

/// Current value of one endpoint field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub field: String,
    pub target: Option<EntityId>,
}

/// Outcome of checking a record's endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    Ok,
    /// Persisted with fewer than two endpoints and no pending bind-back.
    Incomplete,
    /// Both endpoints reference the same entity.
    SelfReferencing,
}

/// Lifecycle state of a relation record.
///
/// `Draft -> PersistedIncomplete -> PersistedComplete`; deletion removes the
/// record altogether.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationState {
    /// Not saved yet.
    Draft,
    /// Saved with a missing endpoint.
    PersistedIncomplete,
    /// Saved with both endpoints set.
    PersistedComplete,
}

/// Relation graph queries over a schema registry.
#[derive(Debug, Clone, Copy)]
pub struct RelationGraph<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> RelationGraph<'a> {
    #[must_use]
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Relation schema of a record, if it is a relation node.
    #[must_use]
    pub fn schema_of(&self, record: &Entity) -> Option<&'a RelationSchema> {
        if record.entity_type != EntityType::Node {
            return None;
        }
        self.registry.resolve_relation_schema(&record.bundle)
    }

    /// Every relation record whose endpoints reference `target`, per bundle.
    ///
    /// Only bundles whose endpoint fields may target `target`'s bundle are
    /// queried. Terms, unsaved entities and relation records yield an empty map.
    pub fn find_referencing_relations<S: EntityStore + ?Sized>(
        &self,
        store: &S,
        target: &Entity,
    ) -> Result<ReferencingRelations, RelsyncError> {
        let mut found = ReferencingRelations::new();
        let Some(id) = target.id else {
            return Ok(found);
        };
        if target.entity_type != EntityType::Node {
            return Ok(found);
        }

        for schema in self.registry.relation_bundles_targeting(&target.bundle) {
            let mut records = BTreeSet::new();
            for endpoint in &schema.endpoints {
                if !endpoint.can_target(&target.bundle) {
                    continue;
                }
                records.extend(store.query_references(
                    EntityType::Node,
                    &schema.bundle,
                    &endpoint.name,
                    id,
                )?);
            }
            if !records.is_empty() {
                found.insert(schema.bundle.clone(), records);
            }
        }
        Ok(found)
    }

    /// Endpoint values in schema order, or `None` for non-relation entities.
    #[must_use]
    pub fn endpoint_values(&self, record: &Entity) -> Option<[Endpoint; 2]> {
        let schema = self.schema_of(record)?;
        Some(schema.endpoints.clone().map(|endpoint| Endpoint {
            target: record.first_reference(&endpoint.name),
            field: endpoint.name,
        }))
    }

    /// Which endpoint field links `record` to `target`.
    ///
    /// Both fields pointing at `target` is a configuration error, reported as
    /// `RelsyncError::DuplicateRelation` rather than picking one.
    pub fn resolve_join_field(
        &self,
        record: &Entity,
        target: EntityId,
    ) -> Result<Option<String>, RelsyncError> {
        let Some(endpoints) = self.endpoint_values(record) else {
            return Ok(None);
        };
        let mut matching = endpoints
            .into_iter()
            .filter(|endpoint| endpoint.target == Some(target));

        match (matching.next(), matching.next()) {
            (Some(_), Some(_)) => Err(RelsyncError::DuplicateRelation {
                relation: describe(record),
                target,
            }),
            (Some(endpoint), None) => Ok(Some(endpoint.field)),
            _ => Ok(None),
        }
    }

    /// Check endpoint consistency. `None` for non-relation entities.
    ///
    /// Unsaved records and records waiting for bind-back are not
    /// reported as incomplete.
    #[must_use]
    pub fn validate_endpoints(&self, record: &Entity, pending: &BindingQueue) -> Option<EndpointStatus> {
        let [first, second] = self.endpoint_values(record)?;
        let status = match (first.target, second.target) {
            (Some(a), Some(b)) if a == b => EndpointStatus::SelfReferencing,
            (Some(_), Some(_)) => EndpointStatus::Ok,
            _ => match record.id {
                None => EndpointStatus::Ok,
                Some(id) if pending.is_pending(id) => EndpointStatus::Ok,
                Some(_) => EndpointStatus::Incomplete,
            },
        };
        Some(status)
    }

    /// Lifecycle state of a relation record. `None` for non-relation entities.
    #[must_use]
    pub fn relation_state(&self, record: &Entity) -> Option<RelationState> {
        let [first, second] = self.endpoint_values(record)?;
        let state = if record.is_new() {
            RelationState::Draft
        } else if first.target.is_some() && second.target.is_some() {
            RelationState::PersistedComplete
        } else {
            RelationState::PersistedIncomplete
        };
        Some(state)
    }

    /// Build the display label from the endpoint titles.
    ///
    /// `"Relationship A - B"`: titles of one field are comma-joined, fields are
    /// joined with `" - "` in schema order. Unloadable references are skipped.
    pub fn generate_label<S: EntityStore + ?Sized>(
        &self,
        store: &S,
        record: &Entity,
    ) -> Result<String, RelsyncError> {
        let schema = self
            .schema_of(record)
            .ok_or_else(|| RelsyncError::NotARelation(record.bundle.clone()))?;

        let mut parts = Vec::with_capacity(2);
        for field in schema.endpoint_names() {
            let ids = record.references(field);
            if ids.is_empty() {
                continue;
            }
            let titles: Vec<String> = store
                .load_multiple(EntityType::Node, ids)?
                .into_iter()
                .map(|entity| entity.label)
                .collect();
            if !titles.is_empty() {
                parts.push(titles.join(LABEL_TITLE_SEPARATOR));
            }
        }

        if parts.is_empty() {
            Ok(EMPTY_LABEL.to_string())
        } else {
            Ok(format!("{LABEL_PREFIX} {}", parts.join(LABEL_FIELD_SEPARATOR)))
        }
    }

    /// Validate every persisted relation record in the store.
    pub fn audit<S: EntityStore + ?Sized>(
        &self,
        store: &S,
        pending: &BindingQueue,
    ) -> Result<ValidationReport, RelsyncError> {
        let mut report = ValidationReport::new();
        for schema in self.registry.relation_bundles() {
            let ids = store.ids(EntityType::Node, Some(&schema.bundle))?;
            for record in store.load_multiple(EntityType::Node, &ids)? {
                match self.validate_endpoints(&record, pending) {
                    Some(EndpointStatus::Incomplete) => {
                        report.push(ErrorCode::Incomplete, describe(&record));
                    }
                    Some(EndpointStatus::SelfReferencing) => {
                        report.push(ErrorCode::SelfReferring, describe(&record));
                    }
                    _ => {}
                }
            }
        }
        Ok(report)
    }
}

/// `bundle:id` for saved records, `bundle:new` otherwise.
pub(crate) fn describe(record: &Entity) -> String {
    match record.id {
        Some(id) => format!("{}:{id}", record.bundle),
        None => format!("{}:new", record.bundle),
    }
}

// =============================================================================
// TESTS
// =============================================================================

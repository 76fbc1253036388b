//! # Core Type Definitions
//!
//! This module contains the data model shared by every relsync component:
//! - Entity identifiers (`EntityId`, `EntityType`, `EntityKey`)
//! - Content entities and their field values (`Entity`, `FieldValue`)
//! - Field definitions read from configuration (`FieldDefinition`)
//! - Error types (`RelsyncError`)
//!
//! ## Determinism Guarantees
//!
//! Fields are held in `BTreeMap` so iteration, serialization and labels
//! are stable across runs and backends.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ENTITY IDENTIFIERS
// =============================================================================

/// Identifier assigned by the entity store on first save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two content entity types the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Content node. Relation records are nodes of a relation bundle.
    Node,
    /// Taxonomy term. Bundles of terms are vocabularies.
    Term,
}

impl EntityType {
    /// Stable one-byte tag used as part of storage keys.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Node => 0,
            Self::Term => 1,
        }
    }

    /// Machine name as used in configuration and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Term => "term",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = RelsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(Self::Node),
            "term" | "taxonomy_term" => Ok(Self::Term),
            other => Err(RelsyncError::DeserializationError(format!(
                "Unknown entity type: {other}"
            ))),
        }
    }
}

/// Fully qualified reference to a stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity_type: EntityType,
    pub id: EntityId,
}

impl EntityKey {
    #[must_use]
    pub const fn new(entity_type: EntityType, id: EntityId) -> Self {
        Self { entity_type, id }
    }

    #[must_use]
    pub const fn node(id: u64) -> Self {
        Self::new(EntityType::Node, EntityId(id))
    }

    #[must_use]
    pub const fn term(id: u64) -> Self {
        Self::new(EntityType::Term, EntityId(id))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

// =============================================================================
// FIELD VALUES
// =============================================================================

/// Value stored in a single entity field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Plain text, e.g. a cross-reference label snapshot.
    Text(String),
    /// Entity references, in delta order.
    References(Vec<EntityId>),
}

impl FieldValue {
    /// Single-valued reference.
    #[must_use]
    pub fn reference(id: EntityId) -> Self {
        Self::References(vec![id])
    }

    /// True when the field holds nothing meaningful.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::References(ids) => ids.is_empty(),
        }
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// A content entity: node or taxonomy term.
///
/// `id` is `None` until the store assigns one on first save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: EntityType,
    #[serde(default)]
    pub id: Option<EntityId>,
    /// Bundle (content type) for nodes, vocabulary for terms.
    pub bundle: String,
    /// Title for nodes, name for terms.
    pub label: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Entity {
    /// Create a new, unsaved entity.
    #[must_use]
    pub fn new(entity_type: EntityType, bundle: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: None,
            bundle: bundle.into(),
            label: label.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Create a new, unsaved node.
    #[must_use]
    pub fn node(bundle: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(EntityType::Node, bundle, title)
    }

    /// Create a new, unsaved taxonomy term.
    #[must_use]
    pub fn term(vocabulary: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(EntityType::Term, vocabulary, name)
    }

    /// Builder-style reference setter.
    #[must_use]
    pub fn with_reference(mut self, field: &str, target: EntityId) -> Self {
        self.set_field_value(field, FieldValue::reference(target));
        self
    }

    /// Builder-style text setter.
    #[must_use]
    pub fn with_text(mut self, field: &str, text: impl Into<String>) -> Self {
        self.set_field_value(field, FieldValue::Text(text.into()));
        self
    }

    /// Key of a saved entity.
    #[must_use]
    pub fn key(&self) -> Option<EntityKey> {
        self.id.map(|id| EntityKey::new(self.entity_type, id))
    }

    /// True when the entity has never been saved.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    #[must_use]
    pub fn field_value(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Write a field. Empty values remove the field entirely.
    pub fn set_field_value(&mut self, field: &str, value: FieldValue) {
        if value.is_empty() {
            self.fields.remove(field);
        } else {
            self.fields.insert(field.to_string(), value);
        }
    }

    pub fn clear_field(&mut self, field: &str) {
        self.fields.remove(field);
    }

    /// All referenced ids in a field; empty for text or missing fields.
    #[must_use]
    pub fn references(&self, field: &str) -> &[EntityId] {
        match self.fields.get(field) {
            Some(FieldValue::References(ids)) => ids,
            _ => &[],
        }
    }

    /// The first (delta 0) reference in a field.
    #[must_use]
    pub fn first_reference(&self, field: &str) -> Option<EntityId> {
        self.references(field).first().copied()
    }

    /// Text content of a field.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(FieldValue::Text(text)) => Some(text),
            _ => None,
        }
    }
}

// =============================================================================
// FIELD DEFINITIONS
// =============================================================================

/// Storage type of a configured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    EntityReference,
    String,
    /// Anything the engine does not manage (body, image, ...).
    Other,
}

/// Number of values a field may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Limited(u32),
    Unlimited,
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::Limited(1)
    }
}

impl Cardinality {
    #[must_use]
    pub const fn is_single(self) -> bool {
        matches!(self, Self::Limited(1))
    }
}

/// Field storage and instance settings relevant to relation schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FieldDefinition {
    #[serde(default)]
    pub field_type: FieldType,
    /// Target entity type for reference fields.
    #[serde(default)]
    pub target_type: Option<EntityType>,
    /// Allowed target bundles. Empty means any bundle of `target_type`.
    #[serde(default)]
    pub target_bundles: BTreeSet<String>,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub required: bool,
    /// Marked as created and owned by the relation engine.
    #[serde(default)]
    pub managed: bool,
}

impl FieldDefinition {
    /// Single-valued reference field targeting `target_type`.
    #[must_use]
    pub fn reference(target_type: EntityType) -> Self {
        Self {
            field_type: FieldType::EntityReference,
            target_type: Some(target_type),
            managed: true,
            ..Self::default()
        }
    }

    /// Single-valued plain string field.
    #[must_use]
    pub fn string() -> Self {
        Self {
            field_type: FieldType::String,
            target_type: None,
            managed: true,
            ..Self::default()
        }
    }

    /// Restrict the allowed target bundles.
    #[must_use]
    pub fn targeting<I, S>(mut self, bundles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_bundles = bundles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn is_reference_to(&self, target_type: EntityType) -> bool {
        self.field_type == FieldType::EntityReference && self.target_type == Some(target_type)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in relsync.
///
/// Configuration problems are reported through `ValidationReport`, not here.
/// These variants cover storage failures and misuse of the engine API.
#[derive(Debug, Error)]
pub enum RelsyncError {
    /// The requested entity does not exist in the store.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityKey),

    /// The bundle has no resolvable relation schema.
    #[error("Bundle is not a relation bundle: {0}")]
    NotARelation(String),

    /// The field is not one of the bundle's endpoint fields.
    #[error("Field {field} is not an endpoint field of relation bundle {bundle}")]
    UnknownEndpointField { bundle: String, field: String },

    /// Both endpoint fields reference the same target.
    #[error("Duplicate relation: both endpoints of relation {relation} reference {target}")]
    DuplicateRelation { relation: String, target: EntityId },

    /// An entity failed validation and was not saved.
    #[error("Validation failed:\n{0}")]
    ValidationFailed(String),

    /// Configuration import rejected by validation.
    #[error("Configuration import blocked:\n{0}")]
    ImportBlocked(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

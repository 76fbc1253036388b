//! # relsync-core
//!
//! Consistency engine for relation records and mirror terms.
//!
//! A relation record is a node of a relation bundle whose two endpoint
//! fields each reference a node. The engine keeps these records coherent:
//! - labels are regenerated from the endpoint titles on every save;
//! - deleting a node deletes the relation records referencing it;
//! - records created before their host exists are bound to it afterwards;
//! - self-referencing mirror terms keep pointing at each other;
//! - configuration changes that would break the schema are rejected.
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies
//! - Deterministic: `BTreeMap`/`BTreeSet` only, so iteration order, labels
//!   and snapshots are stable across runs
//! - Every write goes through `Session`, which runs the lifecycle hooks

// =============================================================================
// MODULES
// =============================================================================

pub mod binding;
pub mod formats;
pub mod import;
pub mod mirror;
pub mod primitives;
pub mod relation;
pub mod schema;
pub mod session;
pub mod settings;
pub mod storage;
pub mod store;
pub mod types;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Cardinality, Entity, EntityId, EntityKey, EntityType, FieldDefinition, FieldType, FieldValue,
    RelsyncError,
};

// =============================================================================
// RE-EXPORTS: Configuration and Schema
// =============================================================================

pub use import::{ConfigDiff, import_config, validate_import};
pub use schema::{
    EndpointField, MirrorMode, MirrorPairSchema, RelationSchema, RelationTypeField, SchemaRegistry,
    VocabularyRole,
};
pub use settings::{BundleConfig, ReferencingType, Settings, SiteConfig, VocabularyConfig};
pub use validation::{ErrorCode, FieldOwner, ValidationError, ValidationReport};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use binding::BindingQueue;
pub use mirror::MirrorSync;
pub use relation::{Endpoint, EndpointStatus, ReferencingRelations, RelationGraph, RelationState};
pub use session::{LifecycleHook, Session, StorageBackend};
pub use storage::RedbStore;
pub use store::{EntityStore, MemoryStore, SerializableStore};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{SnapshotHeader, store_from_bytes, store_to_bytes};

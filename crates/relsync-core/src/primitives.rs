//! # Primitives
//!
//! Default configuration values and format constants.
//!
//! Field names and prefixes here are only defaults: every one of them can be
//! overridden through `Settings`.

/// Machine-name prefix expected on relation bundles.
pub const DEFAULT_RELATION_BUNDLE_PREFIX: &str = "relation_";

/// Default name of the first endpoint field on relation bundles.
pub const DEFAULT_RELATED_ENTITY_FIELD_1: &str = "rn_related_entity_1";

/// Default name of the second endpoint field on relation bundles.
pub const DEFAULT_RELATED_ENTITY_FIELD_2: &str = "rn_related_entity_2";

/// Default name of the optional relation type field.
pub const DEFAULT_RELATION_TYPE_FIELD: &str = "rn_relation_type";

/// Default mirror field for vocabularies in `string` referencing mode.
pub const DEFAULT_MIRROR_STRING_FIELD: &str = "rn_mirror_string";

/// Default mirror field for vocabularies in `entity_reference` referencing mode.
pub const DEFAULT_MIRROR_REFERENCE_FIELD: &str = "rn_mirror_reference";

/// Vocabulary name prefix for self-referencing relation type vocabularies.
pub const DEFAULT_SELF_VOCABULARY_PREFIX: &str = "selfrelation_";

/// Vocabulary name prefix for cross-referencing relation type vocabularies.
pub const DEFAULT_CROSS_VOCABULARY_PREFIX: &str = "crossrelation_";

/// Label prefix for generated relation titles.
pub const LABEL_PREFIX: &str = "Relationship";

/// Label used when no endpoint resolves to a loadable entity.
pub const EMPTY_LABEL: &str = "Relationship (no entities)";

/// Separator between titles of one endpoint field.
pub const LABEL_TITLE_SEPARATOR: &str = ", ";

/// Separator between endpoint fields.
pub const LABEL_FIELD_SEPARATOR: &str = " - ";

/// Magic bytes for the snapshot file header.
pub const MAGIC_BYTES: &[u8; 4] = b"RELS";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum number of entities accepted from a single load file.
pub const MAX_LOAD_BATCH: usize = 10_000;

//! # Site Configuration
//!
//! Serde model of the configuration the engine reads: module-wide
//! `Settings`, per-bundle `BundleConfig` and per-vocabulary
//! `VocabularyConfig`.
//!
//! The engine never writes configuration. Loading it from disk is the app
//! layer's job; this module only defines the shape and the defaults.

use crate::primitives::{
    DEFAULT_CROSS_VOCABULARY_PREFIX, DEFAULT_MIRROR_REFERENCE_FIELD, DEFAULT_MIRROR_STRING_FIELD,
    DEFAULT_RELATED_ENTITY_FIELD_1, DEFAULT_RELATED_ENTITY_FIELD_2,
    DEFAULT_RELATION_BUNDLE_PREFIX, DEFAULT_RELATION_TYPE_FIELD, DEFAULT_SELF_VOCABULARY_PREFIX,
};
use crate::types::FieldDefinition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// MODULE SETTINGS
// =============================================================================

/// Global field-name and prefix settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub relation_bundle_prefix: String,
    pub related_entity_field_1: String,
    pub related_entity_field_2: String,
    /// Empty disables relation types altogether.
    pub relation_type_field: String,
    pub mirror_string_field: String,
    pub mirror_reference_field: String,
    pub self_vocabulary_prefix: String,
    pub cross_vocabulary_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relation_bundle_prefix: DEFAULT_RELATION_BUNDLE_PREFIX.to_string(),
            related_entity_field_1: DEFAULT_RELATED_ENTITY_FIELD_1.to_string(),
            related_entity_field_2: DEFAULT_RELATED_ENTITY_FIELD_2.to_string(),
            relation_type_field: DEFAULT_RELATION_TYPE_FIELD.to_string(),
            mirror_string_field: DEFAULT_MIRROR_STRING_FIELD.to_string(),
            mirror_reference_field: DEFAULT_MIRROR_REFERENCE_FIELD.to_string(),
            self_vocabulary_prefix: DEFAULT_SELF_VOCABULARY_PREFIX.to_string(),
            cross_vocabulary_prefix: DEFAULT_CROSS_VOCABULARY_PREFIX.to_string(),
        }
    }
}

impl Settings {
    /// The two endpoint field names, in schema order.
    #[must_use]
    pub fn endpoint_fields(&self) -> [&str; 2] {
        [
            self.related_entity_field_1.as_str(),
            self.related_entity_field_2.as_str(),
        ]
    }

    /// Relation type field name, if relation types are enabled.
    #[must_use]
    pub fn relation_type_field(&self) -> Option<&str> {
        let name = self.relation_type_field.trim();
        (!name.is_empty()).then_some(name)
    }

    /// Every field name the engine manages.
    #[must_use]
    pub fn field_names(&self) -> BTreeSet<&str> {
        [
            self.related_entity_field_1.as_str(),
            self.related_entity_field_2.as_str(),
            self.relation_type_field.as_str(),
            self.mirror_string_field.as_str(),
            self.mirror_reference_field.as_str(),
        ]
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
    }
}

// =============================================================================
// BUNDLE AND VOCABULARY SETTINGS
// =============================================================================

/// How a relation type vocabulary links a term to its mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReferencingType {
    #[default]
    None,
    /// Terms reference their mirror term in the same vocabulary.
    EntityReference,
    /// Terms carry a plain-text label of the reverse relation.
    String,
}

/// Node bundle (content type) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// "Is relation enabled" flag.
    pub relation_enabled: bool,
    /// Regenerate the title of relation records before every save.
    pub auto_title: bool,
    pub fields: BTreeMap<String, FieldDefinition>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            relation_enabled: false,
            auto_title: true,
            fields: BTreeMap::new(),
        }
    }
}

impl BundleConfig {
    /// Ordinary content bundle.
    #[must_use]
    pub fn content() -> Self {
        Self::default()
    }

    /// Relation-enabled bundle with automatic titles.
    #[must_use]
    pub fn relation() -> Self {
        Self {
            relation_enabled: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, definition: FieldDefinition) -> Self {
        self.fields.insert(name.into(), definition);
        self
    }
}

/// Taxonomy vocabulary settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Vocabulary provides relation types.
    pub relation_enabled: bool,
    pub referencing_type: ReferencingType,
    pub fields: BTreeMap<String, FieldDefinition>,
}

impl VocabularyConfig {
    /// Relation type vocabulary using the given referencing type.
    #[must_use]
    pub fn relation(referencing_type: ReferencingType) -> Self {
        Self {
            relation_enabled: true,
            referencing_type,
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, definition: FieldDefinition) -> Self {
        self.fields.insert(name.into(), definition);
        self
    }
}

// =============================================================================
// SITE CONFIGURATION
// =============================================================================

/// Complete configuration snapshot: settings plus every bundle and vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SiteConfig {
    pub settings: Settings,
    pub bundles: BTreeMap<String, BundleConfig>,
    pub vocabularies: BTreeMap<String, VocabularyConfig>,
}

impl SiteConfig {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_bundle(mut self, name: impl Into<String>, bundle: BundleConfig) -> Self {
        self.bundles.insert(name.into(), bundle);
        self
    }

    #[must_use]
    pub fn with_vocabulary(mut self, name: impl Into<String>, vocabulary: VocabularyConfig) -> Self {
        self.vocabularies.insert(name.into(), vocabulary);
        self
    }
}

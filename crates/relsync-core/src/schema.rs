//! # Schema Registry
//!
//! Translates `SiteConfig` into tagged `RelationSchema` and
//! `MirrorPairSchema` values and answers classification queries.
//!
//! All schemas are resolved once, when the registry is built. Callers treat
//! a `None` lookup as "ordinary content" and carry on silently; the detailed
//! reason a bundle failed to resolve is only reported by the validation
//! entry points in [`crate::validation`].

use crate::settings::{BundleConfig, ReferencingType, Settings, SiteConfig, VocabularyConfig};
use crate::types::{EntityType, FieldDefinition, FieldType};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// RELATION SCHEMA
// =============================================================================

/// One of the two endpoint reference fields of a relation bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointField {
    pub name: String,
    /// Allowed node bundles. Empty means any non-relation bundle.
    pub target_bundles: BTreeSet<String>,
}

impl EndpointField {
    #[must_use]
    pub fn can_target(&self, bundle: &str) -> bool {
        self.target_bundles.is_empty() || self.target_bundles.contains(bundle)
    }
}

/// Optional relation type reference on a relation bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationTypeField {
    pub field: String,
    pub vocabulary: String,
}

/// Resolved schema of a relation bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationSchema {
    pub bundle: String,
    /// Endpoint fields in schema order.
    pub endpoints: [EndpointField; 2],
    pub relation_type: Option<RelationTypeField>,
    pub auto_title: bool,
}

impl RelationSchema {
    /// Endpoint field names in schema order.
    #[must_use]
    pub fn endpoint_names(&self) -> [&str; 2] {
        [self.endpoints[0].name.as_str(), self.endpoints[1].name.as_str()]
    }

    #[must_use]
    pub fn has_endpoint(&self, field: &str) -> bool {
        self.endpoints.iter().any(|endpoint| endpoint.name == field)
    }

    /// True when either endpoint may reference nodes of `bundle`.
    #[must_use]
    pub fn can_target(&self, bundle: &str) -> bool {
        self.endpoints.iter().any(|endpoint| endpoint.can_target(bundle))
    }
}

// =============================================================================
// MIRROR SCHEMA
// =============================================================================

/// How a vocabulary keeps mirror terms in step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorMode {
    None,
    /// Back-reference field targeting the same vocabulary; kept in sync both ways.
    SelfReference { field: String },
    /// Plain-text snapshot of the paired label; one-way, never synced.
    CrossReferenceString { field: String },
}

/// Resolved mirror configuration of a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorPairSchema {
    pub vocabulary: String,
    pub mode: MirrorMode,
}

impl MirrorPairSchema {
    /// Back-reference field, only in self-reference mode.
    #[must_use]
    pub fn reference_field(&self) -> Option<&str> {
        match &self.mode {
            MirrorMode::SelfReference { field } => Some(field),
            _ => None,
        }
    }
}

/// Mirror role a vocabulary plays, derived from name prefix and fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabularyRole {
    SelfReferencing,
    CrossReferencing,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Read-only projection of the site configuration.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    config: SiteConfig,
    relations: BTreeMap<String, RelationSchema>,
    mirrors: BTreeMap<String, MirrorPairSchema>,
    roles: BTreeMap<String, VocabularyRole>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(SiteConfig::default())
    }
}

impl SchemaRegistry {
    /// Resolve every bundle and vocabulary in `config`.
    #[must_use]
    pub fn new(config: SiteConfig) -> Self {
        let relations = config
            .bundles
            .iter()
            .filter_map(|(name, bundle)| {
                resolve_relation(&config, name, bundle).map(|schema| (name.clone(), schema))
            })
            .collect();
        let mirrors = config
            .vocabularies
            .iter()
            .filter_map(|(name, vocabulary)| {
                resolve_mirror(&config.settings, name, vocabulary)
                    .map(|schema| (name.clone(), schema))
            })
            .collect();
        let roles = config
            .vocabularies
            .iter()
            .filter_map(|(name, vocabulary)| {
                classify(&config.settings, name, vocabulary).map(|role| (name.clone(), role))
            })
            .collect();

        Self {
            config,
            relations,
            mirrors,
            roles,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.config.settings
    }

    /// Relation schema of a node bundle, or `None` for ordinary content.
    #[must_use]
    pub fn resolve_relation_schema(&self, bundle: &str) -> Option<&RelationSchema> {
        self.relations.get(bundle)
    }

    /// Mirror schema of a vocabulary, or `None` when it is unknown or incomplete.
    #[must_use]
    pub fn resolve_mirror_schema(&self, vocabulary: &str) -> Option<&MirrorPairSchema> {
        self.mirrors.get(vocabulary)
    }

    #[must_use]
    pub fn classify_vocabulary(&self, vocabulary: &str) -> Option<VocabularyRole> {
        self.roles.get(vocabulary).copied()
    }

    #[must_use]
    pub fn is_relation_bundle(&self, bundle: &str) -> bool {
        self.relations.contains_key(bundle)
    }

    /// All resolved relation schemas in bundle order.
    pub fn relation_bundles(&self) -> impl Iterator<Item = &RelationSchema> {
        self.relations.values()
    }

    /// Relation schemas whose endpoints can reference nodes of `bundle`.
    ///
    /// Relation bundles are never endpoint targets, so this is empty for them.
    #[must_use]
    pub fn relation_bundles_targeting(&self, bundle: &str) -> Vec<&RelationSchema> {
        if self.is_flagged_relation(bundle) {
            return Vec::new();
        }
        self.relations
            .values()
            .filter(|schema| schema.can_target(bundle))
            .collect()
    }

    /// True when the bundle carries the relation flag, resolved or not.
    #[must_use]
    pub fn is_flagged_relation(&self, bundle: &str) -> bool {
        self.config
            .bundles
            .get(bundle)
            .is_some_and(|config| config.relation_enabled)
    }
}

// =============================================================================
// RESOLUTION RULES
// =============================================================================

/// Endpoint fields must be single-valued node references to non-relation bundles.
pub(crate) fn endpoint_definition_is_valid(config: &SiteConfig, definition: &FieldDefinition) -> bool {
    definition.is_reference_to(EntityType::Node)
        && definition.cardinality.is_single()
        && !definition.target_bundles.iter().any(|target| {
            config
                .bundles
                .get(target)
                .is_some_and(|bundle| bundle.relation_enabled)
        })
}

/// Relation type fields must be single-valued references to exactly one vocabulary.
pub(crate) fn relation_type_definition_is_valid(definition: &FieldDefinition) -> bool {
    definition.is_reference_to(EntityType::Term)
        && definition.cardinality.is_single()
        && definition.target_bundles.len() == 1
}

fn resolve_relation(config: &SiteConfig, name: &str, bundle: &BundleConfig) -> Option<RelationSchema> {
    if !bundle.relation_enabled {
        return None;
    }

    let settings = &config.settings;
    let mut endpoints = Vec::with_capacity(2);
    for field in settings.endpoint_fields() {
        if field.trim().is_empty() {
            return None;
        }
        let definition = bundle.fields.get(field)?;
        if !endpoint_definition_is_valid(config, definition) {
            return None;
        }
        endpoints.push(EndpointField {
            name: field.to_string(),
            target_bundles: definition.target_bundles.clone(),
        });
    }
    let endpoints: [EndpointField; 2] = endpoints.try_into().ok()?;
    if endpoints[0].name == endpoints[1].name {
        return None;
    }

    let relation_type = settings.relation_type_field().and_then(|field| {
        let definition = bundle.fields.get(field)?;
        if !relation_type_definition_is_valid(definition) {
            return None;
        }
        let vocabulary = definition.target_bundles.iter().next()?.clone();
        Some(RelationTypeField {
            field: field.to_string(),
            vocabulary,
        })
    });

    Some(RelationSchema {
        bundle: name.to_string(),
        endpoints,
        relation_type,
        auto_title: bundle.auto_title,
    })
}

fn resolve_mirror(
    settings: &Settings,
    name: &str,
    vocabulary: &VocabularyConfig,
) -> Option<MirrorPairSchema> {
    let mode = match vocabulary.referencing_type {
        ReferencingType::None => MirrorMode::None,
        ReferencingType::EntityReference => {
            let field = settings.mirror_reference_field.as_str();
            let definition = vocabulary.fields.get(field)?;
            if !definition.is_reference_to(EntityType::Term) {
                return None;
            }
            MirrorMode::SelfReference {
                field: field.to_string(),
            }
        }
        ReferencingType::String => {
            let field = settings.mirror_string_field.as_str();
            let definition = vocabulary.fields.get(field)?;
            if definition.field_type != FieldType::String {
                return None;
            }
            MirrorMode::CrossReferenceString {
                field: field.to_string(),
            }
        }
    };

    Some(MirrorPairSchema {
        vocabulary: name.to_string(),
        mode,
    })
}

/// Self-referencing mirror fields must point back into their own vocabulary.
pub(crate) fn mirror_reference_targets_self(name: &str, definition: &FieldDefinition) -> bool {
    definition.is_reference_to(EntityType::Term)
        && definition.target_bundles.len() == 1
        && definition.target_bundles.contains(name)
}

fn classify(settings: &Settings, name: &str, vocabulary: &VocabularyConfig) -> Option<VocabularyRole> {
    let self_prefix = settings.self_vocabulary_prefix.as_str();
    let cross_prefix = settings.cross_vocabulary_prefix.as_str();

    if !self_prefix.is_empty() && name.starts_with(self_prefix) {
        return vocabulary
            .fields
            .get(&settings.mirror_reference_field)
            .filter(|definition| mirror_reference_targets_self(name, definition))
            .map(|_| VocabularyRole::SelfReferencing);
    }
    if !cross_prefix.is_empty() && name.starts_with(cross_prefix) {
        return vocabulary
            .fields
            .get(&settings.mirror_string_field)
            .filter(|definition| definition.field_type == FieldType::String)
            .map(|_| VocabularyRole::CrossReferencing);
    }
    None
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cardinality;

    fn partnership_config() -> SiteConfig {
        let settings = Settings {
            related_entity_field_1: "rn_entity_a".to_string(),
            related_entity_field_2: "rn_entity_b".to_string(),
            ..Settings::default()
        };
        SiteConfig::new(settings)
            .with_bundle("company", BundleConfig::content())
            .with_bundle(
                "relation_partnership",
                BundleConfig::relation()
                    .with_field("rn_entity_a", FieldDefinition::reference(EntityType::Node))
                    .with_field("rn_entity_b", FieldDefinition::reference(EntityType::Node))
                    .with_field(
                        "rn_relation_type",
                        FieldDefinition::reference(EntityType::Term)
                            .targeting(["selfrelation_types"]),
                    ),
            )
            .with_vocabulary(
                "selfrelation_types",
                VocabularyConfig::relation(ReferencingType::EntityReference).with_field(
                    "rn_mirror_reference",
                    FieldDefinition::reference(EntityType::Term).targeting(["selfrelation_types"]),
                ),
            )
            .with_vocabulary(
                "crossrelation_types",
                VocabularyConfig::relation(ReferencingType::String)
                    .with_field("rn_mirror_string", FieldDefinition::string()),
            )
    }

    #[test]
    fn resolves_relation_bundle() {
        let registry = SchemaRegistry::new(partnership_config());
        let schema = registry
            .resolve_relation_schema("relation_partnership")
            .expect("schema");

        assert_eq!(schema.endpoint_names(), ["rn_entity_a", "rn_entity_b"]);
        assert_eq!(
            schema.relation_type,
            Some(RelationTypeField {
                field: "rn_relation_type".to_string(),
                vocabulary: "selfrelation_types".to_string(),
            })
        );
        assert!(registry.resolve_relation_schema("company").is_none());
    }

    #[test]
    fn missing_endpoint_is_not_a_relation() {
        let mut config = partnership_config();
        if let Some(bundle) = config.bundles.get_mut("relation_partnership") {
            bundle.fields.remove("rn_entity_b");
        }
        let registry = SchemaRegistry::new(config);
        assert!(registry.resolve_relation_schema("relation_partnership").is_none());
        assert!(registry.is_flagged_relation("relation_partnership"));
    }

    #[test]
    fn multi_valued_endpoint_is_not_a_relation() {
        let mut config = partnership_config();
        if let Some(bundle) = config.bundles.get_mut("relation_partnership") {
            if let Some(field) = bundle.fields.get_mut("rn_entity_a") {
                field.cardinality = Cardinality::Unlimited;
            }
        }
        let registry = SchemaRegistry::new(config);
        assert!(!registry.is_relation_bundle("relation_partnership"));
    }

    #[test]
    fn endpoint_targeting_relation_bundle_is_rejected() {
        let mut config = partnership_config();
        if let Some(bundle) = config.bundles.get_mut("relation_partnership") {
            if let Some(field) = bundle.fields.get_mut("rn_entity_a") {
                field.target_bundles.insert("relation_partnership".to_string());
            }
        }
        let registry = SchemaRegistry::new(config);
        assert!(!registry.is_relation_bundle("relation_partnership"));
    }

    #[test]
    fn resolves_mirror_modes() {
        let registry = SchemaRegistry::new(partnership_config());

        let own = registry
            .resolve_mirror_schema("selfrelation_types")
            .expect("self schema");
        assert_eq!(own.reference_field(), Some("rn_mirror_reference"));

        let cross = registry
            .resolve_mirror_schema("crossrelation_types")
            .expect("cross schema");
        assert_eq!(
            cross.mode,
            MirrorMode::CrossReferenceString {
                field: "rn_mirror_string".to_string()
            }
        );
        assert!(cross.reference_field().is_none());
        assert!(registry.resolve_mirror_schema("tags").is_none());
    }

    #[test]
    fn mirror_without_field_does_not_resolve() {
        let config = partnership_config().with_vocabulary(
            "selfrelation_broken",
            VocabularyConfig::relation(ReferencingType::EntityReference),
        );
        let registry = SchemaRegistry::new(config);
        assert!(registry.resolve_mirror_schema("selfrelation_broken").is_none());
    }

    #[test]
    fn classifies_by_prefix_and_field() {
        let config = partnership_config().with_vocabulary(
            "selfrelation_wrong_target",
            VocabularyConfig::relation(ReferencingType::EntityReference).with_field(
                "rn_mirror_reference",
                FieldDefinition::reference(EntityType::Term).targeting(["selfrelation_types"]),
            ),
        );
        let registry = SchemaRegistry::new(config);

        assert_eq!(
            registry.classify_vocabulary("selfrelation_types"),
            Some(VocabularyRole::SelfReferencing)
        );
        assert_eq!(
            registry.classify_vocabulary("crossrelation_types"),
            Some(VocabularyRole::CrossReferencing)
        );
        assert_eq!(registry.classify_vocabulary("selfrelation_wrong_target"), None);
    }

    #[test]
    fn relation_bundles_targeting_respects_target_bundles() {
        let mut config = partnership_config().with_bundle("person", BundleConfig::content());
        if let Some(bundle) = config.bundles.get_mut("relation_partnership") {
            for field in ["rn_entity_a", "rn_entity_b"] {
                if let Some(definition) = bundle.fields.get_mut(field) {
                    definition.target_bundles.insert("company".to_string());
                }
            }
        }
        let registry = SchemaRegistry::new(config);

        assert_eq!(registry.relation_bundles_targeting("company").len(), 1);
        assert!(registry.relation_bundles_targeting("person").is_empty());
        assert!(
            registry
                .relation_bundles_targeting("relation_partnership")
                .is_empty()
        );
    }
}

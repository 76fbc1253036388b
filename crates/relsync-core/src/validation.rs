//! # Schema Validation
//!
//! Error codes and the validation entry points used before configuration is
//! imported. Problems are collected, never thrown: a non-empty
//! `ValidationReport` blocks the change and its `message()` is shown to the
//! user, one deduplicated line per error.

use crate::schema::{
    SchemaRegistry, endpoint_definition_is_valid, mirror_reference_targets_self,
};
use crate::settings::{ReferencingType, SiteConfig};
use crate::types::{EntityType, FieldDefinition, FieldType};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Machine-readable validation error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MissingFieldNameConfig,
    MissingField,
    InvalidFieldType,
    InvalidCardinality,
    InvalidTargetType,
    InvalidTargetBundle,
    MultipleTargetBundles,
    FieldRequired,
    InvalidBundlePrefix,
    VocabularyHasDependency,
    FieldHasDependency,
    OrphanedFieldSettings,
    Incomplete,
    SelfReferring,
    DuplicateRelation,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingFieldNameConfig => "missing_field_name_config",
            Self::MissingField => "missing_field",
            Self::InvalidFieldType => "invalid_field_type",
            Self::InvalidCardinality => "invalid_cardinality",
            Self::InvalidTargetType => "invalid_target_type",
            Self::InvalidTargetBundle => "invalid_target_bundle",
            Self::MultipleTargetBundles => "multiple_target_bundles",
            Self::FieldRequired => "field_required",
            Self::InvalidBundlePrefix => "invalid_bundle_prefix",
            Self::VocabularyHasDependency => "vocabulary_has_dependency",
            Self::FieldHasDependency => "field_has_dependency",
            Self::OrphanedFieldSettings => "orphaned_field_settings",
            Self::Incomplete => "incomplete",
            Self::SelfReferring => "self_referring",
            Self::DuplicateRelation => "duplicate_relation",
        }
    }

    /// Human-readable explanation shown next to the context.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::MissingFieldNameConfig => "a required field name is not configured",
            Self::MissingField => "the configured field does not exist",
            Self::InvalidFieldType => "the field has the wrong field type",
            Self::InvalidCardinality => "the field must hold exactly one value",
            Self::InvalidTargetType => "the field references the wrong entity type",
            Self::InvalidTargetBundle => "the field references a bundle it may not reference",
            Self::MultipleTargetBundles => "the field must reference exactly one bundle",
            Self::FieldRequired => "the field may not be required",
            Self::InvalidBundlePrefix => "the relation bundle name lacks the configured prefix",
            Self::VocabularyHasDependency => "relation bundles still depend on this vocabulary",
            Self::FieldHasDependency => "an enabled relation bundle still depends on this field",
            Self::OrphanedFieldSettings => {
                "the field is marked as managed but is not a configured field"
            }
            Self::Incomplete => "the relation does not reference two entities",
            Self::SelfReferring => "the relation references the same entity twice",
            Self::DuplicateRelation => "both endpoint fields reference the same entity",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(errorCode, context)` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ValidationError {
    pub code: ErrorCode,
    /// Bundle, vocabulary, field or record the error is about.
    pub context: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(code: ErrorCode, context: impl Into<String>) -> Self {
        Self {
            code,
            context: context.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.code, self.code.describe(), self.context)
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Collected validation errors, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, code: ErrorCode, context: impl Into<String>) {
        self.errors.push(ValidationError::new(code, context));
    }

    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    #[must_use]
    pub fn contains(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|error| error.code == code)
    }

    /// One line per distinct error, first occurrence order.
    #[must_use]
    pub fn message(&self) -> String {
        let mut seen = BTreeSet::new();
        self.errors
            .iter()
            .filter(|error| seen.insert(*error))
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// REGISTRY VALIDATION
// =============================================================================

/// Where a field lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOwner<'a> {
    Bundle(&'a str),
    Vocabulary(&'a str),
}

impl SchemaRegistry {
    /// Check the global field-name keys.
    #[must_use]
    pub fn validate_settings(&self) -> ValidationReport {
        let settings = self.settings();
        let mut report = ValidationReport::new();

        let keys = [
            ("related_entity_field_1", &settings.related_entity_field_1),
            ("related_entity_field_2", &settings.related_entity_field_2),
            ("mirror_string_field", &settings.mirror_string_field),
            ("mirror_reference_field", &settings.mirror_reference_field),
        ];
        for (key, value) in keys {
            if value.trim().is_empty() {
                report.push(ErrorCode::MissingFieldNameConfig, key);
            }
        }

        let [first, second] = settings.endpoint_fields();
        if !first.trim().is_empty() && first == second {
            report.push(
                ErrorCode::MissingFieldNameConfig,
                "related_entity_field_2 repeats related_entity_field_1",
            );
        }
        report
    }

    /// Check a node bundle's relation configuration and field markers.
    #[must_use]
    pub fn validate_bundle(&self, name: &str) -> ValidationReport {
        let mut report = ValidationReport::new();
        let config = self.config();
        let Some(bundle) = config.bundles.get(name) else {
            return report;
        };

        if bundle.relation_enabled {
            let prefix = config.settings.relation_bundle_prefix.as_str();
            if !prefix.is_empty() && !name.starts_with(prefix) {
                report.push(ErrorCode::InvalidBundlePrefix, name);
            }

            for field in config.settings.endpoint_fields() {
                if field.trim().is_empty() {
                    continue;
                }
                let context = format!("{name}.{field}");
                match bundle.fields.get(field) {
                    None => report.push(ErrorCode::MissingField, context),
                    Some(definition) => {
                        check_endpoint(config, definition, &context, &mut report);
                    }
                }
            }

            if let Some(field) = config.settings.relation_type_field() {
                if let Some(definition) = bundle.fields.get(field) {
                    check_relation_type(config, definition, &format!("{name}.{field}"), &mut report);
                }
            }
        }

        check_orphans(config, &bundle.fields, name, &mut report);
        report
    }

    /// Check a vocabulary's mirror configuration and field markers.
    #[must_use]
    pub fn validate_vocabulary(&self, name: &str) -> ValidationReport {
        let mut report = ValidationReport::new();
        let config = self.config();
        let Some(vocabulary) = config.vocabularies.get(name) else {
            return report;
        };
        let settings = &config.settings;

        if vocabulary.relation_enabled {
            match vocabulary.referencing_type {
                ReferencingType::None => {}
                ReferencingType::EntityReference => {
                    let field = settings.mirror_reference_field.as_str();
                    let context = format!("{name}.{field}");
                    match vocabulary.fields.get(field) {
                        None => report.push(ErrorCode::MissingField, context),
                        Some(definition) => {
                            if definition.field_type != FieldType::EntityReference {
                                report.push(ErrorCode::InvalidFieldType, context);
                            } else if definition.target_type != Some(EntityType::Term) {
                                report.push(ErrorCode::InvalidTargetType, context);
                            } else if definition.target_bundles.len() > 1 {
                                report.push(ErrorCode::MultipleTargetBundles, context);
                            } else if !mirror_reference_targets_self(name, definition) {
                                report.push(ErrorCode::InvalidTargetBundle, context);
                            } else {
                                check_single_optional(definition, &context, &mut report);
                            }
                        }
                    }
                }
                ReferencingType::String => {
                    let field = settings.mirror_string_field.as_str();
                    let context = format!("{name}.{field}");
                    match vocabulary.fields.get(field) {
                        None => report.push(ErrorCode::MissingField, context),
                        Some(definition) if definition.field_type != FieldType::String => {
                            report.push(ErrorCode::InvalidFieldType, context);
                        }
                        Some(definition) => {
                            check_single_optional(definition, &context, &mut report);
                        }
                    }
                }
            }
        }

        check_orphans(config, &vocabulary.fields, name, &mut report);
        report
    }

    /// Check whether a field may be deleted from its bundle or vocabulary.
    ///
    /// Run against the registry of the configuration that remains after the
    /// deletion: a still-enabled owner that needs the field blocks it.
    #[must_use]
    pub fn validate_field_deletion(&self, owner: FieldOwner<'_>, field: &str) -> ValidationReport {
        let mut report = ValidationReport::new();
        let config = self.config();
        let settings = &config.settings;

        match owner {
            FieldOwner::Bundle(bundle) => {
                let enabled = config
                    .bundles
                    .get(bundle)
                    .is_some_and(|config| config.relation_enabled);
                let needed = settings.endpoint_fields().contains(&field)
                    || settings.relation_type_field() == Some(field);
                if enabled && needed {
                    report.push(ErrorCode::FieldHasDependency, format!("{bundle}.{field}"));
                }
            }
            FieldOwner::Vocabulary(vocabulary) => {
                let needed = config.vocabularies.get(vocabulary).is_some_and(|config| {
                    config.relation_enabled
                        && match config.referencing_type {
                            ReferencingType::None => false,
                            ReferencingType::EntityReference => {
                                settings.mirror_reference_field == field
                            }
                            ReferencingType::String => settings.mirror_string_field == field,
                        }
                });
                if needed {
                    report.push(
                        ErrorCode::FieldHasDependency,
                        format!("{vocabulary}.{field}"),
                    );
                }
            }
        }
        report
    }

    /// Check whether a vocabulary may stop providing relation types.
    ///
    /// Every relation-enabled bundle whose relation type field targets the
    /// vocabulary is reported.
    #[must_use]
    pub fn validate_vocabulary_disable(&self, vocabulary: &str) -> ValidationReport {
        let mut report = ValidationReport::new();
        let config = self.config();
        let Some(field) = config.settings.relation_type_field() else {
            return report;
        };

        for (bundle, bundle_config) in &config.bundles {
            if !bundle_config.relation_enabled {
                continue;
            }
            let depends = bundle_config
                .fields
                .get(field)
                .is_some_and(|definition| definition.target_bundles.contains(vocabulary));
            if depends {
                report.push(
                    ErrorCode::VocabularyHasDependency,
                    format!("{vocabulary} <- {bundle}"),
                );
            }
        }
        report
    }

    /// Validate settings, every bundle and every vocabulary.
    #[must_use]
    pub fn validate_all(&self) -> ValidationReport {
        let mut report = self.validate_settings();
        for name in self.config().bundles.keys() {
            report.merge(self.validate_bundle(name));
        }
        for (name, vocabulary) in &self.config().vocabularies {
            report.merge(self.validate_vocabulary(name));
            if !vocabulary.relation_enabled {
                report.merge(self.validate_vocabulary_disable(name));
            }
        }
        report
    }
}

fn check_single_optional(definition: &FieldDefinition, context: &str, report: &mut ValidationReport) {
    if !definition.cardinality.is_single() {
        report.push(ErrorCode::InvalidCardinality, context);
    }
    if definition.required {
        report.push(ErrorCode::FieldRequired, context);
    }
}

fn check_endpoint(
    config: &SiteConfig,
    definition: &FieldDefinition,
    context: &str,
    report: &mut ValidationReport,
) {
    if definition.field_type != FieldType::EntityReference {
        report.push(ErrorCode::InvalidFieldType, context);
        return;
    }
    if definition.target_type != Some(EntityType::Node) {
        report.push(ErrorCode::InvalidTargetType, context);
        return;
    }
    check_single_optional(definition, context, report);

    let unknown_target = definition
        .target_bundles
        .iter()
        .any(|target| !config.bundles.contains_key(target));
    // Cardinality problems are already reported above.
    if definition.cardinality.is_single()
        && (unknown_target || !endpoint_definition_is_valid(config, definition))
    {
        report.push(ErrorCode::InvalidTargetBundle, context);
    }
}

fn check_relation_type(
    config: &SiteConfig,
    definition: &FieldDefinition,
    context: &str,
    report: &mut ValidationReport,
) {
    if definition.field_type != FieldType::EntityReference {
        report.push(ErrorCode::InvalidFieldType, context);
        return;
    }
    if definition.target_type != Some(EntityType::Term) {
        report.push(ErrorCode::InvalidTargetType, context);
        return;
    }
    check_single_optional(definition, context, report);

    let mut targets = definition.target_bundles.iter();
    match (targets.next(), targets.next()) {
        (Some(vocabulary), None) => {
            let is_relation_vocabulary = config
                .vocabularies
                .get(vocabulary)
                .is_some_and(|vocabulary| vocabulary.relation_enabled);
            if !is_relation_vocabulary {
                report.push(ErrorCode::InvalidTargetBundle, context);
            }
        }
        _ => report.push(ErrorCode::MultipleTargetBundles, context),
    }
}

fn check_orphans(
    config: &SiteConfig,
    fields: &BTreeMap<String, FieldDefinition>,
    owner: &str,
    report: &mut ValidationReport,
) {
    let configured = config.settings.field_names();
    for (field, definition) in fields {
        if definition.managed && !configured.contains(field.as_str()) {
            report.push(ErrorCode::OrphanedFieldSettings, format!("{owner}.{field}"));
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

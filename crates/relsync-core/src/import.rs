//! # Configuration Import
//!
//! Validates a proposed configuration against the current one before any
//! entity is touched. The proposed configuration is projected into its own
//! `SchemaRegistry`; only the parts the diff names are re-validated.

use crate::schema::SchemaRegistry;
use crate::settings::SiteConfig;
use crate::types::RelsyncError;
use crate::validation::{FieldOwner, ValidationReport};
use serde::Serialize;
use std::collections::BTreeSet;

/// What changed between two configuration snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigDiff {
    pub settings_changed: bool,
    /// Added or modified bundles.
    pub changed_bundles: BTreeSet<String>,
    pub deleted_bundles: BTreeSet<String>,
    /// Added or modified vocabularies.
    pub changed_vocabularies: BTreeSet<String>,
    pub deleted_vocabularies: BTreeSet<String>,
    /// `(bundle, field)` pairs removed from bundles that still exist.
    pub deleted_bundle_fields: BTreeSet<(String, String)>,
    /// `(vocabulary, field)` pairs removed from vocabularies that still exist.
    pub deleted_vocabulary_fields: BTreeSet<(String, String)>,
    /// Vocabularies that provided relation types before and no longer do.
    pub disabled_vocabularies: BTreeSet<String>,
}

impl ConfigDiff {
    /// Compute the diff from `current` to `proposed`.
    #[must_use]
    pub fn between(current: &SiteConfig, proposed: &SiteConfig) -> Self {
        let mut diff = Self {
            settings_changed: current.settings != proposed.settings,
            ..Self::default()
        };

        for (name, bundle) in &proposed.bundles {
            match current.bundles.get(name) {
                Some(existing) if existing == bundle => {}
                Some(existing) => {
                    diff.changed_bundles.insert(name.clone());
                    for field in existing.fields.keys() {
                        if !bundle.fields.contains_key(field) {
                            diff.deleted_bundle_fields.insert((name.clone(), field.clone()));
                        }
                    }
                }
                None => {
                    diff.changed_bundles.insert(name.clone());
                }
            }
        }
        for name in current.bundles.keys() {
            if !proposed.bundles.contains_key(name) {
                diff.deleted_bundles.insert(name.clone());
            }
        }

        for (name, vocabulary) in &proposed.vocabularies {
            match current.vocabularies.get(name) {
                Some(existing) if existing == vocabulary => {}
                Some(existing) => {
                    diff.changed_vocabularies.insert(name.clone());
                    for field in existing.fields.keys() {
                        if !vocabulary.fields.contains_key(field) {
                            diff.deleted_vocabulary_fields
                                .insert((name.clone(), field.clone()));
                        }
                    }
                    if existing.relation_enabled && !vocabulary.relation_enabled {
                        diff.disabled_vocabularies.insert(name.clone());
                    }
                }
                None => {
                    diff.changed_vocabularies.insert(name.clone());
                }
            }
        }
        for (name, vocabulary) in &current.vocabularies {
            if !proposed.vocabularies.contains_key(name) {
                diff.deleted_vocabularies.insert(name.clone());
                if vocabulary.relation_enabled {
                    diff.disabled_vocabularies.insert(name.clone());
                }
            }
        }

        diff
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Validate `proposed` as a replacement for `current`.
///
/// Returns every error that would block the import; an empty report means
/// the import may proceed.
#[must_use]
pub fn validate_import(current: &SiteConfig, proposed: &SiteConfig) -> ValidationReport {
    let diff = ConfigDiff::between(current, proposed);
    let registry = SchemaRegistry::new(proposed.clone());
    let mut report = ValidationReport::new();

    if diff.settings_changed {
        report.merge(registry.validate_settings());
        // New field names can change the outcome for every bundle and vocabulary.
        for name in proposed.bundles.keys() {
            report.merge(registry.validate_bundle(name));
        }
        for name in proposed.vocabularies.keys() {
            report.merge(registry.validate_vocabulary(name));
        }
    } else {
        for name in &diff.changed_bundles {
            report.merge(registry.validate_bundle(name));
        }
        for name in &diff.changed_vocabularies {
            report.merge(registry.validate_vocabulary(name));
        }
    }

    for (bundle, field) in &diff.deleted_bundle_fields {
        report.merge(registry.validate_field_deletion(FieldOwner::Bundle(bundle), field));
    }
    for (vocabulary, field) in &diff.deleted_vocabulary_fields {
        report.merge(registry.validate_field_deletion(FieldOwner::Vocabulary(vocabulary), field));
    }
    for vocabulary in &diff.disabled_vocabularies {
        report.merge(registry.validate_vocabulary_disable(vocabulary));
    }

    tracing::debug!(
        target: "relsync_core::import",
        changed_bundles = diff.changed_bundles.len(),
        changed_vocabularies = diff.changed_vocabularies.len(),
        errors = report.len(),
        "validated configuration import"
    );
    report
}

/// Accept `proposed` if it validates, otherwise block with the formatted report.
pub fn import_config(current: &SiteConfig, proposed: SiteConfig) -> Result<SiteConfig, RelsyncError> {
    let report = validate_import(current, &proposed);
    if report.is_empty() {
        Ok(proposed)
    } else {
        tracing::warn!(
            target: "relsync_core::import",
            errors = report.len(),
            "configuration import blocked"
        );
        Err(RelsyncError::ImportBlocked(report.message()))
    }
}

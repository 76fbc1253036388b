//! # Mirror Sync
//!
//! Keeps self-referencing mirror terms pointing at each other.
//!
//! When term A's back-reference field changes from B to C, B loses its
//! back-reference to A and C gains one. Deleting A clears the back-reference
//! on its partner. Cross-referencing (string) vocabularies hold a text
//! snapshot only and are never synced.
//!
//! Partner updates go through `Session::save`, so they run the same hooks
//! as any other save. Two guards stop the resulting cascade:
//! - a partner already holding the expected value is not saved again;
//! - a term whose sync is in progress is never re-entered or touched by a
//!   nested sync.

use crate::session::{LifecycleHook, Session};
use crate::types::{Entity, EntityId, EntityType, FieldValue, RelsyncError};

/// Mirror term synchronisation, driven by session lifecycle hooks.
pub struct MirrorSync;

impl MirrorSync {
    /// Propagate a change of `term`'s back-reference to its old and new partners.
    ///
    /// `original` is the stored version before this save, `None` on insert.
    /// On `Delete`, `term` is the entity that was just removed.
    pub fn set_mirror_term_link(
        session: &mut Session,
        term: &Entity,
        original: Option<&Entity>,
        hook: LifecycleHook,
    ) -> Result<(), RelsyncError> {
        if term.entity_type != EntityType::Term {
            return Ok(());
        }
        let Some(id) = term.id else {
            return Ok(());
        };
        let Some(field) = Self::mirror_field(session, &term.bundle) else {
            return Ok(());
        };

        let (previous, current) = match hook {
            LifecycleHook::Delete => (term.first_reference(&field), None),
            LifecycleHook::Insert | LifecycleHook::Update => (
                original.and_then(|o| o.first_reference(&field)),
                term.first_reference(&field),
            ),
        };
        if previous == current {
            return Ok(());
        }

        if !session.begin_sync(id) {
            tracing::debug!(term = %id, "mirror sync already running, skipping");
            return Ok(());
        }
        let result = Self::propagate(session, term, id, &field, previous, current);
        session.end_sync(id);
        result
    }

    /// Back-reference field of a self-referencing vocabulary.
    fn mirror_field(session: &Session, vocabulary: &str) -> Option<String> {
        session
            .registry()
            .resolve_mirror_schema(vocabulary)
            .and_then(|schema| schema.reference_field())
            .map(str::to_string)
    }

    fn propagate(
        session: &mut Session,
        term: &Entity,
        id: EntityId,
        field: &str,
        previous: Option<EntityId>,
        current: Option<EntityId>,
    ) -> Result<(), RelsyncError> {
        if let Some(old) = previous {
            if let Some(mut partner) = Self::partner(session, term, old)? {
                if partner.first_reference(field) == Some(id) {
                    partner.clear_field(field);
                    tracing::debug!(term = %id, partner = %old, "clearing mirror back-reference");
                    session.save(&mut partner)?;
                }
            }
        }

        if let Some(new) = current {
            if let Some(mut partner) = Self::partner(session, term, new)? {
                if partner.first_reference(field) != Some(id) {
                    partner.set_field_value(field, FieldValue::reference(id));
                    tracing::debug!(term = %id, partner = %new, "setting mirror back-reference");
                    session.save(&mut partner)?;
                }
            }
        }
        Ok(())
    }

    /// Load a partner term eligible for a back-reference write.
    ///
    /// Terms whose own sync is running, missing terms and terms of another
    /// vocabulary are skipped.
    fn partner(
        session: &Session,
        term: &Entity,
        partner: EntityId,
    ) -> Result<Option<Entity>, RelsyncError> {
        if session.is_syncing(partner) {
            return Ok(None);
        }
        let Some(entity) = session.load(EntityType::Term, partner)? else {
            tracing::debug!(term = ?term.id, partner = %partner, "mirror partner not found");
            return Ok(None);
        };
        if entity.bundle != term.bundle {
            tracing::warn!(
                term = ?term.id,
                partner = %partner,
                vocabulary = %entity.bundle,
                "mirror partner belongs to another vocabulary"
            );
            return Ok(None);
        }
        Ok(Some(entity))
    }
}

// =============================================================================
// TESTS
// =============================================================================

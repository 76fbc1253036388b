//! # Scenario Tier Tests (S0-S4)
//!
//! End-to-end behaviour of the engine through `Session`.
//!
//! ## Tiers
//! - S0: Relation labels
//! - S1: Cascade delete
//! - S2: Nested relation bind-back
//! - S3: Mirror terms
//! - S4: Configuration import

use relsync_core::{
    BundleConfig, EndpointStatus, Entity, EntityId, EntityType, ErrorCode, FieldDefinition,
    FieldValue, ReferencingType, RelsyncError, SchemaRegistry, Session, Settings, SiteConfig,
    VocabularyConfig,
};

const A: &str = "rn_entity_a";
const B: &str = "rn_entity_b";
const MIRROR: &str = "rn_mirror_reference";
const MIRROR_STRING: &str = "rn_mirror_string";

fn settings() -> Settings {
    Settings {
        related_entity_field_1: A.to_string(),
        related_entity_field_2: B.to_string(),
        ..Settings::default()
    }
}

fn site_config() -> SiteConfig {
    SiteConfig::new(settings())
        .with_bundle("company", BundleConfig::content())
        .with_bundle(
            "relation_partnership",
            BundleConfig::relation()
                .with_field(A, FieldDefinition::reference(EntityType::Node).targeting(["company"]))
                .with_field(B, FieldDefinition::reference(EntityType::Node).targeting(["company"])),
        )
        .with_vocabulary(
            "selfrelation_family",
            VocabularyConfig::relation(ReferencingType::EntityReference).with_field(
                MIRROR,
                FieldDefinition::reference(EntityType::Term).targeting(["selfrelation_family"]),
            ),
        )
        .with_vocabulary(
            "crossrelation_types",
            VocabularyConfig::relation(ReferencingType::String)
                .with_field(MIRROR_STRING, FieldDefinition::string()),
        )
}

fn session() -> Session {
    Session::new(SchemaRegistry::new(site_config()))
}

fn node(session: &mut Session, bundle: &str, title: &str) -> EntityId {
    let mut entity = Entity::node(bundle, title);
    session.save(&mut entity).expect("save node")
}

fn partnership(session: &mut Session, a: EntityId, b: EntityId) -> Entity {
    let mut relation = Entity::node("relation_partnership", "")
        .with_reference(A, a)
        .with_reference(B, b);
    session.save(&mut relation).expect("save relation");
    relation
}

// =============================================================================
// TIER S0: RELATION LABELS
// =============================================================================

mod s0_labels {
    use super::*;

    /// S0.1: Label joins endpoint titles in schema order.
    #[test]
    fn label_from_endpoint_titles() {
        let mut session = session();
        let a = node(&mut session, "company", "Company A");
        let b = node(&mut session, "company", "Company B");
        assert_eq!((a, b), (EntityId(1), EntityId(2)));

        let relation = partnership(&mut session, a, b);
        assert_eq!(relation.label, "Relationship Company A - Company B");
        assert_eq!(
            session.generate_label(&relation).expect("label"),
            "Relationship Company A - Company B"
        );
    }

    /// S0.2: Renaming an endpoint shows up on the next relation save.
    #[test]
    fn label_follows_renamed_endpoint() {
        let mut session = session();
        let a = node(&mut session, "company", "Company A");
        let b = node(&mut session, "company", "Company B");
        let mut relation = partnership(&mut session, a, b);

        let mut renamed = session.load(EntityType::Node, b).expect("load").expect("exists");
        renamed.label = "Company Z".to_string();
        session.save(&mut renamed).expect("save");
        session.save(&mut relation).expect("resave");

        assert_eq!(relation.label, "Relationship Company A - Company Z");
    }

    /// S0.3: Relation bundles without auto title keep the given label.
    #[test]
    fn manual_title_kept() {
        let config = site_config().with_bundle(
            "relation_manual",
            BundleConfig {
                auto_title: false,
                ..BundleConfig::relation()
            }
            .with_field(A, FieldDefinition::reference(EntityType::Node).targeting(["company"]))
            .with_field(B, FieldDefinition::reference(EntityType::Node).targeting(["company"])),
        );
        let mut session = Session::new(SchemaRegistry::new(config));
        let a = node(&mut session, "company", "Company A");
        let b = node(&mut session, "company", "Company B");

        let mut relation = Entity::node("relation_manual", "Hand written")
            .with_reference(A, a)
            .with_reference(B, b);
        session.save(&mut relation).expect("save");
        assert_eq!(relation.label, "Hand written");
    }
}

// =============================================================================
// TIER S1: CASCADE DELETE
// =============================================================================

mod s1_cascade_delete {
    use super::*;

    /// S1.1: Deleting an endpoint node deletes the relation record.
    #[test]
    fn endpoint_delete_removes_relation() {
        let mut session = session();
        let a = node(&mut session, "company", "Company A");
        let b = node(&mut session, "company", "Company B");
        let relation = partnership(&mut session, a, b);
        let relation_id = relation.id.expect("id");

        assert!(session.delete(EntityType::Node, b).expect("delete"));

        assert!(session.load(EntityType::Node, relation_id).expect("load").is_none());
        assert!(session.load(EntityType::Node, a).expect("load").is_some());
    }

    /// S1.2: Every relation touching the node goes, unrelated ones stay.
    #[test]
    fn only_referencing_relations_deleted() {
        let mut session = session();
        let a = node(&mut session, "company", "A");
        let b = node(&mut session, "company", "B");
        let c = node(&mut session, "company", "C");
        let ab = partnership(&mut session, a, b).id.expect("id");
        let ca = partnership(&mut session, c, a).id.expect("id");
        let bc = partnership(&mut session, b, c).id.expect("id");

        let target = session.load(EntityType::Node, a).expect("load").expect("exists");
        let found = session.find_referencing_relations(&target).expect("find");
        assert_eq!(found["relation_partnership"].len(), 2);

        session.delete(EntityType::Node, a).expect("delete");
        assert!(session.load(EntityType::Node, ab).expect("load").is_none());
        assert!(session.load(EntityType::Node, ca).expect("load").is_none());
        assert!(session.load(EntityType::Node, bc).expect("load").is_some());
    }

    /// S1.3: Deleting a relation record leaves its endpoints alone.
    #[test]
    fn relation_delete_keeps_endpoints() {
        let mut session = session();
        let a = node(&mut session, "company", "A");
        let b = node(&mut session, "company", "B");
        let relation = partnership(&mut session, a, b).id.expect("id");

        session.delete(EntityType::Node, relation).expect("delete");
        assert_eq!(session.store().count(EntityType::Node).expect("count"), 2);
    }
}

// =============================================================================
// TIER S2: NESTED RELATION BIND-BACK
// =============================================================================

mod s2_bind_back {
    use super::*;

    /// S2.1: Records created in a host form end up pointing at the host.
    #[test]
    fn drafts_bound_to_new_host() {
        let mut session = session();
        let partner = node(&mut session, "company", "Partner");

        let mut first = Entity::node("relation_partnership", "").with_reference(B, partner);
        let first = session.save_nested_relation(&mut first, A).expect("nested");

        let mut host = Entity::node("company", "Host");
        let host = session.save_host(&mut host).expect("host");

        let stored = session.load(EntityType::Node, first).expect("load").expect("exists");
        assert_eq!(stored.first_reference(A), Some(host));
        assert_eq!(stored.label, "Relationship Host - Partner");
        assert_eq!(
            session.relation_graph().validate_endpoints(&stored, session.pending_bindings()),
            Some(EndpointStatus::Ok)
        );
    }

    /// S2.2: A failing host save leaves no draft behind.
    #[test]
    fn failing_host_rolls_back() {
        let mut session = session();
        let partner = node(&mut session, "company", "Partner");
        let mut draft = Entity::node("relation_partnership", "").with_reference(B, partner);
        let draft = session.save_nested_relation(&mut draft, A).expect("nested");

        let mut host = Entity::node("relation_partnership", "")
            .with_reference(A, partner)
            .with_reference(B, partner);
        assert!(matches!(
            session.save_host(&mut host),
            Err(RelsyncError::ValidationFailed(_))
        ));
        assert!(session.load(EntityType::Node, draft).expect("load").is_none());
    }

    /// S2.3: A draft never bound is reported by the audit.
    #[test]
    fn abandoned_draft_audited() {
        let mut session = session();
        let partner = node(&mut session, "company", "Partner");
        let mut draft = Entity::node("relation_partnership", "").with_reference(B, partner);
        session.save_nested_relation(&mut draft, A).expect("nested");

        assert!(session.audit().expect("audit").is_empty());
        session.finish_request();
        assert!(session.audit().expect("audit").contains(ErrorCode::Incomplete));
    }
}

// =============================================================================
// TIER S3: MIRROR TERMS
// =============================================================================

mod s3_mirror_terms {
    use super::*;

    fn family_term(session: &mut Session, name: &str) -> Entity {
        let mut term = Entity::term("selfrelation_family", name);
        session.save(&mut term).expect("save term");
        term
    }

    fn mirror_of(session: &Session, id: EntityId) -> Option<EntityId> {
        session
            .load(EntityType::Term, id)
            .expect("load")
            .expect("exists")
            .first_reference(MIRROR)
    }

    /// S3.1: Linking converges both terms in one save.
    #[test]
    fn link_converges() {
        let mut session = session();
        let mut parent = family_term(&mut session, "Parent");
        let child = family_term(&mut session, "Child");
        let (parent_id, child_id) = (parent.id.expect("id"), child.id.expect("id"));

        parent.set_field_value(MIRROR, FieldValue::reference(child_id));
        session.save(&mut parent).expect("save");

        assert_eq!(mirror_of(&session, child_id), Some(parent_id));
        assert_eq!(mirror_of(&session, parent_id), Some(child_id));
    }

    /// S3.2: Unlinking clears the partner.
    #[test]
    fn unlink_clears_partner() {
        let mut session = session();
        let mut parent = family_term(&mut session, "Parent");
        let child = family_term(&mut session, "Child");
        let child_id = child.id.expect("id");
        parent.set_field_value(MIRROR, FieldValue::reference(child_id));
        session.save(&mut parent).expect("save");

        parent.clear_field(MIRROR);
        session.save(&mut parent).expect("save");
        assert_eq!(mirror_of(&session, child_id), None);
    }

    /// S3.3: Linking to a term that had another partner frees that partner.
    #[test]
    fn steal_partner() {
        let mut session = session();
        let mut a = family_term(&mut session, "A");
        let mut b = family_term(&mut session, "B");
        let c = family_term(&mut session, "C");
        let (a_id, b_id, c_id) = (a.id.expect("id"), b.id.expect("id"), c.id.expect("id"));

        a.set_field_value(MIRROR, FieldValue::reference(c_id));
        session.save(&mut a).expect("save");
        b.set_field_value(MIRROR, FieldValue::reference(c_id));
        session.save(&mut b).expect("save");

        assert_eq!(mirror_of(&session, c_id), Some(b_id));
        assert_eq!(mirror_of(&session, a_id), None);
    }

    /// S3.4: String mode stores text only and never saves the paired term.
    #[test]
    fn string_mode_no_recursive_save() {
        let mut session = session();
        let mut child = Entity::term("crossrelation_types", "Child");
        session.save(&mut child).expect("save");

        let before = session.memory_store().expect("in memory").save_count();
        let mut parent = Entity::term("crossrelation_types", "Parent").with_text(MIRROR_STRING, "Child");
        session.save(&mut parent).expect("save");
        let after = session.memory_store().expect("in memory").save_count();

        assert_eq!(after - before, 1);
        let stored = session
            .load(EntityType::Term, child.id.expect("id"))
            .expect("load")
            .expect("exists");
        assert!(stored.field_value(MIRROR_STRING).is_none());
        assert_eq!(parent.text(MIRROR_STRING), Some("Child"));
    }
}

// =============================================================================
// TIER S4: CONFIGURATION IMPORT
// =============================================================================

mod s4_config_import {
    use super::*;
    use relsync_core::import_config;

    /// S4.1: A consistent configuration imports.
    #[test]
    fn valid_import_applies() {
        let current = SiteConfig::new(settings());
        let imported = import_config(&current, site_config()).expect("import");
        assert!(SchemaRegistry::new(imported).is_relation_bundle("relation_partnership"));
    }

    /// S4.2: Removing an endpoint field from a relation bundle is blocked.
    #[test]
    fn endpoint_removal_blocked() {
        let current = site_config();
        let mut proposed = site_config();
        if let Some(bundle) = proposed.bundles.get_mut("relation_partnership") {
            bundle.fields.remove(B);
        }
        assert!(matches!(
            import_config(&current, proposed),
            Err(RelsyncError::ImportBlocked(_))
        ));
    }

    /// S4.3: Reloading the session picks up new relation bundles.
    #[test]
    fn reload_resolves_new_bundles() {
        let mut session = Session::new(SchemaRegistry::new(SiteConfig::new(settings())));
        assert!(!session.registry().is_relation_bundle("relation_partnership"));
        session.reload_config(site_config());
        assert!(session.registry().is_relation_bundle("relation_partnership"));
    }
}

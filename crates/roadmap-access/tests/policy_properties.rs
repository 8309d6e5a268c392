//! Property tests for the access-policy evaluator.
//!
//! Each property is checked over randomly generated ACLs and principals drawn
//! from a small shared pool, so that memberships overlap often.

use proptest::prelude::*;
use roadmap_access::{
    evaluate, AccessControlled, AccessLevel, Principal, PrincipalId, PrincipalRef, PUBLIC_GROUP,
};
use uuid::Uuid;

const GROUPS: [&str; 4] = ["Public", "ClimateTeam", "Energy", "Transport"];

fn id_from(n: u8) -> PrincipalId {
    PrincipalId(Uuid::from_u128(u128::from(n) + 1))
}

fn person(n: u8) -> PrincipalRef {
    PrincipalRef::new(id_from(n), format!("user{n}"))
}

prop_compose! {
    fn arb_acl()(
        author in 0u8..6,
        editors in prop::collection::vec(0u8..6, 0..4),
        viewers in prop::collection::vec(0u8..6, 0..4),
        edit_groups in prop::sample::subsequence(GROUPS.to_vec(), 0..=GROUPS.len()),
        view_groups in prop::sample::subsequence(GROUPS.to_vec(), 0..=GROUPS.len()),
    ) -> AccessControlled {
        AccessControlled::owned_by(person(author))
            .with_editors(editors.into_iter().map(person))
            .with_viewers(viewers.into_iter().map(person))
            .with_edit_groups(edit_groups)
            .with_view_groups(view_groups)
    }
}

prop_compose! {
    fn arb_principal()(
        n in 0u8..6,
        is_admin in any::<bool>(),
        groups in prop::sample::subsequence(GROUPS.to_vec(), 0..=GROUPS.len()),
    ) -> Principal {
        Principal::new(id_from(n), format!("user{n}"))
            .with_admin(is_admin)
            .with_groups(groups)
    }
}

proptest! {
    #[test]
    fn evaluation_is_pure(acl in arb_acl(), principal in arb_principal()) {
        let first = evaluate(&acl, Some(&principal));
        let second = evaluate(&acl, Some(&principal));
        prop_assert_eq!(first, second);
        prop_assert_eq!(evaluate(&acl, None), evaluate(&acl, None));
    }

    #[test]
    fn admin_always_resolves_to_admin(acl in arb_acl(), principal in arb_principal()) {
        let admin = principal.with_admin(true);
        prop_assert_eq!(evaluate(&acl, Some(&admin)), AccessLevel::Admin);
    }

    #[test]
    fn anonymous_depends_only_on_public(acl in arb_acl()) {
        let expected = if acl.grants_view_to_group(PUBLIC_GROUP) {
            AccessLevel::View
        } else {
            AccessLevel::None
        };
        prop_assert_eq!(evaluate(&acl, None), expected);
    }

    #[test]
    fn author_resolves_to_at_least_edit(acl in arb_acl(), principal in arb_principal()) {
        let mut acl = acl;
        acl.author = principal.to_ref();
        prop_assert!(evaluate(&acl, Some(&principal)) >= AccessLevel::Edit);
    }

    #[test]
    fn adding_editor_never_lowers_level(acl in arb_acl(), principal in arb_principal()) {
        let before = evaluate(&acl, Some(&principal));
        let after = evaluate(&acl.clone().with_editors([principal.to_ref()]), Some(&principal));
        prop_assert!(after >= before);
        prop_assert!(after >= AccessLevel::Edit);
    }

    #[test]
    fn adding_viewer_never_lowers_level(acl in arb_acl(), principal in arb_principal()) {
        let before = evaluate(&acl, Some(&principal));
        let after = evaluate(&acl.clone().with_viewers([principal.to_ref()]), Some(&principal));
        prop_assert!(after >= before);
        prop_assert!(after >= AccessLevel::View);
    }

    #[test]
    fn adding_group_grants_never_lower_level(
        acl in arb_acl(),
        principal in arb_principal(),
        group in prop::sample::select(GROUPS.to_vec()),
    ) {
        let principal = principal.with_groups([group]);
        let before = evaluate(&acl, Some(&principal));

        let with_edit = acl.clone().with_edit_groups([group]);
        prop_assert!(evaluate(&with_edit, Some(&principal)) >= before.max(AccessLevel::Edit));

        let with_view = acl.with_view_groups([group]);
        prop_assert!(evaluate(&with_view, Some(&principal)) >= before.max(AccessLevel::View));
    }
}

/// An edit group grant works without an editors listing.
#[test]
fn edit_group_member_resolves_to_edit() {
    let acl = AccessControlled::owned_by(person(0)).with_edit_groups(["ClimateTeam"]);
    let member = Principal::new(id_from(1), "member").with_groups(["ClimateTeam"]);

    assert!(!acl.lists_editor(member.id));
    assert_eq!(evaluate(&acl, Some(&member)), AccessLevel::Edit);
}

/// Anonymous access hinges on the Public view group.
#[test]
fn anonymous_view_requires_public_group() {
    let public = AccessControlled::owned_by(person(0)).with_view_groups([PUBLIC_GROUP]);
    assert_eq!(evaluate(&public, None), AccessLevel::View);

    let closed = AccessControlled::owned_by(person(0));
    assert_eq!(evaluate(&closed, None), AccessLevel::None);
}

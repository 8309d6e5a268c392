use pretty_assertions::assert_eq;
use roadmap_access::{AccessControlled, AccessLevel};
use roadmap_core::{MutationRequest, OrchestratorConfig, ResourceRef, RoadmapType, SessionClaims};
use roadmap_gate::{load_fixture, parse_session, run_apply, run_check, save_fixture};
use roadmap_test_utils::{goal_input, World};
use std::sync::Arc;

struct Fixture {
    _dir: tempfile::TempDir,
    path: std::path::PathBuf,
    world: World,
    roadmap: roadmap_core::Roadmap,
}

fn fixture() -> Fixture {
    let world = World::new();
    let owner = world.user("owner", &[]);
    world.user("member", &["ClimateTeam"]);
    let meta = world.meta_roadmap(&owner, RoadmapType::Municipal);
    let roadmap = world.roadmap(
        &meta,
        AccessControlled::owned_by(owner.to_ref())
            .with_edit_groups(["ClimateTeam"])
            .with_view_groups(["Public"]),
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    save_fixture(&world.store, &path).unwrap();
    Fixture {
        _dir: dir,
        path,
        world,
        roadmap,
    }
}

#[tokio::test]
async fn test_check_reports_levels_from_fixture() {
    let fx = fixture();
    let store = Arc::new(load_fixture(&fx.path).unwrap());
    let id = fx.roadmap.id.to_string();

    let member = run_check(Arc::clone(&store), "member", &id).await.unwrap();
    assert_eq!(member.level, AccessLevel::Edit);
    assert_eq!(member.target, ResourceRef::Roadmap(fx.roadmap.id));

    let anonymous = run_check(Arc::clone(&store), "anonymous", &id).await.unwrap();
    assert_eq!(anonymous.level, AccessLevel::View);

    assert!(run_check(Arc::clone(&store), "nobody", &id).await.is_err());
    assert!(run_check(store, "member", "not-a-uuid").await.is_err());
}

#[tokio::test]
async fn test_apply_commits_and_reports_status() {
    let fx = fixture();
    let store = Arc::new(load_fixture(&fx.path).unwrap());
    let member = fx.world.store.principal_named("member").unwrap();
    let claims = SessionClaims {
        principal_id: member.id,
        is_admin: false,
    };

    let report = run_apply(
        Arc::clone(&store),
        OrchestratorConfig::default(),
        Some(claims),
        MutationRequest::CreateGoal {
            roadmap: fx.roadmap.id,
            input: goal_input("Emissions|CO2", &["12", "11"]),
        },
    )
    .await
    .unwrap();

    assert!(report.succeeded());
    assert_eq!(report.status, 201);
    assert!(!report.session_destroyed);
    let outcome = report.outcome.unwrap();
    assert!(store.get(outcome.target).is_some());
}

#[tokio::test]
async fn test_apply_reports_bad_session() {
    let fx = fixture();
    let store = Arc::new(load_fixture(&fx.path).unwrap());
    let member = fx.world.store.principal_named("member").unwrap();
    let forged = format!(r#"{{"principal_id":"{}","is_admin":true}}"#, member.id);

    let report = run_apply(
        store,
        OrchestratorConfig::default(),
        parse_session(&forged).unwrap(),
        MutationRequest::DeleteRoadmap {
            id: fx.roadmap.id,
        },
    )
    .await
    .unwrap();

    assert!(!report.succeeded());
    assert_eq!(report.status, 403);
    assert!(report.session_destroyed);
    assert_eq!(report.error.as_deref(), Some("bad session"));
}

#[test]
fn test_anonymous_session_argument() {
    assert_eq!(parse_session("anonymous").unwrap(), None);
    assert!(parse_session("{not json").is_err());
}

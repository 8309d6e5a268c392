//! Governing ACL resolution
//!
//! Meta-roadmaps and roadmaps carry their own ACL. Goals and actions have
//! none; they are governed by the roadmap they belong to. National scope is a
//! property of the meta-roadmap type and gates the documents themselves, not
//! the goals and actions inside them.

use crate::error::{MutationError, StoreError};
use crate::store::RoadmapStore;
use crate::types::{Entity, MetaRoadmapId, ResourceRef, RoadmapId};
use roadmap_access::{AccessControlled, AccessLevel, Principal, PrincipalId};
use std::collections::HashSet;

/// A loaded resource together with the ACL that governs it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// The referenced record itself
    pub entity: Entity,
    /// Governing ACL
    pub acl: AccessControlled,
    /// True if the governing document has national scope
    pub national: bool,
    /// Authors along the path to the top document, nearest first
    pub lineage_authors: Vec<PrincipalId>,
    /// Roadmap owning the resource, if any
    pub roadmap: Option<RoadmapId>,
}

impl Resolved {
    /// True if `id` authored the resource or one of its ancestors
    #[must_use]
    pub fn authored_in_lineage(&self, id: PrincipalId) -> bool {
        self.lineage_authors.contains(&id)
    }
}

/// Load `target` and its governing ACL
///
/// # Errors
/// [`StoreError::NotFound`] if the target or any record on its path is
/// missing; other store failures unchanged.
pub async fn resolve<S>(store: &S, target: ResourceRef) -> Result<Resolved, StoreError>
where
    S: RoadmapStore + ?Sized,
{
    match target {
        ResourceRef::MetaRoadmap(id) => {
            let meta = store.load_meta_roadmap(id).await?;
            Ok(Resolved {
                acl: meta.acl.clone(),
                national: meta.kind.is_national(),
                lineage_authors: vec![meta.acl.author.id],
                roadmap: None,
                entity: Entity::MetaRoadmap(meta),
            })
        }
        ResourceRef::Roadmap(id) => {
            let roadmap = store.load_roadmap(id).await?;
            let meta = store.load_meta_roadmap(roadmap.meta_roadmap).await?;
            Ok(Resolved {
                acl: roadmap.acl.clone(),
                national: meta.kind.is_national(),
                lineage_authors: vec![roadmap.acl.author.id, meta.acl.author.id],
                roadmap: Some(roadmap.id),
                entity: Entity::Roadmap(roadmap),
            })
        }
        ResourceRef::Goal(id) => {
            let goal = store.load_goal(id).await?;
            let roadmap = store.load_roadmap(goal.roadmap).await?;
            Ok(Resolved {
                lineage_authors: vec![goal.author.id, roadmap.acl.author.id],
                acl: roadmap.acl,
                national: false,
                roadmap: Some(roadmap.id),
                entity: Entity::Goal(goal),
            })
        }
        ResourceRef::Action(id) => {
            let action = store.load_action(id).await?;
            let goal = store.load_goal(action.goal).await?;
            let roadmap = store.load_roadmap(goal.roadmap).await?;
            Ok(Resolved {
                lineage_authors: vec![action.author.id, goal.author.id, roadmap.acl.author.id],
                acl: roadmap.acl,
                national: false,
                roadmap: Some(roadmap.id),
                entity: Entity::Action(action),
            })
        }
    }
}

/// Hard gate for national-scope documents
///
/// Runs before ordinary policy evaluation; passing it does not grant
/// anything by itself.
///
/// # Errors
/// [`MutationError::AccessDenied`] if `national` and the principal is not an
/// admin.
pub fn require_national_clearance(
    national: bool,
    principal: Option<&Principal>,
) -> Result<(), MutationError> {
    if national && !principal.is_some_and(|p| p.is_admin) {
        tracing::warn!(
            principal = principal.map(|p| p.username.as_str()),
            required = %AccessLevel::Admin,
            "national document requires admin"
        );
        return Err(MutationError::AccessDenied);
    }
    Ok(())
}

/// True if `needle` is `start` or one of its ancestors
///
/// Used to keep the meta-roadmap parent relation acyclic. A parent that no
/// longer exists ends the walk.
///
/// # Errors
/// Store failures other than a missing record.
pub async fn ancestry_contains<S>(
    store: &S,
    start: MetaRoadmapId,
    needle: MetaRoadmapId,
) -> Result<bool, StoreError>
where
    S: RoadmapStore + ?Sized,
{
    let mut visited = HashSet::new();
    let mut cursor = Some(start);

    while let Some(id) = cursor {
        if id == needle {
            return Ok(true);
        }
        if !visited.insert(id) {
            // Stored data already has a cycle; it does not involve `needle`.
            return Ok(false);
        }
        cursor = match store.load_meta_roadmap(id).await {
            Ok(meta) => meta.parent,
            Err(StoreError::NotFound(_)) => None,
            Err(err) => return Err(err),
        };
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockRoadmapStore;
    use crate::types::{Goal, GoalId, MetaRoadmap, Roadmap, RoadmapType, DataSeries};
    use chrono::Utc;
    use indexmap::IndexSet;
    use mockall::predicate::eq;
    use roadmap_access::PrincipalRef;

    fn person(name: &str) -> PrincipalRef {
        PrincipalRef::new(PrincipalId::new(), name)
    }

    fn meta(author: &PrincipalRef, kind: RoadmapType, parent: Option<MetaRoadmapId>) -> MetaRoadmap {
        MetaRoadmap {
            id: MetaRoadmapId::new(),
            name: "Plan".into(),
            description: String::new(),
            kind,
            actor: None,
            parent,
            acl: AccessControlled::owned_by(author.clone()),
            links: IndexSet::new(),
            last_modified: Utc::now(),
        }
    }

    fn roadmap(author: &PrincipalRef, meta: MetaRoadmapId) -> Roadmap {
        Roadmap {
            id: RoadmapId::new(),
            meta_roadmap: meta,
            period: Some("2025".into()),
            description: None,
            acl: AccessControlled::owned_by(author.clone()).with_edit_groups(["Editors"]),
            last_modified: Utc::now(),
        }
    }

    #[tokio::test]
    async fn goal_is_governed_by_its_roadmap() {
        let alice = person("alice");
        let bob = person("bob");
        let parent = meta(&alice, RoadmapType::National, None);
        let road = roadmap(&alice, parent.id);
        let goal = Goal {
            id: GoalId::new(),
            roadmap: road.id,
            author: bob.clone(),
            name: None,
            description: None,
            indicator_parameter: "Emissions".into(),
            data_series: DataSeries {
                unit: "kt".into(),
                first_year: 2020,
                values: vec![Some(1.0)],
            },
            links: IndexSet::new(),
            last_modified: Utc::now(),
        };

        let mut store = MockRoadmapStore::new();
        let goal_clone = goal.clone();
        store
            .expect_load_goal()
            .with(eq(goal.id))
            .returning(move |_| Ok(goal_clone.clone()));
        let road_clone = road.clone();
        store
            .expect_load_roadmap()
            .with(eq(road.id))
            .returning(move |_| Ok(road_clone.clone()));

        let resolved = resolve(&store, ResourceRef::Goal(goal.id)).await.unwrap();
        assert_eq!(resolved.acl, road.acl);
        assert_eq!(resolved.roadmap, Some(road.id));
        assert!(!resolved.national);
        assert!(resolved.authored_in_lineage(bob.id));
        assert!(resolved.authored_in_lineage(alice.id));
    }

    #[tokio::test]
    async fn roadmap_inherits_national_scope() {
        let alice = person("alice");
        let parent = meta(&alice, RoadmapType::National, None);
        let road = roadmap(&person("bob"), parent.id);

        let mut store = MockRoadmapStore::new();
        let road_clone = road.clone();
        store
            .expect_load_roadmap()
            .returning(move |_| Ok(road_clone.clone()));
        let parent_clone = parent.clone();
        store
            .expect_load_meta_roadmap()
            .returning(move |_| Ok(parent_clone.clone()));

        let resolved = resolve(&store, ResourceRef::Roadmap(road.id)).await.unwrap();
        assert!(resolved.national);
        assert_eq!(resolved.lineage_authors[1], alice.id);
    }

    #[tokio::test]
    async fn missing_ancestor_is_not_found() {
        let mut store = MockRoadmapStore::new();
        store
            .expect_load_roadmap()
            .returning(|id| Err(StoreError::NotFound(ResourceRef::Roadmap(id))));

        let err = resolve(&store, ResourceRef::Roadmap(RoadmapId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn national_gate_admits_only_admins() {
        let admin = Principal::new(PrincipalId::new(), "root").with_admin(true);
        let user = Principal::new(PrincipalId::new(), "alice");

        assert!(require_national_clearance(true, Some(&admin)).is_ok());
        assert_eq!(
            require_national_clearance(true, Some(&user)),
            Err(MutationError::AccessDenied)
        );
        assert_eq!(
            require_national_clearance(true, None),
            Err(MutationError::AccessDenied)
        );
        assert!(require_national_clearance(false, None).is_ok());
    }

    #[tokio::test]
    async fn ancestry_walk_detects_cycles() {
        let alice = person("alice");
        let root = meta(&alice, RoadmapType::Other, None);
        let child = meta(&alice, RoadmapType::Other, Some(root.id));

        let mut store = MockRoadmapStore::new();
        let (root_c, child_c) = (root.clone(), child.clone());
        store.expect_load_meta_roadmap().returning(move |id| {
            if id == root_c.id {
                Ok(root_c.clone())
            } else if id == child_c.id {
                Ok(child_c.clone())
            } else {
                Err(StoreError::NotFound(ResourceRef::MetaRoadmap(id)))
            }
        });

        // Making root a child of child would close a loop.
        assert!(ancestry_contains(&store, child.id, root.id).await.unwrap());
        assert!(!ancestry_contains(&store, root.id, child.id).await.unwrap());
    }
}

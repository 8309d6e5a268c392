//! Testing utilities for the roadmap workspace
//!
//! Shared fixtures: a seeded in-memory world with principals, documents and
//! sessions, plus request input builders.

#![allow(missing_docs)]

use chrono::{Duration, Utc};
use indexmap::IndexSet;
use roadmap_access::{AccessControlled, Principal, PrincipalId};
use roadmap_core::{
    Action, ActionId, ActionInput, Comment, CommentId, DataSeries, Entity, Goal, GoalId, GoalInput,
    Link, LinkId, LinkInput, MemoryStore, MetaRoadmap, MetaRoadmapId, MetaRoadmapInput,
    MutationOrchestrator, RegisteredSession, ResourceRef, Roadmap, RoadmapId, RoadmapType,
    SessionClaims, SessionRegistry, Timestamp,
};
use std::sync::Arc;

/// Stamp given to seeded records; older than any commit made by a test
pub fn seeded_stamp() -> Timestamp {
    Utc::now() - Duration::minutes(5)
}

/// A memory store, a session registry and an orchestrator over both
pub struct World {
    pub store: Arc<MemoryStore>,
    pub sessions: Arc<SessionRegistry>,
    pub orchestrator: MutationOrchestrator<MemoryStore>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store.add_group(roadmap_access::PUBLIC_GROUP);
        Self {
            orchestrator: MutationOrchestrator::with_defaults(Arc::clone(&store)),
            store,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn user(&self, username: &str, groups: &[&str]) -> Principal {
        let principal = Principal::new(PrincipalId::new(), username).with_groups(groups.iter().copied());
        self.store.add_principal(principal.clone());
        principal
    }

    pub fn admin(&self, username: &str) -> Principal {
        let principal = Principal::new(PrincipalId::new(), username).with_admin(true);
        self.store.add_principal(principal.clone());
        principal
    }

    /// Session whose claims match the principal record
    pub fn session(&self, principal: &Principal) -> RegisteredSession {
        self.sessions.open(SessionClaims {
            principal_id: principal.id,
            is_admin: principal.is_admin,
        })
    }

    /// Session claiming admin regardless of the principal record
    pub fn admin_claim_session(&self, principal: &Principal) -> RegisteredSession {
        self.sessions.open(SessionClaims {
            principal_id: principal.id,
            is_admin: true,
        })
    }

    pub fn meta_roadmap(&self, author: &Principal, kind: RoadmapType) -> MetaRoadmap {
        let meta = MetaRoadmap {
            id: MetaRoadmapId::new(),
            name: format!("{kind:?} plan"),
            description: String::new(),
            kind,
            actor: None,
            parent: None,
            acl: AccessControlled::owned_by(author.to_ref()),
            links: IndexSet::new(),
            last_modified: seeded_stamp(),
        };
        self.store.seed(Entity::MetaRoadmap(meta.clone()));
        meta
    }

    pub fn roadmap(&self, meta: &MetaRoadmap, acl: AccessControlled) -> Roadmap {
        let roadmap = Roadmap {
            id: RoadmapId::new(),
            meta_roadmap: meta.id,
            period: Some("2025".into()),
            description: None,
            acl,
            last_modified: seeded_stamp(),
        };
        self.store.seed(Entity::Roadmap(roadmap.clone()));
        roadmap
    }

    pub fn goal(&self, roadmap: &Roadmap, author: &Principal, links: &[LinkId]) -> Goal {
        let goal = Goal {
            id: GoalId::new(),
            roadmap: roadmap.id,
            author: author.to_ref(),
            name: Some("Cut transport emissions".into()),
            description: None,
            indicator_parameter: "Emissions|CO2|Transport".into(),
            data_series: DataSeries {
                unit: "kt CO2/yr".into(),
                first_year: 2020,
                values: vec![Some(120.0), Some(115.0), None],
            },
            links: links.iter().copied().collect(),
            last_modified: seeded_stamp(),
        };
        self.store.seed(Entity::Goal(goal.clone()));
        goal
    }

    pub fn action(&self, goal: &Goal, author: &Principal) -> Action {
        let action = Action {
            id: ActionId::new(),
            goal: goal.id,
            author: author.to_ref(),
            name: "Expand commuter rail".into(),
            description: None,
            start_year: Some(2025),
            end_year: Some(2030),
            links: IndexSet::new(),
            last_modified: seeded_stamp(),
        };
        self.store.seed(Entity::Action(action.clone()));
        action
    }

    pub fn link(&self, url: &str) -> Link {
        let link = Link {
            id: LinkId::new(),
            url: url.to_string(),
            description: None,
        };
        self.store.seed_link(link.clone());
        link
    }

    pub fn comment(&self, target: ResourceRef, author: &Principal, text: &str) -> Comment {
        let comment = Comment {
            id: CommentId::new(),
            target,
            author: author.to_ref(),
            text: text.to_string(),
            created_at: seeded_stamp(),
        };
        self.store.seed_comment(comment.clone());
        comment
    }

    /// Current stored version of a record
    pub fn stored(&self, target: ResourceRef) -> Option<Entity> {
        self.store.get(target)
    }
}

pub fn meta_input(name: &str, kind: RoadmapType) -> MetaRoadmapInput {
    MetaRoadmapInput {
        name: name.to_string(),
        description: String::new(),
        kind,
        actor: None,
        parent: None,
        sharing: None,
        links: vec![],
    }
}

pub fn goal_input(indicator: &str, series: &[&str]) -> GoalInput {
    GoalInput {
        name: None,
        description: None,
        indicator_parameter: indicator.to_string(),
        data_unit: "kt CO2/yr".to_string(),
        data_series: series.iter().map(|cell| (*cell).to_string()).collect(),
        links: vec![],
    }
}

pub fn action_input(name: &str) -> ActionInput {
    ActionInput {
        name: name.to_string(),
        description: None,
        start_year: None,
        end_year: None,
        links: vec![],
    }
}

pub fn link_input(url: &str) -> LinkInput {
    LinkInput {
        url: url.to_string(),
        description: None,
    }
}

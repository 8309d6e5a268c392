//! In-memory reference store
//!
//! Keeps the whole record graph behind one lock so every [`Changeset`]
//! is validated and applied as a unit. Used by tests and the gate CLI;
//! fixtures are loaded from and dumped to [`StoreSnapshot`].

use crate::error::StoreError;
use crate::operation::SharingInput;
use crate::store::{
    Changeset, CommitReceipt, OrphanSet, ReferenceSnapshot, RoadmapStore,
};
use crate::types::{
    Action, ActionId, Comment, CommentId, Entity, Goal, GoalId, Link, LinkId, MetaRoadmap,
    MetaRoadmapId, ResourceRef, Roadmap, RoadmapId, Timestamp,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use indexmap::IndexSet;
use parking_lot::RwLock;
use roadmap_access::{AccessControlled, Group, Principal, PrincipalId, PrincipalRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Serializable dump of a [`MemoryStore`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    /// Known principals
    pub principals: Vec<Principal>,
    /// Known group names
    pub groups: BTreeSet<String>,
    /// Meta-roadmaps
    pub meta_roadmaps: Vec<MetaRoadmap>,
    /// Roadmaps
    pub roadmaps: Vec<Roadmap>,
    /// Goals
    pub goals: Vec<Goal>,
    /// Actions
    pub actions: Vec<Action>,
    /// Links
    pub links: Vec<Link>,
    /// Comments
    pub comments: Vec<Comment>,
}

#[derive(Debug, Default)]
struct StoreState {
    principals: HashMap<PrincipalId, Principal>,
    groups: BTreeSet<String>,
    meta_roadmaps: HashMap<MetaRoadmapId, MetaRoadmap>,
    roadmaps: HashMap<RoadmapId, Roadmap>,
    goals: HashMap<GoalId, Goal>,
    actions: HashMap<ActionId, Action>,
    links: HashMap<LinkId, Link>,
    comments: HashMap<CommentId, Comment>,
    last_stamp: Option<Timestamp>,
}

impl StoreState {
    /// Commit stamps strictly increase even if the wall clock does not
    fn tick(&mut self) -> Timestamp {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn observe(&mut self, stamp: Timestamp) {
        if self.last_stamp.map_or(true, |last| stamp > last) {
            self.last_stamp = Some(stamp);
        }
    }

    fn contains(&self, target: ResourceRef) -> bool {
        match target {
            ResourceRef::MetaRoadmap(id) => self.meta_roadmaps.contains_key(&id),
            ResourceRef::Roadmap(id) => self.roadmaps.contains_key(&id),
            ResourceRef::Goal(id) => self.goals.contains_key(&id),
            ResourceRef::Action(id) => self.actions.contains_key(&id),
        }
    }

    fn stamp_of(&self, target: ResourceRef) -> Option<Timestamp> {
        match target {
            ResourceRef::MetaRoadmap(id) => self.meta_roadmaps.get(&id).map(|m| m.last_modified),
            ResourceRef::Roadmap(id) => self.roadmaps.get(&id).map(|r| r.last_modified),
            ResourceRef::Goal(id) => self.goals.get(&id).map(|g| g.last_modified),
            ResourceRef::Action(id) => self.actions.get(&id).map(|a| a.last_modified),
        }
    }

    fn get(&self, target: ResourceRef) -> Option<Entity> {
        match target {
            ResourceRef::MetaRoadmap(id) => self.meta_roadmaps.get(&id).cloned().map(Entity::MetaRoadmap),
            ResourceRef::Roadmap(id) => self.roadmaps.get(&id).cloned().map(Entity::Roadmap),
            ResourceRef::Goal(id) => self.goals.get(&id).cloned().map(Entity::Goal),
            ResourceRef::Action(id) => self.actions.get(&id).cloned().map(Entity::Action),
        }
    }

    fn put(&mut self, entity: Entity) {
        match entity {
            Entity::MetaRoadmap(m) => {
                self.meta_roadmaps.insert(m.id, m);
            }
            Entity::Roadmap(r) => {
                self.roadmaps.insert(r.id, r);
            }
            Entity::Goal(g) => {
                self.goals.insert(g.id, g);
            }
            Entity::Action(a) => {
                self.actions.insert(a.id, a);
            }
        }
    }

    fn parent_of(entity: &Entity) -> Option<ResourceRef> {
        match entity {
            Entity::MetaRoadmap(m) => m.parent.map(ResourceRef::MetaRoadmap),
            Entity::Roadmap(r) => Some(ResourceRef::MetaRoadmap(r.meta_roadmap)),
            Entity::Goal(g) => Some(ResourceRef::Roadmap(g.roadmap)),
            Entity::Action(a) => Some(ResourceRef::Goal(a.goal)),
        }
    }

    /// Check every rule before anything is applied
    fn validate(&self, changes: &Changeset) -> Result<(), StoreError> {
        if let Some(pre) = changes.precondition {
            let stored = self
                .stamp_of(pre.target)
                .ok_or(StoreError::NotFound(pre.target))?;
            if stored > pre.unmodified_since {
                return Err(StoreError::Stale(pre.target));
            }
        }

        let mut pending = HashSet::new();
        for entity in &changes.inserts {
            let target = entity.resource_ref();
            if self.contains(target) || !pending.insert(target) {
                return Err(StoreError::Referential(format!("{target} already exists")));
            }
        }
        for entity in &changes.updates {
            let target = entity.resource_ref();
            if !self.contains(target) {
                return Err(StoreError::NotFound(target));
            }
        }

        let exists = |target: ResourceRef| self.contains(target) || pending.contains(&target);
        let new_links: HashSet<LinkId> = changes.links.iter().map(|l| l.id).collect();

        for entity in changes.inserts.iter().chain(&changes.updates) {
            if let Some(parent) = Self::parent_of(entity) {
                if !exists(parent) {
                    return Err(StoreError::NotFound(parent));
                }
            }
            for link in entity.links().into_iter().flatten() {
                if !self.links.contains_key(link) && !new_links.contains(link) {
                    return Err(StoreError::Referential(format!("link {link} does not exist")));
                }
            }
        }

        for link in &changes.links {
            if self.links.contains_key(&link.id) {
                return Err(StoreError::Referential(format!("link {} already exists", link.id)));
            }
        }

        for comment in &changes.comments {
            if !exists(comment.target) {
                return Err(StoreError::NotFound(comment.target));
            }
            if self.comments.contains_key(&comment.id) {
                return Err(StoreError::Referential(format!(
                    "comment {} already exists",
                    comment.id
                )));
            }
        }

        if let Some(target) = changes.delete {
            if !self.contains(target) {
                return Err(StoreError::NotFound(target));
            }
        }
        Ok(())
    }

    fn apply(&mut self, changes: Changeset) -> Timestamp {
        let stamp = self.tick();

        for link in changes.links {
            self.links.insert(link.id, link);
        }
        for mut entity in changes.inserts.into_iter().chain(changes.updates) {
            entity.set_last_modified(stamp);
            self.put(entity);
        }
        for comment in changes.comments {
            self.comments.insert(comment.id, comment);
        }
        if let Some(target) = changes.delete {
            self.remove_cascading(target);
        }
        stamp
    }

    /// Remove a record and everything below it
    ///
    /// Child meta-roadmaps are detached rather than removed. Links and
    /// comments are left for orphan pruning.
    fn remove_cascading(&mut self, target: ResourceRef) {
        match target {
            ResourceRef::MetaRoadmap(id) => {
                let roadmaps: Vec<RoadmapId> = self
                    .roadmaps
                    .values()
                    .filter(|r| r.meta_roadmap == id)
                    .map(|r| r.id)
                    .collect();
                for roadmap in roadmaps {
                    self.remove_cascading(ResourceRef::Roadmap(roadmap));
                }
                for child in self.meta_roadmaps.values_mut() {
                    if child.parent == Some(id) {
                        child.parent = None;
                    }
                }
                self.meta_roadmaps.remove(&id);
            }
            ResourceRef::Roadmap(id) => {
                let goals: Vec<GoalId> = self
                    .goals
                    .values()
                    .filter(|g| g.roadmap == id)
                    .map(|g| g.id)
                    .collect();
                for goal in goals {
                    self.remove_cascading(ResourceRef::Goal(goal));
                }
                self.roadmaps.remove(&id);
            }
            ResourceRef::Goal(id) => {
                self.actions.retain(|_, a| a.goal != id);
                self.goals.remove(&id);
            }
            ResourceRef::Action(id) => {
                self.actions.remove(&id);
            }
        }
    }

    fn resolve_username(&self, name: &str) -> Result<PrincipalRef, StoreError> {
        self.principals
            .values()
            .find(|p| p.username == name)
            .map(Principal::to_ref)
            .ok_or_else(|| StoreError::Referential(format!("unknown user {name:?}")))
    }

    fn resolve_group(&self, name: &str) -> Result<Group, StoreError> {
        if self.groups.contains(name) {
            Ok(Group::new(name))
        } else {
            Err(StoreError::Referential(format!("unknown group {name:?}")))
        }
    }
}

/// Store holding everything in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write();
            state.groups = snapshot.groups;
            for principal in snapshot.principals {
                state.groups.extend(principal.groups.iter().cloned());
                state.principals.insert(principal.id, principal);
            }
            let entities = snapshot
                .meta_roadmaps
                .into_iter()
                .map(Entity::MetaRoadmap)
                .chain(snapshot.roadmaps.into_iter().map(Entity::Roadmap))
                .chain(snapshot.goals.into_iter().map(Entity::Goal))
                .chain(snapshot.actions.into_iter().map(Entity::Action));
            for entity in entities {
                state.observe(entity.last_modified());
                state.put(entity);
            }
            for link in snapshot.links {
                state.links.insert(link.id, link);
            }
            for comment in snapshot.comments {
                state.comments.insert(comment.id, comment);
            }
        }
        store
    }

    /// Dump the current contents
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot {
            principals: state.principals.values().cloned().collect(),
            groups: state.groups.clone(),
            meta_roadmaps: state.meta_roadmaps.values().cloned().collect(),
            roadmaps: state.roadmaps.values().cloned().collect(),
            goals: state.goals.values().cloned().collect(),
            actions: state.actions.values().cloned().collect(),
            links: state.links.values().cloned().collect(),
            comments: state.comments.values().cloned().collect(),
        }
    }

    /// Register a principal; its groups become known group names
    pub fn add_principal(&self, principal: Principal) {
        let mut state = self.state.write();
        state.groups.extend(principal.groups.iter().cloned());
        state.principals.insert(principal.id, principal);
    }

    /// Register a group name
    pub fn add_group(&self, name: impl Into<String>) {
        self.state.write().groups.insert(name.into());
    }

    /// Remove a principal record
    pub fn remove_principal(&self, id: PrincipalId) -> Option<Principal> {
        self.state.write().principals.remove(&id)
    }

    /// Insert a record without validation, keeping its stamp
    pub fn seed(&self, entity: Entity) {
        let mut state = self.state.write();
        state.observe(entity.last_modified());
        state.put(entity);
    }

    /// Insert a link without validation
    pub fn seed_link(&self, link: Link) {
        self.state.write().links.insert(link.id, link);
    }

    /// Insert a comment without validation
    pub fn seed_comment(&self, comment: Comment) {
        self.state.write().comments.insert(comment.id, comment);
    }

    /// Current version of a record
    #[must_use]
    pub fn get(&self, target: ResourceRef) -> Option<Entity> {
        self.state.read().get(target)
    }

    /// Principal by username
    #[must_use]
    pub fn principal_named(&self, username: &str) -> Option<Principal> {
        self.state
            .read()
            .principals
            .values()
            .find(|p| p.username == username)
            .cloned()
    }

    /// True if the link exists
    #[must_use]
    pub fn has_link(&self, id: LinkId) -> bool {
        self.state.read().links.contains_key(&id)
    }

    /// True if the comment exists
    #[must_use]
    pub fn has_comment(&self, id: CommentId) -> bool {
        self.state.read().comments.contains_key(&id)
    }

    /// Number of stored links
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.state.read().links.len()
    }
}

fn not_found(target: ResourceRef) -> StoreError {
    StoreError::NotFound(target)
}

#[async_trait]
impl RoadmapStore for MemoryStore {
    async fn load_principal(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError> {
        Ok(self.state.read().principals.get(&id).cloned())
    }

    async fn load_meta_roadmap(&self, id: MetaRoadmapId) -> Result<MetaRoadmap, StoreError> {
        self.state
            .read()
            .meta_roadmaps
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(ResourceRef::MetaRoadmap(id)))
    }

    async fn load_roadmap(&self, id: RoadmapId) -> Result<Roadmap, StoreError> {
        self.state
            .read()
            .roadmaps
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(ResourceRef::Roadmap(id)))
    }

    async fn load_goal(&self, id: GoalId) -> Result<Goal, StoreError> {
        self.state
            .read()
            .goals
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(ResourceRef::Goal(id)))
    }

    async fn load_action(&self, id: ActionId) -> Result<Action, StoreError> {
        self.state
            .read()
            .actions
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(ResourceRef::Action(id)))
    }

    async fn resolve_sharing(
        &self,
        author: PrincipalRef,
        sharing: &SharingInput,
    ) -> Result<AccessControlled, StoreError> {
        let state = self.state.read();
        let editors = sharing
            .editors
            .iter()
            .map(|name| state.resolve_username(name))
            .collect::<Result<IndexSet<_>, _>>()?;
        let viewers = sharing
            .viewers
            .iter()
            .map(|name| state.resolve_username(name))
            .collect::<Result<IndexSet<_>, _>>()?;
        let edit_groups = sharing
            .edit_groups
            .iter()
            .map(|name| state.resolve_group(name))
            .collect::<Result<IndexSet<_>, _>>()?;
        let view_groups = sharing
            .view_groups
            .iter()
            .map(|name| state.resolve_group(name))
            .collect::<Result<IndexSet<_>, _>>()?;

        Ok(AccessControlled {
            author,
            editors,
            viewers,
            edit_groups,
            view_groups,
        })
    }

    async fn commit(&self, changes: Changeset) -> Result<CommitReceipt, StoreError> {
        let mut state = self.state.write();
        state.validate(&changes)?;
        let stamp = state.apply(changes);
        Ok(CommitReceipt { stamp })
    }

    async fn reference_snapshot(&self) -> Result<ReferenceSnapshot, StoreError> {
        let state = self.state.read();
        let referenced_links = state
            .meta_roadmaps
            .values()
            .flat_map(|m| m.links.iter())
            .chain(state.goals.values().flat_map(|g| g.links.iter()))
            .chain(state.actions.values().flat_map(|a| a.links.iter()))
            .copied()
            .collect();
        let live_resources = state
            .meta_roadmaps
            .keys()
            .map(|id| ResourceRef::MetaRoadmap(*id))
            .chain(state.roadmaps.keys().map(|id| ResourceRef::Roadmap(*id)))
            .chain(state.goals.keys().map(|id| ResourceRef::Goal(*id)))
            .chain(state.actions.keys().map(|id| ResourceRef::Action(*id)))
            .collect();

        Ok(ReferenceSnapshot {
            links: state.links.keys().copied().collect(),
            referenced_links,
            comments: state.comments.values().map(|c| (c.id, c.target)).collect(),
            live_resources,
        })
    }

    async fn remove_orphans(&self, orphans: &OrphanSet) -> Result<(), StoreError> {
        let mut state = self.state.write();
        for id in &orphans.links {
            state.links.remove(id);
        }
        for id in &orphans.comments {
            state.comments.remove(id);
        }
        Ok(())
    }
}

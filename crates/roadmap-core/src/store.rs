//! Persistence collaborator contract
//!
//! The store supplies ACL snapshots and principal records, enforces id
//! uniqueness and referential integrity, and applies each [`Changeset`]
//! atomically: the whole record graph commits or none of it does.

use crate::error::StoreError;
use crate::operation::SharingInput;
use crate::types::{
    Action, ActionId, Comment, CommentId, Entity, Goal, GoalId, Link, LinkId, MetaRoadmap,
    MetaRoadmapId, ResourceRef, Roadmap, RoadmapId, Timestamp,
};
use async_trait::async_trait;
use roadmap_access::{AccessControlled, Principal, PrincipalId, PrincipalRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Conditional-write precondition for updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    /// Record whose stamp is checked
    pub target: ResourceRef,
    /// Stored stamp must not be newer than this
    pub unmodified_since: Timestamp,
}

/// One atomic write
///
/// Records in `inserts` must not exist yet; records in `updates` must exist
/// and replace the stored version wholesale. Every parent reference must
/// resolve. The store stamps `last_modified` on every inserted or updated
/// record with the commit time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    /// Checked before anything is applied
    pub precondition: Option<Precondition>,
    /// New hierarchy records
    pub inserts: Vec<Entity>,
    /// Replaced hierarchy records
    pub updates: Vec<Entity>,
    /// New link records
    pub links: Vec<Link>,
    /// New comments
    pub comments: Vec<Comment>,
    /// Record to delete together with its descendants
    pub delete: Option<ResourceRef>,
}

impl Changeset {
    /// Empty changeset
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the target to be unmodified since `stamp`
    #[inline]
    #[must_use]
    pub fn guarded_by(mut self, target: ResourceRef, stamp: Timestamp) -> Self {
        self.precondition = Some(Precondition {
            target,
            unmodified_since: stamp,
        });
        self
    }

    /// True if applying would change nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
            && self.updates.is_empty()
            && self.links.is_empty()
            && self.comments.is_empty()
            && self.delete.is_none()
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Commit time, written to every touched record's `last_modified`
    pub stamp: Timestamp,
}

/// Which dependent records exist and which of them are still referenced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSnapshot {
    /// Every stored link
    pub links: Vec<LinkId>,
    /// Links held by at least one surviving record
    pub referenced_links: HashSet<LinkId>,
    /// Every stored comment with its target
    pub comments: Vec<(CommentId, ResourceRef)>,
    /// Hierarchy records that still exist
    pub live_resources: HashSet<ResourceRef>,
}

/// Dependent records selected for removal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanSet {
    /// Links no surviving record holds
    pub links: Vec<LinkId>,
    /// Comments whose target is gone
    pub comments: Vec<CommentId>,
}

impl OrphanSet {
    /// True if nothing needs removing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.comments.is_empty()
    }
}

/// Persistence engine as seen by the orchestrator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoadmapStore: Send + Sync {
    /// Fresh principal record, including group names
    async fn load_principal(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError>;

    /// Load a meta-roadmap
    async fn load_meta_roadmap(&self, id: MetaRoadmapId) -> Result<MetaRoadmap, StoreError>;

    /// Load a roadmap
    async fn load_roadmap(&self, id: RoadmapId) -> Result<Roadmap, StoreError>;

    /// Load a goal
    async fn load_goal(&self, id: GoalId) -> Result<Goal, StoreError>;

    /// Load an action
    async fn load_action(&self, id: ActionId) -> Result<Action, StoreError>;

    /// Resolve submitted sharing names into an ACL owned by `author`
    ///
    /// Unknown usernames or group names fail with
    /// [`StoreError::Referential`].
    async fn resolve_sharing(
        &self,
        author: PrincipalRef,
        sharing: &SharingInput,
    ) -> Result<AccessControlled, StoreError>;

    /// Apply a changeset atomically
    async fn commit(&self, changes: Changeset) -> Result<CommitReceipt, StoreError>;

    /// Snapshot of dependent records for orphan detection
    async fn reference_snapshot(&self) -> Result<ReferenceSnapshot, StoreError>;

    /// Remove the given dependent records; unknown ids are ignored
    async fn remove_orphans(&self, orphans: &OrphanSet) -> Result<(), StoreError>;
}

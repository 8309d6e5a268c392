//! Core types for the roadmap hierarchy
//!
//! Defines:
//! - identifiers for every stored record
//! - the four-tier entity graph (meta-roadmap, roadmap, goal, action)
//! - dependent records (links, comments, data series)

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use roadmap_access::{AccessControlled, PrincipalRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;
use uuid::Uuid;

/// Point in time used for `last_modified` and freshness tokens
pub type Timestamp = DateTime<Utc>;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random id
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Meta-roadmap identifier
    MetaRoadmapId
);
record_id!(
    /// Roadmap identifier
    RoadmapId
);
record_id!(
    /// Goal identifier
    GoalId
);
record_id!(
    /// Action identifier
    ActionId
);
record_id!(
    /// Link identifier
    LinkId
);
record_id!(
    /// Comment identifier
    CommentId
);

/// Identifier of one mutation request (ULID for sortability in logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MutationId(pub Ulid);

impl MutationId {
    /// Generate new mutation ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of resource a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Top-level planning document
    MetaRoadmap,
    /// One reporting period of a meta-roadmap
    Roadmap,
    /// Indicator goal within a roadmap
    Goal,
    /// Action under a goal
    Action,
    /// Comment on any of the above
    Comment,
}

impl ResourceKind {
    /// Stable lowercase name, used for log fields and metric labels
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::MetaRoadmap => "meta_roadmap",
            ResourceKind::Roadmap => "roadmap",
            ResourceKind::Goal => "goal",
            ResourceKind::Action => "action",
            ResourceKind::Comment => "comment",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to one authorizable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceRef {
    /// A meta-roadmap
    MetaRoadmap(MetaRoadmapId),
    /// A roadmap
    Roadmap(RoadmapId),
    /// A goal
    Goal(GoalId),
    /// An action
    Action(ActionId),
}

impl ResourceRef {
    /// Kind of the referenced resource
    #[must_use]
    pub fn kind(self) -> ResourceKind {
        match self {
            ResourceRef::MetaRoadmap(_) => ResourceKind::MetaRoadmap,
            ResourceRef::Roadmap(_) => ResourceKind::Roadmap,
            ResourceRef::Goal(_) => ResourceKind::Goal,
            ResourceRef::Action(_) => ResourceKind::Action,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::MetaRoadmap(id) => write!(f, "meta_roadmap:{id}"),
            ResourceRef::Roadmap(id) => write!(f, "roadmap:{id}"),
            ResourceRef::Goal(id) => write!(f, "goal:{id}"),
            ResourceRef::Action(id) => write!(f, "action:{id}"),
        }
    }
}

/// Scope of a meta-roadmap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoadmapType {
    /// National scope; admin-only to create or modify
    National,
    /// Regional scope
    Regional,
    /// Municipal scope
    Municipal,
    /// Local scope
    Local,
    /// Anything else, e.g. an organization
    #[default]
    Other,
}

impl RoadmapType {
    /// True for the admin-gated national scope
    #[inline]
    #[must_use]
    pub fn is_national(self) -> bool {
        matches!(self, RoadmapType::National)
    }
}

/// Top-level planning document; parents form a tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRoadmap {
    /// Identifier
    pub id: MetaRoadmapId,
    /// Name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Scope
    pub kind: RoadmapType,
    /// Responsible actor, if named
    pub actor: Option<String>,
    /// Parent meta-roadmap
    pub parent: Option<MetaRoadmapId>,
    /// Sharing rules
    pub acl: AccessControlled,
    /// Reference links
    #[serde(default)]
    pub links: IndexSet<LinkId>,
    /// Stamp of the last successful mutation
    pub last_modified: Timestamp,
}

/// One reporting period of a meta-roadmap; carries the authoritative ACL for
/// its goals and actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    /// Identifier
    pub id: RoadmapId,
    /// Owning meta-roadmap
    pub meta_roadmap: MetaRoadmapId,
    /// Reporting period label, e.g. "2025"
    pub period: Option<String>,
    /// Free-text description
    pub description: Option<String>,
    /// Sharing rules governing this roadmap and its descendants
    pub acl: AccessControlled,
    /// Stamp of the last successful mutation
    pub last_modified: Timestamp,
}

/// Time-indexed indicator values, one slot per year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSeries {
    /// Unit of every value
    pub unit: String,
    /// Year of the first slot
    pub first_year: u16,
    /// Values; `None` for years without data
    pub values: Vec<Option<f64>>,
}

impl DataSeries {
    /// Value for `year`, if present
    #[must_use]
    pub fn value_for(&self, year: u16) -> Option<f64> {
        let offset = usize::from(year.checked_sub(self.first_year)?);
        self.values.get(offset).copied().flatten()
    }
}

/// Indicator goal within a roadmap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Identifier
    pub id: GoalId,
    /// Owning roadmap
    pub roadmap: RoadmapId,
    /// Creator
    pub author: PrincipalRef,
    /// Optional display name
    pub name: Option<String>,
    /// Free-text description
    pub description: Option<String>,
    /// Indicator being tracked
    pub indicator_parameter: String,
    /// Indicator values
    pub data_series: DataSeries,
    /// Reference links
    #[serde(default)]
    pub links: IndexSet<LinkId>,
    /// Stamp of the last successful mutation
    pub last_modified: Timestamp,
}

/// Action under a goal; authorized with the goal's roadmap ACL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Identifier
    pub id: ActionId,
    /// Owning goal
    pub goal: GoalId,
    /// Creator
    pub author: PrincipalRef,
    /// Name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// First year the action runs
    pub start_year: Option<u16>,
    /// Last year the action runs
    pub end_year: Option<u16>,
    /// Reference links
    #[serde(default)]
    pub links: IndexSet<LinkId>,
    /// Stamp of the last successful mutation
    pub last_modified: Timestamp,
}

/// External reference attached to one or more resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Identifier
    pub id: LinkId,
    /// Target URL
    pub url: String,
    /// Optional caption
    pub description: Option<String>,
}

/// Comment attached to a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Identifier
    pub id: CommentId,
    /// Resource commented on
    pub target: ResourceRef,
    /// Commenter
    pub author: PrincipalRef,
    /// Body
    pub text: String,
    /// Creation time
    pub created_at: Timestamp,
}

/// Any of the four hierarchy records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Entity {
    /// A meta-roadmap
    MetaRoadmap(MetaRoadmap),
    /// A roadmap
    Roadmap(Roadmap),
    /// A goal
    Goal(Goal),
    /// An action
    Action(Action),
}

impl Entity {
    /// Reference to this record
    #[must_use]
    pub fn resource_ref(&self) -> ResourceRef {
        match self {
            Entity::MetaRoadmap(m) => ResourceRef::MetaRoadmap(m.id),
            Entity::Roadmap(r) => ResourceRef::Roadmap(r.id),
            Entity::Goal(g) => ResourceRef::Goal(g.id),
            Entity::Action(a) => ResourceRef::Action(a.id),
        }
    }

    /// Stamp of the last successful mutation
    #[must_use]
    pub fn last_modified(&self) -> Timestamp {
        match self {
            Entity::MetaRoadmap(m) => m.last_modified,
            Entity::Roadmap(r) => r.last_modified,
            Entity::Goal(g) => g.last_modified,
            Entity::Action(a) => a.last_modified,
        }
    }

    /// Overwrite the modification stamp
    pub fn set_last_modified(&mut self, stamp: Timestamp) {
        match self {
            Entity::MetaRoadmap(m) => m.last_modified = stamp,
            Entity::Roadmap(r) => r.last_modified = stamp,
            Entity::Goal(g) => g.last_modified = stamp,
            Entity::Action(a) => a.last_modified = stamp,
        }
    }

    /// Link ids held by this record
    #[must_use]
    pub fn links(&self) -> Option<&IndexSet<LinkId>> {
        match self {
            Entity::MetaRoadmap(m) => Some(&m.links),
            Entity::Roadmap(_) => None,
            Entity::Goal(g) => Some(&g.links),
            Entity::Action(a) => Some(&a.links),
        }
    }
}

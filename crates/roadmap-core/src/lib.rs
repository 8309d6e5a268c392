//! Roadmap Core - mutation guard for roadmap documents
//!
//! Sits between a request surface and a document store:
//! - resolves the ACL governing any record in the
//!   meta-roadmap → roadmap → goal → action hierarchy
//! - authorizes every mutation against it, with a hard gate for
//!   national-scope documents
//! - rejects updates based on stale reads
//! - commits each write atomically and prunes orphaned links and comments
//!
//! # Example
//!
//! ```rust,ignore
//! use roadmap_core::{MemoryStore, MutationOrchestrator, MutationRequest, SessionRegistry};
//! use std::sync::Arc;
//!
//! # async fn example(request: MutationRequest, claims: roadmap_core::SessionClaims)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = MutationOrchestrator::with_defaults(Arc::new(MemoryStore::new()));
//! let session = SessionRegistry::new().open(claims);
//!
//! let outcome = orchestrator.mutate(&session, request).await?;
//! println!("{} -> {}", outcome.status, outcome.location);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod freshness;
pub mod hierarchy;
pub mod memory;
pub mod operation;
pub mod orchestrator;
pub mod pruning;
pub mod session;
pub mod stage;
pub mod store;
pub mod types;
pub mod validation;

pub use config::{ConfigError, OrchestratorConfig};
pub use error::{MutationError, StoreError};
pub use freshness::{check_freshness, Conflict};
pub use hierarchy::{require_national_clearance, resolve, Resolved};
pub use memory::{MemoryStore, StoreSnapshot};
pub use operation::{
    ActionInput, GoalInput, LinkInput, MetaRoadmapInput, MutationRequest, RoadmapInput,
    SharingInput, Verb,
};
pub use orchestrator::{MutationOrchestrator, MutationOutcome};
pub use pruning::{find_orphans, prune_orphans, PruneReport};
pub use session::{Anonymous, RegisteredSession, Session, SessionClaims, SessionId, SessionRegistry};
pub use stage::{MutationStage, StageTrail};
pub use store::{Changeset, CommitReceipt, OrphanSet, Precondition, ReferenceSnapshot, RoadmapStore};
pub use types::{
    Action, ActionId, Comment, CommentId, DataSeries, Entity, Goal, GoalId, Link, LinkId,
    MetaRoadmap, MetaRoadmapId, MutationId, ResourceKind, ResourceRef, Roadmap, RoadmapId,
    RoadmapType, Timestamp,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Roadmap Core
    pub use crate::{
        Entity, MemoryStore, MutationError, MutationOrchestrator, MutationOutcome,
        MutationRequest, ResourceRef, RoadmapStore, Session, SessionClaims, SessionRegistry,
    };
    pub use roadmap_access::{AccessControlled, AccessLevel, Principal, PrincipalId};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

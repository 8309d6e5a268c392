//! Roadmap Gate - fixture-driven access checks and mutation runs
//!
//! Loads a JSON store snapshot, then either reports the access level a
//! principal holds on a roadmap or runs one mutation through the
//! orchestrator and reports the outcome.

#![warn(unreachable_pub)]

pub mod config;

use anyhow::{bail, Context};
use roadmap_access::AccessLevel;
use roadmap_core::{
    Anonymous, MemoryStore, MutationOrchestrator, MutationOutcome, MutationRequest,
    OrchestratorConfig, ResourceRef, RoadmapId, Session, SessionClaims, SessionRegistry,
    StoreSnapshot,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

pub use config::{init_tracing, GateConfig, LogConfig, LogFormat};

/// Principal name meaning "no principal"
pub const ANONYMOUS: &str = "anonymous";

/// Read a fixture snapshot into a fresh store
///
/// # Errors
/// Unreadable file or malformed JSON.
pub fn load_fixture(path: &Path) -> anyhow::Result<MemoryStore> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    let snapshot: StoreSnapshot = serde_json::from_str(&text)
        .with_context(|| format!("parsing fixture {}", path.display()))?;
    tracing::debug!(
        fixture = %path.display(),
        principals = snapshot.principals.len(),
        roadmaps = snapshot.roadmaps.len(),
        "fixture loaded"
    );
    Ok(MemoryStore::from_snapshot(snapshot))
}

/// Write the store back out as a fixture
///
/// # Errors
/// Serialization or write failure.
pub fn save_fixture(store: &MemoryStore, path: &Path) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(&store.snapshot())?;
    std::fs::write(path, text).with_context(|| format!("writing fixture {}", path.display()))
}

/// Output of `check`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Username checked, or `anonymous`
    pub principal: String,
    /// Roadmap checked
    pub target: ResourceRef,
    /// Resolved level
    pub level: AccessLevel,
}

/// Resolve the level `principal` holds on a roadmap
///
/// # Errors
/// Unknown username, malformed id or a roadmap that does not exist.
pub async fn run_check(
    store: Arc<MemoryStore>,
    principal: &str,
    roadmap: &str,
) -> anyhow::Result<CheckReport> {
    let id = uuid::Uuid::parse_str(roadmap).with_context(|| format!("invalid roadmap id {roadmap:?}"))?;
    let target = ResourceRef::Roadmap(RoadmapId(id));

    let record = if principal == ANONYMOUS {
        None
    } else {
        match store.principal_named(principal) {
            Some(record) => Some(record),
            None => bail!("unknown principal {principal:?}"),
        }
    };

    let orchestrator = MutationOrchestrator::with_defaults(store);
    let level = orchestrator
        .access_level(record.as_ref(), target)
        .await
        .with_context(|| format!("no access to {target}"))?;

    Ok(CheckReport {
        principal: principal.to_string(),
        target,
        level,
    })
}

/// Output of `apply`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyReport {
    /// HTTP status the result maps to
    pub status: u16,
    /// Outcome on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MutationOutcome>,
    /// Error kind on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True if the session was torn down
    pub session_destroyed: bool,
}

impl ApplyReport {
    /// True if the mutation committed
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Parse `--session`: `anonymous` or a JSON [`SessionClaims`] object
///
/// # Errors
/// Malformed JSON.
pub fn parse_session(arg: &str) -> anyhow::Result<Option<SessionClaims>> {
    if arg == ANONYMOUS {
        return Ok(None);
    }
    let claims = serde_json::from_str(arg).context("parsing session claims")?;
    Ok(Some(claims))
}

/// Run one mutation against the store
///
/// # Errors
/// Inconsistent orchestrator limits. Rejected mutations are reported in the
/// [`ApplyReport`], not as errors.
pub async fn run_apply(
    store: Arc<MemoryStore>,
    config: OrchestratorConfig,
    claims: Option<SessionClaims>,
    request: MutationRequest,
) -> anyhow::Result<ApplyReport> {
    let orchestrator = MutationOrchestrator::new(store, config)?;
    let registry = SessionRegistry::new();

    let (result, session_destroyed) = match claims {
        Some(claims) => {
            let session = registry.open(claims);
            let result = orchestrator.mutate(&session, request).await;
            (result, session.claims().is_none())
        }
        None => (orchestrator.mutate(&Anonymous, request).await, false),
    };

    Ok(match result {
        Ok(outcome) => ApplyReport {
            status: outcome.status,
            outcome: Some(outcome),
            error: None,
            session_destroyed,
        },
        Err(err) => ApplyReport {
            status: err.status_code(),
            outcome: None,
            error: Some(err.to_string()),
            session_destroyed,
        },
    })
}

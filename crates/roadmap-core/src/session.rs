//! Session collaborator contract
//!
//! The identity subsystem authenticates callers; this module only consumes
//! what a presented session claims and offers a way to tear it down when the
//! claim turns out to be stale or tampered with.

use async_trait::async_trait;
use dashmap::DashMap;
use roadmap_access::PrincipalId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// What a presented session says about its holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Claimed principal
    pub principal_id: PrincipalId,
    /// Claimed admin flag
    #[serde(default)]
    pub is_admin: bool,
}

/// A presented session
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Session: Send + Sync {
    /// Claims of the session; `None` for anonymous callers
    fn claims(&self) -> Option<SessionClaims>;

    /// Destroy the session, forcing the holder to log in again
    async fn destroy(&self);
}

/// Session for callers that presented nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

#[async_trait]
impl Session for Anonymous {
    fn claims(&self) -> Option<SessionClaims> {
        None
    }

    async fn destroy(&self) {}
}

/// Session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new random id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process session registry
///
/// Stands in for the cookie-backed session store in tests and the CLI.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionClaims>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a session and return a handle to it
    #[must_use]
    pub fn open(self: &Arc<Self>, claims: SessionClaims) -> RegisteredSession {
        let id = SessionId::new();
        self.sessions.insert(id, claims);
        RegisteredSession {
            id,
            registry: Arc::clone(self),
        }
    }

    /// True while the session has not been destroyed
    #[must_use]
    pub fn is_active(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Number of live sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True if no session is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Handle to one session in a [`SessionRegistry`]
#[derive(Debug, Clone)]
pub struct RegisteredSession {
    id: SessionId,
    registry: Arc<SessionRegistry>,
}

impl RegisteredSession {
    /// Identifier of this session
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }
}

#[async_trait]
impl Session for RegisteredSession {
    fn claims(&self) -> Option<SessionClaims> {
        self.registry.sessions.get(&self.id).map(|entry| *entry.value())
    }

    async fn destroy(&self) {
        if self.registry.sessions.remove(&self.id).is_some() {
            tracing::info!(session = %self.id.0, "session destroyed");
        }
    }
}

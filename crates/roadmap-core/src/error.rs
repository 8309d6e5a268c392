//! Error types for the roadmap core
//!
//! Provides the tagged result taxonomy every mutation resolves to:
//! - structural input problems, caught before authorization
//! - authentication and session failures
//! - policy denials (which also cover missing resources)
//! - stale freshness tokens and vanished references
//! - collaborator failures

use crate::types::ResourceRef;
use roadmap_access::AccessDenied;

/// Terminal outcome of a failed mutation or read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// Required fields missing or malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No principal where one is required
    #[error("unauthenticated")]
    Unauthenticated,

    /// Resolved level below the operation's minimum, or resource not found
    #[error("access denied")]
    AccessDenied,

    /// Session admin claim contradicts the stored principal record
    #[error("bad session")]
    BadSession,

    /// Client freshness token older than the stored version
    #[error("stale data")]
    StaleData,

    /// A referenced record vanished between authorization and commit
    #[error("referential failure: {0}")]
    ReferentialFailure(String),

    /// Unexpected collaborator failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl MutationError {
    /// HTTP status the transport layer maps this error to
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::ReferentialFailure(_) => 400,
            Self::Unauthenticated => 401,
            Self::AccessDenied | Self::BadSession => 403,
            Self::StaleData => 409,
            Self::Internal(_) => 500,
        }
    }

    /// True if the caller must tear down the session and re-authenticate
    #[inline]
    #[must_use]
    pub fn forces_logout(&self) -> bool {
        matches!(self, Self::BadSession)
    }

    /// True if reloading and resubmitting may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleData)
    }

    /// Stable short name, used for metric labels
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Unauthenticated => "unauthenticated",
            Self::AccessDenied => "access_denied",
            Self::BadSession => "bad_session",
            Self::StaleData => "stale_data",
            Self::ReferentialFailure(_) => "referential_failure",
            Self::Internal(_) => "internal",
        }
    }

    /// Shorthand for [`MutationError::InvalidInput`]
    #[inline]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Map a store failure that happened while loading for authorization
    ///
    /// Missing records fold into `AccessDenied` so existence never leaks.
    #[must_use]
    pub fn from_load(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::AccessDenied,
            StoreError::Stale(_) => Self::StaleData,
            StoreError::Referential(msg) => Self::ReferentialFailure(msg),
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }

    /// Map a store failure that happened while committing
    #[must_use]
    pub fn from_commit(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(target) => {
                Self::ReferentialFailure(format!("{target} no longer exists"))
            }
            StoreError::Referential(msg) => Self::ReferentialFailure(msg),
            StoreError::Stale(_) => Self::StaleData,
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<AccessDenied> for MutationError {
    fn from(denied: AccessDenied) -> Self {
        tracing::debug!(
            required = %denied.required,
            resolved = %denied.resolved,
            "policy denied request"
        );
        Self::AccessDenied
    }
}

/// Failures reported by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record with this reference
    #[error("not found: {0}")]
    NotFound(ResourceRef),

    /// A parent, principal or group named by the write does not exist
    #[error("referential integrity violation: {0}")]
    Referential(String),

    /// Conditional write precondition failed
    #[error("stale write to {0}")]
    Stale(ResourceRef),

    /// Storage backend failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GoalId;
    use roadmap_access::AccessLevel;

    #[test]
    fn status_mapping_is_fixed() {
        assert_eq!(MutationError::invalid("x").status_code(), 400);
        assert_eq!(MutationError::Unauthenticated.status_code(), 401);
        assert_eq!(MutationError::AccessDenied.status_code(), 403);
        assert_eq!(MutationError::BadSession.status_code(), 403);
        assert_eq!(MutationError::StaleData.status_code(), 409);
        assert_eq!(
            MutationError::ReferentialFailure("gone".into()).status_code(),
            400
        );
        assert_eq!(MutationError::Internal("boom".into()).status_code(), 500);
    }

    #[test]
    fn only_bad_session_forces_logout() {
        assert!(MutationError::BadSession.forces_logout());
        assert!(!MutationError::AccessDenied.forces_logout());
        assert!(!MutationError::StaleData.forces_logout());
    }

    #[test]
    fn only_stale_data_is_worth_resubmitting() {
        assert!(MutationError::StaleData.is_retryable());
        assert!(!MutationError::AccessDenied.is_retryable());
        assert!(!MutationError::Internal("boom".into()).is_retryable());
    }

    #[test]
    fn not_found_folds_differently_by_phase() {
        let missing = StoreError::NotFound(ResourceRef::Goal(GoalId::new()));

        assert_eq!(
            MutationError::from_load(missing.clone()),
            MutationError::AccessDenied
        );
        assert!(matches!(
            MutationError::from_commit(missing),
            MutationError::ReferentialFailure(_)
        ));
    }

    #[test]
    fn policy_denial_converts_to_access_denied() {
        let denied = AccessDenied {
            required: AccessLevel::Edit,
            resolved: AccessLevel::View,
        };
        assert_eq!(MutationError::from(denied), MutationError::AccessDenied);
    }
}

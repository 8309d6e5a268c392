//! Mutation lifecycle
//!
//! `Received → Authenticated → AclResolved → PolicyEvaluated →
//! FreshnessChecked (updates only) → Committed → Pruned`. A failure at any
//! stage is terminal; there is no retry edge.

use serde::{Deserialize, Serialize};

/// Stage of one mutation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStage {
    /// Request accepted and structurally valid
    Received,
    /// Principal loaded and session claims verified
    Authenticated,
    /// Governing ACL loaded
    AclResolved,
    /// Level met the operation's minimum
    PolicyEvaluated,
    /// Freshness token accepted
    FreshnessChecked,
    /// Write applied
    Committed,
    /// Orphan pruning attempted
    Pruned,
}

/// Transition not allowed by the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal mutation stage transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// Current stage
    pub from: MutationStage,
    /// Requested stage
    pub to: MutationStage,
}

impl From<IllegalTransition> for crate::error::MutationError {
    fn from(err: IllegalTransition) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Stages reachable from `from`
#[must_use]
pub fn allowed_transitions(from: MutationStage) -> &'static [MutationStage] {
    use MutationStage::*;
    match from {
        Received => &[Authenticated],
        Authenticated => &[AclResolved],
        AclResolved => &[PolicyEvaluated],
        PolicyEvaluated => &[FreshnessChecked, Committed],
        FreshnessChecked => &[Committed],
        Committed => &[Pruned],
        Pruned => &[],
    }
}

/// Validate a stage transition
///
/// # Errors
/// [`IllegalTransition`] if `to` is not reachable from `from`.
pub fn validate_transition(from: MutationStage, to: MutationStage) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

/// Stages a request has passed, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTrail {
    stages: Vec<MutationStage>,
}

impl StageTrail {
    /// Trail starting at `Received`
    #[must_use]
    pub fn start() -> Self {
        Self {
            stages: vec![MutationStage::Received],
        }
    }

    /// Current stage
    #[must_use]
    pub fn current(&self) -> MutationStage {
        self.stages
            .last()
            .copied()
            .unwrap_or(MutationStage::Received)
    }

    /// Move to `next`
    ///
    /// # Errors
    /// [`IllegalTransition`] if the lifecycle forbids it.
    pub fn advance(&mut self, next: MutationStage) -> Result<(), IllegalTransition> {
        validate_transition(self.current(), next)?;
        tracing::trace!(stage = ?next, "mutation stage");
        self.stages.push(next);
        Ok(())
    }

    /// True if `stage` was reached
    #[must_use]
    pub fn reached(&self, stage: MutationStage) -> bool {
        self.stages.contains(&stage)
    }

    /// All stages passed
    #[must_use]
    pub fn stages(&self) -> &[MutationStage] {
        &self.stages
    }
}

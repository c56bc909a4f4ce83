//! Error types for the unit-of-work cycle.

use thiserror::Error;

use crate::batch::Phase;

/// Errors surfaced by a commit cycle, its hooks, or a work item.
///
/// The engine never rewraps an error: whatever a hook or work item returns
/// is exactly what the caller of `commit_work` / `mark_*` receives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitOfWorkError {
    #[error("Failed to begin transaction: {0}")]
    Begin(String),

    #[error("{phase} action failed: {reason}")]
    Action { phase: Phase, reason: String },

    #[error("Failed to commit transaction: {0}")]
    Commit(String),

    #[error("Failed to roll back transaction: {0}")]
    Rollback(String),

    #[error("Failed to release transaction: {0}")]
    Release(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl UnitOfWorkError {
    /// Shorthand for an [`UnitOfWorkError::Action`] failure.
    pub fn action(phase: Phase, reason: impl Into<String>) -> Self {
        Self::Action {
            phase,
            reason: reason.into(),
        }
    }

    /// Returns `true` if a work item failed during one of the phases.
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action { .. })
    }

    /// The phase an action failure happened in, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Action { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

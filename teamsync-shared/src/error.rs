/// Core error types
///
/// Every operation exposed by the core returns [`CoreResult`]. The first
/// three kinds are expected outcomes the caller can act on; the UI layer
/// shows their messages verbatim.
///
/// [`CoreError::InvariantViolation`] is different: it means a transition
/// produced a state that breaks one of the model invariants. It is logged
/// loudly where it is raised, the enclosing transaction is dropped without
/// commit, and callers must never surface its detail to end users.

use crate::store::StoreError;

/// Result alias used across the core services
pub type CoreResult<T> = Result<T, CoreError>;

/// Error kinds returned by the core
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Referenced user, team, task, or notification does not exist
    #[error("{0}")]
    NotFound(String),

    /// Duplicate name, already-a-member, removing the owner, ...
    #[error("{0}")]
    Conflict(String),

    /// Actor is not allowed to perform the operation
    #[error("{0}")]
    Forbidden(String),

    /// A transition left the model in an inconsistent state
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Persistence failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Builds an invariant violation and logs it at error level
    ///
    /// Raising through this constructor guarantees the drift shows up in
    /// operator logs even if a caller later swallows the error.
    pub fn invariant(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(target: "teamsync::invariant", detail = %detail, "Invariant violated");
        CoreError::InvariantViolation(detail)
    }

    /// Whether retrying the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Store(StoreError::Serialization))
    }
}

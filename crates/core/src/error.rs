use crate::types::DbId;

/// Typed failure taxonomy shared by every component.
///
/// Components return these values instead of stringly-typed errors; the API
/// layer maps each kind to an HTTP status. Presence and notification
/// delivery failures are logged rather than surfaced, so they never appear
/// here.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// An operation was attempted against the wrong lifecycle state, e.g.
    /// reviewing a change request that is no longer pending.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Duplicate active membership, duplicate pending invite or request, or
    /// a lock held by another user.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An invite or lock past its deadline.
    #[error("Expired: {0}")]
    Expired(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the domain layer.
pub type CoreResult<T> = Result<T, CoreError>;

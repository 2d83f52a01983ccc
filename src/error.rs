//! Core error taxonomy shared by every coordination subsystem.
//!
//! Each subsystem (message bus, rate limiter, reservation registry, worktree
//! manager, policy engine, orchestrator) raises one of a small closed set of
//! abstract error kinds rather than a bespoke enum per component, so callers
//! can write one retry/abort policy that works across all of them.

use thiserror::Error;

/// The abstract error kinds any coordination subsystem can raise.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The referenced entity (cell, reservation, mandate, pattern, agent) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A state transition was attempted that the entity's state machine forbids.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Two callers' requests collide (e.g. overlapping exclusive reservations,
    /// a worktree already materialized for a subtask).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Input failed structural or semantic validation before being accepted.
    #[error("validation failed: {0}")]
    ValidationError(String),

    /// The caller has exceeded its allotted rate for this endpoint.
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// A required backing subsystem (storage, git, an external service) is unavailable.
    #[error("subsystem unavailable: {0}")]
    SubsystemUnavailable(String),

    /// The operation was cancelled before it completed.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// The operation did not complete within its allotted deadline.
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::ValidationError(what.into())
    }

    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition { from: from.into(), to: to.into() }
    }

    pub fn subsystem_unavailable(what: impl Into<String>) -> Self {
        Self::SubsystemUnavailable(what.into())
    }

    /// Returns true if a caller could reasonably retry the same operation unchanged.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::SubsystemUnavailable(_) | Self::Timeout(_))
    }

    /// Returns true if retrying without changing the request would never succeed.
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidTransition { .. } | Self::ValidationError(_))
    }
}

/// Errors raised by the SQLite-backed adapters while talking to the database.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    MigrationFailed(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl StorageError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_))
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(msg) => Self::SubsystemUnavailable(msg),
            StorageError::QueryFailed(e) => Self::SubsystemUnavailable(e.to_string()),
            StorageError::MigrationFailed(msg) => Self::SubsystemUnavailable(msg),
            StorageError::SerializationError(msg) => Self::ValidationError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = CoreError::not_found("cell epic-a1b2.3");
        assert_eq!(err.to_string(), "not found: cell epic-a1b2.3");
    }

    #[test]
    fn invalid_transition_display() {
        let err = CoreError::invalid_transition("completed", "pending");
        assert_eq!(err.to_string(), "invalid transition from completed to pending");
    }

    #[test]
    fn rate_limited_is_transient() {
        assert!(CoreError::RateLimited { retry_after_ms: 500 }.is_transient());
        assert!(!CoreError::RateLimited { retry_after_ms: 500 }.is_permanent());
    }

    #[test]
    fn not_found_is_permanent() {
        assert!(CoreError::not_found("x").is_permanent());
        assert!(!CoreError::not_found("x").is_transient());
    }

    #[test]
    fn conflict_is_neither_transient_nor_permanent() {
        let err = CoreError::conflict("reservation overlap");
        assert!(!err.is_transient());
        assert!(!err.is_permanent());
    }

    #[test]
    fn storage_connection_failure_maps_to_subsystem_unavailable() {
        let storage_err = StorageError::ConnectionFailed("pool exhausted".to_string());
        let core_err: CoreError = storage_err.into();
        assert!(matches!(core_err, CoreError::SubsystemUnavailable(_)));
    }

    #[test]
    fn equality_for_retry_bookkeeping() {
        let a = CoreError::not_found("x");
        let b = CoreError::not_found("x");
        assert_eq!(a, b);
        assert_ne!(a, CoreError::not_found("y"));
    }
}

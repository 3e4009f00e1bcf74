//! The error taxonomy of spec.md §7, as concrete types.

use thiserror::Error;

use notify_proto::EntityId;

/// Errors surfaced by a [`crate::ports::EntityRepository`] or
/// [`crate::ports::DataSourceRepository`] call.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("entity {0} not found")]
    NotFound(EntityId),
    #[error("transient database error: {0}")]
    Transient(#[source] anyhow::Error),
    #[error("fatal database error: {0}")]
    Fatal(#[source] anyhow::Error),
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Collectors tolerate `NotFound` locally (spec.md §7); everything else
    /// is retried at the next cycle or is fatal.
    pub fn is_retryable(&self) -> bool { matches!(self, Self::Transient(_)) }
}

/// Errors from a single collector poll/watch cycle (spec.md §4.2, §7).
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("parent lookup failed, event dropped: {0}")]
    ParentNotFound(String),
    #[error("malformed object from source: {0}")]
    MalformedObject(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors validating or creating a subscription (spec.md §4.5, §7).
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("invalid subscription: {0}")]
    Validation(String),
    #[error("callback value must be unique")]
    DuplicateCallback,
    #[error("callback is not reachable: {0}")]
    Unreachable(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A configuration problem detected at startup (spec.md §7
/// "FatalConfigError"). Callers map this to a non-zero process exit.
#[derive(Debug, Error)]
#[error("fatal configuration error: {0}")]
pub struct FatalConfigError(pub String);

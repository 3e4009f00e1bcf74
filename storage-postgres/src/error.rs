//! Maps `tokio_postgres` errors onto `notify-core`'s repository error
//! taxonomy (spec.md §7).

use notify_core::error::RepositoryError;

/// Connection failures, serialization failures, and most driver errors are
/// transient from the caller's point of view — retried at the next poll
/// cycle or subscription-worker attempt. A small set of SQLSTATE classes
/// (integrity constraint violation) are reported as [`RepositoryError::Conflict`]
/// so callers can map them to a user-facing uniqueness error.
pub fn map_db_error(err: tokio_postgres::Error) -> RepositoryError {
    if let Some(db_err) = err.as_db_error() {
        if db_err.code() == &tokio_postgres::error::SqlState::UNIQUE_VIOLATION {
            return RepositoryError::Conflict(db_err.message().to_string());
        }
    }
    RepositoryError::Transient(anyhow::Error::new(err))
}

pub fn map_pool_error<E: std::error::Error + Send + Sync + 'static>(err: bb8::RunError<E>) -> RepositoryError {
    RepositoryError::Transient(anyhow::Error::new(err))
}

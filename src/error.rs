//! Typed persistence errors.
//!
//! Callers pattern-match on [`StoreError`] to decide whether to retry;
//! everything above the persistence boundary collapses into `anyhow::Result`
//! with `.context(...)` annotations: a typed error underneath, `anyhow` at
//! the call site.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection reset, SQLITE_BUSY/LOCKED, timeout — safe to retry with
    /// backoff up to the caller's deadline.
    #[error("retryable store error: {0}")]
    Retryable(String),

    /// Constraint violation, malformed row, serialization failure — aborts
    /// the single operation, never the whole batch.
    #[error("permanent store error: {0}")]
    Permanent(String),

    /// The requested row does not exist. Not itself an error condition for
    /// most callers (`find*` operations return `Option`/`Vec`), but surfaced
    /// for operations that require the row to be present (e.g. `update`,
    /// `deactivate` on an unknown config id).
    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Retryable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                StoreError::Retryable(err.to_string())
            }
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(err.to_string()),
            _ => StoreError::Permanent(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("row decoding error: {0}")]
    Decode(String),
}

/// Map Postgres unique violations (SQLSTATE 23505) to [`StoreError::Conflict`]
/// so callers can distinguish "tuple already taken" from infrastructure
/// failures.
pub fn conflict_on_unique(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Conflict(what.to_string());
        }
    }
    StoreError::Sqlx(err)
}

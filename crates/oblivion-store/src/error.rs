//! Storage errors.

use thiserror::Error;

/// Failure inside a [`Ledger`](crate::Ledger) or
/// [`CiphertextVault`](crate::CiphertextVault) backend.
///
/// Business outcomes such as "store already exists" are not errors here; they
/// come back as result enums from the trait methods.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Database(#[from] rusqlite::Error),

    /// The on-disk schema cannot be brought to the version this build expects.
    #[error("schema migration: {0}")]
    Migration(String),

    /// A writer panicked while holding the backend's lock.
    #[error("backend lock poisoned: {0}")]
    LockPoisoned(String),

    /// The blocking worker running a SQLite call was cancelled or panicked.
    #[error("blocking storage task did not complete: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

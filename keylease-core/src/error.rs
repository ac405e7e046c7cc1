//! Error types for keylease.
//!
//! Contention and wait timeouts are ordinary outcomes reported through
//! `Ok(false)`. Only infrastructure failures and caller mistakes surface here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    /// The caller passed an empty lock key.
    #[error("lock key must not be empty")]
    EmptyKey,

    /// A configuration value is out of range.
    #[error("invalid lock configuration: {0}")]
    InvalidConfig(String),

    /// The SQLite backend reported an error.
    #[cfg(feature = "sqlite")]
    #[error("sqlite lock store failure: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Any other backend failure (unreachable store, poisoned state).
    #[error("lock store failure: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, LockError>;

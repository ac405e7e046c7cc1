use serde::{Deserialize, Serialize};

/// Latest representable expiry. Backends store `expires_at` as a signed
/// 64-bit integer, so every record is clamped to this.
pub const MAX_EXPIRES_AT: u64 = i64::MAX as u64;

/// A time-bound claim on a resource key.
///
/// Rows are never updated in place: a lock is created by a successful
/// acquire and removed by release, lazy expiry detection, or the sweeper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Identifier of the protected resource (primary key)
    pub lock_key: String,
    /// Absolute expiry in milliseconds since the Unix epoch
    pub expires_at: u64,
    /// Diagnostic identifier of the request or worker that took the lock
    pub holder_id: String,
}

impl LockRecord {
    pub fn new(lock_key: impl Into<String>, holder_id: impl Into<String>, ttl_ms: u64, now: u64) -> Self {
        Self {
            lock_key: lock_key.into(),
            expires_at: now.saturating_add(ttl_ms).min(MAX_EXPIRES_AT),
            holder_id: holder_id.into(),
        }
    }

    /// A lock is invalid once `now` has passed `expires_at`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at < now
    }

    /// Milliseconds left before the lock expires, zero once expired.
    pub fn remaining_ms(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }
}

/// Outcome of an atomic insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created; the caller holds the lock
    Inserted,
    /// A row already exists for the key (uniqueness violation)
    AlreadyExists,
}

/// Observable state of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    /// No live row for the key
    Absent,
    /// A live row exists
    Held,
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockState::Absent => write!(f, "ABSENT"),
            LockState::Held => write!(f, "HELD"),
        }
    }
}

/// Result of running work under [`crate::manager::LockManager::run_exclusive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusive<T> {
    /// The lock was obtained and the work ran
    Ran(T),
    /// Someone else kept the lock for the whole wait budget
    Skipped,
}

impl<T> Exclusive<T> {
    pub fn ran(self) -> Option<T> {
        match self {
            Exclusive::Ran(value) => Some(value),
            Exclusive::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Exclusive::Skipped)
    }
}

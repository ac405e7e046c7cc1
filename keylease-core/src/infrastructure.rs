use crate::error::Result;
use crate::types::{InsertOutcome, LockRecord};

/// Defines the contract for lock storage backends.
///
/// `insert` is the only source of mutual exclusion: two concurrent inserts
/// for the same key must never both report [`InsertOutcome::Inserted`].
/// Everything else is a point operation. Backend failures are always
/// returned as errors, never folded into `AlreadyExists`.
pub trait LockStore: Send + Sync {
    /// Atomically create the row unless one already exists for the key
    fn insert(&self, record: &LockRecord) -> Result<InsertOutcome>;

    /// Fetch the row for a key, expired or not
    fn lookup(&self, lock_key: &str) -> Result<Option<LockRecord>>;

    /// Remove the row for a key. Deleting an absent key is not an error.
    fn delete(&self, lock_key: &str) -> Result<()>;

    /// Remove the row only if it has expired at `now`
    fn delete_if_expired(&self, lock_key: &str, now: u64) -> Result<bool>;

    /// Remove the row only if it was created by `holder_id`
    fn delete_if_holder(&self, lock_key: &str, holder_id: &str) -> Result<bool>;

    /// Remove every row with `expires_at < now`, returning how many went away
    fn delete_expired(&self, now: u64) -> Result<usize>;

    /// All rows currently stored, including expired ones not yet swept
    fn list(&self) -> Result<Vec<LockRecord>>;
}

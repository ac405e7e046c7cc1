//! High-level lock API built on a pluggable [`LockStore`].
//! The CLI and the HTTP service both delegate to this.

use std::sync::Arc;

use nanoid::nanoid;

use crate::clock::{Clock, SystemClock};
use crate::config::LockConfig;
use crate::error::{LockError, Result};
use crate::infrastructure::LockStore;
use crate::infrastructure_in_memory::InMemoryLockStore;
use crate::sweeper::Sweeper;
use crate::types::{Exclusive, InsertOutcome, LockRecord, LockState};
use crate::waiter;

/// The main entry point: acquire, release and inspect TTL locks.
///
/// Cheap to clone; clones share the same store. All correctness rests on the
/// store's atomic insert, so any number of managers in any number of
/// processes can point at one shared store.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    config: LockConfig,
    sweeper: Sweeper,
}

impl LockManager {
    /// Create a manager over `store` using the system clock.
    pub fn new(store: Arc<dyn LockStore>, config: LockConfig) -> Result<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn LockStore>,
        config: LockConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let sweeper = Sweeper::new(store.clone(), clock.clone(), config.cleanup_probability);
        Ok(Self {
            store,
            clock,
            config,
            sweeper,
        })
    }

    /// A manager over a fresh process-local store.
    pub fn in_memory(config: LockConfig) -> Result<Self> {
        Self::new(Arc::new(InMemoryLockStore::new()), config)
    }

    /// A manager backed by the SQLite database at `path`.
    /// Every process opening the same file shares the same locks.
    #[cfg(feature = "sqlite")]
    pub fn with_sqlite(path: impl AsRef<std::path::Path>, config: LockConfig) -> Result<Self> {
        let store = crate::infrastructure_sqlite::SqliteLockStore::open(path)?;
        Self::new(Arc::new(store), config)
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub fn sweeper(&self) -> &Sweeper {
        &self.sweeper
    }

    /// Try to take the lock. `Ok(true)` means the caller now holds it,
    /// `Ok(false)` means someone else does.
    pub fn acquire(&self, lock_key: &str, request_id: &str) -> Result<bool> {
        Ok(self.try_acquire(lock_key, request_id)?.is_some())
    }

    /// Like [`acquire`](Self::acquire), but hands back the row that was
    /// written. An empty `request_id` gets a generated holder id.
    pub fn try_acquire(&self, lock_key: &str, request_id: &str) -> Result<Option<LockRecord>> {
        ensure_key(lock_key)?;

        self.sweeper.maybe_sweep();

        let holder_id = if request_id.is_empty() {
            nanoid!()
        } else {
            request_id.to_string()
        };
        let now = self.clock.now_ms();
        let record = LockRecord::new(lock_key, holder_id, self.config.ttl_ms, now);

        if self.store.insert(&record)? == InsertOutcome::Inserted {
            tracing::debug!(lock_key, holder_id = %record.holder_id, expires_at = record.expires_at, "Lock acquired");
            return Ok(Some(record));
        }

        // The existing row may be a leftover whose TTL already ran out. Only
        // a conditional delete is allowed here, and the retry still goes
        // through the atomic insert.
        if !self.store.delete_if_expired(lock_key, now)? {
            tracing::debug!(lock_key, "Lock contended");
            return Ok(None);
        }

        tracing::debug!(lock_key, "Reclaimed expired lock");
        match self.store.insert(&record)? {
            InsertOutcome::Inserted => Ok(Some(record)),
            InsertOutcome::AlreadyExists => Ok(None),
        }
    }

    /// Delete the lock without checking who holds it.
    pub fn release(&self, lock_key: &str) -> Result<()> {
        ensure_key(lock_key)?;
        self.store.delete(lock_key)?;
        tracing::debug!(lock_key, "Lock released");
        Ok(())
    }

    /// Delete the lock only if `holder_id` created it.
    /// Returns false when the lock is absent or held by someone else.
    pub fn release_owned(&self, lock_key: &str, holder_id: &str) -> Result<bool> {
        ensure_key(lock_key)?;
        let released = self.store.delete_if_holder(lock_key, holder_id)?;
        if !released {
            tracing::debug!(lock_key, holder_id, "Owned release did not match a held lock");
        }
        Ok(released)
    }

    /// Whether a live lock exists. Expired rows are deleted as a side effect.
    pub fn is_locked(&self, lock_key: &str) -> Result<bool> {
        Ok(self.holder(lock_key)?.is_some())
    }

    pub fn state(&self, lock_key: &str) -> Result<LockState> {
        Ok(if self.is_locked(lock_key)? {
            LockState::Held
        } else {
            LockState::Absent
        })
    }

    /// The live row for `lock_key`, if any. Expired rows are deleted.
    pub fn holder(&self, lock_key: &str) -> Result<Option<LockRecord>> {
        ensure_key(lock_key)?;

        let Some(record) = self.store.lookup(lock_key)? else {
            return Ok(None);
        };

        let now = self.clock.now_ms();
        if record.is_expired(now) {
            self.store.delete_if_expired(lock_key, now)?;
            tracing::debug!(lock_key, holder_id = %record.holder_id, "Removed expired lock");
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Block until the lock is released or expires, polling with capped
    /// exponential backoff. `Ok(false)` means the wait budget ran out.
    pub fn wait_for_lock_release(&self, lock_key: &str) -> Result<bool> {
        ensure_key(lock_key)?;
        waiter::wait_for_release(
            self.store.as_ref(),
            self.clock.as_ref(),
            self.config.backoff_schedule(),
            lock_key,
        )
    }

    /// Delete every expired row. Safe to call from a timer in any process.
    pub fn cleanup_expired_locks(&self) -> Result<usize> {
        self.sweeper.sweep()
    }

    /// All stored rows, including expired ones not yet swept.
    pub fn list_locks(&self) -> Result<Vec<LockRecord>> {
        self.store.list()
    }

    /// Run `work` while holding `lock_key`.
    ///
    /// On contention the caller waits once for the holder to finish and then
    /// makes a single further attempt. If the lock is still taken the work is
    /// skipped. The lock is released with the holder id this call wrote, so a
    /// lock that expired mid-work and was taken by someone else is left alone.
    /// Once `work` has run its output is always returned; a release failure is
    /// logged and the row is left for TTL expiry.
    pub fn run_exclusive<T, F>(&self, lock_key: &str, request_id: &str, work: F) -> Result<Exclusive<T>>
    where
        F: FnOnce() -> T,
    {
        let record = match self.try_acquire(lock_key, request_id)? {
            Some(record) => record,
            None => {
                if !self.wait_for_lock_release(lock_key)? {
                    tracing::info!(lock_key, "Skipping work, lock still held");
                    return Ok(Exclusive::Skipped);
                }
                match self.try_acquire(lock_key, request_id)? {
                    Some(record) => record,
                    None => {
                        tracing::info!(lock_key, "Skipping work, lost the race after release");
                        return Ok(Exclusive::Skipped);
                    }
                }
            }
        };

        let output = work();
        // The work already happened; a failed release leaves the row to expire.
        if let Err(e) = self.release_owned(lock_key, &record.holder_id) {
            tracing::warn!(lock_key, error = %e, "Release after work failed, lock left to expire");
        }
        Ok(Exclusive::Ran(output))
    }
}

fn ensure_key(lock_key: &str) -> Result<()> {
    if lock_key.is_empty() {
        return Err(LockError::EmptyKey);
    }
    Ok(())
}

use crate::error::{LockError, Result};
use crate::infrastructure::LockStore;
use crate::types::{InsertOutcome, LockRecord};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard};

/// Process-local lock table. The map mutex plays the role a database's
/// unique index plays for the durable backends.
#[derive(Default)]
pub struct InMemoryLockStore {
    // Map of lock key -> row
    locks: Mutex<HashMap<String, LockRecord>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> Result<MutexGuard<'_, HashMap<String, LockRecord>>> {
        self.locks
            .lock()
            .map_err(|_| LockError::Store("in-memory lock table poisoned".to_string()))
    }
}

impl LockStore for InMemoryLockStore {
    fn insert(&self, record: &LockRecord) -> Result<InsertOutcome> {
        match self.table()?.entry(record.lock_key.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    fn lookup(&self, lock_key: &str) -> Result<Option<LockRecord>> {
        Ok(self.table()?.get(lock_key).cloned())
    }

    fn delete(&self, lock_key: &str) -> Result<()> {
        self.table()?.remove(lock_key);
        Ok(())
    }

    fn delete_if_expired(&self, lock_key: &str, now: u64) -> Result<bool> {
        let mut table = self.table()?;
        match table.get(lock_key) {
            Some(record) if record.is_expired(now) => {
                table.remove(lock_key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_if_holder(&self, lock_key: &str, holder_id: &str) -> Result<bool> {
        let mut table = self.table()?;
        match table.get(lock_key) {
            Some(record) if record.holder_id == holder_id => {
                table.remove(lock_key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_expired(&self, now: u64) -> Result<usize> {
        let mut table = self.table()?;
        let before = table.len();
        table.retain(|_, record| !record.is_expired(now));
        Ok(before - table.len())
    }

    fn list(&self) -> Result<Vec<LockRecord>> {
        let mut records: Vec<LockRecord> = self.table()?.values().cloned().collect();
        records.sort_by(|a, b| a.lock_key.cmp(&b.lock_key));
        Ok(records)
    }
}

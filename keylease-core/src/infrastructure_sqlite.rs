//! SQLite-backed LockStore implementation.
//! Several processes can coordinate by opening the same database file.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! keylease-core = { path = "../keylease-core", features = ["sqlite"] }
//! ```

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{LockError, Result};
use crate::infrastructure::LockStore;
use crate::types::{InsertOutcome, LockRecord};

/// How long a statement waits on another connection's write lock before
/// reporting `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A persistent lock store backed by SQLite.
///
/// Uses WAL mode so readers in other processes are not blocked by writers.
/// Mutual exclusion comes from the `lock_key` primary key.
pub struct SqliteLockStore {
    conn: Mutex<Connection>,
}

impl SqliteLockStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::init(conn)
    }

    /// A private, non-shared database. Useful for tests and single-process use.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS locks (
                lock_key   TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL,
                holder_id  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_locks_expires_at ON locks(expires_at);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LockError::Store("sqlite connection poisoned".to_string()))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<LockRecord> {
        Ok(LockRecord {
            lock_key: row.get(0)?,
            expires_at: row.get(1)?,
            holder_id: row.get(2)?,
        })
    }
}

impl LockStore for SqliteLockStore {
    fn insert(&self, record: &LockRecord) -> Result<InsertOutcome> {
        // The conflict clause only swallows the primary key violation; every
        // other failure still comes back as an error.
        let inserted = self.conn()?.execute(
            "INSERT INTO locks (lock_key, expires_at, holder_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(lock_key) DO NOTHING",
            params![record.lock_key, record.expires_at, record.holder_id],
        )?;

        Ok(if inserted == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyExists
        })
    }

    fn lookup(&self, lock_key: &str) -> Result<Option<LockRecord>> {
        let record = self
            .conn()?
            .query_row(
                "SELECT lock_key, expires_at, holder_id FROM locks WHERE lock_key = ?1",
                params![lock_key],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn delete(&self, lock_key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM locks WHERE lock_key = ?1", params![lock_key])?;
        Ok(())
    }

    fn delete_if_expired(&self, lock_key: &str, now: u64) -> Result<bool> {
        let rows = self.conn()?.execute(
            "DELETE FROM locks WHERE lock_key = ?1 AND expires_at < ?2",
            params![lock_key, now],
        )?;
        Ok(rows > 0)
    }

    fn delete_if_holder(&self, lock_key: &str, holder_id: &str) -> Result<bool> {
        let rows = self.conn()?.execute(
            "DELETE FROM locks WHERE lock_key = ?1 AND holder_id = ?2",
            params![lock_key, holder_id],
        )?;
        Ok(rows > 0)
    }

    fn delete_expired(&self, now: u64) -> Result<usize> {
        let rows = self
            .conn()?
            .execute("DELETE FROM locks WHERE expires_at < ?1", params![now])?;
        Ok(rows)
    }

    fn list(&self) -> Result<Vec<LockRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT lock_key, expires_at, holder_id FROM locks ORDER BY lock_key",
        )?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

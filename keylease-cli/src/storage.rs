use std::sync::Arc;

use anyhow::bail;

use keylease_core::infrastructure::LockStore;
use keylease_core::infrastructure_in_memory::InMemoryLockStore;

/// Open the backend named by `storage`: `memory` or `sqlite:<path>`.
///
/// Never falls back to another backend: every process must see the same table.
pub fn open_store(storage: &str) -> anyhow::Result<Arc<dyn LockStore>> {
    if storage == "memory" {
        tracing::info!("💾 Storage backend: in-memory (locks are process-local)");
        return Ok(Arc::new(InMemoryLockStore::new()));
    }

    if let Some(path) = storage.strip_prefix("sqlite:") {
        if path.is_empty() {
            bail!("sqlite storage needs a path, e.g. 'sqlite:keylease.db'");
        }
        return open_sqlite(path);
    }

    bail!(
        "Unknown storage backend: '{}'. Use 'memory' or 'sqlite:<path>'",
        storage
    )
}

#[cfg(feature = "sqlite")]
fn open_sqlite(path: &str) -> anyhow::Result<Arc<dyn LockStore>> {
    use anyhow::Context;

    tracing::debug!("💾 Storage backend: SQLite ({})", path);
    let store = keylease_core::infrastructure_sqlite::SqliteLockStore::open(path)
        .with_context(|| format!("Failed to open SQLite database at '{}'", path))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(path: &str) -> anyhow::Result<Arc<dyn LockStore>> {
    let _ = path;
    bail!(
        "SQLite storage requested but the `sqlite` feature is not enabled. \
         Rebuild with: cargo build --features sqlite"
    )
}

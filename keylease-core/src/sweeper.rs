use std::sync::Arc;

use crate::clock::Clock;
use crate::error::Result;
use crate::infrastructure::LockStore;

/// Deletes expired lock rows.
///
/// Runs either inline from `acquire` with a configured probability, or on a
/// timer driven by whoever owns the process (see `keylease serve`). Both paths
/// call the same idempotent store operation, so concurrent sweeps are safe.
#[derive(Clone)]
pub struct Sweeper {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    probability: f64,
}

impl Sweeper {
    pub fn new(store: Arc<dyn LockStore>, clock: Arc<dyn Clock>, probability: f64) -> Self {
        Self {
            store,
            clock,
            probability,
        }
    }

    /// Delete every row with `expires_at < now`. Returns the number removed.
    pub fn sweep(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let deleted = self.store.delete_expired(now)?;
        if deleted > 0 {
            tracing::debug!(deleted, now, "Swept expired locks");
        }
        Ok(deleted)
    }

    /// Roll the dice and sweep on a hit. Failures are logged, never returned:
    /// the inline sweep must not change the outcome of the acquire around it.
    pub fn maybe_sweep(&self) -> Option<usize> {
        if !self.should_trigger() {
            return None;
        }
        match self.sweep() {
            Ok(deleted) => Some(deleted),
            Err(e) => {
                tracing::warn!(error = %e, "Inline sweep failed");
                None
            }
        }
    }

    fn should_trigger(&self) -> bool {
        self.probability > 0.0 && rand::random::<f64>() < self.probability
    }
}

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffSchedule;
use crate::error::{LockError, Result};

pub const DEFAULT_TTL_MS: u64 = 30_000;
pub const DEFAULT_INITIAL_WAIT_MS: u64 = 500;
pub const DEFAULT_MAX_WAIT_MS: u64 = 3_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_CLEANUP_PROBABILITY: f64 = 0.10;

/// Tunables for lock lifetime, waiting and inline sweeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Lock lifetime in milliseconds
    pub ttl_ms: u64,
    /// First backoff sleep of the waiter
    pub initial_wait_ms: u64,
    /// Backoff ceiling
    pub max_wait_ms: u64,
    /// Number of polls before the waiter gives up
    pub max_attempts: u32,
    /// Chance that an acquire triggers an inline sweep first
    pub cleanup_probability: f64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            initial_wait_ms: DEFAULT_INITIAL_WAIT_MS,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cleanup_probability: DEFAULT_CLEANUP_PROBABILITY,
        }
    }
}

impl LockConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ttl_ms == 0 {
            return Err(LockError::InvalidConfig("ttl_ms must be greater than 0".to_string()));
        }
        if self.initial_wait_ms == 0 {
            return Err(LockError::InvalidConfig(
                "initial_wait_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_wait_ms < self.initial_wait_ms {
            return Err(LockError::InvalidConfig(format!(
                "max_wait_ms ({}) must not be below initial_wait_ms ({})",
                self.max_wait_ms, self.initial_wait_ms
            )));
        }
        if self.max_attempts == 0 {
            return Err(LockError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.cleanup_probability) {
            return Err(LockError::InvalidConfig(format!(
                "cleanup_probability must be within [0, 1], got {}",
                self.cleanup_probability
            )));
        }
        Ok(())
    }

    /// The sleep sequence used by the waiter.
    pub fn backoff_schedule(&self) -> BackoffSchedule {
        BackoffSchedule::new(self.initial_wait_ms, self.max_wait_ms, self.max_attempts)
    }
}

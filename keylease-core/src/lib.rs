//! # keylease-core
//!
//! TTL lease locks for callers that must not run the same expensive,
//! side-effecting operation for one key at the same time. Mutual exclusion
//! comes from the backing store's atomic insert; abandoned locks are
//! recovered through expiry, lazy self-healing reads, and a sweeper.

pub mod backoff;
pub mod clock;
pub mod config;
pub mod error;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod manager;
pub mod sweeper;
pub mod types;
pub mod waiter;

#[cfg(test)]
mod backoff_test;
#[cfg(test)]
mod sweeper_test;
#[cfg(test)]
mod waiter_test;

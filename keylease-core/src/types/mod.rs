mod lock;

pub use lock::{Exclusive, InsertOutcome, LockRecord, LockState, MAX_EXPIRES_AT};

use crate::backoff::BackoffSchedule;
use crate::clock::Clock;
use crate::error::Result;
use crate::infrastructure::LockStore;

/// Poll until `lock_key` is observed released or expired.
///
/// Each attempt sleeps for the next interval of `schedule` and then looks the
/// row up. An expired row is removed on the way out, mirroring
/// `LockManager::is_locked`. Returns `Ok(false)` once the schedule is
/// exhausted with the lock still live.
pub fn wait_for_release(
    store: &dyn LockStore,
    clock: &dyn Clock,
    schedule: BackoffSchedule,
    lock_key: &str,
) -> Result<bool> {
    let attempts = schedule.len();

    for (i, wait) in schedule.enumerate() {
        clock.sleep(wait);

        let now = clock.now_ms();
        match store.lookup(lock_key)? {
            None => {
                tracing::debug!(lock_key, attempt = i + 1, "Lock released");
                return Ok(true);
            }
            Some(record) if record.is_expired(now) => {
                store.delete_if_expired(lock_key, now)?;
                tracing::debug!(
                    lock_key,
                    attempt = i + 1,
                    holder_id = %record.holder_id,
                    "Lock expired while waiting"
                );
                return Ok(true);
            }
            Some(record) => {
                tracing::debug!(
                    lock_key,
                    attempt = i + 1,
                    waited_ms = wait.as_millis() as u64,
                    remaining_ms = record.remaining_ms(now),
                    "Lock still held"
                );
            }
        }
    }

    tracing::debug!(lock_key, attempts, "Gave up waiting for lock");
    Ok(false)
}

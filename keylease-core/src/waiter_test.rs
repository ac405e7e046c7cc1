#[cfg(test)]
mod tests {
    use crate::clock::Clock;
    use crate::config::LockConfig;
    use crate::error::Result;
    use crate::infrastructure::LockStore;
    use crate::infrastructure_in_memory::InMemoryLockStore;
    use crate::manager::LockManager;
    use crate::types::{InsertOutcome, LockRecord};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    // =========================================================================
    // Helpers
    // =========================================================================

    type Action = Box<dyn FnOnce() + Send>;

    /// A manual clock that records each sleep and fires scheduled actions
    /// when time passes their due instant.
    struct ScriptedClock {
        now: AtomicU64,
        sleeps: Mutex<Vec<u64>>,
        actions: Mutex<Vec<(u64, Action)>>,
    }

    impl ScriptedClock {
        fn new() -> Self {
            Self {
                now: AtomicU64::new(0),
                sleeps: Mutex::new(Vec::new()),
                actions: Mutex::new(Vec::new()),
            }
        }

        fn set(&self, now: u64) {
            self.now.store(now, Ordering::SeqCst);
        }

        fn at(&self, due: u64, action: impl FnOnce() + Send + 'static) {
            self.actions.lock().unwrap().push((due, Box::new(action)));
        }

        fn sleeps(&self) -> Vec<u64> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    impl Clock for ScriptedClock {
        fn now_ms(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }

        fn sleep(&self, duration: Duration) {
            let ms = duration.as_millis() as u64;
            self.sleeps.lock().unwrap().push(ms);
            let now = self.now.fetch_add(ms, Ordering::SeqCst) + ms;

            let due: Vec<Action> = {
                let mut actions = self.actions.lock().unwrap();
                let (ready, pending): (Vec<_>, Vec<_>) =
                    actions.drain(..).partition(|(at, _)| *at <= now);
                *actions = pending;
                ready.into_iter().map(|(_, action)| action).collect()
            };
            for action in due {
                action();
            }
        }
    }

    /// Wraps a store and records the instant of every lookup.
    struct PollRecorder {
        inner: InMemoryLockStore,
        clock: Arc<ScriptedClock>,
        lookups: Mutex<Vec<u64>>,
        deletes: AtomicUsize,
    }

    impl PollRecorder {
        fn new(clock: Arc<ScriptedClock>) -> Self {
            Self {
                inner: InMemoryLockStore::new(),
                clock,
                lookups: Mutex::new(Vec::new()),
                deletes: AtomicUsize::new(0),
            }
        }

        fn lookups(&self) -> Vec<u64> {
            self.lookups.lock().unwrap().clone()
        }
    }

    impl LockStore for PollRecorder {
        fn insert(&self, record: &LockRecord) -> Result<InsertOutcome> {
            self.inner.insert(record)
        }

        fn lookup(&self, lock_key: &str) -> Result<Option<LockRecord>> {
            self.lookups.lock().unwrap().push(self.clock.now_ms());
            self.inner.lookup(lock_key)
        }

        fn delete(&self, lock_key: &str) -> Result<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(lock_key)
        }

        fn delete_if_expired(&self, lock_key: &str, now: u64) -> Result<bool> {
            self.inner.delete_if_expired(lock_key, now)
        }

        fn delete_if_holder(&self, lock_key: &str, holder_id: &str) -> Result<bool> {
            self.inner.delete_if_holder(lock_key, holder_id)
        }

        fn delete_expired(&self, now: u64) -> Result<usize> {
            self.inner.delete_expired(now)
        }

        fn list(&self) -> Result<Vec<LockRecord>> {
            self.inner.list()
        }
    }

    fn scenario_config() -> LockConfig {
        LockConfig {
            ttl_ms: 30_000,
            initial_wait_ms: 500,
            max_wait_ms: 3_000,
            max_attempts: 5,
            cleanup_probability: 0.0,
        }
    }

    fn setup(config: LockConfig) -> (Arc<ScriptedClock>, Arc<PollRecorder>, LockManager) {
        let clock = Arc::new(ScriptedClock::new());
        let store = Arc::new(PollRecorder::new(clock.clone()));
        let manager = LockManager::with_clock(store.clone(), config, clock.clone()).unwrap();
        (clock, store, manager)
    }

    // =========================================================================
    // Scenarios
    // =========================================================================

    #[test]
    fn lock_never_released_times_out_after_every_attempt() {
        let (clock, store, manager) = setup(scenario_config());

        assert!(manager.acquire("crawl:entity-1", "caller-a").unwrap());
        clock.set(1);
        assert!(!manager.acquire("crawl:entity-1", "caller-b").unwrap());

        assert!(!manager.wait_for_lock_release("crawl:entity-1").unwrap());
        assert_eq!(store.lookups(), vec![501, 1501, 3501, 6501, 9501]);
        assert_eq!(clock.sleeps(), vec![500, 1000, 2000, 3000, 3000]);
        assert!(manager.is_locked("crawl:entity-1").unwrap());
    }

    #[test]
    fn release_between_polls_is_seen_on_the_next_poll() {
        let (clock, store, manager) = setup(scenario_config());

        assert!(manager.acquire("crawl:entity-1", "caller-a").unwrap());
        clock.set(1);
        assert!(!manager.acquire("crawl:entity-1", "caller-b").unwrap());

        let releaser = manager.clone();
        clock.at(2_000, move || releaser.release("crawl:entity-1").unwrap());

        assert!(manager.wait_for_lock_release("crawl:entity-1").unwrap());
        // Still held at 1501, gone by 3501
        assert_eq!(store.lookups(), vec![501, 1501, 3501]);
        assert!(manager.acquire("crawl:entity-1", "caller-b").unwrap());
    }

    // =========================================================================
    // Properties
    // =========================================================================

    #[test]
    fn absent_lock_returns_after_first_poll() {
        let (clock, store, manager) = setup(scenario_config());
        assert!(manager.wait_for_lock_release("nobody-holds-this").unwrap());
        assert_eq!(clock.sleeps(), vec![500]);
        assert_eq!(store.lookups().len(), 1);
    }

    #[test]
    fn expiry_during_wait_counts_as_release_and_heals_the_row() {
        let config = LockConfig {
            ttl_ms: 1_200,
            ..scenario_config()
        };
        let (clock, store, manager) = setup(config);

        assert!(manager.acquire("k", "crashed").unwrap());
        assert!(manager.wait_for_lock_release("k").unwrap());

        // 500 (live), 1500 (expired at 1200)
        assert_eq!(clock.sleeps(), vec![500, 1000]);
        assert_eq!(store.inner.lookup("k").unwrap(), None);
        // Healing used the conditional delete, not the unconditional one
        assert_eq!(store.deletes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn poll_count_matches_attempt_budget() {
        for max_attempts in [1, 3, 7] {
            let config = LockConfig {
                ttl_ms: u64::MAX / 2,
                initial_wait_ms: 10,
                max_wait_ms: 40,
                max_attempts,
                cleanup_probability: 0.0,
            };
            let (clock, store, manager) = setup(config);
            assert!(manager.acquire("k", "forever").unwrap());

            assert!(!manager.wait_for_lock_release("k").unwrap());
            assert_eq!(store.lookups().len(), max_attempts as usize);

            let sleeps = clock.sleeps();
            assert!(sleeps.windows(2).all(|w| w[0] <= w[1]), "{:?}", sleeps);
            assert!(sleeps.iter().all(|&s| s <= 40), "{:?}", sleeps);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;
    use crate::error::{LockError, Result};
    use crate::infrastructure::LockStore;
    use crate::infrastructure_in_memory::InMemoryLockStore;
    use crate::sweeper::Sweeper;
    use crate::types::{InsertOutcome, LockRecord};
    use std::sync::Arc;

    /// A store whose every call fails, as if the database were unreachable.
    struct UnreachableStore;

    impl LockStore for UnreachableStore {
        fn insert(&self, _: &LockRecord) -> Result<InsertOutcome> {
            Err(LockError::Store("connection refused".to_string()))
        }
        fn lookup(&self, _: &str) -> Result<Option<LockRecord>> {
            Err(LockError::Store("connection refused".to_string()))
        }
        fn delete(&self, _: &str) -> Result<()> {
            Err(LockError::Store("connection refused".to_string()))
        }
        fn delete_if_expired(&self, _: &str, _: u64) -> Result<bool> {
            Err(LockError::Store("connection refused".to_string()))
        }
        fn delete_if_holder(&self, _: &str, _: &str) -> Result<bool> {
            Err(LockError::Store("connection refused".to_string()))
        }
        fn delete_expired(&self, _: u64) -> Result<usize> {
            Err(LockError::Store("connection refused".to_string()))
        }
        fn list(&self) -> Result<Vec<LockRecord>> {
            Err(LockError::Store("connection refused".to_string()))
        }
    }

    fn seeded_store() -> Arc<InMemoryLockStore> {
        let store = Arc::new(InMemoryLockStore::new());
        for (key, expires_at) in [("a", 100), ("b", 200), ("c", 300)] {
            store.insert(&LockRecord::new(key, "h", expires_at, 0)).unwrap();
        }
        store
    }

    #[test]
    fn sweep_deletes_only_rows_expired_at_call_time() {
        let store = seeded_store();
        let clock = Arc::new(ManualClock::new(200));
        let sweeper = Sweeper::new(store.clone(), clock.clone(), 0.0);

        assert_eq!(sweeper.sweep().unwrap(), 1);
        let keys: Vec<String> = store.list().unwrap().into_iter().map(|r| r.lock_key).collect();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn sweep_with_nothing_expired_returns_zero() {
        let store = seeded_store();
        let sweeper = Sweeper::new(store.clone(), Arc::new(ManualClock::new(50)), 0.0);
        assert_eq!(sweeper.sweep().unwrap(), 0);
        assert_eq!(sweeper.sweep().unwrap(), 0);
        assert_eq!(store.list().unwrap().len(), 3);
    }

    #[test]
    fn concurrent_sweeps_delete_each_row_once() {
        let store = Arc::new(InMemoryLockStore::new());
        for i in 0..200 {
            store.insert(&LockRecord::new(format!("k{}", i), "h", 10, 0)).unwrap();
        }
        let sweeper = Sweeper::new(store.clone(), Arc::new(ManualClock::new(1_000)), 0.0);

        let total: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| sweeper.sweep().unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(total, 200);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn zero_probability_never_sweeps() {
        let store = seeded_store();
        let sweeper = Sweeper::new(store.clone(), Arc::new(ManualClock::new(10_000)), 0.0);
        for _ in 0..100 {
            assert_eq!(sweeper.maybe_sweep(), None);
        }
        assert_eq!(store.list().unwrap().len(), 3);
    }

    #[test]
    fn full_probability_always_sweeps() {
        let store = seeded_store();
        let sweeper = Sweeper::new(store.clone(), Arc::new(ManualClock::new(10_000)), 1.0);
        assert_eq!(sweeper.maybe_sweep(), Some(3));
        assert_eq!(sweeper.maybe_sweep(), Some(0));
    }

    #[test]
    fn sweep_surfaces_store_failures() {
        let sweeper = Sweeper::new(Arc::new(UnreachableStore), Arc::new(ManualClock::new(0)), 1.0);
        assert!(matches!(sweeper.sweep(), Err(LockError::Store(_))));
        // The inline variant swallows them
        assert_eq!(sweeper.maybe_sweep(), None);
    }

    #[test]
    fn store_failure_is_not_contention() {
        use crate::config::LockConfig;
        use crate::manager::LockManager;

        let manager = LockManager::with_clock(
            Arc::new(UnreachableStore),
            LockConfig::default(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();

        assert!(matches!(manager.acquire("k", "r"), Err(LockError::Store(_))));
        assert!(matches!(manager.release("k"), Err(LockError::Store(_))));
        assert!(matches!(manager.is_locked("k"), Err(LockError::Store(_))));
        assert!(matches!(manager.wait_for_lock_release("k"), Err(LockError::Store(_))));
    }
}

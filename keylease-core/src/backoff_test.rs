#[cfg(test)]
mod tests {
    use crate::backoff::BackoffSchedule;
    use crate::config::LockConfig;
    use std::time::Duration;

    fn millis(schedule: BackoffSchedule) -> Vec<u64> {
        schedule.map(|d| d.as_millis() as u64).collect()
    }

    #[test]
    fn default_schedule_doubles_then_caps() {
        let schedule = LockConfig::default().backoff_schedule();
        assert_eq!(millis(schedule), vec![500, 1000, 2000, 3000, 3000]);
    }

    #[test]
    fn schedule_is_non_decreasing_and_capped() {
        for (initial, max, attempts) in [(1, 1, 4), (7, 100, 12), (250, 3000, 8), (900, 1000, 3)] {
            let waits = millis(BackoffSchedule::new(initial, max, attempts));
            assert_eq!(waits.len(), attempts as usize);
            assert_eq!(waits[0], initial);
            assert!(waits.windows(2).all(|w| w[0] <= w[1]), "{:?}", waits);
            assert!(waits.iter().all(|&w| w <= max), "{:?}", waits);
        }
    }

    #[test]
    fn initial_above_ceiling_is_clamped() {
        let waits = millis(BackoffSchedule::new(5000, 3000, 2));
        assert_eq!(waits, vec![3000, 3000]);
    }

    #[test]
    fn zero_attempts_yields_nothing() {
        let mut schedule = BackoffSchedule::new(500, 3000, 0);
        assert_eq!(schedule.len(), 0);
        assert_eq!(schedule.next(), None);
    }

    #[test]
    fn total_is_the_longest_possible_wait() {
        let schedule = LockConfig::default().backoff_schedule();
        assert_eq!(schedule.total(), Duration::from_millis(9500));
        // total() does not consume the schedule
        assert_eq!(schedule.len(), 5);
    }

    #[test]
    fn large_values_do_not_overflow() {
        let waits = millis(BackoffSchedule::new(u64::MAX / 2 + 1, u64::MAX, 3));
        assert_eq!(waits, vec![u64::MAX / 2 + 1, u64::MAX, u64::MAX]);
    }
}

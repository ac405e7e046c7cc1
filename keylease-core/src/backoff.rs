use std::time::Duration;

/// Capped exponential sleep sequence for the waiter.
///
/// Attempt 1 sleeps `initial_ms`; each later attempt doubles the previous
/// sleep, never exceeding `max_ms`. The iterator yields exactly
/// `max_attempts` items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    next_ms: u64,
    max_ms: u64,
    remaining: u32,
}

impl BackoffSchedule {
    pub fn new(initial_ms: u64, max_ms: u64, max_attempts: u32) -> Self {
        Self {
            next_ms: initial_ms.min(max_ms),
            max_ms,
            remaining: max_attempts,
        }
    }

    /// Sum of every sleep in the schedule: the longest a waiter can block.
    pub fn total(&self) -> Duration {
        self.clone().sum()
    }
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let wait = self.next_ms;
        self.next_ms = wait.saturating_mul(2).min(self.max_ms);
        Some(Duration::from_millis(wait))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BackoffSchedule {}

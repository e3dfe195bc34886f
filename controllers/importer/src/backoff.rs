//! # Exponential Backoff
//!
//! Provides a capped exponential backoff for retrying failed work items.
//! The sequence doubles from a minimum up to a cap: 1s, 2s, 4s, ... 300s,
//! and is reset after a successful sync.

use std::time::Duration;

/// Capped exponential backoff calculator
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Minimum backoff value in seconds (for reset)
    min_secs: u64,
    /// Current backoff value in seconds
    current_secs: u64,
    /// Maximum backoff value in seconds
    max_secs: u64,
}

impl ExponentialBackoff {
    /// Create a new backoff with the given minimum and maximum in seconds.
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            current_secs: min_secs,
            max_secs,
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence.
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_secs;
        self.current_secs = std::cmp::min(self.current_secs.saturating_mul(2), self.max_secs);
        result
    }

    /// Get the next backoff duration as a `Duration` and advance the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Reset the backoff to the initial state.
    pub fn reset(&mut self) {
        self.current_secs = self.min_secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence_doubles() {
        let mut backoff = ExponentialBackoff::new(1, 300);

        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff_seconds(), 2);
        assert_eq!(backoff.next_backoff_seconds(), 4);
        assert_eq!(backoff.next_backoff_seconds(), 8);
        assert_eq!(backoff.next_backoff_seconds(), 16);
    }

    #[test]
    fn test_backoff_caps_at_max() {
        let mut backoff = ExponentialBackoff::new(1, 300);

        for _ in 0..20 {
            backoff.next_backoff_seconds();
        }
        // Well past the doubling range, should sit at the cap
        assert_eq!(backoff.next_backoff_seconds(), 300);
        assert_eq!(backoff.next_backoff_seconds(), 300);
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = ExponentialBackoff::new(1, 300);

        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff_seconds(), 2);

        backoff.reset();

        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff_seconds(), 2);
    }
}

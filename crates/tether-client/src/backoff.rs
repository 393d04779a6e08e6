//! Exponential reconnect backoff.

use std::time::Duration;

/// Computes the wait between reconnect attempts.
///
/// The n-th delay (1-based) is `min(initial * 2^(n-1), max)`, so with
/// 500 ms / 10 s the sequence is 500 ms, 1 s, 2 s, 4 s, 8 s, 10 s, 10 s...
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    /// A backoff that starts at `initial` and never waits longer than `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            attempt: 0,
        }
    }

    /// The delay for the n-th failure. `n == 0` yields zero.
    pub fn delay_for(&self, n: u32) -> Duration {
        if n == 0 {
            return Duration::ZERO;
        }
        2u32.checked_pow(n - 1)
            .and_then(|factor| self.initial.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Advances the attempt counter and returns its delay.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.delay_for(self.attempt)
    }

    /// Failures seen since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Forgets past failures, so the next delay is `initial` again. Called
    /// after every successful reconnect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        let mut backoff = Backoff::new(ms(500), Duration::from_secs(10));
        let delays: Vec<Duration> = (0..7).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![ms(500), ms(1_000), ms(2_000), ms(4_000), ms(8_000), ms(10_000), ms(10_000)]
        );
    }

    #[test]
    fn test_delay_for_matches_formula() {
        let backoff = Backoff::new(ms(10), ms(40));
        for n in 1..=20u32 {
            let expected = ms(10 * 2u64.pow(n - 1)).min(ms(40));
            assert_eq!(backoff.delay_for(n), expected, "attempt {n}");
        }
    }

    #[test]
    fn test_delay_for_huge_attempt_saturates_at_max() {
        let backoff = Backoff::new(ms(500), Duration::from_secs(10));
        assert_eq!(backoff.delay_for(40), Duration::from_secs(10));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_reset_starts_over() {
        let mut backoff = Backoff::new(ms(100), Duration::from_secs(1));
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), ms(100));
    }
}

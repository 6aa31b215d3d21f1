//! Reconnect delay schedule.

use std::time::Duration;

/// First delay after an unintentional close.
pub const BASE_DELAY: Duration = Duration::from_millis(1000);

/// Ceiling for the doubled delay.
pub const MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Capped exponential backoff without jitter.
///
/// The delay starts at [`BASE_DELAY`], doubles after each consecutive
/// unintentional closure up to [`MAX_DELAY`], and resets to the base as
/// soon as a connection reaches the open state. Retries are unbounded.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            current: BASE_DELAY,
        }
    }

    /// Delay to wait before the next connection attempt. Advances the
    /// schedule for the attempt after that.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(MAX_DELAY);
        delay
    }

    /// Called on a successful open; the next failure starts over at the base.
    pub fn reset(&mut self) {
        self.current = BASE_DELAY;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_up_to_the_ceiling() {
        let mut backoff = Backoff::new();
        let delays: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
    }

    #[test]
    fn reset_returns_to_base() {
        let mut backoff = Backoff::new();
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.next_delay(), BASE_DELAY);
        assert_eq!(backoff.next_delay(), Duration::from_millis(2000));
    }
}

//! Fixed-period triggers driven by a polled clock.

use embassy_time::{Duration, Instant};

/// Fires when at least `period` has passed since it last fired.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    period: Duration,
    last: Option<Instant>,
}

impl Cadence {
    /// Fires on the first poll.
    pub const fn immediate(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// First fires one period after `start`.
    pub const fn starting_at(period: Duration, start: Instant) -> Self {
        Self {
            period,
            last: Some(start),
        }
    }

    /// Returns true and restarts the period if it has elapsed at `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        };
        if due {
            self.last = Some(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_cadence_fires_on_first_poll() {
        let mut cadence = Cadence::immediate(Duration::from_secs(1));
        assert!(cadence.poll(Instant::from_millis(0)));
        assert!(!cadence.poll(Instant::from_millis(999)));
        assert!(cadence.poll(Instant::from_millis(1000)));
    }

    #[test]
    fn delayed_cadence_waits_one_period() {
        let mut cadence = Cadence::starting_at(Duration::from_secs(60), Instant::from_millis(0));
        assert!(!cadence.poll(Instant::from_millis(59_999)));
        assert!(cadence.poll(Instant::from_millis(60_000)));
    }

    #[test]
    fn fires_at_most_once_per_period() {
        let mut cadence = Cadence::immediate(Duration::from_secs(1));
        let mut fired = Vec::new();
        for ms in (0..10_000u64).step_by(300) {
            if cadence.poll(Instant::from_millis(ms)) {
                fired.push(ms);
            }
        }
        assert_eq!(fired.first(), Some(&0));
        for pair in fired.windows(2) {
            assert!(pair[1] - pair[0] >= 1000);
            assert!(pair[1] - pair[0] < 1300);
        }
    }

    #[test]
    fn clock_going_backwards_does_not_fire() {
        let mut cadence = Cadence::starting_at(Duration::from_secs(1), Instant::from_millis(5000));
        assert!(!cadence.poll(Instant::from_millis(100)));
    }
}

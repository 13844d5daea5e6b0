//! Application watchdog: detects a main loop that stopped checking in.

use embassy_time::{Duration, Instant};

#[derive(Debug)]
pub struct AppWatchdog {
    timeout: Duration,
    last_checkin: Instant,
    paused: bool,
}

impl AppWatchdog {
    pub const fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_checkin: now,
            paused: false,
        }
    }

    pub fn checkin(&mut self, now: Instant) {
        self.last_checkin = now;
    }

    /// Stops expiry while the loop is deliberately blocked (stop sleep).
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self, now: Instant) {
        self.paused = false;
        self.last_checkin = now;
    }

    pub fn expired(&self, now: Instant) -> bool {
        !self.paused && now.saturating_duration_since(self.last_checkin) >= self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_timeout_without_checkin() {
        let mut watchdog = AppWatchdog::new(Duration::from_millis(60_000), Instant::from_secs(0));
        assert!(!watchdog.expired(Instant::from_secs(59)));
        watchdog.checkin(Instant::from_secs(59));
        assert!(!watchdog.expired(Instant::from_secs(118)));
        assert!(watchdog.expired(Instant::from_secs(119)));
    }

    #[test]
    fn paused_watchdog_never_expires() {
        let mut watchdog = AppWatchdog::new(Duration::from_secs(60), Instant::from_secs(0));
        watchdog.pause();
        assert!(!watchdog.expired(Instant::from_secs(30 * 60)));
        watchdog.resume(Instant::from_secs(30 * 60));
        assert!(!watchdog.expired(Instant::from_secs(30 * 60 + 59)));
        assert!(watchdog.expired(Instant::from_secs(30 * 60 + 60)));
    }
}

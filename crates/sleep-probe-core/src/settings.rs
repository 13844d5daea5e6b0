//! Compile-time tuning of the probe.

use embassy_time::Duration;

/// Timing constants shared by every scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Connected time required before the one-shot scenario runs.
    pub warm_up: Duration,
    /// Delay between announcing a scenario and going to sleep.
    pub settle: Duration,
    /// Standard sleep length.
    pub sleep: Duration,
    /// Sleep length of the long stop-sleep variant.
    pub long_sleep: Duration,
    /// Data usage polling period.
    pub report_period: Duration,
    /// Publish period of the no-sleep publish scenario.
    pub publish_period: Duration,
    /// Loop stall time after which the application watchdog resets the device.
    pub watchdog_timeout: Duration,
    /// Event name used by the publish scenarios.
    pub event_name: &'static str,
}

impl Settings {
    pub const DEFAULT: Self = Self {
        warm_up: Duration::from_secs(12),
        settle: Duration::from_secs(2),
        sleep: Duration::from_secs(8),
        long_sleep: Duration::from_secs(30 * 60),
        report_period: Duration::from_millis(1000),
        publish_period: Duration::from_secs(60),
        watchdog_timeout: Duration::from_millis(60_000),
        event_name: "testSleep",
    };
}

impl Default for Settings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

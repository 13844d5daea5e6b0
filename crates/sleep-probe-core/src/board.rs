//! The hardware seam between the scenario logic and the board.

use embassy_time::{Duration, Instant};

use crate::config_switch::SWITCH_BITS;
use crate::error::Error;
use crate::scenario::StopSleep;
use crate::usage::DataUsage;

/// Reserved event that tells the cloud side to drop the device session.
pub const SESSION_END_EVENT: &str = "spark/device/session/end";

/// A cloud event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Publish {
    pub event: &'static str,
    pub data: &'static str,
    /// Wait for the receiver to acknowledge delivery.
    pub ack: bool,
}

impl Publish {
    pub const fn session_end() -> Self {
        Self {
            event: SESSION_END_EVENT,
            data: "",
            ack: false,
        }
    }
}

/// What ended a stop sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeReason {
    /// Falling edge on the wake pin.
    Pin,
    /// The sleep timeout elapsed.
    Timer,
}

/// Everything the scenarios need from the board.
///
/// Irreversible sleeps are not part of the trait: the runner hands them back
/// as [`Step::PowerDown`](crate::runner::Step::PowerDown) and the firmware
/// carries them out itself.
#[allow(async_fn_in_trait)]
pub trait Board {
    /// Monotonic time.
    fn now(&self) -> Instant;

    /// Levels of the configuration switch pins, D0 first.
    fn read_config_switch(&mut self) -> [bool; SWITCH_BITS];

    async fn delay(&mut self, duration: Duration);

    /// Asks for a cloud connection without waiting for it.
    fn begin_connect(&mut self);

    /// The modem is registered on the cellular network.
    fn cellular_ready(&self) -> bool;

    /// A cloud session is up.
    fn cloud_connected(&self) -> bool;

    async fn publish(&mut self, publish: &Publish) -> Result<(), Error>;

    /// Cumulative modem byte counters.
    async fn data_usage(&mut self) -> Result<DataUsage, Error>;

    /// Stop-mode sleep until the wake pin falls or the timeout elapses.
    async fn stop_sleep(&mut self, sleep: StopSleep) -> WakeReason;
}

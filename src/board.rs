//! [`Board`] implementation for the cellular board.
//!
//! Publishes go to the UDP collector over the modem's socket, usage comes
//! from the modem's byte counters and stop sleep puts the MCU in STOP
//! through [`power::enter_stop`].
//!
//! # Clock
//!
//! The tick timer stands still in STOP. [`ElectronBoard`] adds the time
//! measured by the RTC across every stop sleep, so the scenario timing
//! (warm-up, report and publish periods) sees the real elapsed time.

use embassy_stm32::gpio::Input;
use embassy_time::{Duration, Instant, Timer};
use heapless::Vec;
use sleep_probe_core::board::SESSION_END_EVENT;
use sleep_probe_core::config_switch::SWITCH_BITS;
use sleep_probe_core::{Board, DataUsage, Error, Link, Publish, StopSleep, WakeReason};

use crate::network::{self, COLLECTOR_HOST, COLLECTOR_PORT, LINK, SharedModem};
use crate::{power, watchdog};

/// How long a publish with acknowledgement waits for the reply datagram.
const ACK_TIMEOUT: Duration = Duration::from_secs(20);

/// Largest `<event> <data>` datagram.
const DATAGRAM_LEN: usize = 128;

/// The probe hardware as the scenario runner sees it.
pub struct ElectronBoard {
    config_switch: [Input<'static>; SWITCH_BITS],
    /// Kept to hold PA14 as a pulled-up input while it serves as EXTI14.
    _wake_pin: Input<'static>,
    modem: &'static SharedModem,
    /// Time spent in STOP so far.
    stopped: Duration,
}

impl ElectronBoard {
    /// Creates the board.
    ///
    /// # Arguments
    ///
    /// * `config_switch` - Test selection inputs, D0 first
    /// * `wake_pin` - D6 input that ends stop sleep on a falling edge
    /// * `modem` - Shared modem driver, also used by the connection task
    pub fn new(
        config_switch: [Input<'static>; SWITCH_BITS],
        wake_pin: Input<'static>,
        modem: &'static SharedModem,
    ) -> Self {
        Self {
            config_switch,
            _wake_pin: wake_pin,
            modem,
            stopped: Duration::from_ticks(0),
        }
    }
}

impl Board for ElectronBoard {
    fn now(&self) -> Instant {
        Instant::now() + self.stopped
    }

    fn read_config_switch(&mut self) -> [bool; SWITCH_BITS] {
        core::array::from_fn(|bit| self.config_switch[bit].is_high())
    }

    async fn delay(&mut self, duration: Duration) {
        Timer::after(duration).await;
    }

    fn begin_connect(&mut self) {
        network::request_connect();
    }

    fn cellular_ready(&self) -> bool {
        LINK.link() >= Link::Registered
    }

    fn cloud_connected(&self) -> bool {
        LINK.link() == Link::Connected
    }

    /// Sends `<event> <data>` to the collector.
    ///
    /// With `ack` set, the publish only succeeds once a reply datagram
    /// arrives. The session-end event also closes the socket, so the next
    /// publish runs in a new session.
    async fn publish(&mut self, publish: &Publish) -> Result<(), Error> {
        let Some(socket) = LINK.socket() else {
            return Err(Error::NotConnected);
        };

        let mut datagram: Vec<u8, DATAGRAM_LEN> = Vec::new();
        for part in [publish.event.as_bytes(), b" ", publish.data.as_bytes()] {
            datagram
                .extend_from_slice(part)
                .map_err(|_| Error::Malformed)?;
        }

        let mut modem = self.modem.lock().await;
        modem
            .send_to(socket, COLLECTOR_HOST, COLLECTOR_PORT, &datagram)
            .await?;
        if publish.ack {
            modem.wait_for_datagram(socket, ACK_TIMEOUT).await?;
        }
        if publish.event == SESSION_END_EVENT {
            modem.close_socket(socket).await?;
            LINK.set_link(Link::DataActive);
        }
        Ok(())
    }

    /// Reads the modem counters without waiting for the modem; a busy
    /// modem reports [`Error::Busy`].
    async fn data_usage(&mut self) -> Result<DataUsage, Error> {
        let mut modem = self.modem.try_lock().map_err(|_| Error::Busy)?;
        if !modem.is_powered() {
            return Err(Error::NotConnected);
        }
        Ok(modem.data_usage().await?)
    }

    /// Powers the modem off unless network standby is requested, then
    /// enters STOP. The application watchdog is paused meanwhile.
    async fn stop_sleep(&mut self, sleep: StopSleep) -> WakeReason {
        watchdog::pause();
        if !sleep.network_standby {
            LINK.hold_radio(true);
            self.modem.lock().await.power_off().await;
            LINK.set_link(Link::Off);
        }

        let wake = power::enter_stop(sleep.timeout);
        self.stopped += wake.slept;
        defmt::debug!("stopped for {} s", wake.slept.as_secs());

        LINK.hold_radio(false);
        watchdog::resume();
        wake.reason
    }
}

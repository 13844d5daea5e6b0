//! Cloud link task and modem bindings for the link state machine.
//!
//! [`connection_task`] drives [`LinkState::maintain`] once per period; the
//! state machine itself lives in [`sleep_probe_core::link`]. Everything
//! else reads [`LINK`] to learn whether the cloud session is up.
//!
//! The "cloud" is a UDP collector whose address is fixed at build time
//! through `SLEEP_PROBE_COLLECTOR_HOST` / `SLEEP_PROBE_COLLECTOR_PORT`; the
//! APN comes from `SLEEP_PROBE_APN`.

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex, signal::Signal};
use embassy_time::{Duration, Timer};
use sleep_probe_core::link::PowerOn;
use sleep_probe_core::{Error, LinkModem, LinkState};

use crate::modem::Modem;

/// The modem driver, shared by the link task and the main loop.
pub type SharedModem = Mutex<CriticalSectionRawMutex, Modem>;

/// Collector host name or IP address.
pub const COLLECTOR_HOST: &str = match option_env!("SLEEP_PROBE_COLLECTOR_HOST") {
    Some(host) => host,
    None => "collector.invalid",
};

/// Collector UDP port.
pub const COLLECTOR_PORT: u16 = match option_env!("SLEEP_PROBE_COLLECTOR_PORT") {
    Some(port) => parse_port(port),
    None => 5683,
};

const APN: &str = match option_env!("SLEEP_PROBE_APN") {
    Some(apn) => apn,
    None => "spark.telefonica.com",
};

/// Time between link maintenance steps.
const MAINTAIN_PERIOD: Duration = Duration::from_secs(2);

/// Link state of the one modem on the board.
pub static LINK: LinkState = LinkState::new();

static CONNECT_REQUEST: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Starts the connection task; returns immediately.
pub fn request_connect() {
    CONNECT_REQUEST.signal(());
}

/// Async task that brings the cloud link up and keeps it up.
///
/// Idles until [`request_connect`] is called once, then runs forever.
/// While [`LINK`] holds the radio for a sleep, steps are skipped.
///
/// # Arguments
///
/// * `modem` - Shared modem driver; locked for one step at a time
#[embassy_executor::task]
pub async fn connection_task(modem: &'static SharedModem) {
    CONNECT_REQUEST.wait().await;
    defmt::info!("connecting to {}:{}", COLLECTOR_HOST, COLLECTOR_PORT);

    loop {
        LINK.maintain(modem).await;
        Timer::after(MAINTAIN_PERIOD).await;
    }
}

impl LinkModem for Modem {
    fn is_powered(&self) -> bool {
        Modem::is_powered(self)
    }

    async fn power_on(&mut self) -> Result<PowerOn, Error> {
        Ok(Modem::power_on(self).await?)
    }

    async fn registered(&mut self) -> Result<bool, Error> {
        Ok(self.registration().await?.is_registered())
    }

    async fn context_active(&mut self) -> Result<bool, Error> {
        Ok(self.data_active().await?)
    }

    async fn activate_context(&mut self) -> Result<(), Error> {
        Ok(self.activate_data(APN).await?)
    }

    async fn open_socket(&mut self) -> Result<u8, Error> {
        Ok(Modem::open_socket(self).await?)
    }

    async fn close_socket(&mut self, socket: u8) -> Result<(), Error> {
        Ok(Modem::close_socket(self, socket).await?)
    }
}

const fn parse_port(text: &str) -> u16 {
    let bytes = text.as_bytes();
    let mut port: u16 = 0;
    let mut i = 0;
    while i < bytes.len() {
        port = port * 10 + (bytes[i] - b'0') as u16;
        i += 1;
    }
    port
}

//! u-blox SARA cellular modem driver.
//!
//! Drives the modem over USART3 with AT commands. Responses are read one
//! line at a time and decoded with [`sleep_probe_core::at`]. Unsolicited
//! `+UUSORF` codes that arrive in the middle of another exchange are kept
//! so a later [`Modem::wait_for_datagram`] still sees them.

use core::fmt::Write as _;

use embassy_stm32::gpio::Output;
use embassy_stm32::usart::BufferedUart;
use embassy_time::{Duration, Timer, with_timeout};
use embedded_io_async::{Read, Write};
use heapless::{String, Vec};
use sleep_probe_core::at::{self, Line, Registration};
use sleep_probe_core::link::PowerOn;
use sleep_probe_core::{DataUsage, Error};

/// Longest response line kept; longer lines are truncated.
const LINE_LEN: usize = 96;
/// Information lines kept per command.
const MAX_INFO_LINES: usize = 4;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
/// `+UPSDA` may take up to 150 s while the network sets up the context.
const ACTIVATE_TIMEOUT: Duration = Duration::from_secs(150);
/// `+CPWROFF` may take up to 40 s.
const POWER_OFF_TIMEOUT: Duration = Duration::from_secs(40);
/// Power key low time that switches the modem on.
const POWER_KEY_PULSE: Duration = Duration::from_millis(150);
/// Attempts to get an `OK` to `AT` after power-on.
const POWER_ON_PROBES: usize = 10;
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Packet switched data profile used for the internal IP stack.
const PSD_PROFILE: u8 = 0;

/// One response line.
pub type Text = String<LINE_LEN>;

/// Failure of a modem exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum ModemError {
    /// The UART reported an error.
    Uart,
    /// No final result code in time.
    Timeout,
    /// `ERROR` or `+CME ERROR`.
    Rejected,
    /// The expected information line was missing or unreadable.
    Malformed,
}

impl From<ModemError> for Error {
    fn from(error: ModemError) -> Self {
        match error {
            ModemError::Uart | ModemError::Timeout => Error::Timeout,
            ModemError::Rejected => Error::Rejected,
            ModemError::Malformed => Error::Malformed,
        }
    }
}

/// Information lines returned by a command before its final `OK`.
#[derive(Default)]
pub struct Response {
    lines: Vec<Text, MAX_INFO_LINES>,
}

impl Response {
    /// First line the parser accepts.
    ///
    /// # Arguments
    ///
    /// * `parse` - Line parser from [`sleep_probe_core::at`]
    pub fn find<T>(&self, parse: impl Fn(&str) -> Option<T>) -> Result<T, ModemError> {
        self.lines
            .iter()
            .find_map(|line| parse(line))
            .ok_or(ModemError::Malformed)
    }
}

/// AT command driver for the SARA modem.
///
/// Not powered after construction; [`Modem::power_on`] brings it up.
pub struct Modem {
    uart: BufferedUart<'static>,
    /// Active-low power key (PWR_UC)
    power_key: Output<'static>,
    /// Active-low reset (RESET_UC)
    _reset_n: Output<'static>,
    /// Active-low level shifter enable (LVLOE_UC)
    level_shifter_n: Output<'static>,
    powered: bool,
    /// `+UUSORF` seen while waiting for something else.
    pending_read: Option<(u8, usize)>,
}

impl Modem {
    /// Creates the driver from its UART and control pins.
    ///
    /// # Arguments
    ///
    /// * `uart` - USART3, connected to the modem's RXD/TXD
    /// * `power_key` - PWR_UC output, idle high
    /// * `reset_n` - RESET_UC output, idle high
    /// * `level_shifter_n` - LVLOE_UC output, high until power-on
    pub fn new(
        uart: BufferedUart<'static>,
        power_key: Output<'static>,
        reset_n: Output<'static>,
        level_shifter_n: Output<'static>,
    ) -> Self {
        Self {
            uart,
            power_key,
            _reset_n: reset_n,
            level_shifter_n,
            powered: false,
            pending_read: None,
        }
    }

    /// The modem was powered on and has not been switched off since.
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Switches the modem on and sets up its command interface.
    ///
    /// A modem that answers straight away was left running (network
    /// standby across a deep sleep) and is not pulsed again.
    pub async fn power_on(&mut self) -> Result<PowerOn, ModemError> {
        self.level_shifter_n.set_low();

        let state = if self.probe(1).await {
            PowerOn::AlreadyOn
        } else {
            self.power_key.set_low();
            Timer::after(POWER_KEY_PULSE).await;
            self.power_key.set_high();
            if !self.probe(POWER_ON_PROBES).await {
                return Err(ModemError::Timeout);
            }
            PowerOn::Started
        };

        self.command("ATE0").await?;
        self.command("AT+CMEE=2").await?;
        self.powered = true;
        defmt::info!("modem powered on ({})", state);
        Ok(state)
    }

    /// Sends `AT` up to `attempts` times; true once the modem answers `OK`.
    async fn probe(&mut self, attempts: usize) -> bool {
        for _ in 0..attempts {
            if self.command_with_timeout("AT", PROBE_TIMEOUT).await.is_ok() {
                return true;
            }
        }
        false
    }

    /// Detaches and switches the modem off. The modem counts as off even if
    /// it did not confirm.
    pub async fn power_off(&mut self) {
        if let Err(error) = self.command_with_timeout("AT+CPWROFF", POWER_OFF_TIMEOUT).await {
            defmt::warn!("modem power off not confirmed: {}", error);
        }
        self.level_shifter_n.set_high();
        self.powered = false;
        self.pending_read = None;
        defmt::info!("modem powered off");
    }

    /// Network registration status (`AT+CREG?`).
    pub async fn registration(&mut self) -> Result<Registration, ModemError> {
        self.command("AT+CREG?").await?.find(at::parse_registration)
    }

    /// Configures the APN and activates the packet switched data profile.
    ///
    /// # Arguments
    ///
    /// * `apn` - Access point name of the SIM's operator
    pub async fn activate_data(&mut self, apn: &str) -> Result<(), ModemError> {
        let mut command: String<64> = String::new();
        write!(command, "AT+UPSD={},1,\"{}\"", PSD_PROFILE, apn).map_err(|_| ModemError::Malformed)?;
        self.command(&command).await?;

        command.clear();
        write!(command, "AT+UPSDA={},3", PSD_PROFILE).map_err(|_| ModemError::Malformed)?;
        self.command_with_timeout(&command, ACTIVATE_TIMEOUT).await?;
        Ok(())
    }

    /// Whether the data profile's PDP context is active (`AT+UPSND`).
    pub async fn data_active(&mut self) -> Result<bool, ModemError> {
        let mut command: String<32> = String::new();
        write!(command, "AT+UPSND={},8", PSD_PROFILE).map_err(|_| ModemError::Malformed)?;
        self.command(&command).await?.find(at::parse_psd_active)
    }

    /// Opens a UDP socket and returns its id.
    pub async fn open_socket(&mut self) -> Result<u8, ModemError> {
        self.command("AT+USOCR=17").await?.find(at::parse_socket)
    }

    /// Closes a socket (`AT+USOCL`); fails for sockets that are not open.
    pub async fn close_socket(&mut self, socket: u8) -> Result<(), ModemError> {
        let mut command: String<32> = String::new();
        write!(command, "AT+USOCL={}", socket).map_err(|_| ModemError::Malformed)?;
        self.command(&command).await?;
        Ok(())
    }

    /// Sends one UDP datagram.
    ///
    /// # Arguments
    ///
    /// * `socket` - Open UDP socket
    /// * `host` - Remote host name or IP address
    /// * `port` - Remote UDP port
    /// * `payload` - Datagram contents
    pub async fn send_to(
        &mut self,
        socket: u8,
        host: &str,
        port: u16,
        payload: &[u8],
    ) -> Result<(), ModemError> {
        let mut command: String<128> = String::new();
        write!(
            command,
            "AT+USOST={},\"{}\",{},{}",
            socket,
            host,
            port,
            payload.len()
        )
        .map_err(|_| ModemError::Malformed)?;

        self.send_line(&command).await?;
        with_timeout(COMMAND_TIMEOUT, self.wait_for_prompt())
            .await
            .map_err(|_| ModemError::Timeout)??;
        // The modem needs a short pause between the prompt and the data.
        Timer::after_millis(50).await;
        self.uart.write_all(payload).await.map_err(|_| ModemError::Uart)?;
        with_timeout(COMMAND_TIMEOUT, self.read_response())
            .await
            .map_err(|_| ModemError::Timeout)??;
        Ok(())
    }

    /// Waits for a datagram on `socket` and discards it. Returns its length.
    ///
    /// # Arguments
    ///
    /// * `socket` - Socket the datagram is expected on
    /// * `timeout` - How long to wait for the `+UUSORF` notification
    pub async fn wait_for_datagram(
        &mut self,
        socket: u8,
        timeout: Duration,
    ) -> Result<usize, ModemError> {
        let length = match self.pending_read.take() {
            Some((ready, length)) if ready == socket => length,
            _ => with_timeout(timeout, self.wait_for_read_ready(socket))
                .await
                .map_err(|_| ModemError::Timeout)??,
        };

        let mut command: String<32> = String::new();
        write!(command, "AT+USORF={},{}", socket, length).map_err(|_| ModemError::Malformed)?;
        self.command(&command).await?;
        Ok(length)
    }

    /// Cumulative byte counters of the active context.
    pub async fn data_usage(&mut self) -> Result<DataUsage, ModemError> {
        self.command("AT+UGCNTRD").await?.find(at::parse_data_usage)
    }

    /// Sends a command and collects its response with the default timeout.
    async fn command(&mut self, command: &str) -> Result<Response, ModemError> {
        self.command_with_timeout(command, COMMAND_TIMEOUT).await
    }

    async fn command_with_timeout(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<Response, ModemError> {
        self.send_line(command).await?;
        with_timeout(timeout, self.read_response())
            .await
            .map_err(|_| ModemError::Timeout)?
    }

    async fn send_line(&mut self, command: &str) -> Result<(), ModemError> {
        defmt::debug!("modem <- {}", command);
        self.uart
            .write_all(command.as_bytes())
            .await
            .map_err(|_| ModemError::Uart)?;
        self.uart.write_all(b"\r\n").await.map_err(|_| ModemError::Uart)
    }

    async fn read_response(&mut self) -> Result<Response, ModemError> {
        let mut response = Response::default();
        loop {
            let line = self.read_line().await?;
            match at::classify(&line) {
                Line::Empty => {}
                Line::Ok => return Ok(response),
                Line::Error => return Err(ModemError::Rejected),
                Line::CmeError(reason) => {
                    defmt::warn!("modem: +CME ERROR: {}", reason);
                    return Err(ModemError::Rejected);
                }
                Line::Info(text) => {
                    defmt::debug!("modem -> {}", text);
                    if let Some(ready) = at::parse_read_ready(text) {
                        self.pending_read = Some(ready);
                    } else if let Ok(text) = Text::try_from(text) {
                        // Extra lines past the limit are not needed by any command.
                        let _ = response.lines.push(text);
                    }
                }
            }
        }
    }

    async fn wait_for_read_ready(&mut self, socket: u8) -> Result<usize, ModemError> {
        loop {
            let line = self.read_line().await?;
            if let Line::Info(text) = at::classify(&line) {
                match at::parse_read_ready(text) {
                    Some((ready, length)) if ready == socket => return Ok(length),
                    _ => defmt::debug!("modem -> {}", text),
                }
            }
        }
    }

    async fn wait_for_prompt(&mut self) -> Result<(), ModemError> {
        let mut byte = [0u8; 1];
        loop {
            self.uart
                .read_exact(&mut byte)
                .await
                .map_err(|_| ModemError::Uart)?;
            if byte[0] == b'@' {
                return Ok(());
            }
        }
    }

    async fn read_line(&mut self) -> Result<Text, ModemError> {
        let mut line = Text::new();
        let mut byte = [0u8; 1];
        loop {
            self.uart
                .read_exact(&mut byte)
                .await
                .map_err(|_| ModemError::Uart)?;
            match byte[0] {
                b'\n' => return Ok(line),
                b'\r' => {}
                // Truncate over-long lines instead of failing the exchange.
                b => {
                    let _ = line.push(char::from(b));
                }
            }
        }
    }
}

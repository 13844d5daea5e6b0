//! Firmware for measuring sleep-mode power and cellular data usage.
//!
//! # Overview
//!
//! This firmware runs one hardcoded test scenario per boot:
//! - A 4-bit DIP switch on D0-D3 selects the scenario at boot
//! - Stop sleep, deep sleep, network standby and soft power-off variants
//! - Wake on a falling edge of D6 or on a timer
//! - Cellular data usage counters logged whenever they change
//!
//! # Hardware
//!
//! - **MCU**: STM32F205RG (Cortex-M3)
//! - **Modem**: u-blox SARA 2G/3G on USART3
//! - **RTC**: 32.768 kHz crystal for the stop and standby wakeup timer
//! - **Fuel gauge**: MAX17043 on I2C3, asleep during soft power-off
//! - **Logs**: defmt frames on USART1 TX (`log-serial`, default) or RTT
//!   (`log-rtt`); D6 shares SWCLK, so serial logging keeps the probe off
//!   the wake pin
//!
//! # Main Loop
//!
//! The scenario logic lives in [`sleep_probe_core::Runner`]. Each iteration
//! polls the link, runs the scenario's publish work, fires the one-shot
//! sleep after a 12 s warm-up and reports data usage once per second. When
//! a step requests deep sleep or soft power-off the loop ends in STANDBY
//! and the firmware restarts from reset on wake.
//!
//! # Module Organization
//!
//! - [`board`] - [`sleep_probe_core::Board`] implementation
//! - [`fuel_gauge`] - MAX17043 sleep control
//! - [`hardware`] - Pin mappings and peripheral initialization
//! - [`modem`] - AT command driver for the cellular modem
//! - [`network`] - Cloud link bring-up task and link state
//! - [`power`] - Boot cause, STOP and STANDBY entry, RTC wakeup
//! - [`watchdog`] - Application watchdog task

#![no_std]
#![no_main]

#[cfg(all(feature = "log-serial", feature = "log-rtt"))]
compile_error!("enable only one of the `log-serial` and `log-rtt` features");

mod board;
mod fuel_gauge;
mod hardware;
mod modem;
mod network;
mod power;
mod watchdog;

use embassy_executor::Spawner;
use embassy_stm32::{Config, rcc::LsConfig};
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Timer};
use sleep_probe_core::{Runner, Settings, Step};
use static_cell::StaticCell;
#[cfg(feature = "log-rtt")]
use defmt_rtt as _;
use panic_probe as _;

use board::ElectronBoard;
use hardware::Peripherals;
use network::{SharedModem, connection_task};
use watchdog::watchdog_task;

/// Pause between loop iterations so the link and watchdog tasks get to run.
const LOOP_PERIOD: Duration = Duration::from_millis(10);

static MODEM: StaticCell<SharedModem> = StaticCell::new();
#[cfg(feature = "log-serial")]
static LOG_UART: StaticCell<embassy_stm32::usart::UartTx<'static, embassy_stm32::mode::Blocking>> =
    StaticCell::new();

/// Main entry point for the sleep probe firmware.
///
/// # Initialization Sequence
///
/// 1. Enable the LSE so the RTC can time STOP and STANDBY wakeups
/// 2. Initialize STM32 peripherals, GPIO and drivers
/// 3. Start serial logging
/// 4. Log and clear the boot cause, wake the fuel gauge
/// 5. Spawn the watchdog and connection tasks
/// 6. Read the switch and start the selected scenario
/// 7. Enter the main loop
///
/// # Spawned Tasks
///
/// - **watchdog_task**: Resets the device when the main loop stalls
/// - **connection_task**: Brings the cloud link up once requested
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let mut config = Config::default();
    config.rcc.ls = LsConfig::default_lse();

    let p = embassy_stm32::init(config);

    // Wait 3 seconds after boot to allow debugger connection
    // before the wake pin takes over SWCLK.
    #[cfg(feature = "debug-mode")]
    {
        defmt::info!("Waiting 3 seconds for debugger connection...");
        Timer::after_secs(3).await;
    }

    let mut peripherals = Peripherals::new(p);

    #[cfg(feature = "log-serial")]
    defmt_serial::defmt_serial(LOG_UART.init(peripherals.log_uart));

    let boot_cause = power::take_boot_cause();
    defmt::info!("boot cause: {}", boot_cause);

    // Left asleep by a soft power-off
    if let Err(error) = peripherals.fuel_gauge.set_sleep(false) {
        defmt::warn!("fuel gauge wake failed: {}", error);
    }

    let settings = Settings::DEFAULT;
    let modem: &'static SharedModem = MODEM.init(Mutex::new(peripherals.modem));

    #[cfg(feature = "debug-mode")]
    defmt::info!("Spawning watchdog and connection tasks...");

    spawner
        .spawn(watchdog_task(settings.watchdog_timeout))
        .unwrap();
    spawner.spawn(connection_task(modem)).unwrap();

    let board = ElectronBoard::new(peripherals.config_switch, peripherals.wake_pin, modem);
    let mut runner = Runner::new(board, settings);
    let mut step = runner.start();

    loop {
        if let Step::PowerDown(request) = step {
            defmt::info!("power down: {}", request);
            power::prepare_power_down(&request, modem, &mut peripherals.fuel_gauge).await;
            power::enter_standby(request.duration);
        }

        watchdog::checkin();
        Timer::after(LOOP_PERIOD).await;
        step = runner.step().await;
    }
}

//! Hardware abstraction and peripheral initialization.
//!
//! This module defines the pin mappings and peripheral initialization
//! for the STM32F205 cellular board (u-blox SARA modem on USART3).
//!
//! # Pin Assignments
//!
//! ## Test Selection Switch (pull-up, read once at boot)
//! - **PB7**: D0 - bit 0
//! - **PB6**: D1 - bit 1
//! - **PB5**: D2 - bit 2
//! - **PB4**: D3 - bit 3
//!
//! ## Sleep Wake Input (pull-up, falling edge, EXTI14)
//! - **PA14**: D6 - shared with SWCLK, so logs go out on USART1 and stop
//!   sleep tests run without a probe attached
//!
//! ## Log Output
//! - **PA9**: TX - USART1_TX, defmt frames (`log-serial` feature)
//!
//! ## Fuel Gauge (MAX17043, I2C3)
//! - **PA8**: I2C3_SCL
//! - **PC9**: I2C3_SDA
//!
//! ## Cellular Modem
//! - **PB10**: USART3_TX to modem RXD
//! - **PB11**: USART3_RX from modem TXD
//! - **PC3**: PWR_UC - Active-low power key
//! - **PC4**: RESET_UC - Active-low modem reset
//! - **PB12**: LVLOE_UC - Active-low level shifter enable
//!
//! ## Low Power & RTC
//! - **PC14**: OSC32_IN - 32.768 kHz crystal input
//! - **PC15**: OSC32_OUT - 32.768 kHz crystal output

use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::i2c::{self, I2c};
#[cfg(feature = "log-serial")]
use embassy_stm32::{mode::Blocking, usart::UartTx};
use embassy_stm32::usart::{self, BufferedUart};
use embassy_stm32::{bind_interrupts, peripherals};
use sleep_probe_core::config_switch::SWITCH_BITS;
use static_cell::StaticCell;

use crate::fuel_gauge::FuelGauge;
use crate::modem::Modem;

/// Modem UART baud rate after power-on (autobauding is not used).
const MODEM_BAUD: u32 = 115_200;

/// Log UART baud rate.
#[cfg(feature = "log-serial")]
const LOG_BAUD: u32 = 115_200;

const MODEM_TX_BUF_LEN: usize = 256;
const MODEM_RX_BUF_LEN: usize = 512;

bind_interrupts!(struct Irqs {
    USART3 => usart::BufferedInterruptHandler<peripherals::USART3>;
});

static MODEM_TX_BUF: StaticCell<[u8; MODEM_TX_BUF_LEN]> = StaticCell::new();
static MODEM_RX_BUF: StaticCell<[u8; MODEM_RX_BUF_LEN]> = StaticCell::new();

/// Top-level peripheral container for the probe.
///
/// Owns the switch inputs, the wake pin, the modem and fuel gauge
/// drivers and the log UART.
pub struct Peripherals {
    /// Test selection switch, D0 first
    pub config_switch: [Input<'static>; SWITCH_BITS],
    /// Stop sleep wake input; [`crate::power`] routes it to EXTI14
    pub wake_pin: Input<'static>,
    /// Cellular modem driver
    pub modem: Modem,
    /// Battery fuel gauge
    pub fuel_gauge: FuelGauge,
    /// Transmit-only UART for defmt frames
    #[cfg(feature = "log-serial")]
    pub log_uart: UartTx<'static, Blocking>,
}

impl Peripherals {
    /// Initializes all peripherals from STM32 peripheral singleton.
    ///
    /// # Initial GPIO States
    ///
    /// Wake input:
    /// - PA14 (D6): Input with pull-up, idle high
    ///
    /// Modem control:
    /// - PC3 (PWR_UC): High (power key released)
    /// - PC4 (RESET_UC): High (not in reset)
    /// - PB12 (LVLOE_UC): High (level shifter disabled until power-on)
    ///
    /// # Arguments
    ///
    /// * `p` - STM32 peripheral singleton from embassy_stm32::init()
    pub fn new(p: embassy_stm32::Peripherals) -> Self {
        let mut uart_config = usart::Config::default();
        uart_config.baudrate = MODEM_BAUD;

        let uart = BufferedUart::new(
            p.USART3,
            p.PB11,
            p.PB10,
            MODEM_TX_BUF.init([0; MODEM_TX_BUF_LEN]),
            MODEM_RX_BUF.init([0; MODEM_RX_BUF_LEN]),
            Irqs,
            uart_config,
        )
        .unwrap();

        #[cfg(feature = "log-serial")]
        let log_uart = {
            let mut log_config = usart::Config::default();
            log_config.baudrate = LOG_BAUD;
            UartTx::new_blocking(p.USART1, p.PA9, log_config).unwrap()
        };

        let fuel_gauge = FuelGauge::new(I2c::new_blocking(
            p.I2C3,
            p.PA8,
            p.PC9,
            i2c::Config::default(),
        ));

        Self {
            config_switch: [
                Input::new(p.PB7, Pull::Up),
                Input::new(p.PB6, Pull::Up),
                Input::new(p.PB5, Pull::Up),
                Input::new(p.PB4, Pull::Up),
            ],
            wake_pin: Input::new(p.PA14, Pull::Up),
            modem: Modem::new(
                uart,
                Output::new(p.PC3, Level::High, Speed::Low),
                Output::new(p.PC4, Level::High, Speed::Low),
                Output::new(p.PB12, Level::High, Speed::Low),
            ),
            fuel_gauge,
            #[cfg(feature = "log-serial")]
            log_uart,
        }
    }
}

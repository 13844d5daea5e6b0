//! Scenario logic of the cellular sleep-mode probe.
//!
//! The firmware selects a test scenario from a 4-bit switch at boot, brings
//! up the cellular link and then runs the scenario (stop sleep, deep sleep,
//! soft power-off or a publish loop) while logging the modem's data usage
//! counters. This crate holds everything that does not touch registers, so
//! it builds and tests on the host:
//!
//! - [`scenario`] - the scenario table and the plan each scenario runs
//! - [`runner`] - boot, main loop iteration and one-shot dispatch
//! - [`board`] - the trait the firmware implements for its hardware
//! - [`at`] - u-blox AT response parsing
//! - [`link`] - cellular link bring-up over the modem
//! - [`fuel_gauge`] - fuel gauge sleep command for soft power-off
//! - [`connection`], [`watchdog`], [`boot_cause`] - supporting monitors

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod at;
pub mod board;
pub mod boot_cause;
pub mod cadence;
pub mod config_switch;
pub mod connection;
pub mod error;
pub mod fuel_gauge;
pub mod link;
pub mod rtc_time;
pub mod runner;
pub mod scenario;
pub mod settings;
pub mod usage;
pub mod watchdog;

pub use board::{Board, Publish, WakeReason};
pub use error::Error;
pub use link::{Link, LinkModem, LinkState};
pub use runner::{Runner, Step};
pub use scenario::{PowerDown, PowerDownMode, Scenario, StopSleep};
pub use settings::Settings;
pub use usage::DataUsage;

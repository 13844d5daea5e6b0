//! Power management: boot cause and the MCU low-power modes.
//!
//! # Modes
//!
//! - **Stop**: [`enter_stop`] halts the core and its clocks with RAM kept.
//!   The RTC wakeup timer (EXTI line 22) or a falling edge on D6 (EXTI line
//!   14) ends it and execution continues after the call.
//! - **Deep**: [`enter_standby`]; the modem stays registered when network
//!   standby is requested, otherwise it is powered off first
//! - **Soft power-off**: modem powered off and fuel gauge put to sleep,
//!   then STANDBY
//!
//! STANDBY wakes through reset, so the boot cause then reads as
//! [`BootCause::StandbyWake`]. Both wakeup timers run from the 32.768 kHz
//! LSE through ck_spre (1 Hz).
//!
//! # Safety
//!
//! This module accesses PWR, RCC, RTC, EXTI and SYSCFG registers directly.

use embassy_stm32::pac;
use embassy_stm32::pac::pwr::vals::Pdds;
use embassy_time::Duration;
use sleep_probe_core::boot_cause::BootCause;
use sleep_probe_core::{Link, PowerDown, WakeReason, rtc_time};

use crate::fuel_gauge::FuelGauge;
use crate::network::{LINK, SharedModem};

/// RTC write protection unlock sequence.
const RTC_WPR_KEYS: [u8; 2] = [0xCA, 0x53];
/// Any other value locks the RTC registers again.
const RTC_WPR_LOCK: u8 = 0xFF;

/// EXTI line of the D6 wake pin (PA14).
const WAKE_PIN_LINE: usize = 14;
/// SYSCFG_EXTICR port code of GPIOA.
const WAKE_PIN_PORT: u8 = 0;
/// EXTI line wired to the RTC wakeup timer.
const RTC_WAKEUP_LINE: usize = 22;

/// How a stop sleep ended.
pub struct StopWake {
    pub reason: WakeReason,
    /// Time spent in STOP, which the tick timer did not count.
    pub slept: Duration,
}

/// Reads and clears the reset and standby flags.
pub fn take_boot_cause() -> BootCause {
    let rcc = pac::RCC;
    let pwr = pac::PWR;

    let cause = BootCause::decode(rcc.csr().read().0, pwr.csr().read().0);

    rcc.csr().modify(|w| w.set_rmvf(true));
    pwr.cr().modify(|w| w.set_csbf(true));

    cause
}

/// Switches off what the power-down does not keep running.
///
/// # Arguments
///
/// * `request` - The power-down about to be entered
/// * `modem` - Shared modem, powered off unless kept in network standby
/// * `fuel_gauge` - Put to sleep for soft power-off
pub async fn prepare_power_down(
    request: &PowerDown,
    modem: &SharedModem,
    fuel_gauge: &mut FuelGauge,
) {
    if !request.keeps_radio() {
        LINK.hold_radio(true);
        modem.lock().await.power_off().await;
        LINK.set_link(Link::Off);
    }

    if request.sleeps_fuel_gauge() {
        match fuel_gauge.set_sleep(true) {
            Ok(()) => defmt::info!("fuel gauge asleep"),
            Err(error) => defmt::warn!("fuel gauge sleep failed: {}", error),
        }
    }
}

/// Enters STANDBY for `duration`. Execution resumes from reset.
pub fn enter_standby(duration: Duration) -> ! {
    defmt::info!("entering standby for {} s", duration.as_secs());

    arm_rtc_wakeup(duration);

    // Clear the wakeup flag, then select STANDBY for deep sleep
    pac::PWR.cr().modify(|w| {
        w.set_cwuf(true);
        w.set_pdds(Pdds::STANDBY_MODE);
    });

    let mut core = unsafe { cortex_m::Peripherals::steal() };
    core.SCB.set_sleepdeep();

    loop {
        cortex_m::asm::dsb();
        cortex_m::asm::wfi();
    }
}

/// Enters STOP until the wake pin falls or `timeout` elapses.
///
/// Runs with interrupts masked: the EXTI lines are set up as events, so
/// WFE wakes the core without any handler running. STOP always wakes on
/// the HSI; the oscillators and system clock in use before are restored
/// before interrupts are unmasked again.
///
/// # Arguments
///
/// * `timeout` - Sleep length, rounded to whole seconds (at least 1 s)
pub fn enter_stop(timeout: Duration) -> StopWake {
    cortex_m::interrupt::free(|_| {
        let clock_control = pac::RCC.cr().read();
        let clock_config = pac::RCC.cfgr().read();
        let started = rtc_seconds();

        arm_rtc_wakeup(timeout);
        arm_wake_lines();

        // Regulator in low-power mode while stopped
        pac::PWR.cr().modify(|w| {
            w.set_cwuf(true);
            w.set_pdds(Pdds::STOP_MODE);
            w.set_lpds(true);
        });

        let mut core = unsafe { cortex_m::Peripherals::steal() };
        core.SCB.set_sleepdeep();

        let reason = loop {
            cortex_m::asm::dsb();
            cortex_m::asm::wfe();
            if pac::RTC.isr().read().wutf() {
                break WakeReason::Timer;
            }
            if pac::EXTI.pr(0).read().line(WAKE_PIN_LINE) {
                break WakeReason::Pin;
            }
        };

        core.SCB.clear_sleepdeep();
        restore_clocks(clock_control, clock_config);
        disarm_wake_lines();
        disarm_rtc_wakeup();

        StopWake {
            reason,
            slept: rtc_time::elapsed(started, rtc_seconds()),
        }
    })
}

/// Falling edge on D6 and the RTC wakeup timer as wakeup events.
fn arm_wake_lines() {
    let exti = pac::EXTI;

    pac::RCC.apb2enr().modify(|w| w.set_syscfgen(true));
    pac::SYSCFG
        .exticr(WAKE_PIN_LINE / 4)
        .modify(|w| w.set_exti(WAKE_PIN_LINE % 4, WAKE_PIN_PORT));

    exti.ftsr(0).modify(|w| w.set_line(WAKE_PIN_LINE, true));
    exti.rtsr(0).modify(|w| w.set_line(WAKE_PIN_LINE, false));
    exti.rtsr(0).modify(|w| w.set_line(RTC_WAKEUP_LINE, true));
    exti.pr(0).write(|w| {
        w.set_line(WAKE_PIN_LINE, true);
        w.set_line(RTC_WAKEUP_LINE, true);
    });
    // The pin line also latches its pending bit; its NVIC line stays disabled.
    exti.imr(0).modify(|w| w.set_line(WAKE_PIN_LINE, true));
    exti.emr(0).modify(|w| {
        w.set_line(WAKE_PIN_LINE, true);
        w.set_line(RTC_WAKEUP_LINE, true);
    });
}

fn disarm_wake_lines() {
    let exti = pac::EXTI;

    exti.imr(0).modify(|w| w.set_line(WAKE_PIN_LINE, false));
    exti.emr(0).modify(|w| {
        w.set_line(WAKE_PIN_LINE, false);
        w.set_line(RTC_WAKEUP_LINE, false);
    });
    exti.pr(0).write(|w| {
        w.set_line(WAKE_PIN_LINE, true);
        w.set_line(RTC_WAKEUP_LINE, true);
    });
}

/// Restarts the oscillators STOP switched off and selects the saved system
/// clock again.
fn restore_clocks(clock_control: pac::rcc::regs::Cr, clock_config: pac::rcc::regs::Cfgr) {
    let rcc = pac::RCC;

    if clock_control.hseon() {
        rcc.cr().modify(|w| w.set_hseon(true));
        while !rcc.cr().read().hserdy() {}
    }
    if clock_control.pllon() {
        rcc.cr().modify(|w| w.set_pllon(true));
        while !rcc.cr().read().pllrdy() {}
    }

    let source = clock_config.sw();
    rcc.cfgr().modify(|w| w.set_sw(source));
    while rcc.cfgr().read().sws().to_bits() != source.to_bits() {}
}

/// Programs the RTC wakeup timer to fire once after `duration`.
///
/// With ck_spre as clock the period is (WUT + 1) seconds.
fn arm_rtc_wakeup(duration: Duration) {
    let rtc = pac::RTC;
    let wut = u16::try_from(duration.as_secs().saturating_sub(1)).unwrap_or(u16::MAX);

    unlock_rtc();

    // WUTR is only writable once the timer is stopped and WUTWF is set
    rtc.cr().modify(|w| w.set_wute(false));
    while !rtc.isr().read().wutwf() {}

    rtc.wutr().write(|w| w.set_wut(wut));
    rtc.isr().modify(|w| w.set_wutf(false));
    rtc.cr().modify(|w| {
        w.set_wucksel(pac::rtc::vals::Wucksel::CLOCKSPARE);
        w.set_wutie(true);
        w.set_wute(true);
    });

    lock_rtc();
}

fn disarm_rtc_wakeup() {
    let rtc = pac::RTC;

    unlock_rtc();
    rtc.cr().modify(|w| {
        w.set_wutie(false);
        w.set_wute(false);
    });
    rtc.isr().modify(|w| w.set_wutf(false));
    lock_rtc();
}

/// Time of day from the RTC calendar.
///
/// The shadow registers are resynchronized first, since they are stale
/// after STOP.
fn rtc_seconds() -> u32 {
    let rtc = pac::RTC;

    unlock_rtc();
    rtc.isr().modify(|w| w.set_rsf(false));
    lock_rtc();
    while !rtc.isr().read().rsf() {}

    let tr = rtc.tr().read().0;
    // Reading TR locks the date shadow register until DR is read
    let _ = rtc.dr().read();
    rtc_time::seconds_of_day(tr)
}

fn unlock_rtc() {
    // Backup domain write access; the RCC setup leaves it enabled
    pac::PWR.cr().modify(|w| w.set_dbp(true));
    for key in RTC_WPR_KEYS {
        pac::RTC.wpr().write(|w| w.set_key(key));
    }
}

fn lock_rtc() {
    pac::RTC.wpr().write(|w| w.set_key(RTC_WPR_LOCK));
}

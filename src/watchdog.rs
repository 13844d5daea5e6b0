//! Application watchdog task.
//!
//! The main loop checks in once per iteration. If it stops doing so for
//! longer than the configured timeout, the device is reset. Stop sleep
//! pauses the watchdog so a long sleep does not count as a stall.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embassy_time::{Duration, Instant, Timer};
use sleep_probe_core::watchdog::AppWatchdog;

/// How often the watchdog task looks at the last check-in.
const CHECK_PERIOD: Duration = Duration::from_secs(1);

static WATCHDOG: Mutex<CriticalSectionRawMutex, RefCell<Option<AppWatchdog>>> =
    Mutex::new(RefCell::new(None));

fn with_watchdog(f: impl FnOnce(&mut AppWatchdog)) {
    WATCHDOG.lock(|watchdog| {
        if let Some(watchdog) = watchdog.borrow_mut().as_mut() {
            f(watchdog);
        }
    });
}

pub fn checkin() {
    with_watchdog(|watchdog| watchdog.checkin(Instant::now()));
}

pub fn pause() {
    with_watchdog(AppWatchdog::pause);
}

pub fn resume() {
    with_watchdog(|watchdog| watchdog.resume(Instant::now()));
}

/// Arms the watchdog and resets the device when it expires.
#[embassy_executor::task]
pub async fn watchdog_task(timeout: Duration) {
    WATCHDOG.lock(|watchdog| {
        watchdog.replace(Some(AppWatchdog::new(timeout, Instant::now())));
    });
    defmt::info!("application watchdog armed, timeout {} ms", timeout.as_millis());

    loop {
        Timer::after(CHECK_PERIOD).await;
        let expired = WATCHDOG.lock(|watchdog| {
            watchdog
                .borrow()
                .as_ref()
                .is_some_and(|watchdog| watchdog.expired(Instant::now()))
        });
        if expired {
            defmt::error!("main loop stalled, resetting");
            cortex_m::peripheral::SCB::sys_reset();
        }
    }
}

//! Time of day from the RTC calendar, used to measure stop sleeps.
//!
//! The firmware's tick timer does not count in stop mode, so the time spent
//! asleep is taken from the RTC time register before and after.

use embassy_time::Duration;

const SECS_PER_DAY: u32 = 24 * 60 * 60;

/// Seconds since midnight from a raw `RTC_TR` value (BCD, 24-hour format).
pub fn seconds_of_day(tr: u32) -> u32 {
    let digit = |shift: u32, mask: u32| (tr >> shift) & mask;
    let hours = digit(20, 0x3) * 10 + digit(16, 0xF);
    let minutes = digit(12, 0x7) * 10 + digit(8, 0xF);
    let seconds = digit(4, 0x7) * 10 + digit(0, 0xF);
    hours * 3600 + minutes * 60 + seconds
}

/// Time between two readings, wrapping over midnight.
pub fn elapsed(start: u32, end: u32) -> Duration {
    let secs = (end + SECS_PER_DAY - start % SECS_PER_DAY) % SECS_PER_DAY;
    Duration::from_secs(u64::from(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_bcd_time() {
        // 13:45:27
        assert_eq!(seconds_of_day(0x0013_4527), 13 * 3600 + 45 * 60 + 27);
        assert_eq!(seconds_of_day(0x0023_5959), SECS_PER_DAY - 1);
        assert_eq!(seconds_of_day(0), 0);
    }

    #[test]
    fn elapsed_wraps_over_midnight() {
        let before = seconds_of_day(0x0023_5950);
        let after = seconds_of_day(0x0000_0020);
        assert_eq!(elapsed(before, after), Duration::from_secs(30));
        assert_eq!(elapsed(100, 1900), Duration::from_secs(1800));
        assert_eq!(elapsed(5, 5), Duration::from_secs(0));
    }
}

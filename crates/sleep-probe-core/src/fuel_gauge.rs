//! MAX17043 fuel gauge sleep control.
//!
//! Setting the SLEEP bit (bit 7 of the CONFIG register's low byte) stops
//! the gauge's ADC and drops it to its sleep current. The remaining CONFIG
//! bits (RCOMP, alert threshold) are written back as read.

/// 7-bit I2C address.
pub const ADDRESS: u8 = 0x36;
/// CONFIG register, MSB first.
pub const CONFIG_REGISTER: u8 = 0x0C;

const SLEEP_BIT: u8 = 0x80;

/// Register write that sets or clears SLEEP in `config`.
pub fn config_write(config: [u8; 2], sleep: bool) -> [u8; 3] {
    let [msb, lsb] = config;
    let lsb = if sleep {
        lsb | SLEEP_BIT
    } else {
        lsb & !SLEEP_BIT
    };
    [CONFIG_REGISTER, msb, lsb]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_sets_only_the_sleep_bit() {
        // Power-on default CONFIG: RCOMP 0x97, alert at 4 %.
        assert_eq!(config_write([0x97, 0x1C], true), [0x0C, 0x97, 0x9C]);
        assert_eq!(config_write([0x97, 0x9C], true), [0x0C, 0x97, 0x9C]);
    }

    #[test]
    fn wake_keeps_alert_settings() {
        assert_eq!(config_write([0x97, 0xBF], false), [0x0C, 0x97, 0x3F]);
    }
}

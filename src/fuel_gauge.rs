//! MAX17043 fuel gauge on I2C3.
//!
//! The gauge keeps sampling the battery unless told to sleep; soft
//! power-off puts it to sleep and the next boot wakes it again.

use embassy_stm32::i2c::{Error, I2c};
use embassy_stm32::mode::Blocking;
use sleep_probe_core::fuel_gauge::{self, ADDRESS, CONFIG_REGISTER};

pub struct FuelGauge {
    i2c: I2c<'static, Blocking>,
}

impl FuelGauge {
    pub fn new(i2c: I2c<'static, Blocking>) -> Self {
        Self { i2c }
    }

    /// Sets or clears the gauge's SLEEP bit, keeping the rest of CONFIG.
    ///
    /// # Arguments
    ///
    /// * `sleep` - `true` to stop the gauge, `false` to resume sampling
    pub fn set_sleep(&mut self, sleep: bool) -> Result<(), Error> {
        let mut config = [0u8; 2];
        self.i2c
            .blocking_write_read(ADDRESS, &[CONFIG_REGISTER], &mut config)?;
        self.i2c
            .blocking_write(ADDRESS, &fuel_gauge::config_write(config, sleep))
    }
}

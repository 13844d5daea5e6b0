//! Why the firmware is starting, decoded from the reset and power flags.

/// RCC_CSR reset flags.
const LPWRRSTF: u32 = 1 << 31;
const WWDGRSTF: u32 = 1 << 30;
const IWDGRSTF: u32 = 1 << 29;
const SFTRSTF: u32 = 1 << 28;
const PORRSTF: u32 = 1 << 27;
const PINRSTF: u32 = 1 << 26;
const BORRSTF: u32 = 1 << 25;

/// PWR_CSR standby flag.
const SBF: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootCause {
    /// Woke from standby (deep sleep or soft power-off).
    StandbyWake,
    IndependentWatchdog,
    WindowWatchdog,
    LowPowerReset,
    /// `SCB::sys_reset`, including application watchdog resets.
    Software,
    PowerOn,
    BrownOut,
    PinReset,
    Unknown,
}

impl BootCause {
    /// Decodes the raw RCC_CSR and PWR_CSR values read at boot.
    ///
    /// Standby wake takes priority, then the most specific reset flag.
    /// Power-on also raises the pin and brown-out flags.
    pub fn decode(rcc_csr: u32, pwr_csr: u32) -> Self {
        if pwr_csr & SBF != 0 {
            return Self::StandbyWake;
        }
        [
            (IWDGRSTF, Self::IndependentWatchdog),
            (WWDGRSTF, Self::WindowWatchdog),
            (LPWRRSTF, Self::LowPowerReset),
            (SFTRSTF, Self::Software),
            (PORRSTF, Self::PowerOn),
            (BORRSTF, Self::BrownOut),
            (PINRSTF, Self::PinReset),
        ]
        .into_iter()
        .find(|(flag, _)| rcc_csr & flag != 0)
        .map_or(Self::Unknown, |(_, cause)| cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standby_flag_wins() {
        assert_eq!(BootCause::decode(PINRSTF, SBF), BootCause::StandbyWake);
    }

    #[test]
    fn power_on_hides_pin_and_brown_out() {
        assert_eq!(
            BootCause::decode(PORRSTF | PINRSTF | BORRSTF, 0),
            BootCause::PowerOn
        );
    }

    #[test]
    fn software_reset_with_pin_flag() {
        assert_eq!(BootCause::decode(SFTRSTF | PINRSTF, 0), BootCause::Software);
        assert_eq!(BootCause::decode(PINRSTF, 0), BootCause::PinReset);
    }

    #[test]
    fn no_flags_is_unknown() {
        assert_eq!(BootCause::decode(0, 0), BootCause::Unknown);
    }
}

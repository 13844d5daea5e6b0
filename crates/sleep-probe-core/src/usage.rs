//! Cellular data usage counters and change-only reporting.

/// Byte counters for the active PDP context, as reported by the modem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataUsage {
    /// PDP context id.
    pub cid: u8,
    pub tx_session: u32,
    pub rx_session: u32,
    pub tx_total: u32,
    pub rx_total: u32,
}

impl DataUsage {
    pub fn total(&self) -> u64 {
        u64::from(self.tx_total) + u64::from(self.rx_total)
    }
}

/// Remembers the last logged total so unchanged usage is not logged again.
#[derive(Debug, Default)]
pub struct UsageReporter {
    last_total: u64,
}

impl UsageReporter {
    pub const fn new() -> Self {
        Self { last_total: 0 }
    }

    pub const fn last_total(&self) -> u64 {
        self.last_total
    }

    /// Returns the new total when it differs from the last one reported.
    pub fn observe(&mut self, usage: &DataUsage) -> Option<u64> {
        let total = usage.total();
        if total == self.last_total {
            return None;
        }
        self.last_total = total;
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(tx: u32, rx: u32) -> DataUsage {
        DataUsage {
            cid: 1,
            tx_total: tx,
            rx_total: rx,
            ..DataUsage::default()
        }
    }

    #[test]
    fn never_reports_the_same_total_twice_in_a_row() {
        let mut reporter = UsageReporter::new();
        let samples = [
            usage(0, 0),
            usage(100, 20),
            usage(100, 20),
            usage(120, 0),
            usage(140, 20),
            usage(140, 20),
            usage(141, 20),
        ];
        let reported: Vec<u64> = samples.iter().filter_map(|s| reporter.observe(s)).collect();
        assert_eq!(reported, [120, 160, 161]);
        for pair in reported.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn zero_usage_is_not_reported_at_start() {
        let mut reporter = UsageReporter::new();
        assert_eq!(reporter.observe(&usage(0, 0)), None);
        assert_eq!(reporter.last_total(), 0);
    }

    #[test]
    fn total_does_not_overflow_u32() {
        assert_eq!(usage(u32::MAX, 1).total(), u64::from(u32::MAX) + 1);
    }
}

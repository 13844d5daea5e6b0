use core::fmt;

/// Failure of a board operation (publish, usage query).
///
/// None of these change the scenario's control flow; they end up in a log
/// line or are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The modem did not answer in time, or no acknowledgement arrived.
    Timeout,
    /// The modem answered `ERROR` / `+CME ERROR`.
    Rejected,
    /// No cloud session is up.
    NotConnected,
    /// The modem is in use by another exchange.
    Busy,
    /// A response could not be parsed.
    Malformed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Timeout => "timed out",
            Self::Rejected => "rejected by modem",
            Self::NotConnected => "not connected",
            Self::Busy => "modem busy",
            Self::Malformed => "malformed response",
        };
        f.write_str(text)
    }
}

impl core::error::Error for Error {}

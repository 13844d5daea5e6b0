//! Parsing of u-blox SARA AT responses.
//!
//! The firmware reads the modem one line at a time and hands each line to
//! [`classify`]; information lines are then decoded by the `parse_*`
//! helpers. None of these allocate.

use crate::usage::DataUsage;

/// One response line, stripped of its line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Empty,
    Ok,
    Error,
    /// `+CME ERROR: <text>`
    CmeError(&'a str),
    /// Information text or an unsolicited result code.
    Info(&'a str),
}

pub fn classify(line: &str) -> Line<'_> {
    let line = line.trim();
    match line {
        "" => Line::Empty,
        "OK" => Line::Ok,
        "ERROR" => Line::Error,
        _ => match line.strip_prefix("+CME ERROR:") {
            Some(text) => Line::CmeError(text.trim()),
            None => Line::Info(line),
        },
    }
}

/// Network registration status (`<stat>` of `+CREG`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Registration {
    NotRegistered,
    Home,
    Searching,
    Denied,
    Unknown,
    Roaming,
}

impl Registration {
    fn from_stat(stat: u8) -> Option<Self> {
        Some(match stat {
            0 => Self::NotRegistered,
            1 => Self::Home,
            2 => Self::Searching,
            3 => Self::Denied,
            4 => Self::Unknown,
            5 => Self::Roaming,
            _ => return None,
        })
    }

    pub fn is_registered(self) -> bool {
        matches!(self, Self::Home | Self::Roaming)
    }
}

/// Splits `+TAG: a,b,c` into its fields.
fn fields<'a>(line: &'a str, tag: &str) -> Option<impl Iterator<Item = &'a str>> {
    let rest = line.trim().strip_prefix(tag)?.strip_prefix(':')?;
    Some(rest.split(',').map(str::trim))
}

/// `+CREG: <n>,<stat>[,...]` (query) or `+CREG: <stat>[,...]` (URC).
pub fn parse_registration(line: &str) -> Option<Registration> {
    let mut fields = fields(line, "+CREG")?;
    let first: u8 = fields.next()?.parse().ok()?;
    let stat = match fields.next().map(str::parse::<u8>) {
        Some(Ok(stat)) => stat,
        _ => first,
    };
    Registration::from_stat(stat)
}

/// `+UPSND: <profile>,8,<status>`: whether the PDP context of a packet
/// switched data profile is active.
pub fn parse_psd_active(line: &str) -> Option<bool> {
    let mut fields = fields(line, "+UPSND")?;
    let _profile = fields.next()?;
    if fields.next()? != "8" {
        return None;
    }
    match fields.next()? {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

/// `+USOCR: <socket>`
pub fn parse_socket(line: &str) -> Option<u8> {
    fields(line, "+USOCR")?.next()?.parse().ok()
}

/// `+UUSORF: <socket>,<length>`: data is waiting on a UDP socket.
pub fn parse_read_ready(line: &str) -> Option<(u8, usize)> {
    let mut fields = fields(line, "+UUSORF")?;
    let socket = fields.next()?.parse().ok()?;
    let length = fields.next()?.parse().ok()?;
    Some((socket, length))
}

/// `+UGCNTRD: <cid>,<sent_sess>,<recv_sess>,<sent_total>,<recv_total>`
pub fn parse_data_usage(line: &str) -> Option<DataUsage> {
    let mut fields = fields(line, "+UGCNTRD")?;
    let mut next = || fields.next()?.parse::<u32>().ok();
    let cid = u8::try_from(next()?).ok()?;
    Some(DataUsage {
        cid,
        tx_session: next()?,
        rx_session: next()?,
        tx_total: next()?,
        rx_total: next()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_final_results() {
        assert_eq!(classify("OK\r"), Line::Ok);
        assert_eq!(classify("ERROR"), Line::Error);
        assert_eq!(
            classify("+CME ERROR: SIM not inserted"),
            Line::CmeError("SIM not inserted")
        );
        assert_eq!(classify("  \r"), Line::Empty);
        assert_eq!(classify("+CGATT: 1"), Line::Info("+CGATT: 1"));
    }

    #[test]
    fn registration_query_and_urc() {
        assert_eq!(parse_registration("+CREG: 0,5"), Some(Registration::Roaming));
        assert_eq!(parse_registration("+CREG: 0,2"), Some(Registration::Searching));
        assert_eq!(parse_registration("+CREG: 1"), Some(Registration::Home));
        assert_eq!(
            parse_registration("+CREG: 5,\"1A2B\",\"00C3D4\""),
            Some(Registration::Roaming)
        );
        assert_eq!(parse_registration("+CREG: 0,9"), None);
        assert_eq!(parse_registration("+CGREG: 0,1"), None);
        assert!(Registration::Home.is_registered());
        assert!(!Registration::Denied.is_registered());
    }

    #[test]
    fn psd_status() {
        assert_eq!(parse_psd_active("+UPSND: 0,8,1"), Some(true));
        assert_eq!(parse_psd_active("+UPSND: 0,8,0"), Some(false));
        assert_eq!(parse_psd_active("+UPSND: 0,0,\"10.1.2.3\""), None);
    }

    #[test]
    fn socket_and_read_ready() {
        assert_eq!(parse_socket("+USOCR: 3"), Some(3));
        assert_eq!(parse_read_ready("+UUSORF: 0,12"), Some((0, 12)));
        assert_eq!(parse_read_ready("+UUSORF: 0"), None);
    }

    #[test]
    fn data_usage_counters() {
        assert_eq!(
            parse_data_usage("+UGCNTRD: 1,120,340,5120,20480"),
            Some(DataUsage {
                cid: 1,
                tx_session: 120,
                rx_session: 340,
                tx_total: 5120,
                rx_total: 20480,
            })
        );
        assert_eq!(parse_data_usage("+UGCNTRD: 1,120,340,5120"), None);
        assert_eq!(parse_data_usage("+UGCNTRD: 300,0,0,0,0"), None);
    }
}

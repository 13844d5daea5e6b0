//! Connection check: turns polled link status into transition events.

use embassy_time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    Offline,
    CellularReady,
    CloudConnected,
}

/// A change in link state. `after` is the time spent in the previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionEvent {
    CellularReady { after: Duration },
    CloudConnected { after: Duration },
    CloudLost { after: Duration },
    CellularLost { after: Duration },
}

#[derive(Debug)]
pub struct ConnectionCheck {
    state: LinkStatus,
    since: Instant,
}

impl ConnectionCheck {
    pub const fn new(now: Instant) -> Self {
        Self {
            state: LinkStatus::Offline,
            since: now,
        }
    }

    /// Restarts tracking from the offline state.
    pub fn setup(&mut self, now: Instant) {
        self.state = LinkStatus::Offline;
        self.since = now;
    }

    /// Records the current status; returns an event when the state changed.
    pub fn poll(&mut self, now: Instant, cellular: bool, cloud: bool) -> Option<ConnectionEvent> {
        let next = if cloud {
            LinkStatus::CloudConnected
        } else if cellular {
            LinkStatus::CellularReady
        } else {
            LinkStatus::Offline
        };
        if next == self.state {
            return None;
        }

        let after = now.saturating_duration_since(self.since);
        let event = match (self.state, next) {
            (_, LinkStatus::CloudConnected) => ConnectionEvent::CloudConnected { after },
            (LinkStatus::Offline, LinkStatus::CellularReady) => ConnectionEvent::CellularReady { after },
            (LinkStatus::CloudConnected, LinkStatus::CellularReady) => ConnectionEvent::CloudLost { after },
            (_, LinkStatus::Offline) | (LinkStatus::CellularReady, LinkStatus::CellularReady) => {
                ConnectionEvent::CellularLost { after }
            }
        };
        self.state = next;
        self.since = now;
        Some(event)
    }
}

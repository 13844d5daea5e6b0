//! Cellular link bring-up and supervision.
//!
//! ```text
//! Off → PoweredOn → Registered → DataActive → Connected
//! ```
//!
//! [`LinkState::maintain`] runs one step per call and holds the modem only
//! for that step, so publishes and counter queries get the modem in
//! between. A failed step falls back to an earlier state and is retried on
//! the next call.
//!
//! A deep sleep with network standby restarts the firmware while the modem
//! stays on with its PDP context active and its socket open. Bring-up then
//! finds the modem already running, closes the sockets left behind and
//! keeps the active context instead of activating it again.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::error::Error;

/// Socket ids the modem hands out (u-blox SARA: 0..=6).
pub const MODEM_SOCKETS: u8 = 7;

const NO_SOCKET: u8 = u8::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Link {
    Off = 0,
    PoweredOn = 1,
    Registered = 2,
    DataActive = 3,
    Connected = 4,
}

impl Link {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Link::PoweredOn,
            2 => Link::Registered,
            3 => Link::DataActive,
            4 => Link::Connected,
            _ => Link::Off,
        }
    }
}

/// How the modem answered a power-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerOn {
    /// Switched on by the power key.
    Started,
    /// Was already running, e.g. kept in network standby across a reset.
    AlreadyOn,
}

/// The modem exchanges the link needs.
#[allow(async_fn_in_trait)]
pub trait LinkModem {
    fn is_powered(&self) -> bool;

    async fn power_on(&mut self) -> Result<PowerOn, Error>;

    /// Registered on the home network or roaming.
    async fn registered(&mut self) -> Result<bool, Error>;

    /// The PDP context of the data profile is active.
    async fn context_active(&mut self) -> Result<bool, Error>;

    async fn activate_context(&mut self) -> Result<(), Error>;

    /// Opens a UDP socket and returns its id.
    async fn open_socket(&mut self) -> Result<u8, Error>;

    async fn close_socket(&mut self, socket: u8) -> Result<(), Error>;
}

/// Link state shared between the link task and its users.
pub struct LinkState {
    link: AtomicU8,
    socket: AtomicU8,
    /// Set while the radio is deliberately off for a sleep.
    radio_held: AtomicBool,
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkState {
    pub const fn new() -> Self {
        Self {
            link: AtomicU8::new(Link::Off as u8),
            socket: AtomicU8::new(NO_SOCKET),
            radio_held: AtomicBool::new(false),
        }
    }

    pub fn link(&self) -> Link {
        Link::from_u8(self.link.load(Ordering::Acquire))
    }

    /// Sets the link state; anything below [`Link::Connected`] drops the
    /// socket.
    pub fn set_link(&self, link: Link) {
        if link < Link::Connected {
            self.socket.store(NO_SOCKET, Ordering::Release);
        }
        self.link.store(link as u8, Ordering::Release);
    }

    /// Socket of the cloud session, if connected.
    pub fn socket(&self) -> Option<u8> {
        match self.socket.load(Ordering::Acquire) {
            NO_SOCKET => None,
            socket => Some(socket),
        }
    }

    /// Keeps [`maintain`](Self::maintain) from touching the modem.
    pub fn hold_radio(&self, held: bool) {
        self.radio_held.store(held, Ordering::Release);
    }

    pub fn radio_held(&self) -> bool {
        self.radio_held.load(Ordering::Acquire)
    }

    /// Runs one bring-up or supervision step.
    ///
    /// # Arguments
    ///
    /// * `modem` - Shared modem; locked for the duration of the step
    pub async fn maintain<R: RawMutex, M: LinkModem>(&self, modem: &Mutex<R, M>) {
        if self.radio_held() {
            return;
        }
        let mut modem = modem.lock().await;
        // The lock may have been held by whoever just switched the radio off.
        if self.radio_held() {
            return;
        }

        let current = self.link();
        let next = self.advance(&mut *modem, current).await;
        if next != current {
            debug!("link {:?} -> {:?}", current, next);
        }
        self.set_link(next);
    }

    async fn advance<M: LinkModem>(&self, modem: &mut M, current: Link) -> Link {
        if current != Link::Off && !modem.is_powered() {
            return Link::Off;
        }

        let result = match current {
            Link::Off => start_modem(modem).await,
            Link::PoweredOn => modem.registered().await.map(|registered| {
                if registered {
                    Link::Registered
                } else {
                    Link::PoweredOn
                }
            }),
            Link::Registered => match modem.context_active().await {
                Ok(true) => Ok(Link::DataActive),
                Ok(false) => modem.activate_context().await.map(|()| Link::DataActive),
                Err(error) => Err(error),
            },
            Link::DataActive => modem.open_socket().await.map(|socket| {
                self.socket.store(socket, Ordering::Release);
                Link::Connected
            }),
            Link::Connected => match modem.context_active().await {
                Ok(true) => Ok(Link::Connected),
                Ok(false) => {
                    if let Some(socket) = self.socket() {
                        let _ = modem.close_socket(socket).await;
                    }
                    Ok(Link::Registered)
                }
                Err(error) => Err(error),
            },
        };

        match result {
            Ok(next) => next,
            Err(error) => {
                warn!("link step {:?} failed: {:?}", current, error);
                fallback(current, error)
            }
        }
    }
}

async fn start_modem<M: LinkModem>(modem: &mut M) -> Result<Link, Error> {
    if modem.power_on().await? == PowerOn::AlreadyOn {
        info!("modem already on, closing stale sockets");
        for socket in 0..MODEM_SOCKETS {
            // Sockets that are not open answer with an error.
            let _ = modem.close_socket(socket).await;
        }
    }
    Ok(Link::PoweredOn)
}

/// State to retry from after a failed step.
fn fallback(current: Link, error: Error) -> Link {
    match (current, error) {
        (_, Error::Timeout) => Link::Off,
        (Link::Connected | Link::DataActive, _) => Link::Registered,
        (Link::Registered, _) => Link::PoweredOn,
        (state, _) => state,
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;

    #[derive(Default)]
    struct SimModem {
        powered: bool,
        registered: bool,
        context_active: bool,
        open_sockets: Vec<u8>,
        power_ons: usize,
        activations: usize,
        time_out: bool,
    }

    impl SimModem {
        /// Modem left running in network standby by the previous boot.
        fn in_standby(stale_socket: u8) -> Self {
            Self {
                powered: true,
                registered: true,
                context_active: true,
                open_sockets: vec![stale_socket],
                ..Self::default()
            }
        }

        fn fail(&self) -> Result<(), Error> {
            if self.time_out {
                Err(Error::Timeout)
            } else {
                Ok(())
            }
        }
    }

    impl LinkModem for SimModem {
        fn is_powered(&self) -> bool {
            self.powered
        }

        async fn power_on(&mut self) -> Result<PowerOn, Error> {
            self.fail()?;
            self.power_ons += 1;
            let was_on = self.powered;
            self.powered = true;
            self.registered = true;
            Ok(if was_on {
                PowerOn::AlreadyOn
            } else {
                PowerOn::Started
            })
        }

        async fn registered(&mut self) -> Result<bool, Error> {
            self.fail()?;
            Ok(self.registered)
        }

        async fn context_active(&mut self) -> Result<bool, Error> {
            self.fail()?;
            Ok(self.context_active)
        }

        async fn activate_context(&mut self) -> Result<(), Error> {
            self.fail()?;
            self.activations += 1;
            if self.context_active {
                return Err(Error::Rejected);
            }
            self.context_active = true;
            Ok(())
        }

        async fn open_socket(&mut self) -> Result<u8, Error> {
            self.fail()?;
            let socket = (0..MODEM_SOCKETS)
                .find(|socket| !self.open_sockets.contains(socket))
                .ok_or(Error::Rejected)?;
            self.open_sockets.push(socket);
            Ok(socket)
        }

        async fn close_socket(&mut self, socket: u8) -> Result<(), Error> {
            self.fail()?;
            let open = self.open_sockets.len();
            self.open_sockets.retain(|&open| open != socket);
            if self.open_sockets.len() == open {
                Err(Error::Rejected)
            } else {
                Ok(())
            }
        }
    }

    fn bring_up(state: &LinkState, modem: &Mutex<NoopRawMutex, SimModem>, steps: usize) {
        for _ in 0..steps {
            block_on(state.maintain(modem));
        }
    }

    #[test]
    fn cold_start_walks_every_state() {
        let state = LinkState::new();
        let modem = Mutex::<NoopRawMutex, _>::new(SimModem::default());

        let mut seen = vec![state.link()];
        for _ in 0..4 {
            block_on(state.maintain(&modem));
            seen.push(state.link());
        }

        assert_eq!(
            seen,
            [
                Link::Off,
                Link::PoweredOn,
                Link::Registered,
                Link::DataActive,
                Link::Connected
            ]
        );
        assert_eq!(state.socket(), Some(0));
        assert_eq!(block_on(modem.lock()).activations, 1);
    }

    #[test]
    fn standby_wake_reuses_active_context() {
        let state = LinkState::new();
        let modem = Mutex::<NoopRawMutex, _>::new(SimModem::in_standby(0));

        bring_up(&state, &modem, 4);

        assert_eq!(state.link(), Link::Connected);
        let modem = block_on(modem.lock());
        assert_eq!(modem.power_ons, 1);
        assert_eq!(modem.activations, 0);
        assert_eq!(modem.open_sockets, [0]);
    }

    #[test]
    fn repeated_standby_wakes_do_not_leak_sockets() {
        let modem = Mutex::<NoopRawMutex, _>::new(SimModem::in_standby(3));

        for _ in 0..(usize::from(MODEM_SOCKETS) + 2) {
            // Every wake from deep sleep starts from a fresh state.
            let state = LinkState::new();
            bring_up(&state, &modem, 4);
            assert_eq!(state.link(), Link::Connected);
            assert_eq!(block_on(modem.lock()).open_sockets.len(), 1);
        }
    }

    #[test]
    fn lost_context_closes_the_socket() {
        let state = LinkState::new();
        let modem = Mutex::<NoopRawMutex, _>::new(SimModem::default());
        bring_up(&state, &modem, 4);

        block_on(modem.lock()).context_active = false;
        block_on(state.maintain(&modem));

        assert_eq!(state.link(), Link::Registered);
        assert_eq!(state.socket(), None);
        assert!(block_on(modem.lock()).open_sockets.is_empty());
    }

    #[test]
    fn timeouts_restart_from_off() {
        let state = LinkState::new();
        let modem = Mutex::<NoopRawMutex, _>::new(SimModem::default());
        bring_up(&state, &modem, 3);
        assert_eq!(state.link(), Link::DataActive);

        block_on(modem.lock()).time_out = true;
        block_on(state.maintain(&modem));
        assert_eq!(state.link(), Link::Off);
    }

    #[test]
    fn rejected_steps_fall_back_one_stage() {
        assert_eq!(fallback(Link::Connected, Error::Rejected), Link::Registered);
        assert_eq!(fallback(Link::DataActive, Error::Malformed), Link::Registered);
        assert_eq!(fallback(Link::Registered, Error::Rejected), Link::PoweredOn);
        assert_eq!(fallback(Link::PoweredOn, Error::Rejected), Link::PoweredOn);
        assert_eq!(fallback(Link::Registered, Error::Timeout), Link::Off);
    }

    #[test]
    fn unpowered_modem_drops_the_link() {
        let state = LinkState::new();
        let modem = Mutex::<NoopRawMutex, _>::new(SimModem::default());
        bring_up(&state, &modem, 4);

        block_on(modem.lock()).powered = false;
        block_on(state.maintain(&modem));
        assert_eq!(state.link(), Link::Off);
    }

    #[test]
    fn held_radio_is_left_off() {
        let state = LinkState::new();
        let modem = Mutex::<NoopRawMutex, _>::new(SimModem::default());
        state.hold_radio(true);
        bring_up(&state, &modem, 3);

        assert_eq!(state.link(), Link::Off);
        assert_eq!(block_on(modem.lock()).power_ons, 0);
    }

    #[test]
    fn radio_switched_off_while_waiting_for_the_modem_stays_off() {
        let state = &LinkState::new();
        let modem = &Mutex::<NoopRawMutex, _>::new(SimModem::default());
        bring_up(state, modem, 4);

        block_on(async {
            let mut sleeper = modem.lock().await;
            // The step starts while the sleeper still owns the modem.
            join(state.maintain(modem), async move {
                state.hold_radio(true);
                sleeper.powered = false;
                state.set_link(Link::Off);
                drop(sleeper);
            })
            .await;
        });

        assert_eq!(state.link(), Link::Off);
        let modem = block_on(modem.lock());
        assert!(!modem.powered);
        assert_eq!(modem.power_ons, 1);
    }
}

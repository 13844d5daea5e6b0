//! Scenario runner: boot, main loop iteration and one-shot dispatch.
//!
//! All mutable state of a test run lives in [`Runner`], built once at boot.
//! The firmware calls [`Runner::start`] and then [`Runner::step`] forever,
//! until a step asks for an irreversible power-down:
//!
//! ```text
//! NOT_CONNECTED -> CONNECTED(warming up) -> CONNECTED(fired)
//!                        ^                        |
//!                        +---- woke from stop ----+
//! ```
//!
//! Losing the connection clears the warm-up clock, so the one-shot only
//! runs after the warm-up window of one continuous connection.

use embassy_time::Instant;

use crate::board::{Board, Publish};
use crate::cadence::Cadence;
use crate::config_switch;
use crate::connection::ConnectionCheck;
use crate::scenario::{LoopAction, PowerDown, Scenario, SleepRequest, StopSleep};
use crate::settings::Settings;
use crate::usage::UsageReporter;


/// Outcome of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// The scenario wants a sleep that never returns; the caller must enter
    /// it and stop calling [`Runner::step`].
    PowerDown(PowerDown),
}

/// What a one-shot handler leaves behind.
enum Next {
    Continue,
    /// Woke from stop sleep; arm the scenario again.
    Rearm,
    PowerDown(PowerDown),
}

pub struct Runner<B> {
    board: B,
    settings: Settings,
    test_num: u8,
    scenario: Option<Scenario>,
    connection: ConnectionCheck,
    cloud_started: Option<Instant>,
    one_shot_fired: bool,
    report_cadence: Cadence,
    publish_cadence: Cadence,
    usage: UsageReporter,
}

impl<B: Board> Runner<B> {
    /// Reads the configuration switch and sets up the run state.
    pub fn new(mut board: B, settings: Settings) -> Self {
        let test_num = config_switch::decode(board.read_config_switch());
        let now = board.now();
        Self {
            board,
            test_num,
            scenario: Scenario::from_switch(test_num),
            connection: ConnectionCheck::new(now),
            cloud_started: None,
            one_shot_fired: false,
            report_cadence: Cadence::immediate(settings.report_period),
            publish_cadence: Cadence::starting_at(settings.publish_period, now),
            usage: UsageReporter::new(),
            settings,
        }
    }

    pub fn test_num(&self) -> u8 {
        self.test_num
    }

    pub fn scenario(&self) -> Option<Scenario> {
        self.scenario
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn usage(&self) -> &UsageReporter {
        &self.usage
    }

    /// Boot: either powers straight down (quick sleep scenario) or starts
    /// connecting.
    pub fn start(&mut self) -> Step {
        info!("setup called test_num={}", self.test_num);

        match self.scenario {
            Some(scenario) => {
                if let Some(power_down) = scenario.boot_power_down(&self.settings) {
                    info!("{}: powering down before connecting", scenario.name());
                    return Step::PowerDown(power_down);
                }
            }
            None => warn!("no scenario selected for test_num={}", self.test_num),
        }

        self.connection.setup(self.board.now());
        self.board.begin_connect();
        Step::Continue
    }

    /// One main loop iteration.
    pub async fn step(&mut self) -> Step {
        let cloud = self.board.cloud_connected();
        let cellular = self.board.cellular_ready();
        if let Some(event) = self.connection.poll(self.board.now(), cellular, cloud) {
            info!("connection {:?}", event);
        }

        if cloud {
            if let Some(power_down) = self.run_loop_action().await {
                return Step::PowerDown(power_down);
            }

            let now = self.board.now();
            let started = *self.cloud_started.get_or_insert(now);
            if !self.one_shot_fired
                && now.saturating_duration_since(started) >= self.settings.warm_up
            {
                self.one_shot_fired = true;
                match self.run_one_shot().await {
                    Next::Continue => {}
                    Next::Rearm => self.one_shot_fired = false,
                    Next::PowerDown(power_down) => return Step::PowerDown(power_down),
                }
            }
        } else {
            self.cloud_started = None;
        }

        if self.report_cadence.poll(self.board.now()) {
            self.report_usage().await;
        }

        Step::Continue
    }

    async fn run_loop_action(&mut self) -> Option<PowerDown> {
        let scenario = self.scenario?;
        match scenario.loop_action(&self.settings)? {
            LoopAction::PublishThenSleep { publish, sleep } => {
                info!("{}", scenario.name());
                self.publish_and_report(&publish).await;
                match sleep {
                    SleepRequest::Stop(stop) => {
                        self.stop_sleep(stop).await;
                        None
                    }
                    SleepRequest::PowerDown(power_down) => Some(power_down),
                }
            }
            LoopAction::PeriodicPublish(publish) => {
                if self.publish_cadence.poll(self.board.now()) {
                    self.publish_and_report(&publish).await;
                }
                None
            }
        }
    }

    async fn run_one_shot(&mut self) -> Next {
        let Some(scenario) = self.scenario else {
            return Next::Continue;
        };
        let Some(plan) = scenario.one_shot(&self.settings) else {
            return Next::Continue;
        };

        info!("{}", scenario.name());
        if plan.end_session {
            self.publish(&Publish::session_end()).await;
        }
        self.board.delay(plan.settle).await;

        match plan.sleep {
            SleepRequest::Stop(stop) => {
                self.stop_sleep(stop).await;
                info!("woke from stop sleep test_num={}", self.test_num);
                Next::Rearm
            }
            SleepRequest::PowerDown(power_down) => Next::PowerDown(power_down),
        }
    }

    async fn stop_sleep(&mut self, stop: StopSleep) {
        debug!(
            "stop sleep for {} s network_standby={}",
            stop.timeout.as_secs(),
            stop.network_standby
        );
        let reason = self.board.stop_sleep(stop).await;
        info!("wake reason {:?}", reason);
    }

    async fn publish(&mut self, publish: &Publish) {
        match self.board.publish(publish).await {
            Ok(()) => info!("publish {} result=1", publish.event),
            Err(error) => warn!("publish {} result=0 ({:?})", publish.event, error),
        }
    }

    async fn publish_and_report(&mut self, publish: &Publish) {
        self.publish(publish).await;
        self.report_usage().await;
    }

    /// Logs the modem byte counters when their total changed.
    async fn report_usage(&mut self) {
        let Ok(usage) = self.board.data_usage().await else {
            return;
        };
        if let Some(total) = self.usage.observe(&usage) {
            info!(
                "cid={} tx={} rx={} total={}",
                usage.cid,
                usage.tx_total,
                usage.rx_total,
                total
            );
        }
    }
}

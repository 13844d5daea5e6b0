//! The hardcoded sleep test scenarios and what each one does.
//!
//! A scenario never touches hardware itself. It only describes a plan
//! ([`OneShot`], [`LoopAction`] or a boot-time [`PowerDown`]) which the
//! [`Runner`](crate::runner::Runner) carries out against a
//! [`Board`](crate::board::Board).

use embassy_time::Duration;

use crate::board::Publish;
use crate::settings::Settings;

/// Test scenario selected by the configuration switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Scenario {
    /// Stop sleep, modem off, wake on pin or timer. Repeats.
    StopSleep = 0,
    /// Stop sleep, modem kept registered. Repeats.
    StopSleepNetworkStandby = 1,
    /// Deep sleep, modem off.
    DeepSleep = 2,
    /// Deep sleep, modem kept registered.
    DeepSleepNetworkStandby = 3,
    /// Ends the cloud session, then deep sleep.
    DeepSleepNoSession = 4,
    /// Soft power-off.
    SoftPowerOff = 5,
    /// Stop sleep with network standby for 30 minutes. Repeats.
    StopSleepNetworkStandby30 = 6,
    /// Deep sleep with network standby straight from boot.
    QuickSleepDeepStandby = 7,
    /// Publish with acknowledgement, then stop sleep, on every loop.
    StopSleepNetworkStandbyPublish = 8,
    /// Publish with acknowledgement, then deep sleep.
    DeepSleepNetworkStandbyPublish = 9,
    /// Stay awake and publish once per publish period.
    NoSleepPublish = 10,
}

/// Stop-mode sleep: RAM and execution survive, the wake pin or the timer
/// ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StopSleep {
    pub timeout: Duration,
    /// Keep the modem powered and registered while sleeping.
    pub network_standby: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerDownMode {
    /// MCU standby; the firmware restarts from reset when the timer fires.
    Deep,
    /// Deep sleep with the modem off and the fuel gauge asleep too.
    SoftPowerOff,
}

/// Sleep that does not return to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerDown {
    pub mode: PowerDownMode,
    pub duration: Duration,
    pub network_standby: bool,
}

impl PowerDown {
    /// The modem stays powered and registered through the sleep.
    pub fn keeps_radio(&self) -> bool {
        self.network_standby && self.mode == PowerDownMode::Deep
    }

    pub fn sleeps_fuel_gauge(&self) -> bool {
        self.mode == PowerDownMode::SoftPowerOff
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepRequest {
    Stop(StopSleep),
    PowerDown(PowerDown),
}

/// Plan for the scenario's one-shot run after the warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneShot {
    /// Publish the session-end event before settling.
    pub end_session: bool,
    pub settle: Duration,
    pub sleep: SleepRequest,
}

/// Work done from the main loop on every connected iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Publish, report usage, then sleep. Runs on every iteration.
    PublishThenSleep { publish: Publish, sleep: SleepRequest },
    /// Publish and report usage once per publish period.
    PeriodicPublish(Publish),
}

impl Scenario {
    pub const ALL: [Scenario; 11] = [
        Scenario::StopSleep,
        Scenario::StopSleepNetworkStandby,
        Scenario::DeepSleep,
        Scenario::DeepSleepNetworkStandby,
        Scenario::DeepSleepNoSession,
        Scenario::SoftPowerOff,
        Scenario::StopSleepNetworkStandby30,
        Scenario::QuickSleepDeepStandby,
        Scenario::StopSleepNetworkStandbyPublish,
        Scenario::DeepSleepNetworkStandbyPublish,
        Scenario::NoSleepPublish,
    ];

    /// Maps a switch value to a scenario. Values past the last scenario
    /// select nothing.
    pub fn from_switch(value: u8) -> Option<Self> {
        Self::ALL.get(usize::from(value)).copied()
    }

    pub const fn number(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Scenario::StopSleep => "TEST_STOP_SLEEP",
            Scenario::StopSleepNetworkStandby => "TEST_STOP_SLEEP_NETWORK_STANDBY",
            Scenario::DeepSleep => "TEST_SLEEP_MODE_DEEP",
            Scenario::DeepSleepNetworkStandby => "TEST_SLEEP_MODE_DEEP_NETWORK_STANDBY",
            Scenario::DeepSleepNoSession => "TEST_SLEEP_MODE_DEEP_NO_SESSION",
            Scenario::SoftPowerOff => "TEST_SLEEP_SOFT_POWER_OFF",
            Scenario::StopSleepNetworkStandby30 => "TEST_STOP_SLEEP_NETWORK_STANDBY_30",
            Scenario::QuickSleepDeepStandby => "TEST_QUICK_SLEEP_DEEP_STANDBY",
            Scenario::StopSleepNetworkStandbyPublish => "TEST_STOP_SLEEP_NETWORK_STANDBY_PUBLISH",
            Scenario::DeepSleepNetworkStandbyPublish => "TEST_DEEP_SLEEP_NETWORK_STANDBY_PUBLISH",
            Scenario::NoSleepPublish => "TEST_NO_SLEEP_PUBLISH",
        }
    }

    /// Power-down requested at boot, before any networking starts.
    pub fn boot_power_down(self, settings: &Settings) -> Option<PowerDown> {
        match self {
            Scenario::QuickSleepDeepStandby => Some(deep(settings.sleep, true)),
            _ => None,
        }
    }

    /// Plan run once the connection has been up for the warm-up window.
    pub fn one_shot(self, settings: &Settings) -> Option<OneShot> {
        let (end_session, sleep) = match self {
            Scenario::StopSleep => (false, stop(settings.sleep, false)),
            Scenario::StopSleepNetworkStandby => (false, stop(settings.sleep, true)),
            Scenario::DeepSleep => (false, SleepRequest::PowerDown(deep(settings.sleep, false))),
            Scenario::DeepSleepNetworkStandby => {
                (false, SleepRequest::PowerDown(deep(settings.sleep, true)))
            }
            Scenario::DeepSleepNoSession => {
                (true, SleepRequest::PowerDown(deep(settings.sleep, false)))
            }
            Scenario::SoftPowerOff => (
                false,
                SleepRequest::PowerDown(PowerDown {
                    mode: PowerDownMode::SoftPowerOff,
                    duration: settings.sleep,
                    network_standby: false,
                }),
            ),
            Scenario::StopSleepNetworkStandby30 => (false, stop(settings.long_sleep, true)),
            Scenario::QuickSleepDeepStandby
            | Scenario::StopSleepNetworkStandbyPublish
            | Scenario::DeepSleepNetworkStandbyPublish
            | Scenario::NoSleepPublish => return None,
        };

        Some(OneShot {
            end_session,
            settle: settings.settle,
            sleep,
        })
    }

    /// Work done from the main loop while connected.
    pub fn loop_action(self, settings: &Settings) -> Option<LoopAction> {
        let publish = |ack| Publish {
            event: settings.event_name,
            data: self.name(),
            ack,
        };

        match self {
            Scenario::StopSleepNetworkStandbyPublish => Some(LoopAction::PublishThenSleep {
                publish: publish(true),
                sleep: stop(settings.sleep, true),
            }),
            Scenario::DeepSleepNetworkStandbyPublish => Some(LoopAction::PublishThenSleep {
                publish: publish(true),
                sleep: SleepRequest::PowerDown(deep(settings.sleep, true)),
            }),
            Scenario::NoSleepPublish => Some(LoopAction::PeriodicPublish(publish(false))),
            _ => None,
        }
    }
}

fn stop(timeout: Duration, network_standby: bool) -> SleepRequest {
    SleepRequest::Stop(StopSleep {
        timeout,
        network_standby,
    })
}

fn deep(duration: Duration, network_standby: bool) -> PowerDown {
    PowerDown {
        mode: PowerDownMode::Deep,
        duration,
        network_standby,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_values_map_to_scenario_numbers() {
        for value in 0..=10u8 {
            let scenario = Scenario::from_switch(value).unwrap();
            assert_eq!(scenario.number(), value);
        }
        for value in 11..=15u8 {
            assert_eq!(Scenario::from_switch(value), None);
        }
    }

    #[test]
    fn only_quick_sleep_powers_down_at_boot() {
        let settings = Settings::DEFAULT;
        for scenario in Scenario::ALL {
            let boot = scenario.boot_power_down(&settings);
            if scenario == Scenario::QuickSleepDeepStandby {
                assert_eq!(
                    boot,
                    Some(PowerDown {
                        mode: PowerDownMode::Deep,
                        duration: Duration::from_secs(8),
                        network_standby: true,
                    })
                );
            } else {
                assert_eq!(boot, None);
            }
        }
    }

    #[test]
    fn only_soft_power_off_sleeps_the_fuel_gauge() {
        let settings = Settings::DEFAULT;
        for scenario in Scenario::ALL {
            let Some(SleepRequest::PowerDown(power_down)) =
                scenario.one_shot(&settings).map(|plan| plan.sleep)
            else {
                continue;
            };
            assert_eq!(
                power_down.sleeps_fuel_gauge(),
                scenario == Scenario::SoftPowerOff
            );
            assert_eq!(
                power_down.keeps_radio(),
                scenario == Scenario::DeepSleepNetworkStandby
            );
        }
    }

    #[test]
    fn long_stop_sleep_lasts_thirty_minutes() {
        let plan = Scenario::StopSleepNetworkStandby30
            .one_shot(&Settings::DEFAULT)
            .unwrap();
        assert_eq!(
            plan.sleep,
            SleepRequest::Stop(StopSleep {
                timeout: Duration::from_secs(1800),
                network_standby: true,
            })
        );
        assert_eq!(plan.settle, Duration::from_secs(2));
    }

    #[test]
    fn only_no_session_scenario_ends_the_session() {
        let settings = Settings::DEFAULT;
        let ending: Vec<_> = Scenario::ALL
            .into_iter()
            .filter(|s| s.one_shot(&settings).is_some_and(|plan| plan.end_session))
            .collect();
        assert_eq!(ending, [Scenario::DeepSleepNoSession]);
    }

    #[test]
    fn publish_scenarios_have_no_one_shot() {
        let settings = Settings::DEFAULT;
        for scenario in [
            Scenario::StopSleepNetworkStandbyPublish,
            Scenario::DeepSleepNetworkStandbyPublish,
            Scenario::NoSleepPublish,
        ] {
            assert!(scenario.one_shot(&settings).is_none());
            assert!(scenario.loop_action(&settings).is_some());
        }
    }

    #[test]
    fn periodic_publish_is_sent_without_ack() {
        let action = Scenario::NoSleepPublish.loop_action(&Settings::DEFAULT);
        assert_eq!(
            action,
            Some(LoopAction::PeriodicPublish(Publish {
                event: "testSleep",
                data: "TEST_NO_SLEEP_PUBLISH",
                ack: false,
            }))
        );
    }
}

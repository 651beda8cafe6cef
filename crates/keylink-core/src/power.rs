//! Power manager: inactivity deadline and the one-way suspend transition.
//!
//! The inactivity span is chosen once per active period from the battery state
//! seen at boot. A low battery gets the *shorter* span. Key activity only moves
//! the deadline; it never re-selects the span.

use log::info;

use crate::{battery::BatteryState, timers::Deadline};

pub const NORMAL_TIMEOUT_MS: u64 = 60_000;
pub const LOW_BATTERY_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PowerConfig {
    pub normal_timeout_ms: u64,
    pub low_battery_timeout_ms: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            normal_timeout_ms: NORMAL_TIMEOUT_MS,
            low_battery_timeout_ms: LOW_BATTERY_TIMEOUT_MS,
        }
    }
}

impl PowerConfig {
    pub const fn timeout_for(&self, battery: BatteryState) -> u64 {
        if battery.is_depleted() {
            self.low_battery_timeout_ms
        } else {
            self.normal_timeout_ms
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerState {
    Active,
    Suspended,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SuspendReason {
    Inactivity,
    CriticalBattery,
}

impl SuspendReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inactivity => "inactivity",
            Self::CriticalBattery => "critical_battery",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerDecision {
    StayActive,
    /// Suspension is due but the calibration gesture holds it off.
    Deferred(SuspendReason),
    Suspend(SuspendReason),
}

#[derive(Debug, Clone)]
pub struct PowerManager {
    span_ms: u64,
    inactivity: Deadline,
    state: PowerState,
    deferring: bool,
}

impl PowerManager {
    pub fn new(config: PowerConfig, boot_battery: BatteryState, now_ms: u64) -> Self {
        let span_ms = config.timeout_for(boot_battery);
        let mut inactivity = Deadline::disarmed();
        inactivity.arm(now_ms, span_ms);
        info!(
            "power: boot battery={} inactivity_timeout={}ms",
            boot_battery.as_str(),
            span_ms
        );

        Self {
            span_ms,
            inactivity,
            state: PowerState::Active,
            deferring: false,
        }
    }

    pub const fn span_ms(&self) -> u64 {
        self.span_ms
    }

    pub const fn state(&self) -> PowerState {
        self.state
    }

    pub const fn deadline_ms(&self) -> Option<u64> {
        self.inactivity.deadline_ms()
    }

    /// Any key transition pushes the deadline to `now + span`.
    pub fn note_activity(&mut self, now_ms: u64) {
        if self.state == PowerState::Active {
            self.inactivity.arm(now_ms, self.span_ms);
        }
    }

    /// Checked once per control cycle.
    pub fn poll(
        &mut self,
        now_ms: u64,
        battery: BatteryState,
        calibration_held: bool,
    ) -> PowerDecision {
        if self.state == PowerState::Suspended {
            return PowerDecision::Suspend(SuspendReason::Inactivity);
        }

        let due = if battery == BatteryState::Critical {
            Some(SuspendReason::CriticalBattery)
        } else if self.inactivity.expired(now_ms) {
            Some(SuspendReason::Inactivity)
        } else {
            None
        };

        let Some(reason) = due else {
            self.deferring = false;
            return PowerDecision::StayActive;
        };

        if calibration_held {
            if !self.deferring {
                info!("power: {} suspend deferred for calibration", reason.as_str());
                self.deferring = true;
            }
            return PowerDecision::Deferred(reason);
        }

        self.state = PowerState::Suspended;
        self.inactivity.disarm();
        info!("power: suspending reason={}", reason.as_str());
        PowerDecision::Suspend(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_battery_selects_the_shorter_span() {
        let config = PowerConfig::default();
        assert_eq!(
            PowerManager::new(config, BatteryState::Normal, 0).span_ms(),
            60_000
        );
        assert_eq!(
            PowerManager::new(config, BatteryState::Low, 0).span_ms(),
            10_000
        );
        assert_eq!(
            PowerManager::new(config, BatteryState::Critical, 0).span_ms(),
            10_000
        );
    }

    #[test]
    fn activity_moves_the_deadline_but_keeps_the_span() {
        let mut power = PowerManager::new(PowerConfig::default(), BatteryState::Low, 1_000);
        assert_eq!(power.deadline_ms(), Some(11_000));

        power.note_activity(8_000);
        assert_eq!(power.deadline_ms(), Some(18_000));
        assert_eq!(power.span_ms(), 10_000);

        // Battery recovering mid-period does not lengthen the span.
        assert_eq!(
            power.poll(17_999, BatteryState::Normal, false),
            PowerDecision::StayActive
        );
        power.note_activity(17_999);
        assert_eq!(power.span_ms(), 10_000);
        assert_eq!(power.deadline_ms(), Some(27_999));
    }

    #[test]
    fn inactivity_suspends_once_due() {
        let mut power = PowerManager::new(PowerConfig::default(), BatteryState::Normal, 0);
        assert_eq!(
            power.poll(59_999, BatteryState::Normal, false),
            PowerDecision::StayActive
        );
        assert_eq!(
            power.poll(60_000, BatteryState::Normal, false),
            PowerDecision::Suspend(SuspendReason::Inactivity)
        );
        assert_eq!(power.state(), PowerState::Suspended);

        power.note_activity(60_001);
        assert_eq!(power.deadline_ms(), None);
    }

    #[test]
    fn critical_battery_suspends_unless_calibration_is_held() {
        let mut power = PowerManager::new(PowerConfig::default(), BatteryState::Critical, 0);
        assert_eq!(
            power.poll(5, BatteryState::Critical, true),
            PowerDecision::Deferred(SuspendReason::CriticalBattery)
        );
        assert_eq!(
            power.poll(4_000, BatteryState::Critical, true),
            PowerDecision::Deferred(SuspendReason::CriticalBattery)
        );
        assert_eq!(power.state(), PowerState::Active);
        assert_eq!(
            power.poll(4_001, BatteryState::Critical, false),
            PowerDecision::Suspend(SuspendReason::CriticalBattery)
        );
    }
}

//! Key interpreter: turns debounced key transitions into outbound commands.
//!
//! The FN key is overloaded. Held down, it arms learn mode so the next released
//! key is sent as [`Action::LearnSignal`]; pressed and released on its own it
//! steps the backlight instead and transmits nothing. Holding the power key past
//! [`KeyLayout::long_press_ms`] issues a single [`Action::FactoryReset`].

use log::{debug, info};

use crate::{
    command::{Action, Command, KeyId},
    feedback::{BacklightLevel, FeedbackPattern},
    timers::Deadline,
};

pub const LONG_PRESS_MS: u64 = 8_000;

/// Roles of the special keys and the long-press threshold.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeyLayout {
    pub fn_key: KeyId,
    pub power_key: KeyId,
    pub long_press_ms: u64,
}

impl KeyLayout {
    pub const fn new(fn_key: KeyId, power_key: KeyId) -> Self {
        Self {
            fn_key,
            power_key,
            long_press_ms: LONG_PRESS_MS,
        }
    }

    pub const fn with_long_press_ms(mut self, long_press_ms: u64) -> Self {
        self.long_press_ms = long_press_ms;
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LearnState {
    Idle,
    /// FN is down. `used` is set once any other key went down meanwhile.
    ArmedLearn { used: bool },
    /// Factory reset went out; releases are swallowed until the power key is up.
    ResetIssued,
}

/// Side effects requested by one interpreter step.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Reaction {
    pub command: Option<Command>,
    pub pattern: Option<FeedbackPattern>,
    pub haptic: bool,
    pub backlight: Option<BacklightLevel>,
}

impl Reaction {
    pub const fn none() -> Self {
        Self {
            command: None,
            pattern: None,
            haptic: false,
            backlight: None,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.command.is_none() && self.pattern.is_none() && !self.haptic && self.backlight.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct KeyInterpreter {
    layout: KeyLayout,
    state: LearnState,
    power_hold: Deadline,
    backlight: BacklightLevel,
}

impl KeyInterpreter {
    pub fn new(layout: KeyLayout) -> Self {
        Self {
            layout,
            state: LearnState::Idle,
            power_hold: Deadline::disarmed(),
            backlight: BacklightLevel::default(),
        }
    }

    pub const fn layout(&self) -> KeyLayout {
        self.layout
    }

    pub const fn backlight(&self) -> BacklightLevel {
        self.backlight
    }

    pub const fn is_learning(&self) -> bool {
        matches!(self.state, LearnState::ArmedLearn { .. })
    }

    pub const fn power_key_held(&self) -> bool {
        self.power_hold.is_armed()
    }

    pub fn on_key_down(&mut self, key: KeyId, now_ms: u64) -> Reaction {
        let mut reaction = Reaction::none();
        reaction.haptic = self.backlight.is_max();

        if key == self.layout.fn_key {
            if self.state != LearnState::ResetIssued {
                self.state = LearnState::ArmedLearn { used: false };
                debug!("keys: learn armed");
            }
        } else if let LearnState::ArmedLearn { .. } = self.state {
            self.state = LearnState::ArmedLearn { used: true };
        }

        if key == self.layout.power_key {
            self.power_hold.arm(now_ms, self.layout.long_press_ms);
        }

        reaction
    }

    pub fn on_key_up(&mut self, key: KeyId) -> Reaction {
        let mut reaction = Reaction::none();
        let power_released = key == self.layout.power_key;
        if power_released {
            self.power_hold.disarm();
        }

        match self.state {
            LearnState::ResetIssued => {
                if power_released {
                    self.state = LearnState::Idle;
                }
            }
            LearnState::ArmedLearn { used } if key == self.layout.fn_key => {
                self.state = LearnState::Idle;
                if !used {
                    self.backlight = self.backlight.next();
                    reaction.backlight = Some(self.backlight);
                    debug!("keys: backlight step={}", self.backlight.step());
                }
            }
            LearnState::ArmedLearn { .. } => {
                self.state = LearnState::ArmedLearn { used: true };
                reaction.command = Some(Command::new(key, Action::LearnSignal));
                reaction.pattern = Some(FeedbackPattern::LearnAck);
            }
            // FN can only come up here after a reset hold swallowed its press.
            LearnState::Idle if key == self.layout.fn_key => {}
            LearnState::Idle => {
                reaction.command = Some(Command::send(key));
            }
        }

        reaction
    }

    /// Polled once per cycle; fires the factory reset exactly once per hold.
    pub fn check_long_press(&mut self, now_ms: u64) -> Reaction {
        if !self.power_hold.fire(now_ms) {
            return Reaction::none();
        }

        info!(
            "keys: power held {}ms; issuing factory reset",
            self.layout.long_press_ms
        );
        self.state = LearnState::ResetIssued;

        let mut reaction = Reaction::none();
        reaction.command = Some(Command::new(self.layout.power_key, Action::FactoryReset));
        reaction.pattern = Some(FeedbackPattern::DataSaved);
        reaction
    }
}

#[cfg(test)]
mod tests;

//! Visual and haptic feedback vocabulary.

/// Indications the control core can ask the sink to play.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FeedbackPattern {
    LearnAck,
    DataSaved,
    BatteryLow,
    BatteryCritical,
}

impl FeedbackPattern {
    pub const fn pulses(self) -> PulsePattern {
        match self {
            Self::LearnAck => PulsePattern::new(80, 80, 3),
            Self::DataSaved => PulsePattern::new(300, 150, 2),
            Self::BatteryLow => PulsePattern::new(60, 240, 2),
            Self::BatteryCritical => PulsePattern::new(60, 60, 6),
        }
    }
}

/// On/off pulse train.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PulsePattern {
    pub on_ms: u16,
    pub off_ms: u16,
    pub pulses: u8,
}

impl PulsePattern {
    pub const fn new(on_ms: u16, off_ms: u16, pulses: u8) -> Self {
        Self {
            on_ms,
            off_ms,
            pulses,
        }
    }

    pub const fn duration_ms(self) -> u64 {
        (self.on_ms as u64 + self.off_ms as u64) * self.pulses as u64
    }
}

pub const HAPTIC_PULSE: PulsePattern = PulsePattern::new(40, 0, 1);

/// Output that accepts feedback requests and runs them independently.
pub trait FeedbackSink {
    fn play(&mut self, pattern: FeedbackPattern, now_ms: u64);
    fn haptic_pulse(&mut self, now_ms: u64);
}

/// Non-blocking pulse sequencer; poll it to learn the level a pin should have.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PulsePlayer {
    active: Option<(PulsePattern, u64)>,
}

impl PulsePlayer {
    pub const fn new() -> Self {
        Self { active: None }
    }

    /// Starts `pattern`, replacing whatever was playing.
    pub fn start(&mut self, pattern: PulsePattern, now_ms: u64) {
        self.active = if pattern.pulses == 0 {
            None
        } else {
            Some((pattern, now_ms))
        };
    }

    pub const fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    /// Output level at `now_ms`; `false` once the pattern has completed.
    pub fn level(&mut self, now_ms: u64) -> bool {
        let Some((pattern, started_ms)) = self.active else {
            return false;
        };

        let elapsed = now_ms.saturating_sub(started_ms);
        if elapsed >= pattern.duration_ms() {
            self.active = None;
            return false;
        }

        let period = pattern.on_ms as u64 + pattern.off_ms as u64;
        elapsed % period.max(1) < pattern.on_ms as u64
    }
}

/// Stepped backlight intensity, `MIN_STEP..=MAX_STEP`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct BacklightLevel(u8);

impl BacklightLevel {
    pub const MIN_STEP: u8 = 1;
    pub const MAX_STEP: u8 = 4;

    pub const fn new(step: u8) -> Self {
        if step < Self::MIN_STEP {
            Self(Self::MIN_STEP)
        } else if step > Self::MAX_STEP {
            Self(Self::MAX_STEP)
        } else {
            Self(step)
        }
    }

    pub const fn step(self) -> u8 {
        self.0
    }

    pub const fn is_max(self) -> bool {
        self.0 >= Self::MAX_STEP
    }

    /// Next step up, wrapping past the maximum back to the minimum.
    pub const fn next(self) -> Self {
        if self.0 >= Self::MAX_STEP {
            Self(Self::MIN_STEP)
        } else {
            Self(self.0 + 1)
        }
    }

    pub const fn duty_pct(self) -> u8 {
        (self.0 as u16 * 100 / Self::MAX_STEP as u16) as u8
    }
}

impl Default for BacklightLevel {
    fn default() -> Self {
        Self(Self::MIN_STEP)
    }
}

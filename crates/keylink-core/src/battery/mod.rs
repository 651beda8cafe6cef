//! Battery monitor: filtered sense-line sampling, state classification and
//! one-time field calibration.

use log::{debug, info};

use crate::{
    feedback::FeedbackPattern,
    settings::{ConfigStore, PersistedConfig},
};

pub const SAMPLE_COUNT: u8 = 30;
pub const CRITICAL_THRESHOLD_MV: i32 = 3_630;
pub const LOW_THRESHOLD_MV: i32 = 3_680;
pub const CALIBRATION_REFERENCE_MV: i32 = 3_600;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatteryState {
    Normal,
    Low,
    Critical,
}

impl BatteryState {
    const fn severity(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Low => 1,
            Self::Critical => 2,
        }
    }

    pub const fn is_depleted(self) -> bool {
        !matches!(self, Self::Normal)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Critical => "critical",
        }
    }

    const fn indication(self) -> Option<FeedbackPattern> {
        match self {
            Self::Normal => None,
            Self::Low => Some(FeedbackPattern::BatteryLow),
            Self::Critical => Some(FeedbackPattern::BatteryCritical),
        }
    }
}

/// Analog battery sense line, already scaled to millivolt-equivalent units.
pub trait BatterySense {
    type Error;

    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatteryConfig {
    pub samples: u8,
    pub low_threshold_mv: i32,
    pub critical_threshold_mv: i32,
    pub reference_mv: i32,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            samples: SAMPLE_COUNT,
            low_threshold_mv: LOW_THRESHOLD_MV,
            critical_threshold_mv: CRITICAL_THRESHOLD_MV,
            reference_mv: CALIBRATION_REFERENCE_MV,
        }
    }
}

impl BatteryConfig {
    pub const fn with_samples(mut self, samples: u8) -> Self {
        self.samples = samples;
        self
    }

    pub const fn classify(&self, reading_mv: i32) -> BatteryState {
        if reading_mv < self.critical_threshold_mv {
            BatteryState::Critical
        } else if reading_mv < self.low_threshold_mv {
            BatteryState::Low
        } else {
            BatteryState::Normal
        }
    }
}

/// Classification with the stock thresholds.
pub const fn classify(reading_mv: i32) -> BatteryState {
    if reading_mv < CRITICAL_THRESHOLD_MV {
        BatteryState::Critical
    } else if reading_mv < LOW_THRESHOLD_MV {
        BatteryState::Low
    } else {
        BatteryState::Normal
    }
}

/// One filtered sample and what it changed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatteryReport {
    pub reading_mv: i32,
    pub state: BatteryState,
    pub indication: Option<FeedbackPattern>,
}

#[derive(Debug)]
pub enum CalibrationError<SenseErr, StoreErr> {
    Sense(SenseErr),
    Store(StoreErr),
}

#[derive(Debug, Clone)]
pub struct BatteryMonitor {
    config: BatteryConfig,
    offset: i32,
    state: BatteryState,
    notified: BatteryState,
    last_reading_mv: Option<i32>,
}

impl BatteryMonitor {
    pub const fn new(config: BatteryConfig, calibration_offset: i32) -> Self {
        Self {
            config,
            offset: calibration_offset,
            state: BatteryState::Normal,
            notified: BatteryState::Normal,
            last_reading_mv: None,
        }
    }

    pub const fn state(&self) -> BatteryState {
        self.state
    }

    pub const fn calibration_offset(&self) -> i32 {
        self.offset
    }

    pub const fn last_reading_mv(&self) -> Option<i32> {
        self.last_reading_mv
    }

    /// Average of `samples` raw reads, without the calibration offset.
    pub fn raw_average<S: BatterySense>(&self, sense: &mut S) -> Result<i32, S::Error> {
        let samples = self.config.samples.max(1);
        let mut sum = 0u32;
        for _ in 0..samples {
            sum += sense.read_raw()? as u32;
        }
        Ok((sum / samples as u32) as i32)
    }

    /// Filtered, calibrated reading.
    pub fn sample<S: BatterySense>(&mut self, sense: &mut S) -> Result<i32, S::Error> {
        let reading = self.raw_average(sense)?.saturating_add(self.offset);
        self.last_reading_mv = Some(reading);
        Ok(reading)
    }

    /// Classifies `reading_mv`; an indication is returned only on the edge into
    /// a more severe state than the one last indicated.
    pub fn update(&mut self, reading_mv: i32) -> BatteryReport {
        let state = self.config.classify(reading_mv);
        if state != self.state {
            info!(
                "battery: {} -> {} reading={}mV",
                self.state.as_str(),
                state.as_str(),
                reading_mv
            );
        }
        self.state = state;

        let indication = if state.severity() > self.notified.severity() {
            self.notified = state;
            state.indication()
        } else {
            if state == BatteryState::Normal {
                self.notified = BatteryState::Normal;
            }
            None
        };

        BatteryReport {
            reading_mv,
            state,
            indication,
        }
    }

    pub fn poll<S: BatterySense>(&mut self, sense: &mut S) -> Result<BatteryReport, S::Error> {
        let reading = self.sample(sense)?;
        debug!("battery: reading={}mV offset={}", reading, self.offset);
        Ok(self.update(reading))
    }

    /// Must run with the cell held at the reference voltage. Stores
    /// `reference - raw average` as the new offset and persists it.
    pub fn calibrate<S, C>(
        &mut self,
        sense: &mut S,
        store: &mut C,
        current: PersistedConfig,
    ) -> Result<PersistedConfig, CalibrationError<S::Error, C::Error>>
    where
        S: BatterySense,
        C: ConfigStore,
    {
        let raw = self.raw_average(sense).map_err(CalibrationError::Sense)?;
        let offset = self.config.reference_mv - raw;
        let updated = current.with_calibration_offset(offset);
        store.save(&updated).map_err(CalibrationError::Store)?;

        self.offset = offset;
        info!(
            "battery: calibrated raw={}mV reference={}mV offset={}",
            raw, self.config.reference_mv, offset
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests;

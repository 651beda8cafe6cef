use super::*;
use crate::settings::PairingAddress;

/// Repeats `pattern` forever.
struct FakeSense {
    pattern: Vec<u16>,
    cursor: usize,
    reads: usize,
}

impl FakeSense {
    fn steady(level: u16) -> Self {
        Self::cycling(&[level])
    }

    fn cycling(pattern: &[u16]) -> Self {
        Self {
            pattern: pattern.to_vec(),
            cursor: 0,
            reads: 0,
        }
    }
}

impl BatterySense for FakeSense {
    type Error = ();

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        let value = self.pattern[self.cursor % self.pattern.len()];
        self.cursor += 1;
        self.reads += 1;
        Ok(value)
    }
}

struct BrokenSense;

impl BatterySense for BrokenSense {
    type Error = &'static str;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        Err("adc busy")
    }
}

#[derive(Default)]
struct MemoryStore {
    saved: Vec<PersistedConfig>,
}

impl ConfigStore for MemoryStore {
    type Error = ();

    fn load(&mut self) -> Result<Option<PersistedConfig>, Self::Error> {
        Ok(self.saved.last().copied())
    }

    fn save(&mut self, config: &PersistedConfig) -> Result<(), Self::Error> {
        self.saved.push(*config);
        Ok(())
    }
}

#[test]
fn classification_thresholds() {
    assert_eq!(classify(i32::MIN), BatteryState::Critical);
    assert_eq!(classify(3_629), BatteryState::Critical);
    assert_eq!(classify(3_630), BatteryState::Low);
    assert_eq!(classify(3_679), BatteryState::Low);
    assert_eq!(classify(3_680), BatteryState::Normal);
    assert_eq!(classify(i32::MAX), BatteryState::Normal);
}

#[test]
fn classification_is_monotone() {
    let mut previous = classify(2_000).severity();
    for reading in 2_000..5_000 {
        let severity = classify(reading).severity();
        assert!(severity <= previous, "reading {reading}");
        previous = severity;
    }
}

#[test]
fn sample_averages_thirty_reads_and_adds_offset() {
    let mut monitor = BatteryMonitor::new(BatteryConfig::default(), 25);
    let mut sense = FakeSense::cycling(&[3_690, 3_710]);

    assert_eq!(monitor.sample(&mut sense), Ok(3_725));
    assert_eq!(sense.reads, SAMPLE_COUNT as usize);
    assert_eq!(monitor.last_reading_mv(), Some(3_725));
}

#[test]
fn indication_is_edge_triggered() {
    let mut monitor = BatteryMonitor::new(BatteryConfig::default(), 0);

    assert_eq!(monitor.update(3_700).indication, None);
    assert_eq!(
        monitor.update(3_650).indication,
        Some(FeedbackPattern::BatteryLow)
    );
    assert_eq!(monitor.update(3_655).indication, None);
    assert_eq!(monitor.update(3_640).indication, None);
    assert_eq!(
        monitor.update(3_600).indication,
        Some(FeedbackPattern::BatteryCritical)
    );
    assert_eq!(monitor.update(3_635).indication, None);
    assert_eq!(monitor.update(3_610).indication, None);
    assert_eq!(monitor.state(), BatteryState::Critical);

    assert_eq!(monitor.update(3_800).indication, None);
    assert_eq!(
        monitor.update(3_660).indication,
        Some(FeedbackPattern::BatteryLow)
    );
}

#[test]
fn calibration_persists_reference_offset() {
    let config = PersistedConfig::new(PairingAddress([1, 2, 3, 4, 5, 6]), 0);
    let mut monitor = BatteryMonitor::new(BatteryConfig::default(), 0);
    let mut store = MemoryStore::default();

    let updated = monitor
        .calibrate(&mut FakeSense::steady(3_550), &mut store, config)
        .unwrap();

    assert_eq!(updated.calibration_offset, 50);
    assert_eq!(updated.pairing_address, config.pairing_address);
    assert_eq!(store.saved, vec![updated]);
    assert_eq!(monitor.calibration_offset(), 50);
    assert_eq!(monitor.sample(&mut FakeSense::steady(3_550)), Ok(3_600));
}

#[test]
fn repeated_calibration_overwrites_within_noise() {
    let config = PersistedConfig::default();
    let mut monitor = BatteryMonitor::new(BatteryConfig::default(), 0);
    let mut store = MemoryStore::default();

    let first = monitor
        .calibrate(&mut FakeSense::cycling(&[3_570, 3_574]), &mut store, config)
        .unwrap();
    let second = monitor
        .calibrate(&mut FakeSense::cycling(&[3_571, 3_575, 3_572]), &mut store, first)
        .unwrap();

    assert!((first.calibration_offset - second.calibration_offset).abs() <= 2);
    assert_eq!(store.saved.len(), 2);
    assert_eq!(store.load().unwrap(), Some(second));
}

#[test]
fn calibration_does_not_stack_previous_offset() {
    let mut monitor = BatteryMonitor::new(BatteryConfig::default(), 400);
    let mut store = MemoryStore::default();

    let updated = monitor
        .calibrate(&mut FakeSense::steady(3_500), &mut store, PersistedConfig::default())
        .unwrap();
    assert_eq!(updated.calibration_offset, 100);
}

#[test]
fn sense_failure_leaves_offset_untouched() {
    let mut monitor = BatteryMonitor::new(BatteryConfig::default(), 7);
    let mut store = MemoryStore::default();

    let result = monitor.calibrate(&mut BrokenSense, &mut store, PersistedConfig::default());
    assert!(matches!(result, Err(CalibrationError::Sense("adc busy"))));
    assert!(store.saved.is_empty());
    assert_eq!(monitor.calibration_offset(), 7);
}

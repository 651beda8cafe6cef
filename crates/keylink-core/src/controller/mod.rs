//! The cooperative control cycle tying keys, battery, power and dispatch
//! together.

use log::{debug, info, warn};

use crate::{
    battery::{BatteryConfig, BatteryMonitor, BatterySense, BatteryState, CalibrationError},
    dispatch::CommandSink,
    feedback::{BacklightLevel, FeedbackPattern, FeedbackSink},
    input::{KeyEvent, KeyEventProvider},
    keys::{KeyInterpreter, KeyLayout, Reaction},
    power::{PowerConfig, PowerDecision, PowerManager, SuspendReason},
    settings::{ConfigStore, PairingAddress, PersistedConfig, provision},
    timers::Deadline,
};

pub const CALIBRATION_HOLD_MS: u64 = 3_000;
pub const BATTERY_POLL_INTERVAL_MS: u64 = 1_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    pub layout: KeyLayout,
    pub battery: BatteryConfig,
    pub power: PowerConfig,
    pub calibration_hold_ms: u64,
    pub battery_poll_interval_ms: u64,
}

impl ControllerConfig {
    pub fn new(layout: KeyLayout) -> Self {
        Self {
            layout,
            battery: BatteryConfig::default(),
            power: PowerConfig::default(),
            calibration_hold_ms: CALIBRATION_HOLD_MS,
            battery_poll_interval_ms: BATTERY_POLL_INTERVAL_MS,
        }
    }

    pub const fn with_battery(mut self, battery: BatteryConfig) -> Self {
        self.battery = battery;
        self
    }

    pub const fn with_power(mut self, power: PowerConfig) -> Self {
        self.power = power;
        self
    }

    pub const fn with_calibration_hold_ms(mut self, calibration_hold_ms: u64) -> Self {
        self.calibration_hold_ms = calibration_hold_ms;
        self
    }

    pub const fn with_battery_poll_interval_ms(mut self, battery_poll_interval_ms: u64) -> Self {
        self.battery_poll_interval_ms = battery_poll_interval_ms;
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    Active,
    Suspend(SuspendReason),
}

/// Board-side collaborators owned by the controller.
pub struct ControlIo<K, B, C, F, D> {
    pub keys: K,
    pub sense: B,
    pub store: C,
    pub feedback: F,
    pub commands: D,
}

pub struct RemoteController<K, B, C, F, D>
where
    K: KeyEventProvider,
    B: BatterySense,
    C: ConfigStore,
    F: FeedbackSink,
    D: CommandSink,
{
    io: ControlIo<K, B, C, F, D>,
    settings: ControllerConfig,
    config: PersistedConfig,
    interpreter: KeyInterpreter,
    battery: BatteryMonitor,
    power: PowerManager,
    calibration_hold: Deadline,
    calibration_was_held: bool,
    battery_poll: Deadline,
    input_fault_logged: bool,
}

impl<K, B, C, F, D> RemoteController<K, B, C, F, D>
where
    K: KeyEventProvider,
    B: BatterySense,
    C: ConfigStore,
    F: FeedbackSink,
    D: CommandSink,
{
    /// Loads and provisions the persisted config, takes the first battery
    /// reading and starts the active period.
    pub fn boot(
        mut io: ControlIo<K, B, C, F, D>,
        settings: ControllerConfig,
        provisioned: PairingAddress,
        now_ms: u64,
    ) -> Self {
        let stored = match io.store.load() {
            Ok(Some(saved)) => {
                info!("config restored from flash");
                Some(saved)
            }
            Ok(None) => {
                info!("no saved config in flash");
                None
            }
            Err(_) => {
                info!("failed to read saved config; using defaults");
                None
            }
        };

        let provisioning = provision(stored, provisioned);
        if provisioning.needs_write {
            match io.store.save(&provisioning.config) {
                Ok(()) => info!(
                    "config: provisioned pairing address {}",
                    provisioning.config.pairing_address
                ),
                Err(_) => info!("config: failed to persist provisioned pairing address"),
            }
        }
        let config = provisioning.config;
        if config.pairing_address.is_unset() {
            warn!("config: no pairing address; commands go nowhere");
        }

        let mut battery = BatteryMonitor::new(settings.battery, config.calibration_offset);
        let boot_state = match battery.poll(&mut io.sense) {
            Ok(report) => {
                if let Some(pattern) = report.indication {
                    io.feedback.play(pattern, now_ms);
                }
                report.state
            }
            Err(_) => {
                info!("battery: boot sample failed; assuming normal");
                BatteryState::Normal
            }
        };

        let power = PowerManager::new(settings.power, boot_state, now_ms);
        let mut battery_poll = Deadline::disarmed();
        battery_poll.arm(now_ms, settings.battery_poll_interval_ms);

        Self {
            io,
            settings,
            config,
            interpreter: KeyInterpreter::new(settings.layout),
            battery,
            power,
            calibration_hold: Deadline::disarmed(),
            calibration_was_held: false,
            battery_poll,
            input_fault_logged: false,
        }
    }

    pub const fn persisted_config(&self) -> PersistedConfig {
        self.config
    }

    pub const fn battery_state(&self) -> BatteryState {
        self.battery.state()
    }

    pub const fn battery_reading_mv(&self) -> Option<i32> {
        self.battery.last_reading_mv()
    }

    pub const fn backlight(&self) -> BacklightLevel {
        self.interpreter.backlight()
    }

    pub const fn power(&self) -> &PowerManager {
        &self.power
    }

    pub fn io(&self) -> &ControlIo<K, B, C, F, D> {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut ControlIo<K, B, C, F, D> {
        &mut self.io
    }

    pub fn into_io(self) -> ControlIo<K, B, C, F, D> {
        self.io
    }

    /// One pass of the control loop.
    pub fn tick(&mut self, now_ms: u64, calibration_held: bool) -> TickOutcome {
        self.process_keys(now_ms);

        let reaction = self.interpreter.check_long_press(now_ms);
        self.apply(reaction, now_ms);

        self.track_calibration_gesture(now_ms, calibration_held);

        if self.battery_poll.fire(now_ms) {
            self.poll_battery(now_ms);
            self.battery_poll
                .arm(now_ms, self.settings.battery_poll_interval_ms);
        }

        match self
            .power
            .poll(now_ms, self.battery.state(), calibration_held)
        {
            PowerDecision::StayActive | PowerDecision::Deferred(_) => TickOutcome::Active,
            PowerDecision::Suspend(reason) => TickOutcome::Suspend(reason),
        }
    }

    fn process_keys(&mut self, now_ms: u64) {
        if self.io.keys.refresh().is_err() {
            self.note_input_fault();
        }

        loop {
            match self.io.keys.poll_event() {
                Ok(Some(event)) => self.apply_key_event(event, now_ms),
                Ok(None) => break,
                Err(_) => {
                    self.note_input_fault();
                    break;
                }
            }
        }
    }

    fn note_input_fault(&mut self) {
        if !self.input_fault_logged {
            info!("keys: matrix scan failed");
            self.input_fault_logged = true;
        }
    }

    fn apply_key_event(&mut self, event: KeyEvent, now_ms: u64) {
        self.power.note_activity(now_ms);
        let reaction = match event {
            KeyEvent::Down(key) => self.interpreter.on_key_down(key, now_ms),
            KeyEvent::Up(key) => self.interpreter.on_key_up(key),
        };
        debug!("keys: {:?}", event);
        self.apply(reaction, now_ms);
    }

    fn apply(&mut self, reaction: Reaction, now_ms: u64) {
        if reaction.haptic {
            self.io.feedback.haptic_pulse(now_ms);
        }
        if let Some(command) = reaction.command
            && let Err(err) = self.io.commands.submit(command)
        {
            info!("dispatch: inbox rejected key={}: {:?}", command.key.raw(), err);
        }
        if let Some(pattern) = reaction.pattern {
            self.io.feedback.play(pattern, now_ms);
        }
    }

    fn track_calibration_gesture(&mut self, now_ms: u64, held: bool) {
        if held && !self.calibration_was_held {
            self.calibration_hold
                .arm(now_ms, self.settings.calibration_hold_ms);
        } else if !held {
            self.calibration_hold.disarm();
        }
        self.calibration_was_held = held;

        if self.calibration_hold.fire(now_ms) {
            self.run_calibration(now_ms);
        }
    }

    fn run_calibration(&mut self, now_ms: u64) {
        match self
            .battery
            .calibrate(&mut self.io.sense, &mut self.io.store, self.config)
        {
            Ok(updated) => {
                self.config = updated;
                self.io.feedback.play(FeedbackPattern::DataSaved, now_ms);
            }
            Err(CalibrationError::Sense(_)) => info!("battery: calibration sample failed"),
            Err(CalibrationError::Store(_)) => {
                info!("battery: calibration offset could not be persisted")
            }
        }
    }

    fn poll_battery(&mut self, now_ms: u64) {
        match self.battery.poll(&mut self.io.sense) {
            Ok(report) => {
                if let Some(pattern) = report.indication {
                    self.io.feedback.play(pattern, now_ms);
                }
            }
            Err(_) => debug!("battery: sample failed"),
        }
    }
}

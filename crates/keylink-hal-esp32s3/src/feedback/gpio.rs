use embedded_hal::digital::OutputPin;
use keylink_core::feedback::{FeedbackPattern, FeedbackSink, HAPTIC_PULSE, PulsePlayer};

/// Status LED and vibration motor driven from the control loop.
///
/// Requests only start a [`PulsePlayer`]; [`GpioFeedback::service`] must be
/// called every loop iteration to move the pins.
#[derive(Debug)]
pub struct GpioFeedback<LED, MOTOR> {
    led: LED,
    motor: MOTOR,
    led_player: PulsePlayer,
    motor_player: PulsePlayer,
    led_on: bool,
    motor_on: bool,
}

impl<LED, MOTOR> GpioFeedback<LED, MOTOR>
where
    LED: OutputPin,
    MOTOR: OutputPin,
{
    pub fn new(mut led: LED, mut motor: MOTOR) -> Self {
        let _ = led.set_low();
        let _ = motor.set_low();
        Self {
            led,
            motor,
            led_player: PulsePlayer::new(),
            motor_player: PulsePlayer::new(),
            led_on: false,
            motor_on: false,
        }
    }

    pub fn service(&mut self, now_ms: u64) {
        let led_level = self.led_player.level(now_ms);
        if led_level != self.led_on {
            self.led_on = led_level;
            let _ = self.led.set_state(led_level.into());
        }

        let motor_level = self.motor_player.level(now_ms);
        if motor_level != self.motor_on {
            self.motor_on = motor_level;
            let _ = self.motor.set_state(motor_level.into());
        }
    }

    pub const fn is_idle(&self) -> bool {
        !self.led_player.is_playing() && !self.motor_player.is_playing()
    }
}

impl<LED, MOTOR> FeedbackSink for GpioFeedback<LED, MOTOR>
where
    LED: OutputPin,
    MOTOR: OutputPin,
{
    fn play(&mut self, pattern: FeedbackPattern, now_ms: u64) {
        log::debug!("feedback: {:?}", pattern);
        self.led_player.start(pattern.pulses(), now_ms);
    }

    fn haptic_pulse(&mut self, now_ms: u64) {
        self.motor_player.start(HAPTIC_PULSE, now_ms);
    }
}

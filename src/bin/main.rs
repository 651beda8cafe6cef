#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::Timer;
use esp_hal::{
    clock::CpuClock,
    gpio::{DriveMode, Input, InputConfig, Level, Output, OutputConfig, Pull, RtcPin},
    ledc::{
        LSGlobalClkSource, Ledc, LowSpeed,
        channel::{self as ledc_channel, ChannelIFace as _},
        timer::{self as ledc_timer, TimerIFace as _},
    },
    rtc_cntl::{SocResetReason, reset_reason, wakeup_cause},
    system::Cpu,
    time::{Instant, Rate},
    timer::timg::TimerGroup,
};
use esp_radio::wifi::{ClientConfig, ModeConfig};
use keylink_core::{
    command::KeyId,
    controller::{ControlIo, ControllerConfig, RemoteController, TickOutcome},
    dispatch::Dispatcher,
    keys::KeyLayout,
    settings::PairingAddress,
};
use keylink_hal_esp32s3::{
    battery::adc::{AdcBatterySense, SenseScale},
    feedback::gpio::GpioFeedback,
    input::matrix::{KeyMatrix, MatrixConfig},
    radio::{DispatchChannel, DispatchInbox, EspNowLink, run_dispatcher},
    storage::flash_config::FlashConfigStore,
};
use log::{LevelFilter, info};

#[path = "main/boot_count.rs"]
mod boot_count;
#[path = "main/power.rs"]
mod power;

const MATRIX_ROWS: usize = 4;
const MATRIX_COLS: usize = 3;
const FN_KEY: KeyId = KeyMatrix::<Input<'static>, Output<'static>, MATRIX_ROWS, MATRIX_COLS>::key_at(0, 0);
const POWER_KEY: KeyId =
    KeyMatrix::<Input<'static>, Output<'static>, MATRIX_ROWS, MATRIX_COLS>::key_at(0, 2);
const MATRIX_DEBOUNCE_POLLS: u8 = 4;
const CONTROL_TICK_MS: u64 = 2;
const BACKLIGHT_PWM_KHZ: u32 = 5;
const SLEEP_FEEDBACK_WAIT_MS: u64 = 1_200;

static DISPATCH_INBOX: DispatchChannel = DispatchChannel::new();

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

fn provisioned_pairing_address() -> PairingAddress {
    match option_env!("KEYLINK_PAIRING_ADDRESS") {
        Some(text) => PairingAddress::parse(text).unwrap_or_else(|| {
            info!("KEYLINK_PAIRING_ADDRESS is not a valid address; ignoring");
            PairingAddress::UNSET
        }),
        None => PairingAddress::UNSET,
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    esp_println::logger::init_logger(LevelFilter::Info);
    esp_println::println!("boot: keylink starting");

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);
    let boot_reset_reason = reset_reason(Cpu::ProCpu);
    let boot_wakeup_cause = wakeup_cause();
    let woke_from_deep_sleep = boot_reset_reason == Some(SocResetReason::CoreDeepSleep);
    let boot_count = boot_count::advance(!woke_from_deep_sleep);
    info!(
        "boot reset_reason={:?} wakeup_cause={:?} boot_count={}",
        boot_reset_reason, boot_wakeup_cause, boot_count
    );

    // esp-radio requires an allocator.
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Key matrix wiring:
    // ROWS=GPIO4..GPIO7 (pull-down), COLS=GPIO8..GPIO10, WAKE=GPIO3 (rows diode-OR)
    let col_pins = (peripherals.GPIO8, peripherals.GPIO9, peripherals.GPIO10);
    // Release the column latches held through the last deep sleep.
    col_pins.0.rtcio_pad_hold(false);
    col_pins.1.rtcio_pad_hold(false);
    col_pins.2.rtcio_pad_hold(false);
    let cols = [
        Output::new(col_pins.0, Level::Low, OutputConfig::default()),
        Output::new(col_pins.1, Level::Low, OutputConfig::default()),
        Output::new(col_pins.2, Level::Low, OutputConfig::default()),
    ];
    let row_cfg = InputConfig::default().with_pull(Pull::Down);
    let rows = [
        Input::new(peripherals.GPIO4, row_cfg),
        Input::new(peripherals.GPIO5, row_cfg),
        Input::new(peripherals.GPIO6, row_cfg),
        Input::new(peripherals.GPIO7, row_cfg),
    ];
    let matrix = KeyMatrix::<_, _, MATRIX_ROWS, MATRIX_COLS>::new(
        rows,
        cols,
        MatrixConfig::default().with_debounce_polls(MATRIX_DEBOUNCE_POLLS),
    )
    .unwrap();
    let _wake_line = Input::new(peripherals.GPIO3, row_cfg);

    // Calibration button: GPIO11, active low.
    let calibration_input = Input::new(
        peripherals.GPIO11,
        InputConfig::default().with_pull(Pull::Up),
    );

    // Feedback: status LED=GPIO12, vibration motor=GPIO13, backlight PWM=GPIO14.
    let feedback = GpioFeedback::new(
        Output::new(peripherals.GPIO12, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO13, Level::Low, OutputConfig::default()),
    );

    // Battery sense: GPIO1 (ADC1 channel 0) behind a 1:2 divider.
    let sense = AdcBatterySense::new(peripherals.ADC1, peripherals.GPIO1, SenseScale::default());

    let mut matrix = matrix;
    let store = match FlashConfigStore::new() {
        Ok(store) => store,
        Err(err) => {
            info!("config storage unavailable: {:?}; sleeping until next key press", err);
            power::enter_deep_sleep(&mut matrix);
        }
    };

    let controller_config = ControllerConfig::new(KeyLayout::new(FN_KEY, POWER_KEY));
    let mut controller = RemoteController::boot(
        ControlIo {
            keys: matrix,
            sense,
            store,
            feedback,
            commands: DispatchInbox::new(&DISPATCH_INBOX),
        },
        controller_config,
        provisioned_pairing_address(),
        0,
    );

    let peer = controller.persisted_config().pairing_address;
    info!(
        "Remote started: peer={} battery={}mV state={} calibration_offset={} sleep_after={}ms",
        peer,
        controller.battery_reading_mv().unwrap_or(0),
        controller.battery_state().as_str(),
        controller.persisted_config().calibration_offset,
        controller.power().span_ms()
    );

    let radio = match esp_radio::init() {
        Ok(radio) => radio,
        Err(err) => {
            info!("esp-radio init failed: {:?}", err);
            power::enter_deep_sleep(&mut controller.io_mut().keys);
        }
    };

    let (mut wifi_controller, interfaces) =
        match esp_radio::wifi::new(&radio, peripherals.WIFI, esp_radio::wifi::Config::default()) {
            Ok(parts) => parts,
            Err(err) => {
                info!("wifi peripheral init failed: {:?}", err);
                power::enter_deep_sleep(&mut controller.io_mut().keys);
            }
        };

    let station_mode = ModeConfig::Client(ClientConfig::default());
    if let Err(err) = wifi_controller.set_config(&station_mode) {
        info!("wifi mode config failed: {:?}", err);
        power::enter_deep_sleep(&mut controller.io_mut().keys);
    }
    if let Err(err) = wifi_controller.start() {
        info!("wifi start failed: {:?}", err);
        power::enter_deep_sleep(&mut controller.io_mut().keys);
    }

    info!(
        "radio: station mac={}",
        PairingAddress(interfaces.sta.mac_address())
    );
    let link = match EspNowLink::new(interfaces.esp_now, peer) {
        Ok(link) => link,
        Err(err) => {
            info!("esp-now peer setup failed: {:?}", err);
            power::enter_deep_sleep(&mut controller.io_mut().keys);
        }
    };

    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let mut backlight_timer = ledc.timer::<LowSpeed>(ledc_timer::Number::Timer0);
    backlight_timer
        .configure(ledc_timer::config::Config {
            duty: ledc_timer::config::Duty::Duty8Bit,
            clock_source: ledc_timer::LSClockSource::APBClk,
            frequency: Rate::from_khz(BACKLIGHT_PWM_KHZ),
        })
        .unwrap();
    let mut backlight =
        ledc.channel::<LowSpeed>(ledc_channel::Number::Channel0, peripherals.GPIO14);
    let mut backlight_level = controller.backlight();
    backlight
        .configure(ledc_channel::config::Config {
            timer: &backlight_timer,
            duty_pct: backlight_level.duty_pct(),
            drive_mode: DriveMode::PushPull,
        })
        .unwrap();

    info!("Key pins: ROWS=GPIO4..7 COLS=GPIO8..10 WAKE=GPIO3 CAL=GPIO11");
    info!("Feedback pins: LED=GPIO12 MOTOR=GPIO13 BACKLIGHT=GPIO14");

    let dispatcher_future = run_dispatcher(Dispatcher::new(peer), link, &DISPATCH_INBOX);
    let control_future = async {
        let loop_start = Instant::now();

        loop {
            let now_ms = loop_start.elapsed().as_millis();
            let calibration_held = calibration_input.is_low();
            let outcome = controller.tick(now_ms, calibration_held);
            controller.io_mut().feedback.service(now_ms);

            let level = controller.backlight();
            if level != backlight_level {
                if let Err(err) = backlight.set_duty(level.duty_pct()) {
                    info!("backlight duty update failed: {:?}", err);
                }
                backlight_level = level;
            }

            if let TickOutcome::Suspend(reason) = outcome {
                info!(
                    "sleep: entering deep sleep reason={} after {}ms",
                    reason.as_str(),
                    now_ms
                );
                let sleep_start = Instant::now();
                while !controller.io().feedback.is_idle()
                    && sleep_start.elapsed().as_millis() < SLEEP_FEEDBACK_WAIT_MS
                {
                    controller
                        .io_mut()
                        .feedback
                        .service(loop_start.elapsed().as_millis());
                    Timer::after_millis(CONTROL_TICK_MS).await;
                }
                let _ = backlight.set_duty(0);
                power::enter_deep_sleep(&mut controller.io_mut().keys);
            }

            Timer::after_millis(CONTROL_TICK_MS).await;
        }
    };

    let _ = embassy_futures::join::join(dispatcher_future, control_future).await;
    unreachable!()
}


use embedded_hal::digital::{InputPin, OutputPin};
use esp_hal::{
    gpio::RtcPin,
    peripherals::{GPIO3, GPIO8, GPIO9, GPIO10, LPWR},
    rtc_cntl::{
        Rtc,
        sleep::{RtcioWakeupSource, WakeupLevel},
    },
};
use keylink_hal_esp32s3::input::matrix::KeyMatrix;
use log::info;

pub(super) fn enter_deep_sleep<ROW, COL, const ROWS: usize, const COLS: usize>(
    matrix: &mut KeyMatrix<ROW, COL, ROWS, COLS>,
) -> !
where
    ROW: InputPin,
    COL: OutputPin,
{
    // Every column high so any key pulls its row, and through the diodes the wake line, high.
    if matrix.prepare_for_wake().is_err() {
        info!("sleep: failed to drive matrix columns for wake");
    }
    // Latch the columns high through deep sleep.
    unsafe { GPIO8::steal() }.rtcio_pad_hold(true);
    unsafe { GPIO9::steal() }.rtcio_pad_hold(true);
    unsafe { GPIO10::steal() }.rtcio_pad_hold(true);

    let mut rtc = Rtc::new(unsafe { LPWR::steal() });
    let mut wake_line = unsafe { GPIO3::steal() };
    let mut wake_pins: [(&mut dyn RtcPin, WakeupLevel); 1] =
        [(&mut wake_line, WakeupLevel::High)];
    let wake_source = RtcioWakeupSource::new(&mut wake_pins);

    rtc.sleep_deep(&[&wake_source]);
}

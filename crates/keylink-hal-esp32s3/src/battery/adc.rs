use esp_hal::{
    Blocking,
    analog::adc::{Adc, AdcChannel, AdcConfig, AdcPin, Attenuation},
    peripherals::ADC1,
};
use keylink_core::battery::BatterySense;

const ADC_FULL_SCALE_RAW: u32 = 4095;

/// Conversion from 12-bit ADC counts to battery millivolts.
#[derive(Debug, Clone, Copy)]
pub struct SenseScale {
    full_scale_mv: u32,
    divider_num: u32,
    divider_den: u32,
}

impl Default for SenseScale {
    fn default() -> Self {
        // 11 dB attenuation behind a 1:2 resistor divider.
        Self {
            full_scale_mv: 2_500,
            divider_num: 2,
            divider_den: 1,
        }
    }
}

impl SenseScale {
    pub const fn with_full_scale_mv(mut self, full_scale_mv: u32) -> Self {
        self.full_scale_mv = full_scale_mv;
        self
    }

    pub const fn with_divider(mut self, num: u32, den: u32) -> Self {
        self.divider_num = num;
        self.divider_den = den;
        self
    }

    fn to_millivolts(self, raw: u16) -> u16 {
        let sense_mv = raw as u32 * self.full_scale_mv / ADC_FULL_SCALE_RAW;
        let battery_mv = sense_mv * self.divider_num / self.divider_den.max(1);
        battery_mv.min(u16::MAX as u32) as u16
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BatterySenseError {
    Conversion,
}

/// One-shot ADC1 reads of the battery sense line.
pub struct AdcBatterySense<'d, PIN> {
    adc: Adc<'d, ADC1<'d>, Blocking>,
    pin: AdcPin<PIN, ADC1<'d>>,
    scale: SenseScale,
}

impl<'d, PIN> AdcBatterySense<'d, PIN>
where
    PIN: AdcChannel,
{
    pub fn new(adc1: ADC1<'d>, sense_pin: PIN, scale: SenseScale) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(sense_pin, Attenuation::_11dB);
        Self {
            adc: Adc::new(adc1, config),
            pin,
            scale,
        }
    }
}

impl<PIN> BatterySense for AdcBatterySense<'_, PIN>
where
    PIN: AdcChannel,
{
    type Error = BatterySenseError;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        let raw = nb::block!(self.adc.read_oneshot(&mut self.pin))
            .map_err(|_| BatterySenseError::Conversion)?;
        Ok(self.scale.to_millivolts(raw))
    }
}

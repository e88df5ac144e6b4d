//! The operations a single PWM driver chip provides to a `ChannelRouter`.

use std::fmt::Debug;

use serde::Deserialize;

///Number of ticks in one PWM cycle.
pub const PWM_CYCLE_TICKS: u16 = 4096;

///Largest duty value accepted by `PwmChip::set_pin`.
pub const MAX_DUTY_TICKS: u16 = PWM_CYCLE_TICKS - 1;

///Writing this value to an ON or OFF register sets the "full" bit of that edge.
pub const FULL_TICKS: u16 = PWM_CYCLE_TICKS;

///How the chip drives its outputs.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputDriver {
    ///Push-pull outputs.
    TotemPole,
    ///Outputs only sink current. LEDs with integrated zener diodes must use this mode.
    OpenDrain,
}

impl OutputDriver {
    pub fn is_totem_pole(&self) -> bool {
        matches!(self, Self::TotemPole)
    }
}

///Selects which edge of a channel's PWM timing pair to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PwmEdge {
    On,
    Off,
}

///Converts a duty value into the ON/OFF tick pair to write.
///
/// 0 and 4095 are fully off and fully on respectively (inverted when `invert` is set),
/// everything else turns on at tick 0.
pub fn pin_on_off(value: u16, invert: bool) -> (u16, u16) {
    let value = value.min(MAX_DUTY_TICKS);
    let full_on = (FULL_TICKS, 0);
    let full_off = (0, FULL_TICKS);
    if invert {
        match value {
            0 => full_on,
            MAX_DUTY_TICKS => full_off,
            _ => (0, MAX_DUTY_TICKS - value),
        }
    } else {
        match value {
            MAX_DUTY_TICKS => full_on,
            0 => full_off,
            _ => (0, value),
        }
    }
}

///Approximate number of ticks for a pulse of `micros` microseconds.
///
/// One tick lasts `(prescale + 1) / oscillator_hz` seconds. The result truncates.
pub fn microseconds_to_ticks(micros: u16, prescale: u8, oscillator_hz: u32) -> u16 {
    let tick_us = 1_000_000.0 * (prescale as f64 + 1.0) / oscillator_hz as f64;
    (micros as f64 / tick_us) as u16
}

///A single PWM driver chip on a shared bus.
///
/// Every method performs blocking bus I/O except the oscillator frequency accessors,
/// which only track the nominal value used for frequency calculations.
pub trait PwmChip {
    type Error: Debug;

    ///Physical number of channels on the chip.
    const CHANNELS: u8;

    ///Sets up the chip. With a prescale it is switched to the external clock,
    ///otherwise it runs on the internal oscillator.
    fn begin(&mut self, prescale: Option<u8>) -> Result<(), Self::Error>;

    fn reset(&mut self) -> Result<(), Self::Error>;

    ///Puts the chip into low power mode.
    fn sleep(&mut self) -> Result<(), Self::Error>;

    fn wakeup(&mut self) -> Result<(), Self::Error>;

    ///Switches the chip to the EXTCLK pin using `prescale`.
    fn set_ext_clk(&mut self, prescale: u8) -> Result<(), Self::Error>;

    ///Sets the output frequency, up to ~1.6 kHz.
    fn set_pwm_freq(&mut self, freq_hz: f32) -> Result<(), Self::Error>;

    fn set_output_mode(&mut self, driver: OutputDriver) -> Result<(), Self::Error>;

    fn get_pwm(&mut self, channel: u8, edge: PwmEdge) -> Result<u16, Self::Error>;

    ///Sets when in the 4096 tick cycle the channel turns on and off.
    fn set_pwm(&mut self, channel: u8, on: u16, off: u16) -> Result<(), Self::Error>;

    fn read_prescale(&mut self) -> Result<u8, Self::Error>;

    fn oscillator_frequency(&self) -> u32;

    fn set_oscillator_frequency(&mut self, freq_hz: u32);

    ///Sets the channel active for `value` ticks out of 4096. See `pin_on_off`.
    fn set_pin(&mut self, channel: u8, value: u16, invert: bool) -> Result<(), Self::Error> {
        let (on, off) = pin_on_off(value, invert);
        self.set_pwm(channel, on, off)
    }

    ///Sets the channel pulse width in microseconds. Not precise.
    fn write_microseconds(&mut self, channel: u8, micros: u16) -> Result<(), Self::Error> {
        let prescale = self.read_prescale()?;
        let ticks = microseconds_to_ticks(micros, prescale, self.oscillator_frequency());
        self.set_pwm(channel, 0, ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_on_off_boundaries() {
        assert_eq!(pin_on_off(0, false), (0, 4096));
        assert_eq!(pin_on_off(4095, false), (4096, 0));
        assert_eq!(pin_on_off(0, true), (4096, 0));
        assert_eq!(pin_on_off(4095, true), (0, 4096));
    }

    #[test]
    fn test_pin_on_off_in_between() {
        assert_eq!(pin_on_off(1000, false), (0, 1000));
        assert_eq!(pin_on_off(1000, true), (0, 3095));
        //values above the cycle are treated as fully on
        assert_eq!(pin_on_off(5000, false), (4096, 0));
    }

    #[test]
    fn test_microseconds_to_ticks() {
        //prescale 121 at 25MHz is ~50Hz, one tick is 4.88us
        assert_eq!(microseconds_to_ticks(1500, 121, 25_000_000), 307);
        assert_eq!(microseconds_to_ticks(0, 121, 25_000_000), 0);
        assert_eq!(microseconds_to_ticks(1500, 121, 0), 0);
    }

    #[test]
    fn test_output_driver_deserialize() {
        let driver: OutputDriver = serde_json::from_str("\"OpenDrain\"").unwrap();
        assert_eq!(driver, OutputDriver::OpenDrain);
        assert!(!driver.is_totem_pole());
        assert!(OutputDriver::TotemPole.is_totem_pole());
    }
}

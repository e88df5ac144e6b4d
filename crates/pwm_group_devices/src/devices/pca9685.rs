use std::{fmt::Debug, thread::sleep, time::Duration};

use embedded_hal::i2c::I2c;
use pwm_group_core::chip::{OutputDriver, PwmChip, PwmEdge};
use tracing::debug;

use crate::error::DeviceConfigError;

const MODE1_REGISTER: u8 = 0x00;
const MODE2_REGISTER: u8 = 0x01;
const LED0_ON_L_REGISTER: u8 = 0x06;
const PRESCALE_REGISTER: u8 = 0xFE;

const MODE1_SLEEP: u8 = 0x10;
const MODE1_AI: u8 = 0x20;
const MODE1_EXTCLK: u8 = 0x40;
const MODE1_RESTART: u8 = 0x80;

const MODE2_OUTDRV: u8 = 0x04;

///Nominal frequency of the internal oscillator.
pub const FREQUENCY_OSCILLATOR: u32 = 25_000_000;

const PRESCALE_MIN: u8 = 3;
const PRESCALE_MAX: u8 = 255;

const MIN_FREQUENCY_HZ: f32 = 1.0;
const MAX_FREQUENCY_HZ: f32 = 3500.0;

///Frequency used by `begin` when no external clock is configured.
const DEFAULT_FREQUENCY_HZ: f32 = 1000.0;

pub const CHANNEL_COUNT: u8 = 16;

const RESET_WAIT: Duration = Duration::from_millis(10);
const OSCILLATOR_WAIT: Duration = Duration::from_millis(5);

#[derive(Debug, PartialEq)]
pub enum Error<E> {
    I2C(E),
    InvalidInputData,
}

impl<E> From<Error<E>> for DeviceConfigError
where
    E: Debug,
{
    fn from(err: Error<E>) -> DeviceConfigError {
        let message = match err {
            Error::I2C(err) => {
                format!("Could not configure PCA9685 Device: {:?}", err)
            }
            Error::InvalidInputData => "PCA9685: Invalid input data".to_string(),
        };
        DeviceConfigError::new(message)
    }
}

///Prescale value producing `freq_hz` from an oscillator running at `oscillator_hz`.
pub fn prescale_for_frequency(freq_hz: f32, oscillator_hz: u32) -> u8 {
    let freq_hz = freq_hz.max(MIN_FREQUENCY_HZ).min(MAX_FREQUENCY_HZ);
    let prescale = (oscillator_hz as f32 / (freq_hz * 4096.0)) + 0.5 - 1.0;
    prescale.max(PRESCALE_MIN as f32).min(PRESCALE_MAX as f32) as u8
}

//one pwm chip bound to an address on an i2c bus
pub struct Pca9685<I2C> {
    i2c: I2C,
    address: u8,
    oscillator_hz: u32,
}

impl<I2C, E> Pca9685<I2C>
where
    E: Debug,
    I2C: I2c<Error = E>,
{
    ///Binds to a chip. Nothing is sent over the bus until `begin`.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            oscillator_hz: FREQUENCY_OSCILLATOR,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    ///Releases the bus.
    pub fn destroy(self) -> I2C {
        self.i2c
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Error<E>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buffer)
            .map_err(Error::I2C)?;
        Ok(buffer[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(Error::I2C)
    }

    fn channel_register(channel: u8, edge: PwmEdge) -> Result<u8, Error<E>> {
        if channel >= CHANNEL_COUNT {
            return Err(Error::InvalidInputData);
        }
        let offset = match edge {
            PwmEdge::On => 0,
            PwmEdge::Off => 2,
        };
        Ok(LED0_ON_L_REGISTER + 4 * channel + offset)
    }
}

impl<I2C, E> PwmChip for Pca9685<I2C>
where
    E: Debug,
    I2C: I2c<Error = E>,
{
    type Error = Error<E>;

    const CHANNELS: u8 = CHANNEL_COUNT;

    fn begin(&mut self, prescale: Option<u8>) -> Result<(), Self::Error> {
        //make sure something answers at the address before touching any state
        self.read_register(MODE1_REGISTER)?;
        self.reset()?;
        self.set_oscillator_frequency(FREQUENCY_OSCILLATOR);
        match prescale {
            Some(prescale) => self.set_ext_clk(prescale)?,
            None => self.set_pwm_freq(DEFAULT_FREQUENCY_HZ)?,
        }
        debug!("PCA9685 at {:#04x} is ready", self.address);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.write_register(MODE1_REGISTER, MODE1_RESTART)?;
        sleep(RESET_WAIT);
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), Self::Error> {
        let awake = self.read_register(MODE1_REGISTER)?;
        self.write_register(MODE1_REGISTER, awake | MODE1_SLEEP)?;
        sleep(OSCILLATOR_WAIT);
        Ok(())
    }

    fn wakeup(&mut self) -> Result<(), Self::Error> {
        let asleep = self.read_register(MODE1_REGISTER)?;
        self.write_register(MODE1_REGISTER, asleep & !MODE1_SLEEP)
    }

    fn set_ext_clk(&mut self, prescale: u8) -> Result<(), Self::Error> {
        let old_mode = self.read_register(MODE1_REGISTER)?;
        let mut new_mode = (old_mode & !MODE1_RESTART) | MODE1_SLEEP;
        self.write_register(MODE1_REGISTER, new_mode)?;

        //EXTCLK can only be set while the chip sleeps
        new_mode |= MODE1_EXTCLK;
        self.write_register(MODE1_REGISTER, new_mode)?;
        self.write_register(PRESCALE_REGISTER, prescale)?;
        sleep(OSCILLATOR_WAIT);

        self.write_register(
            MODE1_REGISTER,
            (new_mode & !MODE1_SLEEP) | MODE1_RESTART | MODE1_AI,
        )
    }

    fn set_pwm_freq(&mut self, freq_hz: f32) -> Result<(), Self::Error> {
        let prescale = prescale_for_frequency(freq_hz, self.oscillator_hz);
        debug!(
            "PCA9685 at {:#04x}: {} Hz needs prescale {}",
            self.address, freq_hz, prescale
        );

        let old_mode = self.read_register(MODE1_REGISTER)?;
        let new_mode = (old_mode & !MODE1_RESTART) | MODE1_SLEEP;
        self.write_register(MODE1_REGISTER, new_mode)?;
        self.write_register(PRESCALE_REGISTER, prescale)?;
        self.write_register(MODE1_REGISTER, old_mode)?;
        sleep(OSCILLATOR_WAIT);
        self.write_register(MODE1_REGISTER, old_mode | MODE1_RESTART | MODE1_AI)
    }

    fn set_output_mode(&mut self, driver: OutputDriver) -> Result<(), Self::Error> {
        let old_mode = self.read_register(MODE2_REGISTER)?;
        let new_mode = if driver.is_totem_pole() {
            old_mode | MODE2_OUTDRV
        } else {
            old_mode & !MODE2_OUTDRV
        };
        self.write_register(MODE2_REGISTER, new_mode)
    }

    fn get_pwm(&mut self, channel: u8, edge: PwmEdge) -> Result<u16, Self::Error> {
        let register = Self::channel_register(channel, edge)?;
        let mut buffer = [0u8; 2];
        self.i2c
            .write_read(self.address, &[register], &mut buffer)
            .map_err(Error::I2C)?;
        Ok(u16::from_le_bytes(buffer))
    }

    fn set_pwm(&mut self, channel: u8, on: u16, off: u16) -> Result<(), Self::Error> {
        let register = Self::channel_register(channel, PwmEdge::On)?;
        let [on_l, on_h] = on.to_le_bytes();
        let [off_l, off_h] = off.to_le_bytes();
        self.i2c
            .write(self.address, &[register, on_l, on_h, off_l, off_h])
            .map_err(Error::I2C)
    }

    fn read_prescale(&mut self) -> Result<u8, Self::Error> {
        self.read_register(PRESCALE_REGISTER)
    }

    fn oscillator_frequency(&self) -> u32 {
        self.oscillator_hz
    }

    fn set_oscillator_frequency(&mut self, freq_hz: u32) {
        self.oscillator_hz = freq_hz;
    }
}

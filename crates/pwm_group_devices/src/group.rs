//! Groups of PCA9685 chips sharing one I2C bus, and building them from configuration.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use embedded_hal::i2c::I2c;
use pwm_group_core::{chip::OutputDriver, error::GroupBuildError, ChannelRouter, Output};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    bus::SharedI2c,
    devices::pca9685::{Pca9685, CHANNEL_COUNT},
    error::DeviceConfigError,
    output::{ChannelOutputs, OutputChannelConfig},
};

pub const PCA9685_I2C_ADDRESS_1: u8 = 0x40;
pub const PCA9685_I2C_ADDRESS_2: u8 = 0x41;
pub const PCA9685_I2C_ADDRESS_3: u8 = 0x42;
pub const PCA9685_I2C_ADDRESS_4: u8 = 0x43;
pub const PCA9685_I2C_ADDRESS_5: u8 = 0x44;

///Addresses used when a board stack is jumpered in order from 0x40.
pub const DEFAULT_ADDRESSES: [u8; 5] = [
    PCA9685_I2C_ADDRESS_1,
    PCA9685_I2C_ADDRESS_2,
    PCA9685_I2C_ADDRESS_3,
    PCA9685_I2C_ADDRESS_4,
    PCA9685_I2C_ADDRESS_5,
];

const MIN_ADDRESS: u8 = 0x40;
const MAX_ADDRESS: u8 = 0x7F;

pub type Pca9685Group<I2C> = ChannelRouter<Pca9685<I2C>>;

///Builds a group with one PCA9685 per address, all bound to `bus`.
pub fn with_bus<I2C, E>(
    channels_per_chip: u8,
    addresses: &[u8],
    bus: SharedI2c<I2C>,
) -> Result<Pca9685Group<SharedI2c<I2C>>, GroupBuildError>
where
    E: std::fmt::Debug,
    I2C: I2c<Error = E>,
{
    ChannelRouter::new(channels_per_chip, addresses, |address| {
        Pca9685::new(bus.clone(), address)
    })
}

///Builds a group where every chip gets its own bus handle from `provider`, called with the
///chip address in order.
pub fn with_bus_provider<I2C, E, F>(
    channels_per_chip: u8,
    addresses: &[u8],
    mut provider: F,
) -> Result<Pca9685Group<I2C>, GroupBuildError>
where
    E: std::fmt::Debug,
    I2C: I2c<Error = E>,
    F: FnMut(u8) -> I2C,
{
    ChannelRouter::new(channels_per_chip, addresses, |address| {
        Pca9685::new(provider(address), address)
    })
}

fn default_bus() -> u8 {
    1
}

fn default_channels_per_chip() -> u8 {
    CHANNEL_COUNT
}

//system level config -- corresponds to a stack of pwm chips on one bus
#[derive(Debug, Deserialize)]
pub struct Pca9685GroupConfig {
    #[serde(default = "default_bus")]
    pub bus: u8,
    #[serde(default = "default_channels_per_chip")]
    pub channels_per_chip: u8,
    pub addresses: Vec<u8>,
    #[serde(default)]
    pub ext_clk_prescale: Option<u8>,
    #[serde(default)]
    pub oscillator_hz: Option<u32>,
    #[serde(default)]
    pub frequency_hz: Option<f32>,
    #[serde(default)]
    pub output_mode: Option<OutputDriver>,
    #[serde(default)]
    pub outputs: HashMap<String, OutputChannelConfig>,
}

impl Pca9685GroupConfig {
    ///Checks the whole config and reports every problem found at once.
    pub fn validate(&self) -> Result<(), GroupBuildError> {
        let mut errs = Vec::new();
        if self.addresses.is_empty() {
            errs.push("PCA9685 group needs at least one address".to_string());
        }
        let mut seen = HashSet::with_capacity(self.addresses.len());
        for address in &self.addresses {
            if !(MIN_ADDRESS..=MAX_ADDRESS).contains(address) {
                errs.push(format!(
                    "PCA9685 address {:#04x} is outside {:#04x}..={:#04x}",
                    address, MIN_ADDRESS, MAX_ADDRESS
                ));
            }
            if !seen.insert(*address) {
                errs.push(format!("PCA9685 address {:#04x} is used twice", address));
            }
        }
        if self.channels_per_chip == 0 || self.channels_per_chip > CHANNEL_COUNT {
            errs.push(format!(
                "channels_per_chip must be between 1 and {}, got {}",
                CHANNEL_COUNT,
                self.channels_per_chip
            ));
        }
        let num_channels = self.addresses.len() * self.channels_per_chip as usize;
        let mut names: Vec<&String> = self.outputs.keys().collect();
        names.sort();
        for name in names {
            let channel = self.outputs[name].channel;
            if channel as usize >= num_channels {
                errs.push(format!(
                    "output {} uses channel {} but the group only has {} channels",
                    name, channel, num_channels
                ));
            }
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(GroupBuildError::messages(&errs))
        }
    }
}

//a configured group of chips along with its running outputs
pub struct Pca9685GroupDevice<I2C> {
    pub group: Arc<Mutex<Pca9685Group<SharedI2c<I2C>>>>,
    pub join_handle: JoinHandle<()>,
    pub outputs: HashMap<String, Output<f64>>,
}

pub struct Pca9685GroupBuilder<F> {
    i2c_bus_provider: F,
}

impl<F> Pca9685GroupBuilder<F> {
    pub fn new(i2c_bus_provider: F) -> Pca9685GroupBuilder<F> {
        Pca9685GroupBuilder { i2c_bus_provider }
    }

    ///Builds the group, sets up every chip, applies the clock and output settings and
    ///spawns the named outputs.
    pub async fn try_build<E, I2C>(
        &self,
        cfg: &Pca9685GroupConfig,
        cancel_token: CancellationToken,
    ) -> Result<Pca9685GroupDevice<I2C>, GroupBuildError>
    where
        E: std::fmt::Debug,
        I2C: I2c<Error = E> + Send + 'static,
        F: Fn(u8) -> Result<I2C, GroupBuildError>,
    {
        cfg.validate()?;

        let bus = SharedI2c::new((self.i2c_bus_provider)(cfg.bus)?);
        let mut group = with_bus(cfg.channels_per_chip, &cfg.addresses, bus)?;

        if !group.begin(cfg.ext_clk_prescale) {
            return Err(DeviceConfigError::new(format!(
                "PCA9685 group at {:02x?} on bus {} failed to begin",
                cfg.addresses, cfg.bus
            ))
            .into());
        }
        if let Some(oscillator_hz) = cfg.oscillator_hz {
            group.set_oscillator_frequency(oscillator_hz);
        }
        if let Some(frequency_hz) = cfg.frequency_hz {
            group.set_pwm_freq(frequency_hz).map_err(|err| {
                DeviceConfigError::new(format!("could not set PWM frequency: {:?}", err))
            })?;
        }
        if let Some(output_mode) = cfg.output_mode {
            group.set_output_mode(output_mode).map_err(|err| {
                DeviceConfigError::new(format!("could not set output mode: {:?}", err))
            })?;
        }
        debug!("PCA9685 group prescale is {:?}", group.read_prescale());
        info!(
            "PCA9685 group ready: {} chips, {} channels",
            group.num_chips(),
            group.num_channels()
        );

        let group = Arc::new(Mutex::new(group));
        let outputs = ChannelOutputs::spawn(group.clone(), &cfg.outputs, cancel_token)?;

        Ok(Pca9685GroupDevice {
            group,
            join_handle: outputs.join_handle,
            outputs: outputs.outputs,
        })
    }
}

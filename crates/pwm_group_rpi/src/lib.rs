//!Raspberry Pi I2C buses for PCA9685 groups. It is a wrapper around the rppal library.
//!
//! The `get_bus` and `get_default_bus` functions open an I2C bus that can be handed to
//! `pwm_group_devices::group::with_bus` or used as the bus provider of a group builder.

//internal error type for rpi buses
pub mod error;

use pwm_group_core::error::GroupBuildError;
use pwm_group_devices::{
    bus::SharedI2c,
    group::{with_bus, Pca9685Group},
};
use tracing::debug;

use crate::error::BusError;

pub use rppal;
pub use rppal::i2c::I2c;

//get i2c bus by id
pub fn get_bus(bus: u8) -> Result<I2c, BusError> {
    debug!("opening i2c bus {}", bus);
    Ok(I2c::with_bus(bus)?)
}

//get default i2c bus
pub fn get_default_bus() -> Result<I2c, BusError> {
    Ok(I2c::new()?)
}

///Bus provider for `Pca9685GroupBuilder`.
pub fn i2c_bus_provider(bus: u8) -> Result<I2c, GroupBuildError> {
    Ok(get_bus(bus)?)
}

///Group with one PCA9685 per address, all on the default bus of the board.
pub fn default_group(
    channels_per_chip: u8,
    addresses: &[u8],
) -> Result<Pca9685Group<SharedI2c<I2c>>, GroupBuildError> {
    let bus = get_default_bus()?;
    with_bus(channels_per_chip, addresses, SharedI2c::new(bus))
}

//! PCA9685 chips on I2C and the plumbing to run several of them as one group of channels.
//!
//! Buses come from the caller, either directly through `group::with_bus` or through a bus
//! provider handed to `group::Pca9685GroupBuilder`.

//internal error type for device configuration
pub mod error;

pub mod devices;

//named float outputs driving channels of a group
pub mod output;

#[cfg(feature = "pca9685")]
pub mod bus;

#[cfg(feature = "pca9685")]
pub mod group;

#[cfg(all(test, feature = "pca9685"))]
mod mock;

//! A cloneable handle that lets every chip of a group talk over the same I2C bus.

use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::i2c::{ErrorType, I2c, Operation};

///Shared I2C bus. Each clone refers to the same underlying bus and every transaction holds
///the bus lock for its full duration.
pub struct SharedI2c<I2C> {
    bus: Arc<Mutex<I2C>>,
}

impl<I2C> SharedI2c<I2C> {
    pub fn new(bus: I2C) -> Self {
        Self {
            bus: Arc::new(Mutex::new(bus)),
        }
    }

    ///Locks the bus. A poisoned lock is recovered since the bus itself holds no invariants.
    pub fn lock(&self) -> MutexGuard<'_, I2C> {
        match self.bus.lock() {
            Ok(bus) => bus,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<I2C> Clone for SharedI2c<I2C> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
        }
    }
}

impl<I2C: ErrorType> ErrorType for SharedI2c<I2C> {
    type Error = I2C::Error;
}

impl<I2C: I2c> I2c for SharedI2c<I2C> {
    fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.lock().read(address, read)
    }

    fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.lock().write(address, write)
    }

    fn write_read(&mut self, address: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
        self.lock().write_read(address, write, read)
    }

    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.lock().transaction(address, operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BusOp, MockBus};

    #[test]
    fn test_clones_share_one_bus() {
        let shared = SharedI2c::new(MockBus::with_chips(&[0x40, 0x41]));
        let mut first = shared.clone();
        let mut second = shared.clone();

        first.write(0x40, &[0x06, 0x12]).unwrap();
        second.write(0x41, &[0x06, 0x34]).unwrap();

        let bus = shared.lock();
        assert_eq!(bus.register(0x40, 0x06), 0x12);
        assert_eq!(bus.register(0x41, 0x06), 0x34);
        assert_eq!(
            bus.log(),
            &[
                BusOp::Write { address: 0x40, bytes: vec![0x06, 0x12] },
                BusOp::Write { address: 0x41, bytes: vec![0x06, 0x34] },
            ]
        );
    }

    #[test]
    fn test_errors_pass_through() {
        let mut shared = SharedI2c::new(MockBus::with_chips(&[0x40]));
        let mut buffer = [0u8; 1];
        assert!(shared.write_read(0x55, &[0x00], &mut buffer).is_err());
    }
}

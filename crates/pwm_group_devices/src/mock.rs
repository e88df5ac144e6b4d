//! In-memory I2C bus holding the register files of several PCA9685 chips.

use std::collections::HashMap;

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

const MODE1_POWER_ON: u8 = 0x11;
const PRESCALE_POWER_ON: u8 = 0x1E;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBusError {
    NoAcknowledge(u8),
}

impl i2c::Error for MockBusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Write { address: u8, bytes: Vec<u8> },
    Read { address: u8, len: usize },
}

impl BusOp {
    pub fn address(&self) -> u8 {
        match self {
            Self::Write { address, .. } | Self::Read { address, .. } => *address,
        }
    }
}

///Register pointers auto-increment on every byte, like a PCA9685 with AI set.
pub struct MockBus {
    registers: HashMap<u8, [u8; 256]>,
    pointers: HashMap<u8, u8>,
    log: Vec<BusOp>,
}

impl MockBus {
    pub fn with_chips(addresses: &[u8]) -> Self {
        let mut registers = HashMap::new();
        for address in addresses {
            let mut regs = [0u8; 256];
            regs[0x00] = MODE1_POWER_ON;
            regs[0xFE] = PRESCALE_POWER_ON;
            registers.insert(*address, regs);
        }
        Self {
            registers,
            pointers: HashMap::new(),
            log: Vec::new(),
        }
    }

    pub fn register(&self, address: u8, register: u8) -> u8 {
        self.registers[&address][register as usize]
    }

    pub fn set_register(&mut self, address: u8, register: u8, value: u8) {
        if let Some(regs) = self.registers.get_mut(&address) {
            regs[register as usize] = value;
        }
    }

    pub fn log(&self) -> &[BusOp] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    ///Addresses that saw any traffic, in order of first use.
    pub fn addresses_touched(&self) -> Vec<u8> {
        let mut touched = Vec::new();
        for op in &self.log {
            if !touched.contains(&op.address()) {
                touched.push(op.address());
            }
        }
        touched
    }
}

impl ErrorType for MockBus {
    type Error = MockBusError;
}

impl I2c for MockBus {
    fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.transaction(address, &mut [Operation::Read(read)])
    }

    fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.transaction(address, &mut [Operation::Write(write)])
    }

    fn write_read(&mut self, address: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
        self.transaction(address, &mut [Operation::Write(write), Operation::Read(read)])
    }

    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let regs = self
            .registers
            .get_mut(&address)
            .ok_or(MockBusError::NoAcknowledge(address))?;
        let pointer = self.pointers.entry(address).or_insert(0);
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    self.log.push(BusOp::Write {
                        address,
                        bytes: bytes.to_vec(),
                    });
                    if let Some((register, data)) = bytes.split_first() {
                        *pointer = *register;
                        for byte in data {
                            regs[*pointer as usize] = *byte;
                            *pointer = pointer.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buffer) => {
                    self.log.push(BusOp::Read {
                        address,
                        len: buffer.len(),
                    });
                    for byte in buffer.iter_mut() {
                        *byte = regs[*pointer as usize];
                        *pointer = pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

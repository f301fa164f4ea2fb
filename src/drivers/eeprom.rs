//! AT24C32 serial EEPROM (4 KiB, I²C).
//!
//! Byte-at-a-time access: every read and write is its own bus transaction.
//! Writes then wait out the device's internal write cycle; reads return as
//! soon as the transaction completes. Slow to write, but it keeps the driver
//! free of page-boundary bookkeeping.
//!
//! The top page of the device holds the config record (see
//! [`EepromConfigStore`](crate::adapters::eeprom_config::EepromConfigStore));
//! everything below [`USER_REGION_END`] is free for host data.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use crate::app::ports::{StorageError, StoragePort};

/// Device size in bytes.
pub const CAPACITY: u16 = 4096;
/// First byte of the config region. Host reads/writes stay below this.
pub const USER_REGION_END: u16 = 0x0F00;
/// 7-bit base address; the low three bits come from the A2..A0 straps.
pub const BASE_ADDRESS: u8 = 0x50;
/// Internal write-cycle time (tWR).
const WRITE_CYCLE_MS: u32 = 10;

pub struct At24c32<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> At24c32<I2C, D> {
    /// `straps` is the A2..A0 pin configuration (0..=7).
    pub fn new(i2c: I2C, delay: D, straps: u8) -> Self {
        Self {
            i2c,
            delay,
            address: BASE_ADDRESS | (straps & 0x07),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn map_err(e: &I2C::Error) -> StorageError {
        match e.kind() {
            ErrorKind::NoAcknowledge(_) => StorageError::Nack,
            _ => StorageError::Bus,
        }
    }
}

impl<I2C: I2c, D: DelayNs> StoragePort for At24c32<I2C, D> {
    fn capacity(&self) -> u16 {
        CAPACITY
    }

    fn read_byte(&mut self, address: u16) -> Result<u8, StorageError> {
        self.check_range(address, 1)?;
        let mut byte = [0u8; 1];
        self.i2c
            .write_read(self.address, &address.to_be_bytes(), &mut byte)
            .map_err(|e| Self::map_err(&e))?;
        Ok(byte[0])
    }

    fn write_byte(&mut self, address: u16, data: u8) -> Result<(), StorageError> {
        self.check_range(address, 1)?;
        let [hi, lo] = address.to_be_bytes();
        let result = self.i2c.write(self.address, &[hi, lo, data]);
        self.delay.delay_ms(WRITE_CYCLE_MS);
        result.map_err(|e| Self::map_err(&e))
    }
}

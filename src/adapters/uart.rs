//! UART transport adapter.
//!
//! Wraps an ESP-IDF [`UartDriver`] as a polled [`Transport`]. Reads never
//! block; writes block until the FIFO accepts the frame. Driver errors are
//! logged with their ESP-IDF code and surfaced as [`CommsError`].

use esp_idf_hal::delay::{BLOCK, NON_BLOCK};
use esp_idf_hal::uart::UartDriver;
use log::warn;

use crate::error::CommsError;
use crate::rpc::transport::Transport;

pub struct UartTransport<'d> {
    uart: UartDriver<'d>,
}

impl<'d> UartTransport<'d> {
    pub fn new(uart: UartDriver<'d>) -> Self {
        Self { uart }
    }
}

impl Transport for UartTransport<'_> {
    type Error = CommsError;

    fn available(&self) -> usize {
        match self.uart.remaining_read() {
            Ok(n) => n,
            Err(e) => {
                warn!("UART: remaining_read failed: {}", e);
                0
            }
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        let mut byte = [0u8; 1];
        let n = self.uart.read(&mut byte, NON_BLOCK).map_err(|e| {
            warn!("UART: read: {}", e);
            CommsError::UartReadFailed
        })?;
        match n {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.uart.write(data).map_err(|e| {
            warn!("UART: write: {}", e);
            CommsError::UartWriteFailed
        })
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.uart.wait_tx_done(BLOCK).map_err(|e| {
            warn!("UART: flush: {}", e);
            CommsError::UartWriteFailed
        })
    }
}

//! Transport abstraction: any polled byte stream.
//!
//! Concrete implementations:
//! - UART at the configured baud rate (target)
//! - in-memory loopback (tests)
//!
//! The protocol engine is generic over `Transport`, so swapping the link
//! requires zero changes to the parsing or dispatch logic.

use crate::error::Error;

/// Polled, non-blocking byte stream.
pub trait Transport {
    /// Error type for this transport, reported as a firmware [`Error`].
    type Error: Into<Error>;

    /// Number of bytes that can be read without blocking.
    fn available(&self) -> usize;

    /// Read one byte. `Ok(None)` if nothing is pending.
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error>;

    /// Write `data` to the transport.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// A null transport that discards all writes and never reads.
/// Useful when no host link is wired up.
pub struct NullTransport;

impl Transport for NullTransport {
    type Error = core::convert::Infallible;

    fn available(&self) -> usize {
        0
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        Ok(None)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

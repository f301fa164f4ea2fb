//! MAX6675 K-type thermocouple converter (SPI, read-only).
//!
//! Each read clocks out one 16-bit big-endian frame:
//!
//! ```text
//!   D15      dummy sign bit (0)
//!   D14..D3  temperature, 0.25 °C per LSB
//!   D2       thermocouple input open
//!   D1       device id (0)
//!   D0       three-state
//! ```
//!
//! A conversion takes up to 220 ms, and reading sooner aborts it, so the
//! [`TemperatureSampler`](super::TemperatureSampler) rate-limits calls.

use embedded_hal::spi::SpiDevice;
use log::warn;

use crate::app::ports::ThermocouplePort;
use crate::error::SensorError;

const OPEN_BIT: u16 = 1 << 2;
const LSB_C: f32 = 0.25;

/// Decode a raw frame into °C, or report an open probe.
pub fn decode(raw: u16) -> Result<f32, SensorError> {
    if raw & OPEN_BIT != 0 {
        return Err(SensorError::OpenCircuit);
    }
    Ok(f32::from((raw >> 3) & 0x0FFF) * LSB_C)
}

pub struct Max6675<SPI> {
    spi: SPI,
    temperature_c: f32,
    last_error: Option<SensorError>,
}

impl<SPI: SpiDevice> Max6675<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            temperature_c: f32::NAN,
            last_error: None,
        }
    }

    /// Clock out one frame and decode it.
    pub fn sample(&mut self) -> Result<f32, SensorError> {
        let mut frame = [0u8; 2];
        self.spi
            .read(&mut frame)
            .map_err(|_| SensorError::BusFailed)?;
        decode(u16::from_be_bytes(frame))
    }

    pub fn last_error(&self) -> Option<SensorError> {
        self.last_error
    }
}

impl<SPI: SpiDevice> ThermocouplePort for Max6675<SPI> {
    fn read(&mut self) -> bool {
        match self.sample() {
            Ok(celsius) => {
                self.temperature_c = celsius;
                self.last_error = None;
                true
            }
            Err(e) => {
                if self.last_error != Some(e) {
                    warn!("MAX6675: {}", e);
                }
                self.last_error = Some(e);
                false
            }
        }
    }

    fn temperature(&self) -> f32 {
        self.temperature_c
    }

    fn is_open(&self) -> bool {
        self.last_error == Some(SensorError::OpenCircuit)
    }
}

//! Error types for the reflow firmware.
//!
//! Fault and sensor errors are `Copy` so they can be passed through the
//! sampler and safety supervisor without allocation. [`Error`] is what the
//! serial link and the boot path report; the control path itself is total
//! and never returns it.

use core::convert::Infallible;
use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The serial link failed.
    Comms(CommsError),
    /// A peripheral could not be brought up at boot.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Init(what) => write!(f, "init: {what}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<Infallible> for Error {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// SPI transfer to the thermocouple converter failed.
    BusFailed,
    /// The converter reports no probe attached (open thermocouple).
    OpenCircuit,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFailed => write!(f, "SPI transfer failed"),
            Self::OpenCircuit => write!(f, "thermocouple open"),
        }
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Safety faults force heating off. They are accumulated in a bitfield by
/// the safety supervisor so that multiple simultaneous faults can be tracked
/// and individually cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// Oven temperature exceeds the configured maximum.
    OverTemperature = 0b0000_0001,
    /// No successful thermocouple sample within the stall timeout.
    SensorStall = 0b0000_0010,
    /// Thermocouple converter reports an open probe.
    ThermocoupleOpen = 0b0000_0100,
}

impl SafetyFault {
    pub const ALL: [SafetyFault; 3] = [
        SafetyFault::OverTemperature,
        SafetyFault::SensorStall,
        SafetyFault::ThermocoupleOpen,
    ];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverTemperature => write!(f, "over temperature"),
            Self::SensorStall => write!(f, "thermocouple stalled"),
            Self::ThermocoupleOpen => write!(f, "thermocouple open"),
        }
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    UartInitFailed,
    UartReadFailed,
    UartWriteFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UartInitFailed => write!(f, "UART init failed"),
            Self::UartReadFailed => write!(f, "UART read failed"),
            Self::UartWriteFailed => write!(f, "UART write failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

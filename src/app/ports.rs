//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ReflowService (domain)
//! ```
//!
//! Driven adapters (thermocouple, heater, EEPROM, event sinks) implement
//! these traits. The [`ReflowService`](super::service::ReflowService)
//! consumes them via generics, so the control core never touches hardware
//! directly and every component can be exercised on the host.

use crate::app::events::AppEvent;
use crate::config::ReflowConfig;

// ───────────────────────────────────────────────────────────────
// Thermocouple port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// The thermocouple front end, treated as a black box.
///
/// Callers must not invoke [`read`](Self::read) faster than the converter's
/// minimum conversion interval; the
/// [`TemperatureSampler`](crate::sensors::TemperatureSampler) enforces this.
pub trait ThermocouplePort {
    /// Trigger a read. Returns `true` if a fresh, valid reading was latched.
    fn read(&mut self) -> bool;

    /// Last latched temperature (°C).
    fn temperature(&self) -> f32;

    /// Whether the last read reported a disconnected probe.
    fn is_open(&self) -> bool {
        false
    }
}

// ───────────────────────────────────────────────────────────────
// Heater port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Time-proportioned heater output.
pub trait HeaterPort {
    /// Drive the output line to its de-asserted state.
    fn begin(&mut self);

    /// Permit actuation.
    fn enable(&mut self);

    /// Forbid actuation and de-assert the output immediately.
    fn disable(&mut self);

    /// Advance the time-proportioning window. Must run every scheduler tick.
    fn update(&mut self, duty_cycle: f32, now_ms: u32);

    /// Whether the output line is currently asserted.
    fn is_on(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ EEPROM)
// ───────────────────────────────────────────────────────────────

/// Byte-addressable non-volatile storage.
///
/// Each single-byte access is a blocking bus transaction with a settling
/// delay. Multi-byte accesses are a sequence of single-byte transactions.
pub trait StoragePort {
    /// Total addressable bytes.
    fn capacity(&self) -> u16;

    /// Read one byte.
    fn read_byte(&mut self, address: u16) -> Result<u8, StorageError>;

    /// Write one byte.
    fn write_byte(&mut self, address: u16, data: u8) -> Result<(), StorageError>;

    /// Read `out.len()` consecutive bytes starting at `address`.
    fn read(&mut self, address: u16, out: &mut [u8]) -> Result<(), StorageError> {
        self.check_range(address, out.len())?;
        for (offset, slot) in out.iter_mut().enumerate() {
            *slot = self.read_byte(address + offset as u16)?;
        }
        Ok(())
    }

    /// Write `data` to consecutive bytes starting at `address`.
    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        self.check_range(address, data.len())?;
        for (offset, byte) in data.iter().enumerate() {
            self.write_byte(address + offset as u16, *byte)?;
        }
        Ok(())
    }

    /// Reject runs that extend past the end of the device.
    fn check_range(&self, address: u16, len: usize) -> Result<(), StorageError> {
        if address as usize + len > self.capacity() as usize {
            Err(StorageError::OutOfRange)
        } else {
            Ok(())
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting and after
/// loading. Invalid ranges are rejected with
/// [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    fn load(&mut self) -> Result<ReflowConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &ReflowConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Serialized config does not fit its storage region.
    TooLarge,
    /// Underlying storage failed.
    Storage(StorageError),
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The device did not acknowledge.
    Nack,
    /// Generic bus error.
    Bus,
    /// Address range extends past the device.
    OutOfRange,
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::TooLarge => write!(f, "config too large"),
            Self::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Nack => write!(f, "no acknowledge"),
            Self::Bus => write!(f, "bus error"),
            Self::OutOfRange => write!(f, "address out of range"),
        }
    }
}

//! Actuator and storage drivers.

pub mod eeprom;
pub mod heater;

pub use eeprom::At24c32;
pub use heater::DutyCycleDriver;

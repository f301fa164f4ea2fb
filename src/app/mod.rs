//! Application core: pure domain logic, zero I/O.
//!
//! This module wires the reflow controller together: protocol handling,
//! sampling, safety evaluation, PID/auto-tune and heater actuation. All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;

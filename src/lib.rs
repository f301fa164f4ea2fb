//! Reflow oven controller library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. ESP-IDF-specific code is guarded by the `espidf` feature
//! within each module, so the whole control core builds and tests on the
//! host.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod rpc;
pub mod safety;

pub mod adapters;
pub mod drivers;
pub mod sensors;

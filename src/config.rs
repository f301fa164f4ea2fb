//! System configuration parameters
//!
//! All tunable parameters for the reflow controller.
//! Values are loaded from the EEPROM config record at boot, falling back
//! to [`ReflowConfig::default`] on first boot or after corruption.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// PID gains for the closed-loop path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 2.0,
            ki: 0.01,
            kd: 1.0,
        }
    }
}

impl PidGains {
    /// All three gains are finite and non-negative, and at least one is non-zero.
    pub fn is_usable(&self) -> bool {
        let all = [self.kp, self.ki, self.kd];
        all.iter().all(|g| g.is_finite() && *g >= 0.0) && all.iter().any(|g| *g > 0.0)
    }
}

/// Auto-tune test inputs, tolerances and bounded timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Fixed duty cycle held during the steady-state phase (0-1).
    pub steady_duty: f32,
    /// Temperature band (±°C) that counts as "stable".
    pub stable_band_c: f32,
    /// How long the temperature must stay inside the band (ms).
    pub stable_dwell_ms: u32,
    /// Steady-state phase gives up and reports its best estimate after this (ms).
    pub steady_timeout_ms: u32,
    /// Duty cycle applied during the velocity phase (0-1).
    pub velocity_duty: f32,
    /// Temperature rise the velocity phase times (°C).
    pub velocity_delta_c: f32,
    /// Velocity phase timeout (ms).
    pub velocity_timeout_ms: u32,
    /// Rise at full power before the inertia phase cuts power (°C).
    pub inertia_ramp_c: f32,
    /// Inertia phase timeout, covering both ramp and coast (ms).
    pub inertia_timeout_ms: u32,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            steady_duty: 0.30,
            stable_band_c: 1.0,
            stable_dwell_ms: 60_000,
            steady_timeout_ms: 30 * 60_000,
            velocity_duty: 1.0,
            velocity_delta_c: 50.0,
            velocity_timeout_ms: 10 * 60_000,
            inertia_ramp_c: 10.0,
            inertia_timeout_ms: 10 * 60_000,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflowConfig {
    // --- Comms ---
    /// Serial symbol rate.
    pub baud: u32,
    /// Telemetry push interval at boot (ms). 0 = only on host request.
    pub telemetry_interval_ms: u16,

    // --- Timing ---
    /// Minimum interval between thermocouple reads (ms).
    pub sample_interval_ms: u32,
    /// Closed-loop evaluation cadence (ms).
    pub pid_interval_ms: u32,
    /// Heater time-proportioning window (ms).
    pub cycle_period_ms: u32,

    // --- Safety ---
    /// Heating is cut above this temperature (°C).
    pub max_temperature_c: f32,
    /// Heating is cut if no sample succeeds for this long (ms).
    pub sensor_stall_timeout_ms: u32,

    // --- Control ---
    pub gains: PidGains,
    pub tuning: TuningConfig,
}

impl Default for ReflowConfig {
    fn default() -> Self {
        Self {
            baud: 9600,
            telemetry_interval_ms: 0,

            sample_interval_ms: 250,
            pid_interval_ms: 100,
            cycle_period_ms: 200,

            max_temperature_c: 300.0,
            sensor_stall_timeout_ms: 2000,

            gains: PidGains::default(),
            tuning: TuningConfig::default(),
        }
    }
}

impl ReflowConfig {
    /// Range-check every field.
    ///
    /// Invalid values are rejected, not clamped: a corrupted record must not
    /// be able to disable thermal shutdown or the stall check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1200..=115_200).contains(&self.baud) {
            return Err(ConfigError::ValidationFailed("baud must be 1200–115200"));
        }
        if !(250..=5000).contains(&self.sample_interval_ms) {
            return Err(ConfigError::ValidationFailed("sample_interval_ms must be 250–5000"));
        }
        if !(10..=5000).contains(&self.pid_interval_ms) {
            return Err(ConfigError::ValidationFailed("pid_interval_ms must be 10–5000"));
        }
        if !(20..=10_000).contains(&self.cycle_period_ms) {
            return Err(ConfigError::ValidationFailed("cycle_period_ms must be 20–10000"));
        }
        if !(50.0..=400.0).contains(&self.max_temperature_c) {
            return Err(ConfigError::ValidationFailed("max_temperature_c must be 50.0–400.0"));
        }
        if self.sensor_stall_timeout_ms <= self.sample_interval_ms
            || self.sensor_stall_timeout_ms > 60_000
        {
            return Err(ConfigError::ValidationFailed(
                "sensor_stall_timeout_ms must exceed sample_interval_ms and be ≤ 60000",
            ));
        }
        if !self.gains.is_usable() {
            return Err(ConfigError::ValidationFailed("gains must be finite and non-negative"));
        }
        let t = &self.tuning;
        if !(0.05..=1.0).contains(&t.steady_duty) || !(0.05..=1.0).contains(&t.velocity_duty) {
            return Err(ConfigError::ValidationFailed("tuning duty cycles must be 0.05–1.0"));
        }
        if !(0.1..=10.0).contains(&t.stable_band_c) {
            return Err(ConfigError::ValidationFailed("stable_band_c must be 0.1–10.0"));
        }
        if !(1.0..=200.0).contains(&t.velocity_delta_c)
            || !(1.0..=100.0).contains(&t.inertia_ramp_c)
        {
            return Err(ConfigError::ValidationFailed("tuning temperature deltas out of range"));
        }
        if t.stable_dwell_ms == 0
            || t.stable_dwell_ms >= t.steady_timeout_ms
            || t.velocity_timeout_ms == 0
            || t.inertia_timeout_ms == 0
        {
            return Err(ConfigError::ValidationFailed(
                "tuning timeouts must be non-zero and exceed the dwell",
            ));
        }
        Ok(())
    }
}

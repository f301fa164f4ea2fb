//! Safety supervisor.
//!
//! Runs every tick right after sampling and accumulates a fault bitmask.
//!
//! ## Fault lifecycle
//!
//! 1. A condition triggers a fault (e.g. oven above `max_temperature_c`).
//! 2. The supervisor sets the corresponding bit.
//! 3. The service sees a new fault while heating is enabled and calls
//!    `disable()`, forcing Idle and dropping the heater in the same tick.
//! 4. Each tick the supervisor re-evaluates and clears bits whose
//!    condition has gone away.
//! 5. Heating stays off until the host sends Enable again. If a fault
//!    is still active then, the next tick disables again.
//!
//! Multiple simultaneous faults are tracked independently.

use crate::config::ReflowConfig;
use crate::error::SafetyFault;
use crate::sensors::TemperatureSampler;
use log::{error, info};

/// Safety supervisor.
pub struct SafetySupervisor {
    max_temp_c: f32,
    stall_timeout_ms: u32,
    /// Latched fault bitmask.
    faults: u8,
}

impl SafetySupervisor {
    pub fn new(config: &ReflowConfig) -> Self {
        Self {
            max_temp_c: config.max_temperature_c,
            stall_timeout_ms: config.sensor_stall_timeout_ms,
            faults: 0,
        }
    }

    /// Evaluate all safety conditions against the sampler.
    /// Returns the updated fault bitmask.
    pub fn evaluate(&mut self, sampler: &TemperatureSampler, now_ms: u32) -> u8 {
        // ── Temperature ───────────────────────────────────────────
        let temp = sampler.celsius();
        self.eval_fault(
            SafetyFault::OverTemperature,
            temp.is_finite() && temp > self.max_temp_c,
        );

        // ── Acquisition stall ─────────────────────────────────────
        self.eval_fault(
            SafetyFault::SensorStall,
            sampler.ms_since_good(now_ms) > self.stall_timeout_ms,
        );

        // ── Probe ─────────────────────────────────────────────────
        self.eval_fault(SafetyFault::ThermocoupleOpen, sampler.thermocouple_open());

        self.faults
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}

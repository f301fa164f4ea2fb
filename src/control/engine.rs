//! PID/Auto-Tune engine.
//!
//! Single owner of every accumulator the control core carries: PID memory,
//! the rate-path set point and the auto-tune sub-state. One instance is
//! built at startup and handed to the scheduler by reference.

use log::info;

use crate::config::{PidGains, ReflowConfig};
use crate::control::autotune::{AutoTuner, TuningReport, TuningResult};
use crate::control::pid::PidController;
use crate::control::state::TuningPhase;

pub struct ControlEngine {
    pid: PidController,
    tuner: AutoTuner,
    interval_ms: u32,
    ceiling_c: f32,
    last_tune_ms: Option<u32>,
    last_tune_duty: f32,
}

impl ControlEngine {
    pub fn new(config: &ReflowConfig) -> Self {
        Self {
            pid: PidController::new(config.gains, config.pid_interval_ms),
            tuner: AutoTuner::new(config.tuning),
            interval_ms: config.pid_interval_ms,
            ceiling_c: config.max_temperature_c,
            last_tune_ms: None,
            last_tune_duty: 0.0,
        }
    }

    // ── Evaluation paths ──────────────────────────────────────

    /// Closed-loop path, target capped at the max temperature. Returns a
    /// duty fraction in [0, 1].
    pub fn evaluate_set_point(&mut self, target_c: f32, current_c: f32, now_ms: u32) -> f32 {
        // `f32::min` would turn a NaN target into the ceiling.
        let target_c = if target_c.is_nan() { target_c } else { target_c.min(self.ceiling_c) };
        self.pid.evaluate_set_point(target_c, current_c, now_ms)
    }

    /// Rate path. Returns a duty fraction in [0, 1].
    pub fn evaluate_rate(&mut self, rate_c_per_s: f32, current_c: f32, now_ms: u32) -> f32 {
        self.pid.evaluate_rate(rate_c_per_s, current_c, self.ceiling_c, now_ms)
    }

    /// Auto-tune path, evaluated at the control interval. Between
    /// evaluations the previous duty is held and `done` is false, so a
    /// phase completion is reported exactly once.
    pub fn tune(&mut self, phase: TuningPhase, current_c: f32, now_ms: u32) -> TuningResult {
        if let Some(last) = self.last_tune_ms {
            if now_ms.wrapping_sub(last) < self.interval_ms {
                return TuningResult {
                    done: false,
                    duty_cycle: self.last_tune_duty,
                };
            }
        }
        self.last_tune_ms = Some(now_ms);
        let result = self.tuner.tune(phase, current_c, now_ms);
        self.last_tune_duty = result.duty_cycle;
        result
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Clear PID memory and the rate-path anchor.
    pub fn reset(&mut self) {
        self.pid.reset();
    }

    /// Start the ramp again from the next measurement. PID memory is kept.
    pub fn reanchor_ramp(&mut self) {
        self.pid.reanchor();
    }

    /// Drop any in-progress tuning phase before a new tuning request.
    pub fn restart_tuning(&mut self, requested: TuningPhase) {
        self.tuner.restart(requested);
        self.last_tune_ms = None;
        self.last_tune_duty = 0.0;
    }

    /// Full reset: PID memory, tuner state and measurements.
    pub fn reset_all(&mut self) {
        self.reset();
        self.restart_tuning(TuningPhase::All);
    }

    /// Derive gains from the tuning report and apply them if usable.
    pub fn apply_derived_gains(&mut self) -> Option<PidGains> {
        let gains = self.tuner.report().derive_gains(self.interval_ms)?;
        info!(
            "TUNE: applying gains kp={:.4} ki={:.4} kd={:.4}",
            gains.kp, gains.ki, gains.kd
        );
        self.pid.set_gains(gains);
        self.pid.reset();
        Some(gains)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn gains(&self) -> PidGains {
        self.pid.gains()
    }

    pub fn report(&self) -> &TuningReport {
        self.tuner.report()
    }

    pub fn ceiling_c(&self) -> f32 {
        self.ceiling_c
    }

    /// Moving set point of a rate run, once anchored.
    pub fn ramp_target(&self) -> Option<f32> {
        self.pid.ramp_target()
    }
}

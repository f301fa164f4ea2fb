//! PID controller for heater duty cycle
//!
//! Velocity-form proportional-integral-derivative controller: each
//! evaluation adds `Kp·e + Ki·Σe + Kd·Δe` to the previous output, which is
//! clamped to [0, 100] percent. Proportional and derivative act on error,
//! not on measurement. Evaluation is rate-limited to a fixed interval;
//! calls in between return the previous output unchanged.

use crate::config::PidGains;

/// PID controller
pub struct PidController {
    gains: PidGains,
    interval_ms: u32,
    last_eval_ms: Option<u32>,
    prev_error: f32,
    integral: f32,
    /// Percent duty, always within the output limits.
    output: f32,
    output_min: f32,
    output_max: f32,
    /// Moving set point for the rate path, anchored on first use.
    ramp_target: Option<f32>,
}

impl PidController {
    pub fn new(gains: PidGains, interval_ms: u32) -> Self {
        Self {
            gains,
            interval_ms,
            last_eval_ms: None,
            prev_error: 0.0,
            integral: 0.0,
            output: 0.0,
            output_min: 0.0,
            output_max: 100.0,
            ramp_target: None,
        }
    }

    /// Replace the gains. Accumulators are kept.
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Closed-loop path. Returns the duty fraction in [0, 1].
    pub fn evaluate_set_point(&mut self, target_c: f32, current_c: f32, now_ms: u32) -> f32 {
        if self.due(now_ms).is_some() {
            self.step(target_c, current_c);
        }
        self.output / 100.0
    }

    /// Rate path: integrates `rate_c_per_s` into a moving set point that
    /// starts at the current temperature, capped at `ceiling_c`, and tracks
    /// it with the same PID. Returns the duty fraction in [0, 1].
    pub fn evaluate_rate(
        &mut self,
        rate_c_per_s: f32,
        current_c: f32,
        ceiling_c: f32,
        now_ms: u32,
    ) -> f32 {
        let Some(elapsed_ms) = self.due(now_ms) else {
            return self.output / 100.0;
        };

        let target = match self.ramp_target {
            Some(prev) if rate_c_per_s.is_finite() => {
                prev + rate_c_per_s * (elapsed_ms as f32 / 1000.0)
            }
            Some(prev) => prev,
            None => current_c,
        };
        let target = target.min(ceiling_c);
        self.ramp_target = Some(target);

        self.step(target, current_c);
        self.output / 100.0
    }

    /// Current moving set point of the rate path, if anchored.
    pub fn ramp_target(&self) -> Option<f32> {
        self.ramp_target
    }

    /// Drop the rate-path anchor; the next evaluation re-anchors at the
    /// measured temperature.
    pub fn reanchor(&mut self) {
        self.ramp_target = None;
    }

    /// Last output in percent.
    pub fn output_percent(&self) -> f32 {
        self.output
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.last_eval_ms = None;
        self.prev_error = 0.0;
        self.integral = 0.0;
        self.output = 0.0;
        self.ramp_target = None;
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// If an evaluation is due, record it and return the elapsed time since
    /// the previous one (0 for the first).
    fn due(&mut self, now_ms: u32) -> Option<u32> {
        let elapsed = match self.last_eval_ms {
            Some(last) => {
                let elapsed = now_ms.wrapping_sub(last);
                if elapsed < self.interval_ms {
                    return None;
                }
                elapsed
            }
            None => 0,
        };
        self.last_eval_ms = Some(now_ms);
        Some(elapsed)
    }

    fn step(&mut self, target_c: f32, current_c: f32) {
        let error = target_c - current_c;
        if !error.is_finite() {
            return;
        }

        let integral = self.integral + error;
        let derivative = error - self.prev_error;
        let delta = self.gains.kp * error + self.gains.ki * integral + self.gains.kd * derivative;
        if !delta.is_finite() {
            return;
        }

        self.integral = integral;
        self.prev_error = error;
        self.output = (self.output + delta).clamp(self.output_min, self.output_max);
    }
}

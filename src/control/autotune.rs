//! Auto-tune sub-state-machine.
//!
//! Characterises the oven with fixed open-loop test inputs:
//!
//! ```text
//!   SteadyState: hold steady_duty until T stays within ±band for the dwell
//!   Velocity:    hold velocity_duty and time a rise of velocity_delta_c
//!   Inertia:     full power for inertia_ramp_c, cut, pass the peak, then
//!                coast until T stays within ±band for the dwell
//! ```
//!
//! Every phase is bounded by a timeout and reports whatever it measured
//! when the timeout fires. Measurements accumulate in a [`TuningReport`],
//! from which PID gains are derived with a reaction-curve rule.

use log::{info, warn};

use crate::config::{PidGains, TuningConfig};
use crate::control::state::TuningPhase;

/// Outcome of one auto-tune evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningResult {
    /// The executing phase has finished.
    pub done: bool,
    /// Open-loop duty fraction to apply, within [0, 1].
    pub duty_cycle: f32,
}

/// Plant characteristics measured by the tuning phases.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TuningReport {
    /// Temperature when the steady-state phase began (°C).
    pub ambient_c: Option<f32>,
    /// Temperature the oven settled at (°C).
    pub steady_temp_c: Option<f32>,
    /// Duty fraction that produced `steady_temp_c`.
    pub steady_duty: Option<f32>,
    /// Rise rate under `velocity_duty` (°C/s).
    pub velocity_c_per_s: Option<f32>,
    /// Duty fraction the velocity was measured at.
    pub velocity_duty: Option<f32>,
    /// Rise past the cut-off temperature after power was removed (°C).
    pub overshoot_c: Option<f32>,
    /// Time from power cut to peak temperature (s).
    pub lag_s: Option<f32>,
    /// Time from power cut until the temperature entered the band it then
    /// held for the stability dwell (s).
    pub settling_s: Option<f32>,
}

impl TuningReport {
    /// Steady-state gain in °C per percent duty.
    pub fn steady_gain(&self) -> Option<f32> {
        let rise = self.steady_temp_c? - self.ambient_c?;
        let percent = self.steady_duty? * 100.0;
        positive(rise / percent)
    }

    /// Reaction-curve gains for a controller evaluated every `interval_ms`.
    ///
    /// `Kp = 1.2·τ/(K·L)`, `Ti = 2L`, `Td = L/2`, converted to the
    /// per-evaluation form the incremental PID uses.
    pub fn derive_gains(&self, interval_ms: u32) -> Option<PidGains> {
        let k = self.steady_gain()?;
        let lag = positive(self.lag_s?)?;
        let velocity = positive(self.velocity_c_per_s?)?;
        // Time constant: the rise the velocity duty would settle at, over
        // the initial slope it produced.
        let tau = positive(k * self.velocity_duty? * 100.0 / velocity)?;
        let dt = interval_ms as f32 / 1000.0;
        if dt <= 0.0 {
            return None;
        }

        let kp = 1.2 * tau / (k * lag);
        let ti = 2.0 * lag;
        let td = 0.5 * lag;
        let gains = PidGains {
            kp,
            ki: kp * dt / ti,
            kd: kp * td / dt,
        };
        let all_positive = gains.kp > 0.0 && gains.ki > 0.0 && gains.kd > 0.0;
        (gains.is_usable() && all_positive).then_some(gains)
    }

    fn clear_phase(&mut self, phase: TuningPhase) {
        match phase {
            TuningPhase::All => *self = Self::default(),
            TuningPhase::SteadyState => {
                self.ambient_c = None;
                self.steady_temp_c = None;
                self.steady_duty = None;
            }
            TuningPhase::Velocity => {
                self.velocity_c_per_s = None;
                self.velocity_duty = None;
            }
            TuningPhase::Inertia => {
                self.overshoot_c = None;
                self.lag_s = None;
                self.settling_s = None;
            }
        }
    }
}

fn positive(v: f32) -> Option<f32> {
    (v.is_finite() && v > 0.0).then_some(v)
}

// ---------------------------------------------------------------------------
// Phase state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum PhaseState {
    NotStarted,
    Steady {
        started_ms: u32,
        start_c: f32,
        band_center_c: f32,
        band_since_ms: u32,
    },
    Velocity {
        started_ms: u32,
        start_c: f32,
    },
    InertiaRamp {
        started_ms: u32,
        start_c: f32,
    },
    InertiaCoast {
        started_ms: u32,
        cut_ms: u32,
        cut_c: f32,
        peak_c: f32,
        peak_ms: u32,
        /// Band centre and entry time, tracked once the peak has passed.
        settle: Option<(f32, u32)>,
    },
}

impl PhaseState {
    fn phase(&self) -> Option<TuningPhase> {
        match self {
            Self::NotStarted => None,
            Self::Steady { .. } => Some(TuningPhase::SteadyState),
            Self::Velocity { .. } => Some(TuningPhase::Velocity),
            Self::InertiaRamp { .. } | Self::InertiaCoast { .. } => Some(TuningPhase::Inertia),
        }
    }
}

// ---------------------------------------------------------------------------
// Auto-tuner
// ---------------------------------------------------------------------------

pub struct AutoTuner {
    config: TuningConfig,
    state: PhaseState,
    report: TuningReport,
}

impl AutoTuner {
    pub fn new(config: TuningConfig) -> Self {
        Self {
            config,
            state: PhaseState::NotStarted,
            report: TuningReport::default(),
        }
    }

    /// Discard the in-progress phase and the measurements `requested` will
    /// produce. The next [`tune`](Self::tune) call starts afresh.
    pub fn restart(&mut self, requested: TuningPhase) {
        self.state = PhaseState::NotStarted;
        self.report.clear_phase(requested);
    }

    pub fn report(&self) -> &TuningReport {
        &self.report
    }

    /// Phase currently being measured, if any.
    pub fn running_phase(&self) -> Option<TuningPhase> {
        self.state.phase()
    }

    /// Evaluate one tick of `phase`. The phase clock starts on its first
    /// evaluation. Passing `All` evaluates its first executed phase.
    pub fn tune(&mut self, phase: TuningPhase, temp_c: f32, now_ms: u32) -> TuningResult {
        let phase = phase.first_executed();
        if self.state.phase() != Some(phase) {
            self.begin(phase, temp_c, now_ms);
        }

        let result = match phase {
            TuningPhase::SteadyState | TuningPhase::All => self.tune_steady(temp_c, now_ms),
            TuningPhase::Velocity => self.tune_velocity(temp_c, now_ms),
            TuningPhase::Inertia => self.tune_inertia(temp_c, now_ms),
        };
        if result.done {
            self.state = PhaseState::NotStarted;
        }
        result
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    fn begin(&mut self, phase: TuningPhase, temp_c: f32, now_ms: u32) {
        info!("TUNE: {:?} started at {:.1}°C", phase, temp_c);
        self.state = match phase {
            TuningPhase::SteadyState | TuningPhase::All => {
                self.report.ambient_c = Some(temp_c);
                PhaseState::Steady {
                    started_ms: now_ms,
                    start_c: temp_c,
                    band_center_c: temp_c,
                    band_since_ms: now_ms,
                }
            }
            TuningPhase::Velocity => PhaseState::Velocity {
                started_ms: now_ms,
                start_c: temp_c,
            },
            TuningPhase::Inertia => PhaseState::InertiaRamp {
                started_ms: now_ms,
                start_c: temp_c,
            },
        };
    }

    fn tune_steady(&mut self, temp_c: f32, now_ms: u32) -> TuningResult {
        let cfg = self.config;
        let running = TuningResult {
            done: false,
            duty_cycle: cfg.steady_duty,
        };
        let PhaseState::Steady {
            started_ms,
            start_c,
            band_center_c,
            band_since_ms,
        } = &mut self.state
        else {
            return running;
        };

        if (temp_c - *band_center_c).abs() > cfg.stable_band_c {
            *band_center_c = temp_c;
            *band_since_ms = now_ms;
        }

        // The oven has to have left ambient before stability counts.
        let warmed = temp_c - *start_c >= 2.0 * cfg.stable_band_c;
        let settled = warmed && now_ms.wrapping_sub(*band_since_ms) >= cfg.stable_dwell_ms;
        let timed_out = now_ms.wrapping_sub(*started_ms) >= cfg.steady_timeout_ms;

        if !(settled || timed_out) {
            return running;
        }
        if timed_out && !settled {
            warn!("TUNE: steady state timed out, using {:.1}°C", temp_c);
        }
        self.report.steady_temp_c = Some(temp_c);
        self.report.steady_duty = Some(cfg.steady_duty);
        info!(
            "TUNE: steady state {:.1}°C at duty {:.2} (gain {:?} °C/%)",
            temp_c,
            cfg.steady_duty,
            self.report.steady_gain()
        );
        TuningResult {
            done: true,
            duty_cycle: cfg.steady_duty,
        }
    }

    fn tune_velocity(&mut self, temp_c: f32, now_ms: u32) -> TuningResult {
        let cfg = self.config;
        let PhaseState::Velocity {
            started_ms,
            start_c,
        } = self.state
        else {
            return TuningResult {
                done: false,
                duty_cycle: cfg.velocity_duty,
            };
        };

        let elapsed_ms = now_ms.wrapping_sub(started_ms);
        let rise = temp_c - start_c;
        let reached = rise >= cfg.velocity_delta_c;
        let timed_out = elapsed_ms >= cfg.velocity_timeout_ms;

        if !(reached || timed_out) {
            return TuningResult {
                done: false,
                duty_cycle: cfg.velocity_duty,
            };
        }
        if timed_out && !reached {
            warn!("TUNE: velocity timed out after {:.1}°C rise", rise);
        }
        let velocity = if elapsed_ms > 0 {
            positive(rise / (elapsed_ms as f32 / 1000.0))
        } else {
            None
        };
        self.report.velocity_c_per_s = velocity;
        self.report.velocity_duty = Some(cfg.velocity_duty);
        info!("TUNE: velocity {:?} °C/s", velocity);
        TuningResult {
            done: true,
            duty_cycle: 0.0,
        }
    }

    fn tune_inertia(&mut self, temp_c: f32, now_ms: u32) -> TuningResult {
        let cfg = self.config;
        match self.state {
            PhaseState::InertiaRamp {
                started_ms,
                start_c,
            } => {
                if now_ms.wrapping_sub(started_ms) >= cfg.inertia_timeout_ms {
                    warn!("TUNE: inertia ramp timed out");
                    return TuningResult {
                        done: true,
                        duty_cycle: 0.0,
                    };
                }
                if temp_c - start_c < cfg.inertia_ramp_c {
                    return TuningResult {
                        done: false,
                        duty_cycle: 1.0,
                    };
                }
                info!("TUNE: inertia power cut at {:.1}°C", temp_c);
                self.state = PhaseState::InertiaCoast {
                    started_ms,
                    cut_ms: now_ms,
                    cut_c: temp_c,
                    peak_c: temp_c,
                    peak_ms: now_ms,
                    settle: None,
                };
                TuningResult {
                    done: false,
                    duty_cycle: 0.0,
                }
            }
            PhaseState::InertiaCoast {
                started_ms,
                cut_ms,
                cut_c,
                ref mut peak_c,
                ref mut peak_ms,
                ref mut settle,
            } => {
                if settle.is_none() {
                    if temp_c > *peak_c {
                        *peak_c = temp_c;
                        *peak_ms = now_ms;
                    } else if temp_c <= *peak_c - cfg.stable_band_c {
                        *settle = Some((temp_c, now_ms));
                    }
                }
                if let Some((center_c, since_ms)) = settle {
                    if (temp_c - *center_c).abs() > cfg.stable_band_c {
                        *center_c = temp_c;
                        *since_ms = now_ms;
                    }
                }
                let (peak_c, peak_ms, settle) = (*peak_c, *peak_ms, *settle);

                let settled_since = settle
                    .map(|(_, since_ms)| since_ms)
                    .filter(|since_ms| now_ms.wrapping_sub(*since_ms) >= cfg.stable_dwell_ms);
                let timed_out = now_ms.wrapping_sub(started_ms) >= cfg.inertia_timeout_ms;
                if settled_since.is_none() && !timed_out {
                    return TuningResult {
                        done: false,
                        duty_cycle: 0.0,
                    };
                }
                if settled_since.is_none() {
                    warn!("TUNE: inertia timed out before the oven settled");
                }
                let overshoot = peak_c - cut_c;
                let lag = peak_ms.wrapping_sub(cut_ms) as f32 / 1000.0;
                let settling =
                    settled_since.map(|since_ms| since_ms.wrapping_sub(cut_ms) as f32 / 1000.0);
                self.report.overshoot_c = Some(overshoot);
                self.report.lag_s = Some(lag);
                self.report.settling_s = settling;
                info!(
                    "TUNE: inertia overshoot {:.1}°C, lag {:.1}s, settling {:?}s",
                    overshoot, lag, settling
                );
                TuningResult {
                    done: true,
                    duty_cycle: 0.0,
                }
            }
            _ => TuningResult {
                done: false,
                duty_cycle: 0.0,
            },
        }
    }
}

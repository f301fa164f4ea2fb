//! Control state machine.
//!
//! Owns the operating state, the safety interlock, the active request and
//! the tuning phase. Every mutator is synchronous and total: invalid
//! combinations are defined by no-op and clamp rules, never by failure.
//!
//! ```text
//!            start() [enabled]             request_tuning_phase()
//!   IDLE ───────────────────────▶ RUNNING ─────────────────────▶ TUNING
//!    ▲  ◀──── go_idle() / disable() ───┘                            │
//!    │                                                              │
//!    └────── go_idle() / disable() / last phase complete ───────────┘
//! ```

use log::info;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Operating state. Discriminants are the 2-bit status-byte codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlState {
    Idle = 0,
    Running = 1,
    Tuning = 2,
}

/// Which request interpretation drives the heater while Running.
/// Discriminants are the 2-bit status-byte codes (0 = n/a).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlMode {
    SetPoint = 1,
    Rate = 2,
    DutyCycle = 3,
}

/// Auto-tune phase. `All` runs the other three in sequence and is never
/// itself executed. Discriminants are the 2-bit status-byte codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TuningPhase {
    All = 0,
    SteadyState = 1,
    Velocity = 2,
    Inertia = 3,
}

impl TuningPhase {
    /// First phase actually executed when this phase is requested.
    pub fn first_executed(self) -> Self {
        match self {
            Self::All => Self::SteadyState,
            other => other,
        }
    }
}

/// The current target, tagged by mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    /// Temperature set point (°C).
    SetPoint(f32),
    /// Temperature ramp rate (°C/s).
    Rate(f32),
    /// Raw duty cycle, always within [0, 1].
    DutyCycle(f32),
}

impl Request {
    pub fn mode(&self) -> ControlMode {
        match self {
            Self::SetPoint(_) => ControlMode::SetPoint,
            Self::Rate(_) => ControlMode::Rate,
            Self::DutyCycle(_) => ControlMode::DutyCycle,
        }
    }

    /// The scalar carried by the request, whatever its mode.
    pub fn value(&self) -> f32 {
        match *self {
            Self::SetPoint(v) | Self::Rate(v) | Self::DutyCycle(v) => v,
        }
    }
}

/// Clamp a duty-cycle fraction into [0, 1]. NaN maps to 0 (heater off).
pub fn clamp_duty(fraction: f32) -> f32 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Control state machine.
pub struct ControlStateMachine {
    state: ControlState,
    request: Request,
    /// Phase the host asked for (may be `All`).
    requested_phase: TuningPhase,
    /// Phase currently executing (never `All`).
    active_phase: TuningPhase,
    heating_enabled: bool,
    /// Bumped on every tuning request so the tuner restarts.
    tuning_epoch: u32,
}

impl Default for ControlStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlStateMachine {
    /// Boot state: Idle, SetPoint mode, tuning phase All, heating disabled.
    pub fn new() -> Self {
        Self {
            state: ControlState::Idle,
            request: Request::SetPoint(0.0),
            requested_phase: TuningPhase::All,
            active_phase: TuningPhase::SteadyState,
            heating_enabled: false,
            tuning_epoch: 0,
        }
    }

    /// Force Idle, SetPoint mode, tuning phase All, heating disabled.
    pub fn reset(&mut self) {
        self.set_state(ControlState::Idle);
        self.request = Request::SetPoint(0.0);
        self.requested_phase = TuningPhase::All;
        self.active_phase = TuningPhase::SteadyState;
        self.heating_enabled = false;
        info!("CONTROL: reset");
    }

    // ── Safety interlock ──────────────────────────────────────

    pub fn enable(&mut self) {
        if !self.heating_enabled {
            info!("CONTROL: heating enabled");
        }
        self.heating_enabled = true;
    }

    /// Clear the interlock. Always lands in Idle.
    pub fn disable(&mut self) {
        if self.heating_enabled {
            info!("CONTROL: heating disabled");
        }
        self.heating_enabled = false;
        self.set_state(ControlState::Idle);
    }

    // ── State transitions ─────────────────────────────────────

    /// Force Idle from any state. The universal abort, tuning included.
    pub fn go_idle(&mut self) {
        self.set_state(ControlState::Idle);
    }

    /// Idle → Running. No-op while Tuning or while heating is disabled.
    pub fn start(&mut self) {
        if self.state == ControlState::Tuning || !self.heating_enabled {
            return;
        }
        self.set_state(ControlState::Running);
    }

    // ── Requests ──────────────────────────────────────────────

    pub fn request_set_point(&mut self, temp_c: f32) {
        self.set_request(Request::SetPoint(temp_c));
    }

    pub fn request_rate(&mut self, rate_c_per_s: f32) {
        self.set_request(Request::Rate(rate_c_per_s));
    }

    /// Stores the fraction clamped to [0, 1].
    pub fn request_duty_cycle(&mut self, fraction: f32) {
        self.set_request(Request::DutyCycle(clamp_duty(fraction)));
    }

    /// Select a tuning phase and enter Tuning unconditionally.
    pub fn request_tuning_phase(&mut self, phase: TuningPhase) {
        self.requested_phase = phase;
        self.active_phase = phase.first_executed();
        self.tuning_epoch = self.tuning_epoch.wrapping_add(1);
        self.set_state(ControlState::Tuning);
    }

    /// The executing phase reported `done`. Advances through an `All`
    /// sequence, or returns to Idle after the last phase.
    ///
    /// Returns the next phase, or `None` if tuning has finished.
    pub fn complete_tuning_phase(&mut self) -> Option<TuningPhase> {
        if self.state != ControlState::Tuning {
            return None;
        }
        let next = match (self.requested_phase, self.active_phase) {
            (TuningPhase::All, TuningPhase::SteadyState) => Some(TuningPhase::Velocity),
            (TuningPhase::All, TuningPhase::Velocity) => Some(TuningPhase::Inertia),
            _ => None,
        };
        match next {
            Some(phase) => {
                info!("CONTROL: tuning {:?} -> {:?}", self.active_phase, phase);
                self.active_phase = phase;
            }
            None => self.set_state(ControlState::Idle),
        }
        next
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn mode(&self) -> ControlMode {
        self.request.mode()
    }

    pub fn request(&self) -> Request {
        self.request
    }

    pub fn heating_enabled(&self) -> bool {
        self.heating_enabled
    }

    pub fn requested_phase(&self) -> TuningPhase {
        self.requested_phase
    }

    pub fn active_phase(&self) -> TuningPhase {
        self.active_phase
    }

    pub fn tuning_epoch(&self) -> u32 {
        self.tuning_epoch
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn set_request(&mut self, request: Request) {
        self.request = request;
    }

    fn set_state(&mut self, next: ControlState) {
        if next != self.state {
            info!("CONTROL transition: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

//! Outbound application events.
//!
//! The [`ReflowService`](super::service::ReflowService) emits these through
//! the [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them: log to the console, count them in a
//! test, etc.

use crate::config::PidGains;
use crate::control::state::{ControlState, TuningPhase};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries initial state).
    Started(ControlState),

    /// The control state machine moved between states.
    StateChanged { from: ControlState, to: ControlState },

    /// One or more new safety faults were raised (full mask).
    FaultDetected(u8),

    /// All safety faults have been cleared.
    FaultCleared,

    /// A tuning phase reported `done`. `next` is the phase that follows,
    /// or `None` when tuning has finished.
    TuningPhaseComplete {
        phase: TuningPhase,
        next: Option<TuningPhase>,
    },

    /// Auto-tune produced usable gains and they are now in effect.
    GainsUpdated(PidGains),
}

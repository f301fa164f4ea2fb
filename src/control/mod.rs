//! Control core: state machine, PID and auto-tune.

pub mod autotune;
pub mod engine;
pub mod pid;
pub mod state;

pub use autotune::{TuningReport, TuningResult};
pub use engine::ControlEngine;
pub use state::{ControlMode, ControlState, ControlStateMachine, Request, TuningPhase};

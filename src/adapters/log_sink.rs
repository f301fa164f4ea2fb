//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (the ESP-IDF console on target, nothing on the host unless a
//! test installs a logger).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::error::SafetyFault;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self { emitted: 0 }
    }

    /// Events logged since boot.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::FaultDetected(flags) => {
                for fault in SafetyFault::ALL {
                    if flags & fault.mask() != 0 {
                        warn!("FAULT | {} (flags=0b{:08b})", fault, flags);
                    }
                }
            }
            AppEvent::FaultCleared => {
                info!("FAULT | all cleared");
            }
            AppEvent::TuningPhaseComplete { phase, next } => match next {
                Some(next) => info!("TUNE | {:?} done, next {:?}", phase, next),
                None => info!("TUNE | {:?} done, tuning finished", phase),
            },
            AppEvent::GainsUpdated(g) => {
                info!("TUNE | gains kp={:.4} ki={:.4} kd={:.4}", g.kp, g.ki, g.kd);
            }
        }
    }
}

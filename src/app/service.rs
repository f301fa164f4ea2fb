//! Application service: the hexagonal core.
//!
//! [`ReflowService`] owns the control state machine, the PID/auto-tune
//! engine, the sampler, the safety supervisor and the protocol engine.
//! All I/O flows through port traits injected at call sites, so the whole
//! service runs on the host against mock adapters.
//!
//! ```text
//!  ThermocouplePort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                       │        ReflowService         │
//!       HeaterPort ◀────│ Control · PID · Safety · RPC │◀──▶ Transport
//!                       └──────────────────────────────┘ ◀──▶ StoragePort
//! ```

use log::{info, warn};

use crate::config::ReflowConfig;
use crate::control::engine::ControlEngine;
use crate::control::state::{ControlState, ControlStateMachine, Request, clamp_duty};
use crate::rpc::engine::{Context, ProtocolEngine};
use crate::rpc::transport::Transport;
use crate::safety::SafetySupervisor;
use crate::sensors::TemperatureSampler;

use super::events::AppEvent;
use super::ports::{EventSink, HeaterPort, StoragePort, ThermocouplePort};

// ───────────────────────────────────────────────────────────────
// ReflowService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct ReflowService {
    config: ReflowConfig,
    control: ControlStateMachine,
    engine: ControlEngine,
    sampler: TemperatureSampler,
    safety: SafetySupervisor,
    protocol: ProtocolEngine,
    /// Duty applied on the last tick.
    duty_cycle: f32,
    /// State at the end of the last tick.
    last_state: ControlState,
    last_faults: u8,
    /// Request seen by the engine on the last tick.
    seen_request: Request,
    seen_tuning_epoch: u32,
}

impl ReflowService {
    /// Construct the service from configuration.
    ///
    /// Does **not** touch hardware. Call [`start`](Self::start) next.
    pub fn new(config: ReflowConfig) -> Self {
        let control = ControlStateMachine::new();
        let mut protocol = ProtocolEngine::new();
        protocol.set_telemetry_interval(config.telemetry_interval_ms);

        Self {
            engine: ControlEngine::new(&config),
            sampler: TemperatureSampler::new(config.sample_interval_ms),
            safety: SafetySupervisor::new(&config),
            protocol,
            duty_cycle: 0.0,
            last_state: control.state(),
            last_faults: 0,
            seen_request: control.request(),
            seen_tuning_epoch: control.tuning_epoch(),
            control,
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Put the heater in its safe state and announce the initial state.
    pub fn start(&mut self, heater: &mut impl HeaterPort, sink: &mut impl EventSink) {
        heater.begin();
        sink.emit(&AppEvent::Started(self.control.state()));
        info!("ReflowService started in {:?}", self.control.state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one scheduler tick:
    /// protocol → sample → safety → control → heater → telemetry → events.
    ///
    /// `hw` implements **both** [`ThermocouplePort`] and [`HeaterPort`].
    pub fn tick(
        &mut self,
        now_ms: u32,
        hw: &mut (impl ThermocouplePort + HeaterPort),
        transport: &mut impl Transport,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        // 1. Host commands
        let mut ctx = Context {
            control: &mut self.control,
            engine: &mut self.engine,
            storage,
            temperature_c: self.sampler.celsius(),
            duty_cycle: self.duty_cycle,
        };
        self.protocol.poll(transport, &mut ctx);

        // 2. Acquisition
        self.sampler.poll(hw, now_ms);

        // 3. Safety
        self.evaluate_safety(now_ms, sink);

        // 4. Accumulator lifecycle
        self.sync_engine();

        // 5. Duty computation
        let duty = clamp_duty(self.compute_duty(now_ms, sink));
        self.duty_cycle = duty;

        // 6. Actuation
        if self.control.heating_enabled() {
            hw.enable();
        } else {
            hw.disable();
        }
        hw.update(duty, now_ms);

        // 7. Telemetry
        self.protocol.stream_telemetry(
            transport,
            &self.control,
            self.sampler.celsius(),
            duty,
            now_ms,
        );

        // 8. State change
        let state = self.control.state();
        if state != self.last_state {
            sink.emit(&AppEvent::StateChanged {
                from: self.last_state,
                to: state,
            });
            self.last_state = state;
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn control(&self) -> &ControlStateMachine {
        &self.control
    }

    pub fn engine(&self) -> &ControlEngine {
        &self.engine
    }

    pub fn sampler(&self) -> &TemperatureSampler {
        &self.sampler
    }

    pub fn safety(&self) -> &SafetySupervisor {
        &self.safety
    }

    pub fn protocol(&self) -> &ProtocolEngine {
        &self.protocol
    }

    pub fn config(&self) -> &ReflowConfig {
        &self.config
    }

    /// Duty applied on the most recent tick.
    pub fn duty_cycle(&self) -> f32 {
        self.duty_cycle
    }

    // ── Internal ──────────────────────────────────────────────

    fn evaluate_safety(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        let faults = self.safety.evaluate(&self.sampler, now_ms);

        if faults & !self.last_faults != 0 {
            sink.emit(&AppEvent::FaultDetected(faults));
        } else if faults == 0 && self.last_faults != 0 {
            sink.emit(&AppEvent::FaultCleared);
        }
        self.last_faults = faults;

        if faults != 0 && self.control.heating_enabled() {
            warn!("Safety fault! flags=0b{:08b}, heating disabled", faults);
            self.control.disable();
        }
    }

    /// Reset PID memory on entry to Running or on a mode change, re-anchor
    /// the ramp when the rate changes, and restart the tuner on a new
    /// tuning request. A new set point keeps the accumulator.
    fn sync_engine(&mut self) {
        let request = self.control.request();
        if self.control.state() == ControlState::Running {
            let entered = self.last_state != ControlState::Running;
            if entered || request.mode() != self.seen_request.mode() {
                self.engine.reset();
            } else if let (Request::Rate(rate), Request::Rate(seen)) =
                (request, self.seen_request)
            {
                if rate.to_bits() != seen.to_bits() {
                    self.engine.reanchor_ramp();
                }
            }
        }
        self.seen_request = request;

        let tuning_epoch = self.control.tuning_epoch();
        if tuning_epoch != self.seen_tuning_epoch {
            self.engine.restart_tuning(self.control.requested_phase());
            self.seen_tuning_epoch = tuning_epoch;
        }
    }

    fn compute_duty(&mut self, now_ms: u32, sink: &mut impl EventSink) -> f32 {
        if !self.control.heating_enabled() {
            return 0.0;
        }
        let temp = self.sampler.celsius();
        match self.control.state() {
            ControlState::Idle => 0.0,
            ControlState::Running => match self.control.request() {
                Request::DutyCycle(d) => d,
                _ if !temp.is_finite() => 0.0,
                Request::SetPoint(target) => self.engine.evaluate_set_point(target, temp, now_ms),
                Request::Rate(rate) => self.engine.evaluate_rate(rate, temp, now_ms),
            },
            ControlState::Tuning => {
                if !temp.is_finite() {
                    return 0.0;
                }
                let phase = self.control.active_phase();
                let result = self.engine.tune(phase, temp, now_ms);
                if !result.done {
                    return result.duty_cycle;
                }
                let next = self.control.complete_tuning_phase();
                sink.emit(&AppEvent::TuningPhaseComplete { phase, next });
                if next.is_some() {
                    return result.duty_cycle;
                }
                if let Some(gains) = self.engine.apply_derived_gains() {
                    sink.emit(&AppEvent::GainsUpdated(gains));
                }
                0.0
            }
        }
    }
}

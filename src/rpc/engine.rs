//! Protocol engine: drains the transport, applies commands, replies.
//!
//! **Transport-decoupled**: the engine owns only the parser and telemetry
//! subscription. The transport and everything a command may touch are
//! borrowed for the duration of one [`poll`](ProtocolEngine::poll).
//!
//! The protocol has no NACK. Malformed input, out-of-region data requests
//! and write failures are logged and otherwise ignored.

use log::{debug, warn};

use crate::app::ports::StoragePort;
use crate::control::engine::ControlEngine;
use crate::control::state::ControlStateMachine;
use crate::drivers::eeprom::USER_REGION_END;
use crate::error::Error;

use super::parser::Parser;
use super::protocol::{Command, Info, MAX_DATA_LEN, Opcode, Response};
use super::stream::StreamManager;
use super::transport::Transport;

/// Everything a command may read or mutate during one poll.
pub struct Context<'a, S: StoragePort> {
    pub control: &'a mut ControlStateMachine,
    pub engine: &'a mut ControlEngine,
    pub storage: &'a mut S,
    /// Latest temperature (NaN before the first sample).
    pub temperature_c: f32,
    /// Duty applied on the previous tick.
    pub duty_cycle: f32,
}

pub struct ProtocolEngine {
    parser: Parser,
    stream: StreamManager,
    write_errors: u32,
}

impl Default for ProtocolEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolEngine {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            stream: StreamManager::new(),
            write_errors: 0,
        }
    }

    /// Drain every byte the transport has, applying each completed command
    /// and writing its response. Returns the number of commands applied.
    pub fn poll<T: Transport, S: StoragePort>(
        &mut self,
        transport: &mut T,
        ctx: &mut Context<'_, S>,
    ) -> u32 {
        let mut applied = 0;
        while transport.available() > 0 {
            let byte = match transport.read_byte() {
                Ok(Some(b)) => b,
                Ok(None) => break,
                Err(e) => {
                    warn!("RPC: read failed: {}", Into::<Error>::into(e));
                    break;
                }
            };
            let Some(cmd) = self.parser.push(byte) else {
                continue;
            };
            applied += 1;
            if let Some(response) = self.apply(cmd, ctx) {
                self.send(transport, &response);
            }
        }
        applied
    }

    /// Apply one command. Returns the response to send, if any.
    pub fn apply<S: StoragePort>(
        &mut self,
        cmd: Command,
        ctx: &mut Context<'_, S>,
    ) -> Option<Response> {
        debug!("RPC: {:?}", cmd);
        let control = &mut *ctx.control;
        match cmd {
            Command::Status => {}
            Command::Info => return Some(Response::info(&info(ctx))),
            Command::Disable => control.disable(),
            Command::Enable => control.enable(),
            Command::Idle => control.go_idle(),
            Command::Start => control.start(),
            Command::Reset => {
                control.reset();
                ctx.engine.reset_all();
            }
            Command::Tune(phase) => control.request_tuning_phase(phase),
            Command::SetTemp(v) => {
                control.request_set_point(v);
                return Some(Response::value(Opcode::SetTemp, control.request().value()));
            }
            Command::SetTempSlope(v) => {
                control.request_rate(v);
                return Some(Response::value(Opcode::SetTempSlope, control.request().value()));
            }
            Command::SetDutyCycle(v) => {
                control.request_duty_cycle(v);
                return Some(Response::value(Opcode::SetDutyCycle, control.request().value()));
            }
            Command::SetData { address, data } => {
                if !in_user_region(address, data.len()) {
                    warn!("RPC: SetData outside user region @{:#06x}", address);
                    return None;
                }
                let written = ctx.storage.write(address, &data);
                if let Err(e) = written {
                    warn!("RPC: SetData @{:#06x} failed: {}", address, e);
                    return Some(Response::data(Opcode::SetData, address, &[]));
                }
                return Some(read_back(ctx.storage, Opcode::SetData, address, data.len()));
            }
            Command::GetData { address, len } => {
                if !in_user_region(address, len as usize) {
                    warn!("RPC: GetData outside user region @{:#06x}", address);
                    return None;
                }
                return Some(read_back(ctx.storage, Opcode::GetData, address, len as usize));
            }
            Command::Telemetry { interval_ms } => {
                self.stream.set_interval(interval_ms);
                return None;
            }
        }
        Some(Response::status(ctx.control))
    }

    /// Emit a telemetry frame if subscribed and due.
    pub fn stream_telemetry<T: Transport>(
        &mut self,
        transport: &mut T,
        control: &ControlStateMachine,
        temperature_c: f32,
        duty_cycle: f32,
        now_ms: u32,
    ) {
        if !self.stream.due(now_ms) {
            return;
        }
        let frame = Response::telemetry(control, temperature_c, duty_cycle);
        if !self.send(transport, &frame) {
            self.stream.record_drop();
        }
    }

    /// Subscribe (non-zero) or unsubscribe (0) from telemetry.
    pub fn set_telemetry_interval(&mut self, interval_ms: u16) {
        self.stream.set_interval(interval_ms);
    }

    pub fn stream(&self) -> &StreamManager {
        &self.stream
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }

    fn send<T: Transport>(&mut self, transport: &mut T, response: &Response) -> bool {
        let bytes = response.as_bytes();
        match transport.write(bytes) {
            Ok(n) if n == bytes.len() => true,
            Ok(n) => {
                warn!("RPC: short write {}/{}", n, bytes.len());
                self.write_errors = self.write_errors.wrapping_add(1);
                false
            }
            Err(e) => {
                warn!("RPC: write failed: {}", Into::<Error>::into(e));
                self.write_errors = self.write_errors.wrapping_add(1);
                false
            }
        }
    }
}

fn in_user_region(address: u16, len: usize) -> bool {
    address as usize + len <= USER_REGION_END as usize
}

fn read_back<S: StoragePort>(
    storage: &mut S,
    opcode: Opcode,
    address: u16,
    len: usize,
) -> Response {
    let mut buf = [0u8; MAX_DATA_LEN];
    let len = len.min(MAX_DATA_LEN);
    match storage.read(address, &mut buf[..len]) {
        Ok(()) => Response::data(opcode, address, &buf[..len]),
        Err(e) => {
            warn!("RPC: read @{:#06x} failed: {}", address, e);
            Response::data(opcode, address, &[])
        }
    }
}

fn info<S: StoragePort>(ctx: &Context<'_, S>) -> Info {
    let gains = ctx.engine.gains();
    let report = ctx.engine.report();
    Info {
        temperature_c: ctx.temperature_c,
        duty_cycle: ctx.duty_cycle,
        kp: gains.kp,
        ki: gains.ki,
        kd: gains.kd,
        steady_gain: report.steady_gain().unwrap_or(f32::NAN),
        velocity: report.velocity_c_per_s.unwrap_or(f32::NAN),
        inertia_lag_s: report.lag_s.unwrap_or(f32::NAN),
    }
}

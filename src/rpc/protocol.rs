//! Host protocol: opcodes, payload layouts and response encoding.
//!
//! Every message in both directions is framed as:
//! ```text
//! ┌──────────┬─────────────┬─────────────────────┐
//! │ 0x02 STX │ opcode (1B) │ payload (0..=35 B)  │
//! └──────────┴─────────────┴─────────────────────┘
//! ```
//! Multi-byte fields are little-endian; floats are IEEE-754 `f32`.
//!
//! Payload bytes are stuffed so STX only ever marks a frame start:
//! ```text
//!   0x02 ──▶ 0x10 0x22        0x10 ──▶ 0x10 0x30
//! ```
//! Payload lengths count decoded bytes.
//!
//! Status byte (`A` responses and telemetry):
//! ```text
//!   bit 7   6 5    4 3      2 1     0
//!      ─  mode  phase   state   enabled
//! ```
//! `phase` is only filled in while Tuning and `mode` only while Running;
//! otherwise both read 0 (n/a).

use heapless::Vec;

use crate::control::state::{ControlState, ControlStateMachine, TuningPhase};

/// Frame start marker (ASCII STX).
pub const START_BYTE: u8 = 0x02;
/// Escape marker (ASCII DLE). The next byte is the payload byte XOR [`ESCAPE_XOR`].
pub const ESCAPE_BYTE: u8 = 0x10;
pub const ESCAPE_XOR: u8 = 0x20;
/// Bumped whenever the framing or a payload layout changes.
pub const PROTOCOL_VERSION: u8 = 4;
/// Largest SetData/GetData run.
pub const MAX_DATA_LEN: usize = 32;
/// Largest inbound payload: SetData header plus data.
pub const MAX_PAYLOAD: usize = DATA_HEADER_LEN + MAX_DATA_LEN;
/// Largest outbound frame, every payload byte stuffed.
pub const MAX_FRAME: usize = 2 + 2 * MAX_PAYLOAD;
/// `addr u16` + `len u8`.
pub const DATA_HEADER_LEN: usize = 3;
/// Telemetry intervals below this are raised to it.
pub const MIN_TELEMETRY_INTERVAL_MS: u16 = 100;

// ───────────────────────────────────────────────────────────────
// Opcodes
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Status = b'A',
    Info = b'B',
    Disable = b'C',
    Enable = b'D',
    Idle = b'E',
    SetTemp = b'F',
    SetTempSlope = b'G',
    SetDutyCycle = b'H',
    TuneAll = b'I',
    TuneSteadyState = b'J',
    TuneVelocity = b'K',
    TuneInertia = b'L',
    SetData = b'M',
    GetData = b'N',
    Start = b'S',
    Telemetry = b'T',
    Reset = b'Z',
}

impl Opcode {
    pub const ALL: [Opcode; 17] = [
        Self::Status,
        Self::Info,
        Self::Disable,
        Self::Enable,
        Self::Idle,
        Self::SetTemp,
        Self::SetTempSlope,
        Self::SetDutyCycle,
        Self::TuneAll,
        Self::TuneSteadyState,
        Self::TuneVelocity,
        Self::TuneInertia,
        Self::SetData,
        Self::GetData,
        Self::Start,
        Self::Telemetry,
        Self::Reset,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| *op as u8 == byte)
    }

    /// Fixed payload length. For SetData this is only the header; the
    /// header's `len` field extends it.
    pub fn payload_len(self) -> usize {
        match self {
            Self::SetTemp | Self::SetTempSlope | Self::SetDutyCycle => 4,
            Self::SetData | Self::GetData => DATA_HEADER_LEN,
            Self::Telemetry => 2,
            _ => 0,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Decoded commands
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Status,
    Info,
    Disable,
    Enable,
    Idle,
    Start,
    Reset,
    SetTemp(f32),
    SetTempSlope(f32),
    SetDutyCycle(f32),
    Tune(TuningPhase),
    SetData {
        address: u16,
        data: Vec<u8, MAX_DATA_LEN>,
    },
    GetData {
        address: u16,
        len: u8,
    },
    Telemetry {
        interval_ms: u16,
    },
}

impl Command {
    /// Decode a complete payload. `None` if the payload is malformed.
    pub fn decode(opcode: Opcode, payload: &[u8]) -> Option<Self> {
        let cmd = match opcode {
            Opcode::Status => Self::Status,
            Opcode::Info => Self::Info,
            Opcode::Disable => Self::Disable,
            Opcode::Enable => Self::Enable,
            Opcode::Idle => Self::Idle,
            Opcode::Start => Self::Start,
            Opcode::Reset => Self::Reset,
            Opcode::TuneAll => Self::Tune(TuningPhase::All),
            Opcode::TuneSteadyState => Self::Tune(TuningPhase::SteadyState),
            Opcode::TuneVelocity => Self::Tune(TuningPhase::Velocity),
            Opcode::TuneInertia => Self::Tune(TuningPhase::Inertia),
            Opcode::SetTemp => Self::SetTemp(read_f32(payload)?),
            Opcode::SetTempSlope => Self::SetTempSlope(read_f32(payload)?),
            Opcode::SetDutyCycle => Self::SetDutyCycle(read_f32(payload)?),
            Opcode::SetData => {
                let (address, len) = read_data_header(payload)?;
                let data = payload.get(DATA_HEADER_LEN..DATA_HEADER_LEN + len as usize)?;
                Self::SetData {
                    address,
                    data: Vec::from_slice(data).ok()?,
                }
            }
            Opcode::GetData => {
                let (address, len) = read_data_header(payload)?;
                Self::GetData { address, len }
            }
            Opcode::Telemetry => Self::Telemetry {
                interval_ms: u16::from_le_bytes([*payload.first()?, *payload.get(1)?]),
            },
        };
        Some(cmd)
    }
}

fn read_f32(payload: &[u8]) -> Option<f32> {
    let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    Some(f32::from_le_bytes(bytes))
}

/// `(address, len)` with `len` in 1..=MAX_DATA_LEN.
pub fn read_data_header(payload: &[u8]) -> Option<(u16, u8)> {
    let address = u16::from_le_bytes([*payload.first()?, *payload.get(1)?]);
    let len = *payload.get(2)?;
    if len == 0 || len as usize > MAX_DATA_LEN {
        return None;
    }
    Some((address, len))
}

// ───────────────────────────────────────────────────────────────
// Byte stuffing
// ───────────────────────────────────────────────────────────────

/// Payload bytes that travel as an escape pair.
pub fn needs_escape(byte: u8) -> bool {
    byte == START_BYTE || byte == ESCAPE_BYTE
}

/// Decode the byte following [`ESCAPE_BYTE`]. `None` unless it encodes a
/// reserved byte.
pub fn unescape(byte: u8) -> Option<u8> {
    let raw = byte ^ ESCAPE_XOR;
    needs_escape(raw).then_some(raw)
}

/// Append `payload` to `out`, stuffing reserved bytes.
pub fn stuff_into<const N: usize>(out: &mut Vec<u8, N>, payload: &[u8]) -> Result<(), u8> {
    for &b in payload {
        if needs_escape(b) {
            out.push(ESCAPE_BYTE)?;
            out.push(b ^ ESCAPE_XOR)?;
        } else {
            out.push(b)?;
        }
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Status byte
// ───────────────────────────────────────────────────────────────

/// Unpacked status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBits {
    pub enabled: bool,
    /// 0 Idle, 1 Running, 2 Tuning.
    pub state: u8,
    /// 0 n/a, 1 SteadyState, 2 Velocity, 3 Inertia.
    pub phase: u8,
    /// 0 n/a, 1 SetPoint, 2 Rate, 3 DutyCycle.
    pub mode: u8,
}

impl StatusBits {
    pub fn of(control: &ControlStateMachine) -> Self {
        let state = control.state();
        Self {
            enabled: control.heating_enabled(),
            state: state as u8,
            phase: if state == ControlState::Tuning {
                control.active_phase() as u8
            } else {
                0
            },
            mode: if state == ControlState::Running {
                control.mode() as u8
            } else {
                0
            },
        }
    }

    pub fn pack(self) -> u8 {
        u8::from(self.enabled)
            | (self.state & 0b11) << 1
            | (self.phase & 0b11) << 3
            | (self.mode & 0b11) << 5
    }

    pub fn unpack(byte: u8) -> Self {
        Self {
            enabled: byte & 1 != 0,
            state: (byte >> 1) & 0b11,
            phase: (byte >> 3) & 0b11,
            mode: (byte >> 5) & 0b11,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Responses
// ───────────────────────────────────────────────────────────────

/// Measured values reported by the Info response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Info {
    pub temperature_c: f32,
    pub duty_cycle: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// °C per percent duty, NaN until measured.
    pub steady_gain: f32,
    /// °C/s, NaN until measured.
    pub velocity: f32,
    /// Seconds, NaN until measured.
    pub inertia_lag_s: f32,
}

/// An encoded outbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    bytes: Vec<u8, MAX_FRAME>,
}

impl Response {
    fn new(opcode: Opcode) -> Self {
        let mut bytes = Vec::new();
        // Two bytes always fit.
        let _ = bytes.extend_from_slice(&[START_BYTE, opcode as u8]);
        Self { bytes }
    }

    /// Append payload bytes, stuffed; every response layout fits [`MAX_FRAME`].
    fn put(mut self, data: &[u8]) -> Self {
        if stuff_into(&mut self.bytes, data).is_err() {
            debug_assert!(false, "response overflow");
        }
        self
    }

    fn put_f32(self, value: f32) -> Self {
        self.put(&value.to_le_bytes())
    }

    /// `A`: status byte and the active request value.
    pub fn status(control: &ControlStateMachine) -> Self {
        Self::new(Opcode::Status)
            .put(&[StatusBits::of(control).pack()])
            .put_f32(control.request().value())
    }

    /// `F`/`G`/`H`: echo of the stored request.
    pub fn value(opcode: Opcode, value: f32) -> Self {
        Self::new(opcode).put_f32(value)
    }

    /// `B`: version and measurements.
    pub fn info(info: &Info) -> Self {
        [
            info.temperature_c,
            info.duty_cycle,
            info.kp,
            info.ki,
            info.kd,
            info.steady_gain,
            info.velocity,
            info.inertia_lag_s,
        ]
        .into_iter()
        .fold(Self::new(Opcode::Info).put(&[PROTOCOL_VERSION]), Self::put_f32)
    }

    /// `M`/`N`: the bytes read back. An empty `data` reports a failure.
    pub fn data(opcode: Opcode, address: u16, data: &[u8]) -> Self {
        let len = data.len().min(MAX_DATA_LEN);
        Self::new(opcode)
            .put(&address.to_le_bytes())
            .put(&[len as u8])
            .put(&data[..len])
    }

    /// `T`: periodic telemetry.
    pub fn telemetry(control: &ControlStateMachine, temperature_c: f32, duty_cycle: f32) -> Self {
        Self::new(Opcode::Telemetry)
            .put(&[StatusBits::of(control).pack()])
            .put_f32(temperature_c)
            .put_f32(duty_cycle)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

//! Mock hardware for integration tests.
//!
//! The real MAX6675 and duty-cycle drivers run unmodified on top of a
//! simulated SPI bus and SSR pin. A two-node thermal model (heating element
//! and oven air) closes the loop so that the heater's time-proportioned
//! output actually moves the thermocouple reading.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, Operation, SpiDevice};

use reflow::adapters::hardware::OvenHardware;
use reflow::app::events::AppEvent;
use reflow::app::ports::{EventSink, StorageError, StoragePort};
use reflow::app::service::ReflowService;
use reflow::config::ReflowConfig;
use reflow::drivers::heater::DutyCycleDriver;
use reflow::rpc::protocol::{
    ESCAPE_BYTE, ESCAPE_XOR, Opcode, START_BYTE, StatusBits, needs_escape, unescape,
};
use reflow::rpc::transport::Transport;
use reflow::sensors::max6675::Max6675;

// ── SSR pin ───────────────────────────────────────────────────

/// Output pin whose level is observable from the test and the plant.
#[derive(Clone, Default)]
pub struct SsrPin {
    level: Rc<Cell<bool>>,
    transitions: Rc<Cell<u32>>,
}

impl SsrPin {
    pub fn is_high(&self) -> bool {
        self.level.get()
    }

    pub fn transitions(&self) -> u32 {
        self.transitions.get()
    }

    fn set(&mut self, high: bool) {
        if self.level.get() != high {
            self.transitions.set(self.transitions.get() + 1);
        }
        self.level.set(high);
    }
}

impl digital::ErrorType for SsrPin {
    type Error = Infallible;
}

impl OutputPin for SsrPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

// ── Thermocouple SPI ──────────────────────────────────────────

/// Serves MAX6675 frames encoding whatever the probe currently reads.
#[derive(Clone)]
pub struct ProbeSpi {
    celsius: Rc<Cell<f32>>,
    open: Rc<Cell<bool>>,
}

impl ProbeSpi {
    pub fn new(celsius: f32) -> Self {
        Self {
            celsius: Rc::new(Cell::new(celsius)),
            open: Rc::new(Cell::new(false)),
        }
    }

    pub fn set_celsius(&self, celsius: f32) {
        self.celsius.set(celsius);
    }

    pub fn celsius(&self) -> f32 {
        self.celsius.get()
    }

    pub fn set_open(&self, open: bool) {
        self.open.set(open);
    }

    fn frame(&self) -> u16 {
        if self.open.get() {
            return 1 << 2;
        }
        let counts = (self.celsius.get().max(0.0) / 0.25) as u16 & 0x0FFF;
        counts << 3
    }
}

impl spi::ErrorType for ProbeSpi {
    type Error = Infallible;
}

impl SpiDevice for ProbeSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let frame = self.frame().to_be_bytes();
        for op in operations {
            if let Operation::Read(buf) = op {
                for (slot, byte) in buf.iter_mut().zip(frame) {
                    *slot = byte;
                }
            }
        }
        Ok(())
    }
}

// ── Thermal plant ─────────────────────────────────────────────

/// Element and air temperatures. The element is heated by the SSR and
/// conducts into the air, which leaks to ambient. The probe sits in the air.
pub struct ThermalPlant {
    pub ambient_c: f32,
    pub element_c: f32,
    pub air_c: f32,
}

impl ThermalPlant {
    /// Element heating rate at full power (°C/s).
    const POWER: f32 = 4.0;
    /// Element → air coupling (1/s), seen from the element.
    const ELEMENT_LOSS: f32 = 0.1;
    /// Element → air coupling (1/s), seen from the air.
    const AIR_GAIN: f32 = 0.1;
    /// Air → ambient leak (1/s).
    const LEAK: f32 = 0.01;

    pub fn new(ambient_c: f32) -> Self {
        Self {
            ambient_c,
            element_c: ambient_c,
            air_c: ambient_c,
        }
    }

    pub fn step(&mut self, dt_ms: u32, heater_on: bool) {
        let dt = dt_ms as f32 / 1000.0;
        let power = if heater_on { Self::POWER } else { 0.0 };
        let gap = self.element_c - self.air_c;
        self.element_c += (power - Self::ELEMENT_LOSS * gap) * dt;
        self.air_c += (Self::AIR_GAIN * gap - Self::LEAK * (self.air_c - self.ambient_c)) * dt;
    }
}

// ── Simulated oven ────────────────────────────────────────────

pub type OvenHw = OvenHardware<Max6675<ProbeSpi>, DutyCycleDriver<SsrPin>>;

/// Real drivers over simulated hardware.
pub struct SimOven {
    pub hw: OvenHw,
    pub pin: SsrPin,
    pub probe: ProbeSpi,
    pub plant: Option<ThermalPlant>,
}

impl SimOven {
    /// Probe reading fixed by the test.
    pub fn scripted(celsius: f32, period_ms: u32) -> Self {
        Self::build(ProbeSpi::new(celsius), None, period_ms)
    }

    /// Probe reading driven by the thermal plant.
    pub fn with_plant(ambient_c: f32, period_ms: u32) -> Self {
        Self::build(
            ProbeSpi::new(ambient_c),
            Some(ThermalPlant::new(ambient_c)),
            period_ms,
        )
    }

    fn build(probe: ProbeSpi, plant: Option<ThermalPlant>, period_ms: u32) -> Self {
        let pin = SsrPin::default();
        let hw = OvenHardware::new(
            Max6675::new(probe.clone()),
            DutyCycleDriver::new(pin.clone(), period_ms),
        );
        Self {
            hw,
            pin,
            probe,
            plant,
        }
    }

    /// Advance the physics by one tick using the current SSR level.
    pub fn step(&mut self, dt_ms: u32) {
        if let Some(plant) = self.plant.as_mut() {
            plant.step(dt_ms, self.pin.is_high());
            self.probe.set_celsius(plant.air_c);
        }
    }
}

// ── EEPROM ────────────────────────────────────────────────────

pub struct MockEeprom {
    pub mem: Vec<u8>,
    pub writes: u32,
}

impl MockEeprom {
    pub fn new() -> Self {
        Self {
            mem: vec![0xFF; 4096],
            writes: 0,
        }
    }
}

impl Default for MockEeprom {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePort for MockEeprom {
    fn capacity(&self) -> u16 {
        self.mem.len() as u16
    }

    fn read_byte(&mut self, address: u16) -> Result<u8, StorageError> {
        self.mem
            .get(address as usize)
            .copied()
            .ok_or(StorageError::OutOfRange)
    }

    fn write_byte(&mut self, address: u16, data: u8) -> Result<(), StorageError> {
        let slot = self
            .mem
            .get_mut(address as usize)
            .ok_or(StorageError::OutOfRange)?;
        *slot = data;
        self.writes += 1;
        Ok(())
    }
}

// ── Serial link ───────────────────────────────────────────────

/// Host side of the serial link: `rx` is what the device will read,
/// `tx` is everything the device wrote.
#[derive(Default)]
pub struct Loopback {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
}

impl Loopback {
    pub fn send(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Take every complete frame the device has written.
    pub fn take_frames(&mut self) -> Vec<Frame> {
        let frames = split_frames(&self.tx);
        self.tx.clear();
        frames
    }
}

impl Transport for Loopback {
    type Error = Infallible;

    fn available(&self) -> usize {
        self.rx.len()
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        Ok(self.rx.pop_front())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ── Host-side frame helpers ───────────────────────────────────

/// A host frame: STX, opcode, stuffed payload.
pub fn frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![START_BYTE, opcode as u8];
    for &b in payload {
        if needs_escape(b) {
            bytes.extend([ESCAPE_BYTE, b ^ ESCAPE_XOR]);
        } else {
            bytes.push(b);
        }
    }
    bytes
}

pub fn command(opcode: Opcode) -> Vec<u8> {
    frame(opcode, &[])
}

pub fn command_f32(opcode: Opcode, value: f32) -> Vec<u8> {
    frame(opcode, &value.to_le_bytes())
}

pub fn telemetry_request(interval_ms: u16) -> Vec<u8> {
    frame(Opcode::Telemetry, &interval_ms.to_le_bytes())
}

pub fn set_data(address: u16, data: &[u8]) -> Vec<u8> {
    let mut payload = address.to_le_bytes().to_vec();
    payload.push(data.len() as u8);
    payload.extend_from_slice(data);
    frame(Opcode::SetData, &payload)
}

pub fn get_data(address: u16, len: u8) -> Vec<u8> {
    let [lo, hi] = address.to_le_bytes();
    frame(Opcode::GetData, &[lo, hi, len])
}

/// A decoded device → host frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Status { bits: StatusBits, value: f32 },
    Value { opcode: u8, value: f32 },
    Info { version: u8, fields: [f32; 8] },
    Data { opcode: u8, address: u16, data: Vec<u8> },
    Telemetry { bits: StatusBits, temperature_c: f32, duty_cycle: f32 },
}

fn f32_at(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn unstuff(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter();
    while let Some(&b) = iter.next() {
        if b == ESCAPE_BYTE {
            let next = *iter.next().expect("dangling escape");
            out.push(unescape(next).expect("bad escape pair"));
        } else {
            out.push(b);
        }
    }
    out
}

/// Split the device's output stream into frames. A start byte only ever
/// opens a frame; payloads arrive stuffed.
pub fn split_frames(bytes: &[u8]) -> Vec<Frame> {
    let Some((&first, rest)) = bytes.split_first() else {
        return Vec::new();
    };
    assert_eq!(first, START_BYTE, "output must begin with the start byte");
    rest.split(|b| *b == START_BYTE).map(decode_frame).collect()
}

fn decode_frame(raw: &[u8]) -> Frame {
    let (&opcode, stuffed) = raw.split_first().expect("frame without opcode");
    let body = unstuff(stuffed);
    let (frame, len) = match opcode {
        b'A' => (
            Frame::Status {
                bits: StatusBits::unpack(body[0]),
                value: f32_at(&body, 1),
            },
            5,
        ),
        b'F' | b'G' | b'H' => (
            Frame::Value {
                opcode,
                value: f32_at(&body, 0),
            },
            4,
        ),
        b'B' => {
            let mut fields = [0.0; 8];
            for (i, f) in fields.iter_mut().enumerate() {
                *f = f32_at(&body, 1 + i * 4);
            }
            (
                Frame::Info {
                    version: body[0],
                    fields,
                },
                33,
            )
        }
        b'M' | b'N' => {
            let len = body[2] as usize;
            (
                Frame::Data {
                    opcode,
                    address: u16::from_le_bytes([body[0], body[1]]),
                    data: body[3..3 + len].to_vec(),
                },
                3 + len,
            )
        }
        b'T' => (
            Frame::Telemetry {
                bits: StatusBits::unpack(body[0]),
                temperature_c: f32_at(&body, 1),
                duty_cycle: f32_at(&body, 5),
            },
            9,
        ),
        other => panic!("unexpected opcode {other:#04x}"),
    };
    assert_eq!(body.len(), len, "frame {:?} has the wrong length", opcode as char);
    frame
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// Scheduler tick used by every scenario.
pub const TICK_MS: u32 = 10;

/// The service wired to simulated hardware, ticked like the firmware loop.
pub struct Rig {
    pub svc: ReflowService,
    pub oven: SimOven,
    pub link: Loopback,
    pub eeprom: MockEeprom,
    pub sink: RecordingSink,
    pub now_ms: u32,
}

impl Rig {
    pub fn new(config: ReflowConfig, mut oven: SimOven) -> Self {
        let mut sink = RecordingSink::default();
        let mut svc = ReflowService::new(config);
        svc.start(&mut oven.hw, &mut sink);
        Self {
            svc,
            oven,
            link: Loopback::default(),
            eeprom: MockEeprom::new(),
            sink,
            now_ms: 0,
        }
    }

    /// Default config with a fixed probe reading.
    pub fn scripted(celsius: f32) -> Self {
        let config = ReflowConfig::default();
        let oven = SimOven::scripted(celsius, config.cycle_period_ms);
        Self::new(config, oven)
    }

    /// Default config with the thermal plant closing the loop.
    pub fn with_plant(ambient_c: f32) -> Self {
        let config = ReflowConfig::default();
        let oven = SimOven::with_plant(ambient_c, config.cycle_period_ms);
        Self::new(config, oven)
    }

    pub fn tick(&mut self) {
        self.svc.tick(
            self.now_ms,
            &mut self.oven.hw,
            &mut self.link,
            &mut self.eeprom,
            &mut self.sink,
        );
        self.oven.step(TICK_MS);
        self.now_ms = self.now_ms.wrapping_add(TICK_MS);
    }

    pub fn run_ms(&mut self, ms: u32) {
        for _ in 0..ms / TICK_MS {
            self.tick();
        }
    }

    /// Tick until `done` holds or `limit_ms` elapses. Returns whether it held.
    pub fn run_until(&mut self, limit_ms: u32, mut done: impl FnMut(&Self) -> bool) -> bool {
        for _ in 0..limit_ms / TICK_MS {
            if done(self) {
                return true;
            }
            self.tick();
        }
        done(self)
    }

    /// Send `bytes`, run one tick, and return the frames written.
    pub fn exchange(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.link.send(bytes);
        self.tick();
        self.link.take_frames()
    }

    /// Send a bare command and return its status reply.
    pub fn status_after(&mut self, bytes: &[u8]) -> StatusBits {
        match self.exchange(bytes).as_slice() {
            [.., Frame::Status { bits, .. }] => *bits,
            other => panic!("expected a status reply, got {other:?}"),
        }
    }
}

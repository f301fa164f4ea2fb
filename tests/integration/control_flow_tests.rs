//! Host-driven control flows: interlock, run modes, safety trips.

use reflow::app::events::AppEvent;
use reflow::control::state::ControlState;
use reflow::error::{SafetyFault, SensorError};
use reflow::rpc::protocol::Opcode;

use crate::mock_hw::{Frame, Rig, command, command_f32, telemetry_request};

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boots_idle_with_heating_disabled() {
    let mut rig = Rig::scripted(25.0);
    rig.run_ms(500);

    let bits = rig.status_after(&command(Opcode::Status));
    assert!(!bits.enabled);
    assert_eq!(bits.state, 0);
    assert_eq!(bits.mode, 0);
    assert!(!rig.oven.pin.is_high());
    assert_eq!(rig.oven.pin.transitions(), 0);
    assert_eq!(rig.sink.events[0], AppEvent::Started(ControlState::Idle));
}

#[test]
fn start_is_ignored_until_enabled() {
    let mut rig = Rig::scripted(25.0);
    let bits = rig.status_after(&command(Opcode::Start));
    assert_eq!(bits.state, 0);

    rig.status_after(&command(Opcode::Enable));
    let bits = rig.status_after(&command(Opcode::Start));
    assert_eq!(bits.state, 1);
}

// ── Set point ─────────────────────────────────────────────────

#[test]
fn set_point_run_tracks_a_ramping_oven() {
    let mut rig = Rig::scripted(25.0);

    let bits = rig.status_after(&command(Opcode::Enable));
    assert!(bits.enabled);

    let echo = rig.exchange(&command_f32(Opcode::SetTemp, 150.0));
    assert_eq!(
        echo,
        vec![Frame::Value {
            opcode: b'F',
            value: 150.0
        }]
    );

    let frames = rig.exchange(&command(Opcode::Start));
    let [Frame::Status { bits, value }] = frames.as_slice() else {
        panic!("expected one status frame, got {frames:?}");
    };
    assert!(bits.enabled);
    assert_eq!(bits.state, 1);
    assert_eq!(bits.mode, 1);
    assert_eq!(*value, 150.0);

    rig.exchange(&telemetry_request(500));
    rig.run_ms(300);
    assert!(rig.oven.pin.is_high(), "cold oven heats at full power");

    // Oven climbs 25 → 150 °C over 50 s.
    let t0 = rig.now_ms;
    rig.run_until(60_000, |r| {
        let t = r.now_ms.wrapping_sub(t0) as f32 / 1000.0;
        r.oven.probe.set_celsius((25.0 + 2.5 * t).min(150.0));
        false
    });

    let frames = rig.link.take_frames();
    let mut last_error = f32::INFINITY;
    let mut samples = 0;
    for frame in frames {
        let Frame::Telemetry {
            bits,
            temperature_c,
            ..
        } = frame
        else {
            continue;
        };
        assert_eq!(bits.state, 1);
        assert_eq!(bits.mode, 1, "mode never changes during the run");
        let error = (150.0 - temperature_c).abs();
        assert!(error <= last_error, "|error| grew to {error}");
        last_error = error;
        samples += 1;
    }
    assert!(samples > 50);
    assert!(last_error < 1.0);

    let frames = rig.exchange(&command(Opcode::Status));
    assert!(matches!(
        frames.last(),
        Some(Frame::Status { bits, value }) if bits.mode == 1 && *value == 150.0
    ));
}

#[test]
fn rate_request_reports_rate_mode() {
    let mut rig = Rig::scripted(25.0);
    rig.exchange(&command(Opcode::Enable));
    let echo = rig.exchange(&command_f32(Opcode::SetTempSlope, 2.0));
    assert_eq!(
        echo,
        vec![Frame::Value {
            opcode: b'G',
            value: 2.0
        }]
    );
    let bits = rig.status_after(&command(Opcode::Start));
    assert_eq!((bits.state, bits.mode), (1, 2));

    rig.run_ms(2_000);
    let target = rig.svc.engine().ramp_target().unwrap();
    assert!(target > 25.0 && target <= 30.0, "ramp target {target}");
}

// ── Duty cycle ────────────────────────────────────────────────

#[test]
fn duty_cycle_requests_are_clamped() {
    let mut rig = Rig::scripted(25.0);
    assert_eq!(
        rig.exchange(&command_f32(Opcode::SetDutyCycle, 1.5)),
        vec![Frame::Value {
            opcode: b'H',
            value: 1.0
        }]
    );
    assert_eq!(
        rig.exchange(&command_f32(Opcode::SetDutyCycle, -0.2)),
        vec![Frame::Value {
            opcode: b'H',
            value: 0.0
        }]
    );
}

#[test]
fn half_duty_asserts_half_of_each_window() {
    let mut rig = Rig::scripted(25.0);
    rig.exchange(&command(Opcode::Enable));
    rig.exchange(&command_f32(Opcode::SetDutyCycle, 0.5));
    rig.exchange(&command(Opcode::Start));
    rig.run_ms(1_000);

    let period = rig.svc.config().cycle_period_ms;
    let mut on_ticks = 0;
    for _ in 0..period / crate::mock_hw::TICK_MS * 10 {
        rig.tick();
        if rig.oven.pin.is_high() {
            on_ticks += 1;
        }
    }
    assert_eq!(on_ticks, period / crate::mock_hw::TICK_MS / 2 * 10);
}

// ── Interlock ─────────────────────────────────────────────────

#[test]
fn disable_cuts_heater_within_one_tick_while_running() {
    let mut rig = Rig::scripted(25.0);
    rig.exchange(&command(Opcode::Enable));
    rig.exchange(&command_f32(Opcode::SetDutyCycle, 1.0));
    rig.exchange(&command(Opcode::Start));
    rig.run_ms(100);
    assert!(rig.oven.pin.is_high());

    let bits = rig.status_after(&command(Opcode::Disable));
    assert!(!rig.oven.pin.is_high());
    assert!(!bits.enabled);
    assert_eq!(bits.state, 0);
}

#[test]
fn disable_aborts_tuning_within_one_tick() {
    let mut rig = Rig::scripted(25.0);
    rig.exchange(&command(Opcode::Enable));
    let bits = rig.status_after(&command(Opcode::TuneAll));
    assert_eq!((bits.state, bits.phase), (2, 1));

    assert!(rig.run_until(1_000, |r| r.oven.pin.is_high()));

    let bits = rig.status_after(&command(Opcode::Disable));
    assert!(!rig.oven.pin.is_high());
    assert_eq!((bits.state, bits.phase), (0, 0));
    rig.run_ms(1_000);
    assert!(!rig.oven.pin.is_high());
}

#[test]
fn idle_stops_heating_but_keeps_interlock() {
    let mut rig = Rig::scripted(25.0);
    rig.exchange(&command(Opcode::Enable));
    rig.exchange(&command_f32(Opcode::SetDutyCycle, 1.0));
    rig.exchange(&command(Opcode::Start));
    rig.run_ms(100);

    let bits = rig.status_after(&command(Opcode::Idle));
    assert!(bits.enabled);
    assert_eq!(bits.state, 0);
    assert!(!rig.oven.pin.is_high());
}

#[test]
fn reset_restores_boot_state() {
    let mut rig = Rig::scripted(25.0);
    rig.exchange(&command(Opcode::Enable));
    rig.exchange(&command_f32(Opcode::SetTemp, 200.0));
    rig.exchange(&command(Opcode::Start));

    let frames = rig.exchange(&command(Opcode::Reset));
    assert_eq!(
        frames,
        vec![Frame::Status {
            bits: reflow::rpc::protocol::StatusBits::unpack(0),
            value: 0.0
        }]
    );
    assert!(!rig.oven.pin.is_high());
}

// ── Safety ────────────────────────────────────────────────────

#[test]
fn over_temperature_trips_interlock_until_host_re_enables() {
    let mut rig = Rig::scripted(25.0);
    rig.exchange(&command(Opcode::Enable));
    rig.exchange(&command_f32(Opcode::SetDutyCycle, 1.0));
    rig.exchange(&command(Opcode::Start));
    rig.run_ms(300);
    assert!(rig.oven.pin.is_high());

    rig.oven.probe.set_celsius(320.0);
    rig.run_ms(500);
    assert!(!rig.oven.pin.is_high());
    assert!(!rig.svc.control().heating_enabled());
    assert!(
        rig.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::FaultDetected(f) if f & 0b001 != 0))
    );

    rig.oven.probe.set_celsius(100.0);
    rig.run_ms(500);
    assert!(rig.sink.events.contains(&AppEvent::FaultCleared));
    assert!(!rig.oven.pin.is_high(), "clearing a fault does not re-enable");

    rig.exchange(&command(Opcode::Enable));
    rig.exchange(&command(Opcode::Start));
    rig.run_ms(300);
    assert!(rig.oven.pin.is_high());
}

#[test]
fn open_thermocouple_trips_interlock() {
    let mut rig = Rig::scripted(25.0);
    rig.exchange(&command(Opcode::Enable));
    rig.exchange(&command_f32(Opcode::SetDutyCycle, 1.0));
    rig.exchange(&command(Opcode::Start));
    rig.run_ms(300);

    rig.oven.probe.set_open(true);
    rig.run_ms(500);
    assert!(!rig.oven.pin.is_high());
    assert_eq!(rig.svc.control().state(), ControlState::Idle);
    assert!(rig.svc.safety().has_fault(SafetyFault::ThermocoupleOpen));
    assert_eq!(
        rig.oven.hw.thermocouple().last_error(),
        Some(SensorError::OpenCircuit)
    );
    assert!(!rig.oven.hw.heater().is_enabled());
}

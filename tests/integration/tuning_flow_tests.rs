//! Auto-tune runs against the simulated thermal plant.

use reflow::app::events::AppEvent;
use reflow::control::state::{ControlState, TuningPhase};
use reflow::rpc::protocol::{Opcode, PROTOCOL_VERSION};

use crate::mock_hw::{Frame, Rig, command, telemetry_request};

const HOUR_MS: u32 = 60 * 60_000;

/// Consecutive distinct `(state, phase)` pairs seen in telemetry.
fn phase_trace(frames: &[Frame]) -> Vec<(u8, u8)> {
    let mut trace: Vec<(u8, u8)> = Vec::new();
    for frame in frames {
        if let Frame::Telemetry { bits, .. } = frame {
            let entry = (bits.state, bits.phase);
            if trace.last() != Some(&entry) {
                trace.push(entry);
            }
        }
    }
    trace
}

#[test]
fn tune_all_walks_every_phase_then_idles() {
    let mut rig = Rig::with_plant(25.0);
    rig.exchange(&command(Opcode::Enable));

    let bits = rig.status_after(&command(Opcode::TuneAll));
    assert_eq!((bits.state, bits.phase), (2, 1));
    rig.exchange(&telemetry_request(1_000));

    let finished = rig.run_until(HOUR_MS, |r| {
        r.svc.control().state() == ControlState::Idle
    });
    assert!(finished, "tuning did not finish");
    rig.run_ms(2_000);

    let frames = rig.link.take_frames();
    assert_eq!(phase_trace(&frames), vec![(2, 1), (2, 2), (2, 3), (0, 0)]);

    let completions: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::TuningPhaseComplete { phase, next } => Some((*phase, *next)),
            _ => None,
        })
        .collect();
    assert_eq!(
        completions,
        vec![
            (TuningPhase::SteadyState, Some(TuningPhase::Velocity)),
            (TuningPhase::Velocity, Some(TuningPhase::Inertia)),
            (TuningPhase::Inertia, None),
        ]
    );

    // Tuning leaves the interlock alone and the oven never tripped.
    assert!(rig.svc.control().heating_enabled());
    assert!(
        !rig.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::FaultDetected(_)))
    );
    assert!(!rig.oven.pin.is_high());
}

#[test]
fn tune_all_measures_the_plant_and_installs_gains() {
    let mut rig = Rig::with_plant(25.0);
    rig.exchange(&command(Opcode::Enable));
    rig.exchange(&command(Opcode::TuneAll));
    assert!(rig.run_until(HOUR_MS, |r| {
        r.svc.control().state() == ControlState::Idle
    }));

    let report = *rig.svc.engine().report();
    let gain = report.steady_gain().unwrap();
    // Steady state at 30 % settles about 120 °C above ambient.
    assert!((3.0..5.0).contains(&gain), "steady gain {gain}");
    assert!(report.velocity_c_per_s.unwrap() > 0.5);
    assert!(report.overshoot_c.unwrap() > 0.0);
    assert!(report.lag_s.unwrap() > 0.0);

    let installed = rig.sink.events.iter().find_map(|e| match e {
        AppEvent::GainsUpdated(g) => Some(*g),
        _ => None,
    });
    let installed = installed.expect("derived gains were installed");
    assert_eq!(rig.svc.engine().gains(), installed);
    assert!(installed.kp > 0.0 && installed.ki > 0.0 && installed.kd > 0.0);

    let frames = rig.exchange(&command(Opcode::Info));
    let [Frame::Info { version, fields }] = frames.as_slice() else {
        panic!("expected an info frame, got {frames:?}");
    };
    assert_eq!(*version, PROTOCOL_VERSION);
    assert_eq!(fields[2], installed.kp);
    assert_eq!(fields[3], installed.ki);
    assert_eq!(fields[4], installed.kd);
    assert_eq!(fields[5], gain);
}

#[test]
fn single_phase_request_returns_idle_after_that_phase() {
    let mut rig = Rig::with_plant(25.0);
    rig.exchange(&command(Opcode::Enable));

    let bits = rig.status_after(&command(Opcode::TuneVelocity));
    assert_eq!((bits.state, bits.phase), (2, 2));
    assert!(rig.run_until(HOUR_MS, |r| {
        r.svc.control().state() == ControlState::Idle
    }));

    assert!(rig.sink.events.contains(&AppEvent::TuningPhaseComplete {
        phase: TuningPhase::Velocity,
        next: None,
    }));
    // One phase alone cannot derive gains.
    assert!(
        !rig.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::GainsUpdated(_)))
    );
    assert!(rig.svc.engine().report().velocity_c_per_s.is_some());
}

#[test]
fn idle_aborts_tuning_and_a_new_request_restarts_it() {
    let mut rig = Rig::with_plant(25.0);
    rig.exchange(&command(Opcode::Enable));
    rig.exchange(&command(Opcode::TuneAll));
    rig.run_ms(30_000);
    let warmed = rig.oven.plant.as_ref().map_or(0.0, |p| p.air_c);
    assert!(warmed > 25.0);

    let bits = rig.status_after(&command(Opcode::Idle));
    assert_eq!((bits.state, bits.phase), (0, 0));
    assert!(bits.enabled);
    rig.run_ms(1_000);
    assert!(!rig.oven.pin.is_high());

    let bits = rig.status_after(&command(Opcode::TuneInertia));
    assert_eq!((bits.state, bits.phase), (2, 3));
    assert!(rig.run_until(1_000, |r| r.oven.pin.is_high()));
}

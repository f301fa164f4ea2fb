//! Solid-state-relay heater driver.
//!
//! Non-blocking software PWM: a fractional duty cycle becomes a
//! time-proportioned digital output over a fixed cycle period. Relays
//! switch slowly, so the period is long (200 ms) and the output is only
//! toggled from the scheduler tick, never from a timer interrupt.
//!
//! ```text
//!   duty 0.5, period 200 ms
//!   ┌─────────┐         ┌─────────┐
//!   │   ON    │   OFF   │   ON    │   OFF
//!   0       100       200       300       400 ms
//! ```
//!
//! ## Safety contract
//!
//! `disable()` de-asserts the line immediately, mid-cycle. While disabled
//! every `update()` drives the line low and skips cycle bookkeeping.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::HeaterPort;
use crate::control::state::clamp_duty;

pub struct DutyCycleDriver<P: OutputPin> {
    pin: P,
    period_ms: u32,
    enabled: bool,
    cycle_start_ms: Option<u32>,
    asserted: bool,
}

impl<P: OutputPin> DutyCycleDriver<P> {
    pub fn new(pin: P, period_ms: u32) -> Self {
        Self {
            pin,
            period_ms: period_ms.max(1),
            enabled: false,
            cycle_start_ms: None,
            asserted: false,
        }
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Give the pin back, e.g. to inspect a mock in tests.
    pub fn release(self) -> P {
        self.pin
    }

    fn drive(&mut self, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.asserted = on,
            Err(e) => warn!("HEATER: pin write failed: {:?}", e),
        }
    }
}

impl<P: OutputPin> HeaterPort for DutyCycleDriver<P> {
    fn begin(&mut self) {
        self.enabled = false;
        self.cycle_start_ms = None;
        self.drive(false);
    }

    fn enable(&mut self) {
        if !self.enabled {
            self.enabled = true;
            self.cycle_start_ms = None;
        }
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.cycle_start_ms = None;
        self.drive(false);
    }

    fn update(&mut self, duty_cycle: f32, now_ms: u32) {
        if !self.enabled {
            self.drive(false);
            return;
        }

        let start = *self.cycle_start_ms.get_or_insert(now_ms);
        let mut elapsed = now_ms.wrapping_sub(start);
        if elapsed >= self.period_ms {
            self.cycle_start_ms = Some(now_ms);
            elapsed = 0;
        }

        let on_time = clamp_duty(duty_cycle) * self.period_ms as f32;
        self.drive((elapsed as f32) < on_time);
    }

    fn is_on(&self) -> bool {
        self.asserted
    }
}

//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the thermocouple front end and the heater driver, exposing them
//! through [`ThermocouplePort`] and [`HeaterPort`] as a single value so the
//! service can take both without a double mutable borrow.

use crate::app::ports::{HeaterPort, ThermocouplePort};

/// Concrete adapter that combines the oven's sensor and actuator.
pub struct OvenHardware<TC, H> {
    thermocouple: TC,
    heater: H,
}

impl<TC: ThermocouplePort, H: HeaterPort> OvenHardware<TC, H> {
    pub fn new(thermocouple: TC, heater: H) -> Self {
        Self {
            thermocouple,
            heater,
        }
    }

    pub fn thermocouple(&self) -> &TC {
        &self.thermocouple
    }

    pub fn heater(&self) -> &H {
        &self.heater
    }
}

// ── ThermocouplePort implementation ───────────────────────────

impl<TC: ThermocouplePort, H> ThermocouplePort for OvenHardware<TC, H> {
    fn read(&mut self) -> bool {
        self.thermocouple.read()
    }

    fn temperature(&self) -> f32 {
        self.thermocouple.temperature()
    }

    fn is_open(&self) -> bool {
        self.thermocouple.is_open()
    }
}

// ── HeaterPort implementation ─────────────────────────────────

impl<TC, H: HeaterPort> HeaterPort for OvenHardware<TC, H> {
    fn begin(&mut self) {
        self.heater.begin();
    }

    fn enable(&mut self) {
        self.heater.enable();
    }

    fn disable(&mut self) {
        self.heater.disable();
    }

    fn update(&mut self, duty_cycle: f32, now_ms: u32) {
        self.heater.update(duty_cycle, now_ms);
    }

    fn is_on(&self) -> bool {
        self.heater.is_on()
    }
}

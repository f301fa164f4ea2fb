//! Temperature acquisition.
//!
//! The [`TemperatureSampler`] owns the last good [`Sample`] and decides
//! when the thermocouple may be read again. Everything downstream reads
//! the sample; nothing else touches the converter.

pub mod max6675;

use crate::app::ports::ThermocouplePort;

pub use max6675::Max6675;

/// Last acquired process variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub celsius: f32,
    pub at_ms: u32,
}

/// Rate-limited thermocouple poller.
pub struct TemperatureSampler {
    interval_ms: u32,
    /// Time of the last read attempt, successful or not.
    last_attempt_ms: Option<u32>,
    /// First poll; the stall clock runs from here until a sample lands.
    first_poll_ms: Option<u32>,
    sample: Option<Sample>,
    open: bool,
}

impl TemperatureSampler {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_attempt_ms: None,
            first_poll_ms: None,
            sample: None,
            open: false,
        }
    }

    /// Read the thermocouple if the minimum interval has elapsed.
    /// Returns the new sample when one was latched this call.
    pub fn poll<T: ThermocouplePort>(&mut self, tc: &mut T, now_ms: u32) -> Option<Sample> {
        self.first_poll_ms.get_or_insert(now_ms);
        if let Some(last) = self.last_attempt_ms {
            if now_ms.wrapping_sub(last) < self.interval_ms {
                return None;
            }
        }
        self.last_attempt_ms = Some(now_ms);

        let ready = tc.read();
        self.open = tc.is_open();
        let celsius = tc.temperature();
        if !ready || !celsius.is_finite() {
            return None;
        }
        let sample = Sample {
            celsius,
            at_ms: now_ms,
        };
        self.sample = Some(sample);
        Some(sample)
    }

    pub fn latest(&self) -> Option<Sample> {
        self.sample
    }

    /// Latest temperature, or NaN before the first sample.
    pub fn celsius(&self) -> f32 {
        self.sample.map_or(f32::NAN, |s| s.celsius)
    }

    /// Milliseconds since the last good sample (or since the first poll if
    /// none has landed yet).
    pub fn ms_since_good(&self, now_ms: u32) -> u32 {
        match (self.sample, self.first_poll_ms) {
            (Some(s), _) => now_ms.wrapping_sub(s.at_ms),
            (None, Some(first)) => now_ms.wrapping_sub(first),
            (None, None) => 0,
        }
    }

    /// The converter reported an open probe on its last read.
    pub fn thermocouple_open(&self) -> bool {
        self.open
    }
}

//! Periodic telemetry push.
//!
//! The `StreamManager` tracks the host's subscription and says when the
//! next telemetry frame is due. Frames the transport refuses are counted
//! and dropped, never queued.

use super::protocol::MIN_TELEMETRY_INTERVAL_MS;

/// Stream subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Not subscribed. No frames are sent.
    Inactive,
    /// Actively streaming at the configured interval.
    Active { interval_ms: u32 },
}

/// Manages the telemetry subscription.
pub struct StreamManager {
    state: StreamState,
    last_sent_ms: Option<u32>,
    /// Number of frames dropped due to backpressure.
    dropped_count: u32,
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamManager {
    pub fn new() -> Self {
        Self {
            state: StreamState::Inactive,
            last_sent_ms: None,
            dropped_count: 0,
        }
    }

    /// Subscribe at `interval_ms`, or unsubscribe when it is 0.
    pub fn set_interval(&mut self, interval_ms: u16) {
        if interval_ms == 0 {
            self.unsubscribe();
        } else {
            self.subscribe(interval_ms);
        }
    }

    /// Subscribe to telemetry streaming.
    pub fn subscribe(&mut self, interval_ms: u16) {
        self.state = StreamState::Active {
            interval_ms: u32::from(interval_ms.max(MIN_TELEMETRY_INTERVAL_MS)),
        };
        self.last_sent_ms = None;
    }

    /// Unsubscribe from telemetry streaming.
    pub fn unsubscribe(&mut self) {
        self.state = StreamState::Inactive;
    }

    /// Returns `true` if a frame should be sent now.
    pub fn due(&mut self, now_ms: u32) -> bool {
        let StreamState::Active { interval_ms } = self.state else {
            return false;
        };
        match self.last_sent_ms {
            Some(last) if now_ms.wrapping_sub(last) < interval_ms => false,
            _ => {
                self.last_sent_ms = Some(now_ms);
                true
            }
        }
    }

    /// Record a dropped frame (transport couldn't keep up).
    pub fn record_drop(&mut self) {
        self.dropped_count = self.dropped_count.wrapping_add(1);
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn dropped_count(&self) -> u32 {
        self.dropped_count
    }
}

//! Time sources for the acquisition loop
//!
//! Timestamps are plain `f64` seconds. The estimation chain only ever uses
//! differences between them, so any origin works:
//! - System clock (wall time, what gets written to the CSV)
//! - Monotonic clock (seconds since the session started)
//! - Fixed time (tests and replays)

/// Timestamp in seconds (since the Unix epoch, or since an arbitrary origin
/// for monotonic sources)
pub type Timestamp = f64;

/// Source of time for a session
pub trait TimeSource {
    /// Current timestamp in seconds
    fn now(&self) -> Timestamp;

    /// Whether timestamps are wall-clock (vs. relative to some origin)
    fn is_wall_clock(&self) -> bool;
}

/// Wall-clock time source (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "std")]
impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Monotonic time source, zero when created (requires std)
///
/// Immune to NTP steps, which would otherwise trip the window's
/// strictly-increasing timestamp check.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    /// Start a clock at zero
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_secs_f64()
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Fixed time source for testing
#[derive(Debug, Clone, Copy)]
pub struct FixedTime {
    timestamp: Timestamp,
}

impl FixedTime {
    /// Clock frozen at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Jump to `timestamp`
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Move forward by `seconds`
    pub fn advance(&mut self, seconds: f64) {
        self.timestamp += seconds;
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

//! Rolling Sample Window
//!
//! ## Overview
//!
//! The regression only ever looks at the last N samples. `SampleBuffer`
//! keeps exactly those, in arrival order, and drops the oldest when a new
//! one arrives on a full window (FIFO, ring-buffer semantics).
//!
//! Storage is a `heapless::Deque` sized for [`MAX_WINDOW_SIZE`]; the
//! configured capacity `N` (3 ≤ N ≤ 64) is a runtime limit inside it, so the
//! window never allocates after construction.
//!
//! ## Acceptance Rules
//!
//! A push is refused, leaving the window untouched, when:
//! - the reading fails [`Sample::from_raw`] validation (see
//!   [`validators`](crate::validators)), or
//! - its timestamp is not strictly after the newest sample already held.
//!
//! Refusals are logged at `warn` and returned as
//! [`PushOutcome::Rejected`]. They are never errors of the session.
//!
//! ## Snapshots
//!
//! Estimation runs on a [`WindowSnapshot`], an owned copy with times
//! re-expressed as seconds since the oldest sample. Taking one is the only
//! thing that has to happen while the window is shared; everything after it
//! can run without the lock.
//!
//! ```text
//! window (N = 4, full):   t=100 t=101 t=102.1 t=103
//! push(t=104)           →       t=101 t=102.1 t=103 t=104   evicted: t=100
//! snapshot().elapsed_s  →       [0.0, 1.1, 2.0, 3.0]        t0 = 101
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use leafflux_core::{RawSample, SampleBuffer, SampleLimits};
//!
//! let limits = SampleLimits::default();
//! let mut window = SampleBuffer::new(3)?;
//!
//! for (i, ppm) in [400.0, 402.0, 404.0, 406.0].iter().enumerate() {
//!     let raw = RawSample { co2_ppm: *ppm, temperature_c: 25.0, humidity_pct: 0.0 };
//!     window.offer(i as f64, raw, &limits);
//! }
//!
//! let snap = window.snapshot();
//! assert_eq!(snap.co2_ppm, vec![402.0, 404.0, 406.0]);
//! assert_eq!(snap.elapsed_s, vec![0.0, 1.0, 2.0]);
//! # Ok::<(), leafflux_core::ConfigError>(())
//! ```

use alloc::vec::Vec;

use heapless::Deque;

use crate::config::SampleLimits;
use crate::constants::buffers::{MAX_WINDOW_SIZE, MIN_WINDOW_SIZE};
use crate::errors::{ConfigError, ValidationError};
use crate::time::Timestamp;
use crate::validators::{RawSample, Sample};

/// What happened to a pushed sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PushOutcome {
    /// Sample entered the window, possibly displacing the oldest one
    Accepted {
        /// Sample dropped off the left end, if the window was full
        evicted: Option<Sample>,
    },
    /// Sample refused; the window is unchanged
    Rejected(ValidationError),
}

impl PushOutcome {
    /// Whether the sample made it into the window
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Fixed-capacity rolling window of validated samples
///
/// ## Internal Invariants
///
/// - `samples.len() <= capacity <= MAX_WINDOW_SIZE`
/// - timestamps strictly increase from front to back
///
/// ## Thread Safety
///
/// Not synchronized. The acquisition runtime keeps it inside the session
/// mutex and hands snapshots to the estimator.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Deque<Sample, MAX_WINDOW_SIZE>,
    capacity: usize,
}

impl SampleBuffer {
    /// Create an empty window holding at most `capacity` samples
    ///
    /// Fails when `capacity` is outside `MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE`.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&capacity) {
            return Err(ConfigError::WindowSizeOutOfRange {
                size: capacity,
                min: MIN_WINDOW_SIZE,
                max: MAX_WINDOW_SIZE,
            });
        }
        Ok(Self {
            samples: Deque::new(),
            capacity,
        })
    }

    /// Validate a raw reading and push it
    pub fn offer(
        &mut self,
        timestamp: Timestamp,
        raw: RawSample,
        limits: &SampleLimits,
    ) -> PushOutcome {
        match Sample::from_raw(timestamp, raw, limits) {
            Ok(sample) => self.push(sample),
            Err(err) => {
                log_warn!("dropping reading at t={}: {}", timestamp, err);
                PushOutcome::Rejected(err)
            }
        }
    }

    /// Append a validated sample, evicting the oldest when full
    pub fn push(&mut self, sample: Sample) -> PushOutcome {
        if let Some(newest) = self.samples.back() {
            if sample.timestamp() <= newest.timestamp() {
                let err = ValidationError::NonIncreasingTimestamp {
                    previous: newest.timestamp(),
                    received: sample.timestamp(),
                };
                log_warn!("dropping reading: {}", err);
                return PushOutcome::Rejected(err);
            }
        }

        let evicted = if self.samples.len() >= self.capacity {
            self.samples.pop_front()
        } else {
            None
        };

        // Cannot fail: capacity <= MAX_WINDOW_SIZE and we just made room
        if self.samples.push_back(sample).is_err() {
            return PushOutcome::Rejected(ValidationError::InvalidValue { field: "window" });
        }

        PushOutcome::Accepted { evicted }
    }

    /// Samples currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether the window holds `capacity` samples
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Newest sample, if any
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Iterate oldest → newest
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Drop every sample, keeping the capacity
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Owned, ordered copy of the window for estimation
    pub fn snapshot(&self) -> WindowSnapshot {
        let t0 = self.samples.front().map(Sample::timestamp).unwrap_or(0.0);
        let n = self.samples.len();

        let mut elapsed_s = Vec::with_capacity(n);
        let mut co2_ppm = Vec::with_capacity(n);
        let mut temperature_c = Vec::with_capacity(n);
        let mut humidity_pct = Vec::with_capacity(n);

        for sample in self.samples.iter() {
            elapsed_s.push(sample.timestamp() - t0);
            co2_ppm.push(sample.co2_ppm());
            temperature_c.push(sample.temperature_c());
            humidity_pct.push(sample.humidity_pct());
        }

        WindowSnapshot {
            t0,
            elapsed_s,
            co2_ppm,
            temperature_c,
            humidity_pct,
            capacity: self.capacity,
        }
    }
}

/// Immutable copy of a window, times relative to the oldest sample
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    /// Absolute timestamp of the oldest sample (s)
    pub t0: Timestamp,
    /// `t_i - t0` for each sample (s)
    pub elapsed_s: Vec<f64>,
    /// Wet CO₂ (ppm)
    pub co2_ppm: Vec<f64>,
    /// Temperature (°C)
    pub temperature_c: Vec<f64>,
    /// Relative humidity (%)
    pub humidity_pct: Vec<f64>,
    /// Capacity of the window the snapshot came from
    pub capacity: usize,
}

impl WindowSnapshot {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.elapsed_s.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.elapsed_s.is_empty()
    }

    /// Whether the source window was at capacity
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Absolute timestamp of the newest sample
    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        self.elapsed_s.last().map(|dt| self.t0 + dt)
    }

    /// Temperature of the newest sample (°C)
    pub fn latest_temperature_c(&self) -> Option<f64> {
        self.temperature_c.last().copied()
    }

    /// Humidity of the newest sample (%)
    pub fn latest_humidity_pct(&self) -> Option<f64> {
        self.humidity_pct.last().copied()
    }

    /// Wet CO₂ of the newest sample (ppm)
    pub fn latest_co2_ppm(&self) -> Option<f64> {
        self.co2_ppm.last().copied()
    }
}

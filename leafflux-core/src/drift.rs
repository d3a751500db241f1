//! Zero-Run Drift Tracking
//!
//! ## Overview
//!
//! Before a leaf goes in, the sealed empty chamber is logged for a while.
//! Any CO₂ trend seen then comes from the sensor or from leaks, not from a
//! plant, and is subtracted from every later leaf slope.
//!
//! ## State Machine
//!
//! ```text
//!            start()                       target reached, enough samples,
//!   Idle ─────────────► Running ─────────► |slope| ≤ threshold ──► Idle (baseline accepted)
//!    ▲                   │   ▲
//!    │   cancel()        │   │ too few samples, or |slope| > threshold:
//!    └───────────────────┘   └─ target += extension, keep collecting
//! ```
//!
//! - Elapsed time is measured from the first sample of the run, so a run
//!   started between sensor refreshes is not shortened.
//! - A rejected (anomalous) run resets the baseline to 0.0 and keeps its
//!   samples; the extension gives the chamber time to settle.
//! - `start()` while running is refused and leaves the collected samples
//!   alone.
//!
//! ## Correction
//!
//! `corrected = raw − baseline.slope`, subtraction only. An unaccepted
//! baseline has slope 0.0, so correction is always safe to apply.

use alloc::vec::Vec;

use crate::errors::CommandError;
use crate::regression::SlopeEstimator;
use crate::time::Timestamp;

/// Drift slope measured on an empty chamber
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriftBaseline {
    /// Drift (ppm/s)
    pub slope: f64,
    /// Whether a zero run completed and passed the anomaly check
    pub accepted: bool,
    /// When the run was accepted
    pub collected_at: Option<Timestamp>,
}

impl Default for DriftBaseline {
    fn default() -> Self {
        Self {
            slope: 0.0,
            accepted: false,
            collected_at: None,
        }
    }
}

impl DriftBaseline {
    /// Remove the drift from a leaf slope (ppm/s)
    #[inline]
    pub fn correct(&self, raw_slope: f64) -> f64 {
        raw_slope - self.slope
    }
}

/// Why a zero run was extended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtensionReason {
    /// Fewer samples than a regression window
    InsufficientData {
        /// Samples collected so far
        collected: usize,
        /// Samples required
        required: usize,
    },
    /// Drift larger than an empty chamber should show
    AnomalousSlope {
        /// Fitted slope (ppm/s)
        slope: f64,
    },
}

impl core::fmt::Display for ExtensionReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InsufficientData {
                collected,
                required,
            } => write!(f, "insufficient data ({}/{} samples)", collected, required),
            Self::AnomalousSlope { slope } => {
                write!(f, "anomalous drift slope {:+.4} ppm/s", slope)
            }
        }
    }
}

/// Result of feeding one sample to the tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftProgress {
    /// No run active, or the sample was out of order
    Ignored,
    /// Still inside the target duration
    Collecting {
        /// Seconds since the first run sample
        elapsed_s: f64,
        /// Current target (s)
        target_s: f64,
        /// Samples collected
        collected: usize,
    },
    /// Target reached but the run could not be accepted yet
    Extended {
        /// What went wrong
        reason: ExtensionReason,
        /// New target (s)
        target_s: f64,
    },
    /// Run complete, new baseline in effect
    Accepted(DriftBaseline),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Idle,
    Running { requested_at: Timestamp, target_s: f64 },
}

/// Zero-run calibration state machine
#[derive(Debug, Clone)]
pub struct ZeroDriftTracker {
    duration_s: f64,
    extension_s: f64,
    threshold_ppm_s: f64,
    min_samples: usize,
    state: State,
    times: Vec<Timestamp>,
    ppm: Vec<f64>,
    baseline: DriftBaseline,
}

impl ZeroDriftTracker {
    /// Tracker that runs for at least `duration_s`, extends by
    /// `extension_s`, rejects `|slope| > threshold_ppm_s`, and needs
    /// `min_samples` samples before fitting
    pub fn new(duration_s: f64, extension_s: f64, threshold_ppm_s: f64, min_samples: usize) -> Self {
        Self {
            duration_s,
            extension_s,
            threshold_ppm_s,
            min_samples: min_samples.max(3),
            state: State::Idle,
            times: Vec::new(),
            ppm: Vec::new(),
            baseline: DriftBaseline::default(),
        }
    }

    /// Whether a zero run is active
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Current baseline
    pub fn baseline(&self) -> DriftBaseline {
        self.baseline
    }

    /// Samples collected in the active run
    pub fn collected(&self) -> usize {
        self.ppm.len()
    }

    /// Target duration of the active run (s)
    pub fn target_s(&self) -> Option<f64> {
        match self.state {
            State::Running { target_s, .. } => Some(target_s),
            State::Idle => None,
        }
    }

    /// When the active run was requested
    pub fn requested_at(&self) -> Option<Timestamp> {
        match self.state {
            State::Running { requested_at, .. } => Some(requested_at),
            State::Idle => None,
        }
    }

    /// Seconds since the first sample of the active run
    pub fn elapsed_s(&self) -> Option<f64> {
        match (self.times.first(), self.times.last()) {
            (Some(first), Some(last)) if self.is_running() => Some(last - first),
            _ => None,
        }
    }

    /// Begin a zero run
    ///
    /// Refused while a run is active; the collected samples are kept.
    pub fn start(&mut self, now: Timestamp) -> Result<(), CommandError> {
        if self.is_running() {
            return Err(CommandError::ZeroRunInProgress);
        }
        self.times.clear();
        self.ppm.clear();
        self.state = State::Running {
            requested_at: now,
            target_s: self.duration_s,
        };
        log_info!("zero run started, target {} s", self.duration_s);
        Ok(())
    }

    /// Abort the active run, keeping the previous baseline
    ///
    /// Returns whether a run was active.
    pub fn cancel(&mut self) -> bool {
        let was_running = self.is_running();
        self.state = State::Idle;
        self.times.clear();
        self.ppm.clear();
        was_running
    }

    /// Forget the baseline
    pub fn reset(&mut self) {
        self.baseline = DriftBaseline::default();
    }

    /// Remove the drift from a leaf slope (ppm/s)
    #[inline]
    pub fn correct(&self, raw_slope: f64) -> f64 {
        self.baseline.correct(raw_slope)
    }

    /// Feed one sample (ppm, dry-corrected if enabled) taken at `timestamp`
    pub fn record(&mut self, timestamp: Timestamp, ppm: f64) -> DriftProgress {
        let State::Running { target_s, .. } = self.state else {
            return DriftProgress::Ignored;
        };
        if !timestamp.is_finite() || !ppm.is_finite() {
            return DriftProgress::Ignored;
        }
        if let Some(&last) = self.times.last() {
            if timestamp <= last {
                log_warn!("zero run: out-of-order sample at t={}", timestamp);
                return DriftProgress::Ignored;
            }
        }

        self.times.push(timestamp);
        self.ppm.push(ppm);

        let elapsed_s = timestamp - self.times[0];
        if elapsed_s < target_s {
            return DriftProgress::Collecting {
                elapsed_s,
                target_s,
                collected: self.ppm.len(),
            };
        }

        if self.ppm.len() < self.min_samples {
            let reason = ExtensionReason::InsufficientData {
                collected: self.ppm.len(),
                required: self.min_samples,
            };
            return self.extend(target_s, reason);
        }

        let t0 = self.times[0];
        let elapsed: Vec<f64> = self.times.iter().map(|t| t - t0).collect();
        let fit = match SlopeEstimator::ordinary().fit(&elapsed, &self.ppm) {
            Ok(fit) => fit,
            Err(err) => {
                log_warn!("zero run fit failed: {}", err);
                let reason = ExtensionReason::InsufficientData {
                    collected: self.ppm.len(),
                    required: self.min_samples,
                };
                return self.extend(target_s, reason);
            }
        };

        if fit.slope.abs() > self.threshold_ppm_s {
            log_warn!(
                "zero run slope {:.4} ppm/s exceeds {:.4} ppm/s, extending",
                fit.slope,
                self.threshold_ppm_s
            );
            self.baseline = DriftBaseline::default();
            return self.extend(target_s, ExtensionReason::AnomalousSlope { slope: fit.slope });
        }

        self.baseline = DriftBaseline {
            slope: fit.slope,
            accepted: true,
            collected_at: Some(timestamp),
        };
        self.state = State::Idle;
        self.times.clear();
        self.ppm.clear();
        log_info!("zero run complete, baseline {:.4} ppm/s", fit.slope);

        DriftProgress::Accepted(self.baseline)
    }

    fn extend(&mut self, target_s: f64, reason: ExtensionReason) -> DriftProgress {
        let target_s = target_s + self.extension_s;
        if let State::Running { requested_at, .. } = self.state {
            self.state = State::Running {
                requested_at,
                target_s,
            };
        }
        log_debug!("zero run extended to {} s: {:?}", target_s, reason);
        DriftProgress::Extended { reason, target_s }
    }
}

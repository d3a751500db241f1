//! Time-Related Constants
//!
//! Durations for the zero-run calibration and unit conversions used when
//! presenting elapsed times.

// ===== TIME UNIT CONVERSIONS =====

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: f64 = 60.0;

// ===== ZERO RUN =====

/// Default zero-run (empty chamber) duration (s).
pub const DEFAULT_ZERO_RUN_DURATION_S: f64 = 30.0;

/// Extension added when a zero run has too few samples or an anomalous
/// slope (s).
///
/// Roughly one SCD4x refresh, so each retry sees at least one new sample.
pub const DEFAULT_ZERO_RUN_EXTENSION_S: f64 = 6.0;

//! Estimation Parameters
//!
//! Defaults for the conditioning cascade, the confidence interval and the
//! zero-run acceptance test. Every value here is exposed through
//! `Configuration`; these are only the starting points.

// ===== CONFIDENCE =====

/// Two-sided 95% normal quantile.
///
/// Normal-theory interval on a small-sample fit: fine for live guidance,
/// not for publication-grade inference.
pub const DEFAULT_CONFIDENCE_Z: f64 = 1.96;

// ===== ZERO RUN =====

/// Zero-run slopes above this magnitude are treated as anomalous (ppm/s).
///
/// An empty, sealed chamber should drift far less than this; larger slopes
/// point at a leak or a sensor still warming up.
pub const DEFAULT_ANOMALOUS_ZERO_SLOPE_PPM_S: f64 = 0.05;

// ===== MEDIAN FILTER =====

/// Median filter kernel (samples, odd).
pub const DEFAULT_MEDIAN_KERNEL: usize = 5;

// ===== SAVITZKY–GOLAY =====

/// Smoothing window length (samples, odd).
pub const DEFAULT_SAVGOL_WINDOW: usize = 19;

/// Smoothing polynomial order.
pub const DEFAULT_SAVGOL_ORDER: usize = 2;

// ===== BUTTERWORTH LOW-PASS =====

/// Low-pass cutoff (Hz).
pub const DEFAULT_LOW_PASS_CUTOFF_HZ: f64 = 0.1;

/// Low-pass filter order.
pub const DEFAULT_LOW_PASS_ORDER: usize = 5;

// ===== ROBUST FIT =====

/// Iteration cap for the IRLS loop.
pub const IRLS_MAX_ITERATIONS: usize = 50;

/// Relative coefficient change below which IRLS is considered converged.
pub const IRLS_TOLERANCE: f64 = 1e-8;

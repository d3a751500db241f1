//! Buffer Sizes and Window Limits
//!
//! The sample window is stored inline (no heap), so its upper bound is a
//! compile-time constant. The configured window size is checked against it
//! before a session starts.

// ===== SAMPLE WINDOW =====

/// Hard upper bound on the regression window (samples).
///
/// Sized for the longest windows used on the bench (41 samples for soil
/// respiration runs) with headroom for the 19-point smoothing filter.
/// - 64 samples × 32 bytes/sample = 2 KB inline
pub const MAX_WINDOW_SIZE: usize = 64;

/// Smallest window a slope can be fitted on.
///
/// Two points always give a perfect line with no residual degrees of
/// freedom, so the standard error is undefined below three.
pub const MIN_WINDOW_SIZE: usize = 3;

/// Default regression window (samples).
///
/// Twelve SCD4x refreshes ≈ one minute of chamber closure.
pub const DEFAULT_WINDOW_SIZE: usize = 12;

// ===== LIVE SERIES =====

/// Default live-plot horizon (s).
///
/// 20 minutes of A_net history; older points are evicted.
pub const DEFAULT_PLOT_WINDOW_S: f64 = 1200.0;

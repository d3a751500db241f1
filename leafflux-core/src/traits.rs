//! Core traits for the estimation chain
//!
//! Two seams:
//! - [`ConditioningStage`]: one filter in the CO₂ conditioning cascade
//! - [`Timestamped`]: anything a [`LiveSeries`](crate::LiveSeries) can
//!   window by time

use alloc::vec::Vec;

use crate::time::Timestamp;

/// One stage of the signal conditioning cascade
///
/// Stages are pure functions of a window: `times` are elapsed seconds
/// (strictly increasing), `values` the CO₂ sequence of the same length. The
/// output must have the same length as the input.
///
/// ## Implementation Guidelines
///
/// 1. **Never fail**: a stage that cannot run on this input (too short,
///    cutoff out of range) returns the input unchanged
/// 2. **No state between calls**: windows overlap, so carrying filter
///    state across calls would count samples twice
/// 3. **Report `min_len`**: the conditioner logs when a stage is skipped
///
/// ## Example: Offset Stage
///
/// ```rust
/// use leafflux_core::traits::ConditioningStage;
///
/// struct Offset(f64);
///
/// impl ConditioningStage for Offset {
///     fn name(&self) -> &'static str {
///         "offset"
///     }
///
///     fn min_len(&self) -> usize {
///         1
///     }
///
///     fn apply(&self, _times: &[f64], values: &[f64]) -> Vec<f64> {
///         values.iter().map(|v| v + self.0).collect()
///     }
/// }
///
/// let shifted = Offset(2.0).apply(&[0.0, 1.0], &[400.0, 401.0]);
/// assert_eq!(shifted, vec![402.0, 403.0]);
/// ```
pub trait ConditioningStage: Send + Sync {
    /// Short identifier used in log lines
    fn name(&self) -> &'static str;

    /// Fewest samples this stage can work on
    fn min_len(&self) -> usize;

    /// Filter `values` sampled at `times`
    fn apply(&self, times: &[f64], values: &[f64]) -> Vec<f64>;
}

/// Entry that carries its own timestamp
pub trait Timestamped {
    /// When this entry was produced
    fn timestamp(&self) -> Timestamp;
}

//! Relative humidity handling
//!
//! Capacitive RH sensors drift slightly below 0% when very dry and above
//! 100% near condensation. The reading is still useful for the dry-air
//! correction, so it is clamped into range rather than rejected. Only
//! non-finite readings are dropped.

use super::utils;
use crate::config::SampleLimits;
use crate::errors::ValidationResult;

/// Clamp a humidity reading (%) into the configured range
pub fn clamp_humidity(percent: f64, limits: &SampleLimits) -> ValidationResult<f64> {
    let percent = utils::check_finite("humidity_pct", percent)?;
    Ok(percent.clamp(limits.humidity_min_pct, limits.humidity_max_pct))
}

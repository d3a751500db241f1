//! Chamber temperature checks
//!
//! The temperature feeds the ideal-gas conversion directly, so a reading
//! outside the sensor's operating range would silently scale every flux.
//! Such readings are dropped instead.

use super::utils;
use crate::config::SampleLimits;
use crate::errors::ValidationResult;

/// Accept a temperature (°C) inside the configured operating range
pub fn validate_temperature(celsius: f64, limits: &SampleLimits) -> ValidationResult<f64> {
    let celsius = utils::check_finite("temperature_c", celsius)?;
    utils::check_range(
        "temperature_c",
        celsius,
        limits.temperature_min_c,
        limits.temperature_max_c,
    )
}

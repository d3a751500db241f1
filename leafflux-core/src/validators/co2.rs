//! CO₂ concentration checks
//!
//! NDIR and photoacoustic sensors report 0 (or a negative raw count) while
//! warming up and after a bus error. Neither is a concentration a sealed
//! chamber can reach, so both are dropped rather than fitted.

use super::utils;
use crate::errors::{ValidationError, ValidationResult};

/// Accept a CO₂ reading (ppm) if it is finite and strictly positive
pub fn validate_concentration(ppm: f64) -> ValidationResult<f64> {
    let ppm = utils::check_finite("co2_ppm", ppm)?;
    if ppm <= 0.0 {
        return Err(ValidationError::NonPositiveConcentration { value: ppm });
    }
    Ok(ppm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambient_reading_passes() {
        assert_eq!(validate_concentration(415.2), Ok(415.2));
    }

    #[test]
    fn zero_and_negative_rejected() {
        assert!(matches!(
            validate_concentration(0.0),
            Err(ValidationError::NonPositiveConcentration { .. })
        ));
        assert!(validate_concentration(-12.0).is_err());
        assert!(matches!(
            validate_concentration(f64::NAN),
            Err(ValidationError::InvalidValue { field: "co2_ppm" })
        ));
    }
}

//! Shared checks used by the per-field validators
//!
//! Pure functions, no allocation. Each returns the error variant naming the
//! field so the log line says which reading was bad.

use crate::errors::{ValidationError, ValidationResult};

/// Reject NaN and infinities
#[inline]
pub(crate) fn check_finite(field: &'static str, value: f64) -> ValidationResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::InvalidValue { field })
    }
}

/// Reject values outside `[min, max]` (inclusive)
#[inline]
pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> ValidationResult<f64> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive() {
        assert_eq!(check_range("t", 60.0, -40.0, 60.0), Ok(60.0));
        assert_eq!(check_range("t", -40.0, -40.0, 60.0), Ok(-40.0));
        assert!(check_range("t", 60.01, -40.0, 60.0).is_err());
    }

    #[test]
    fn non_finite_names_the_field() {
        assert_eq!(
            check_finite("co2", f64::NAN),
            Err(ValidationError::InvalidValue { field: "co2" })
        );
        assert!(check_finite("co2", f64::INFINITY).is_err());
    }
}

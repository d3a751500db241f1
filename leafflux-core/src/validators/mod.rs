//! Sample Validation
//!
//! ## Overview
//!
//! A [`RawSample`] is whatever the sensor collaborator returned. A
//! [`Sample`] is a reading that has passed validation and can enter the
//! regression window. The only way to build a `Sample` is
//! [`Sample::from_raw`], so every sample in a window carries the same
//! guarantees:
//!
//! - `co2_ppm` finite and strictly positive
//! - `temperature_c` finite and inside the device range (−40…60 °C default)
//! - `humidity_pct` finite and clamped to 0…100 %
//! - `timestamp` finite
//!
//! Ordering (strictly increasing timestamps) is a property of the window,
//! not of a single sample, and is checked by
//! [`SampleBuffer`](crate::SampleBuffer).
//!
//! ## Why Drop Instead of Repair?
//!
//! A regression over 12 points tolerates a missing point far better than a
//! wrong one. A zero ppm reading fitted into the window would swing the
//! slope by tens of ppm/s; skipping it costs one refresh interval.
//!
//! ## Usage Example
//!
//! ```rust
//! use leafflux_core::{RawSample, Sample, SampleLimits};
//!
//! let raw = RawSample { co2_ppm: 415.0, temperature_c: 23.0, humidity_pct: 103.0 };
//! let sample = Sample::from_raw(12.0, raw, &SampleLimits::default())?;
//!
//! assert_eq!(sample.humidity_pct(), 100.0);
//! # Ok::<(), leafflux_core::ValidationError>(())
//! ```

mod co2;
mod humidity;
mod temperature;
mod utils;

pub use co2::validate_concentration;
pub use humidity::clamp_humidity;
pub use temperature::validate_temperature;

use crate::config::SampleLimits;
use crate::errors::ValidationResult;
use crate::time::Timestamp;
use crate::traits::Timestamped;

/// Unvalidated reading as returned by a sensor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSample {
    /// CO₂ mole fraction (ppm, wet air)
    pub co2_ppm: f64,
    /// Air temperature (°C)
    pub temperature_c: f64,
    /// Relative humidity (%)
    pub humidity_pct: f64,
}

/// Validated, timestamped reading
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sample {
    timestamp: Timestamp,
    co2_ppm: f64,
    temperature_c: f64,
    humidity_pct: f64,
}

impl Sample {
    /// Validate `raw` taken at `timestamp`
    ///
    /// Humidity is clamped; every other violation rejects the sample.
    pub fn from_raw(
        timestamp: Timestamp,
        raw: RawSample,
        limits: &SampleLimits,
    ) -> ValidationResult<Self> {
        let timestamp = utils::check_finite("timestamp", timestamp)?;
        let co2_ppm = validate_concentration(raw.co2_ppm)?;
        let temperature_c = validate_temperature(raw.temperature_c, limits)?;
        let humidity_pct = clamp_humidity(raw.humidity_pct, limits)?;

        Ok(Self {
            timestamp,
            co2_ppm,
            temperature_c,
            humidity_pct,
        })
    }

    /// When the reading was taken (s)
    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// CO₂ mole fraction (ppm, wet air)
    #[inline]
    pub fn co2_ppm(&self) -> f64 {
        self.co2_ppm
    }

    /// Air temperature (°C)
    #[inline]
    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    /// Relative humidity (%), clamped
    #[inline]
    pub fn humidity_pct(&self) -> f64 {
        self.humidity_pct
    }

    /// The reading without its timestamp
    pub fn raw(&self) -> RawSample {
        RawSample {
            co2_ppm: self.co2_ppm,
            temperature_c: self.temperature_c,
            humidity_pct: self.humidity_pct,
        }
    }
}

impl Timestamped for Sample {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationError;

    fn raw(co2: f64, temp: f64, rh: f64) -> RawSample {
        RawSample {
            co2_ppm: co2,
            temperature_c: temp,
            humidity_pct: rh,
        }
    }

    #[test]
    fn valid_reading_is_accepted() {
        let sample = Sample::from_raw(5.0, raw(410.0, 22.0, 48.0), &SampleLimits::default())
            .expect("valid sample");
        assert_eq!(sample.timestamp(), 5.0);
        assert_eq!(sample.co2_ppm(), 410.0);
        assert_eq!(sample.raw(), raw(410.0, 22.0, 48.0));
    }

    #[test]
    fn first_failing_field_is_reported() {
        let limits = SampleLimits::default();
        assert!(matches!(
            Sample::from_raw(0.0, raw(0.0, 99.0, 50.0), &limits),
            Err(ValidationError::NonPositiveConcentration { .. })
        ));
        assert!(matches!(
            Sample::from_raw(0.0, raw(400.0, 99.0, 50.0), &limits),
            Err(ValidationError::OutOfRange { field: "temperature_c", .. })
        ));
        assert!(matches!(
            Sample::from_raw(f64::NAN, raw(400.0, 20.0, 50.0), &limits),
            Err(ValidationError::InvalidValue { field: "timestamp" })
        ));
    }
}

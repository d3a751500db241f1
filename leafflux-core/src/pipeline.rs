//! Window Evaluation Chain
//!
//! ## Overview
//!
//! One call turns a full window snapshot into an A_net estimate:
//!
//! ```text
//! WindowSnapshot
//!   → dry correction      (HumidityCorrector, optional)
//!   → conditioning        (SignalConditioner, possibly passthrough)
//!   → slope fit           (SlopeEstimator, ordinary or robust)
//!   → drift subtraction   (DriftBaseline)
//!   → slope ± z·stderr
//!   → FluxConverter       (value and both bounds)
//! ```
//!
//! ## Purity
//!
//! `evaluate` borrows everything and mutates nothing. The acquisition side
//! copies the snapshot, baseline and converter out of the session lock, and
//! the evaluation runs unlocked.
//!
//! ## Failure
//!
//! Every failure is an [`EstimationError`] meaning "no estimate this tick".
//! The caller logs it and keeps going.

use alloc::vec::Vec;

use crate::buffer::WindowSnapshot;
use crate::conditioning::SignalConditioner;
use crate::constants::buffers::MIN_WINDOW_SIZE;
use crate::drift::DriftBaseline;
use crate::errors::EstimationError;
use crate::flux::{FluxConverter, FluxEstimate};
use crate::humidity::{self, HumidityCorrector};
use crate::regression::{RegressionResult, SlopeEstimator};

/// Drift-corrected slope with its interval (ppm/s)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlopeInterval {
    /// Point estimate
    pub slope: f64,
    /// `slope − z·stderr`
    pub lower: f64,
    /// `slope + z·stderr`
    pub upper: f64,
}

/// Everything produced for one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Fit on the conditioned series, before drift subtraction
    pub fit: RegressionResult,
    /// Drift-corrected slope and bounds
    pub corrected: SlopeInterval,
    /// Net assimilation
    pub flux: FluxEstimate,
    /// Newest wet CO₂ reading (ppm)
    pub co2_ppm: f64,
    /// Newest CO₂ after dry correction (ppm); equals `co2_ppm` when disabled
    pub dry_co2_ppm: f64,
    /// Newest temperature (°C)
    pub temperature_c: f64,
    /// Newest relative humidity (%)
    pub humidity_pct: f64,
    /// Vapour pressure deficit at the newest sample (kPa)
    pub vpd_kpa: f64,
}

impl Evaluation {
    /// Slope before drift subtraction (ppm/s)
    pub fn raw_slope(&self) -> f64 {
        self.fit.slope
    }
}

/// The configured evaluation chain
#[derive(Debug)]
pub struct FluxPipeline {
    corrector: Option<HumidityCorrector>,
    conditioner: SignalConditioner,
    estimator: SlopeEstimator,
    confidence_z: f64,
}

impl FluxPipeline {
    /// Chain with optional dry correction
    pub fn new(
        corrector: Option<HumidityCorrector>,
        conditioner: SignalConditioner,
        estimator: SlopeEstimator,
        confidence_z: f64,
    ) -> Self {
        Self {
            corrector,
            conditioner,
            estimator,
            confidence_z,
        }
    }

    /// Whether CO₂ is referenced to dry air before fitting
    pub fn dry_correction(&self) -> Option<&HumidityCorrector> {
        self.corrector.as_ref()
    }

    /// Slope estimator in use
    pub fn estimator(&self) -> SlopeEstimator {
        self.estimator
    }

    /// Conditioning cascade in use
    pub fn conditioner(&self) -> &SignalConditioner {
        &self.conditioner
    }

    /// Normal quantile for the interval
    pub fn confidence_z(&self) -> f64 {
        self.confidence_z
    }

    /// CO₂ series the fit sees, before conditioning
    pub fn reference_series(&self, snapshot: &WindowSnapshot) -> Vec<f64> {
        match &self.corrector {
            Some(corrector) => corrector.dry_series(
                &snapshot.co2_ppm,
                &snapshot.humidity_pct,
                &snapshot.temperature_c,
            ),
            None => snapshot.co2_ppm.clone(),
        }
    }

    /// Evaluate one window
    pub fn evaluate(
        &self,
        snapshot: &WindowSnapshot,
        baseline: &DriftBaseline,
        converter: &FluxConverter,
    ) -> Result<Evaluation, EstimationError> {
        let n = snapshot.len();
        if n < MIN_WINDOW_SIZE {
            return Err(EstimationError::InsufficientData {
                required: MIN_WINDOW_SIZE,
                available: n,
            });
        }
        let last = n - 1;

        let reference = self.reference_series(snapshot);
        ensure_finite(&reference, "dry correction")?;

        let conditioned = self.conditioner.condition(&snapshot.elapsed_s, &reference);
        ensure_finite(&conditioned, "conditioning")?;

        let fit = self.estimator.fit(&snapshot.elapsed_s, &conditioned)?;
        let (lower, upper) = fit.interval(self.confidence_z);
        let corrected = SlopeInterval {
            slope: baseline.correct(fit.slope),
            lower: baseline.correct(lower),
            upper: baseline.correct(upper),
        };

        let timestamp = snapshot.t0 + snapshot.elapsed_s[last];
        let temperature_c = snapshot.temperature_c[last];
        let humidity_pct = snapshot.humidity_pct[last];
        let flux = converter.to_flux(
            timestamp,
            corrected.slope,
            corrected.lower,
            corrected.upper,
            Some(temperature_c),
        );
        if !(flux.value.is_finite() && flux.lower.is_finite() && flux.upper.is_finite()) {
            return Err(EstimationError::NonFinite { stage: "flux" });
        }

        Ok(Evaluation {
            fit,
            corrected,
            flux,
            co2_ppm: snapshot.co2_ppm[last],
            dry_co2_ppm: reference[last],
            temperature_c,
            humidity_pct,
            vpd_kpa: humidity::vapour_pressure_deficit_kpa(temperature_c, humidity_pct),
        })
    }
}

fn ensure_finite(values: &[f64], stage: &'static str) -> Result<(), EstimationError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(EstimationError::NonFinite { stage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleBuffer;
    use crate::config::SampleLimits;
    use crate::flux::FluxBasis;
    use crate::validators::RawSample;
    use approx::assert_relative_eq;

    fn window(ppm: &[f64], humidity_pct: f64) -> WindowSnapshot {
        let mut buffer = SampleBuffer::new(ppm.len().max(3)).unwrap();
        for (i, &co2_ppm) in ppm.iter().enumerate() {
            let raw = RawSample {
                co2_ppm,
                temperature_c: 25.0,
                humidity_pct,
            };
            assert!(buffer
                .offer(1_000.0 + i as f64, raw, &SampleLimits::default())
                .is_accepted());
        }
        buffer.snapshot()
    }

    fn plain() -> FluxPipeline {
        FluxPipeline::new(None, SignalConditioner::passthrough(), SlopeEstimator::ordinary(), 1.96)
    }

    fn leaf() -> FluxConverter {
        FluxConverter::new(1.2, 101_325.0, FluxBasis::Area { leaf_area_cm2: 100.0 })
    }

    #[test]
    fn rising_line_gives_reference_flux() {
        let snapshot = window(&[400.0, 402.0, 404.0, 406.0, 408.0, 410.0], 0.0);
        let eval = plain()
            .evaluate(&snapshot, &DriftBaseline::default(), &leaf())
            .unwrap();

        assert_relative_eq!(eval.raw_slope(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(eval.fit.stderr, 0.0, epsilon = 1e-9);
        // −2.0 · 101325 · 0.0012 / (8.314 · 298.15) / 0.01
        assert_relative_eq!(eval.flux.value, -9.8103, epsilon = 1e-3);
        assert_eq!(eval.flux.timestamp, 1_005.0);
    }

    #[test]
    fn drift_is_subtracted_before_conversion() {
        let snapshot = window(&[400.0, 402.0, 404.0, 406.0, 408.0, 410.0], 0.0);
        let baseline = DriftBaseline {
            slope: 2.0,
            accepted: true,
            collected_at: Some(0.0),
        };
        let eval = plain().evaluate(&snapshot, &baseline, &leaf()).unwrap();

        assert_relative_eq!(eval.corrected.slope, 0.0, epsilon = 1e-9);
        assert_relative_eq!(eval.flux.value, 0.0, epsilon = 1e-6);
        assert_relative_eq!(eval.raw_slope(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn dry_correction_scales_the_slope() {
        let snapshot = window(&[400.0, 401.0, 402.0, 403.0, 404.0], 60.0);
        let corrector = HumidityCorrector::default();
        let dry = FluxPipeline::new(
            Some(corrector),
            SignalConditioner::passthrough(),
            SlopeEstimator::ordinary(),
            1.96,
        );

        let wet_eval = plain()
            .evaluate(&snapshot, &DriftBaseline::default(), &leaf())
            .unwrap();
        let dry_eval = dry
            .evaluate(&snapshot, &DriftBaseline::default(), &leaf())
            .unwrap();

        let factor = corrector.dry_ppm(1.0, 60.0, 25.0);
        assert!(factor > 1.0);
        assert_relative_eq!(dry_eval.raw_slope(), wet_eval.raw_slope() * factor, epsilon = 1e-9);
        assert_relative_eq!(dry_eval.dry_co2_ppm, 404.0 * factor, epsilon = 1e-9);
        assert_eq!(dry_eval.co2_ppm, 404.0);
    }

    #[test]
    fn bounds_bracket_value() {
        let snapshot = window(&[400.0, 403.0, 403.5, 407.0, 407.2, 411.0, 411.5, 414.0], 40.0);
        let eval = plain()
            .evaluate(&snapshot, &DriftBaseline::default(), &leaf())
            .unwrap();

        assert!(eval.corrected.lower < eval.corrected.slope);
        assert!(eval.corrected.slope < eval.corrected.upper);
        assert!(eval.flux.lower <= eval.flux.value);
        assert!(eval.flux.value <= eval.flux.upper);
        assert!(eval.vpd_kpa > 0.0);
    }

    #[test]
    fn short_window_is_not_evaluated() {
        let mut buffer = SampleBuffer::new(6).unwrap();
        let raw = RawSample {
            co2_ppm: 400.0,
            temperature_c: 25.0,
            humidity_pct: 50.0,
        };
        buffer.offer(0.0, raw, &SampleLimits::default());
        buffer.offer(1.0, raw, &SampleLimits::default());

        let err = plain()
            .evaluate(&buffer.snapshot(), &DriftBaseline::default(), &leaf())
            .unwrap_err();
        assert_eq!(
            err,
            EstimationError::InsufficientData {
                required: 3,
                available: 2
            }
        );
    }
}

//! Slope Estimation
//!
//! ## Overview
//!
//! Fits `co2 = intercept + slope · t` over a window and reports the slope
//! (ppm/s) with its standard error. Times are centred on their mean before
//! fitting, which keeps the normal equations well conditioned when callers
//! pass absolute epoch seconds, and makes the slope and intercept estimates
//! uncorrelated.
//!
//! ## Ordinary Least Squares
//!
//! ```text
//! Sxx    = Σ (t − t̄)²                  (= n · var(t), population variance)
//! slope  = Σ (t − t̄)(y − ȳ) / Sxx
//! stderr = sqrt( RSS / (n − 2) / Sxx )
//! ```
//!
//! ## Robust (Huber)
//!
//! Iteratively reweighted least squares with Huber's T norm (t = 1.345).
//! The residual scale is the MAD about zero, `median(|r|) / 0.6745`,
//! re-estimated every iteration. Points with `|r / scale| > t` get weight
//! `t / |r / scale|`, so one bad sample cannot drag the slope. The standard
//! error uses Huber's H1 covariance:
//!
//! ```text
//! m   = mean ψ'(u)        k = 1 + (2 / n) · var ψ'(u) / m²
//! var = k² · Σψ(u)² / (n − 2) · scale² / m² / Sxx
//! ```
//!
//! A window whose residual scale is zero (a perfect line through most
//! points) has nothing to reweight and returns the OLS result.
//!
//! ## Errors
//!
//! Fewer than three points, mismatched lengths, a zero-spread time axis and
//! non-finite inputs are reported as [`EstimationError`]. The caller treats
//! any of them as "no result this tick".

use alloc::vec::Vec;

use crate::constants::estimation::{IRLS_MAX_ITERATIONS, IRLS_TOLERANCE};
use crate::constants::physics::{HUBER_T, MAD_NORMAL_CONSISTENCY};
use crate::errors::EstimationError;

/// Regression method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RegressionKind {
    /// Ordinary least squares
    #[default]
    Ordinary,
    /// Huber IRLS
    Robust,
}

/// Outcome of a slope fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionResult {
    /// Rate of change (units of `values` per second)
    pub slope: f64,
    /// Fitted value at `t = 0` of the supplied times
    pub intercept: f64,
    /// Standard error of the slope, ≥ 0
    pub stderr: f64,
    /// Points used
    pub n: usize,
    /// Coefficient of determination; `None` when the values are constant
    pub r_squared: Option<f64>,
    /// Root mean squared residual
    pub rmse: f64,
}

impl RegressionResult {
    /// Normal-theory interval `slope ± z · stderr` as `(lower, upper)`
    pub fn interval(&self, z: f64) -> (f64, f64) {
        let half = z.abs() * self.stderr;
        (self.slope - half, self.slope + half)
    }
}

/// Straight-line fit with centred abscissa
#[derive(Debug, Clone, Copy)]
struct Line {
    slope: f64,
    /// Value at the mean time
    level: f64,
}

impl Line {
    #[inline]
    fn predict(&self, centred_t: f64) -> f64 {
        self.level + self.slope * centred_t
    }
}

/// Fits concentration against time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlopeEstimator {
    kind: RegressionKind,
}

impl SlopeEstimator {
    /// Estimator using `kind`
    pub fn new(kind: RegressionKind) -> Self {
        Self { kind }
    }

    /// Ordinary least squares
    pub fn ordinary() -> Self {
        Self::new(RegressionKind::Ordinary)
    }

    /// Huber IRLS
    pub fn robust() -> Self {
        Self::new(RegressionKind::Robust)
    }

    /// Configured method
    pub fn kind(&self) -> RegressionKind {
        self.kind
    }

    /// Fit `values` against `times` (seconds)
    pub fn fit(&self, times: &[f64], values: &[f64]) -> Result<RegressionResult, EstimationError> {
        let prepared = Prepared::new(times, values)?;
        let ols = prepared.ordinary();
        match self.kind {
            RegressionKind::Ordinary => Ok(ols),
            RegressionKind::Robust => Ok(prepared.robust(ols)),
        }
    }
}

/// Validated inputs with the time axis centred
struct Prepared<'a> {
    centred: Vec<f64>,
    values: &'a [f64],
    t_mean: f64,
    sxx: f64,
}

impl<'a> Prepared<'a> {
    fn new(times: &[f64], values: &'a [f64]) -> Result<Self, EstimationError> {
        if times.len() != values.len() {
            return Err(EstimationError::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }
        if values.len() < 3 {
            return Err(EstimationError::InsufficientData {
                required: 3,
                available: values.len(),
            });
        }
        if times.iter().chain(values).any(|v| !v.is_finite()) {
            return Err(EstimationError::NonFinite {
                stage: "regression",
            });
        }

        let n = times.len() as f64;
        let t_mean = times.iter().sum::<f64>() / n;
        let centred: Vec<f64> = times.iter().map(|t| t - t_mean).collect();
        let sxx: f64 = centred.iter().map(|t| t * t).sum();

        // Rounding in t̄ leaves a few ulps of spread on identical epoch
        // timestamps; that still counts as degenerate
        let scale = times.iter().fold(1.0_f64, |acc, t| acc.max(t.abs()));
        let tolerance = n * f64::EPSILON * scale;
        if sxx <= tolerance * tolerance {
            return Err(EstimationError::DegenerateAbscissa);
        }

        Ok(Self {
            centred,
            values,
            t_mean,
            sxx,
        })
    }

    fn n(&self) -> usize {
        self.values.len()
    }

    fn residuals(&self, line: &Line) -> Vec<f64> {
        self.centred
            .iter()
            .zip(self.values)
            .map(|(t, y)| y - line.predict(*t))
            .collect()
    }

    fn result(&self, line: Line, stderr: f64, residuals: &[f64]) -> RegressionResult {
        let n = self.n() as f64;
        let y_mean = self.values.iter().sum::<f64>() / n;
        let rss: f64 = residuals.iter().map(|r| r * r).sum();
        let tss: f64 = self.values.iter().map(|y| (y - y_mean) * (y - y_mean)).sum();

        RegressionResult {
            slope: line.slope,
            intercept: line.level - line.slope * self.t_mean,
            stderr,
            n: self.n(),
            r_squared: (tss > 0.0).then(|| 1.0 - rss / tss),
            rmse: libm::sqrt(rss / n),
        }
    }

    fn ordinary(&self) -> RegressionResult {
        let n = self.n() as f64;
        let y_mean = self.values.iter().sum::<f64>() / n;
        let sxy: f64 = self
            .centred
            .iter()
            .zip(self.values)
            .map(|(t, y)| t * (y - y_mean))
            .sum();

        let line = Line {
            slope: sxy / self.sxx,
            level: y_mean,
        };
        let residuals = self.residuals(&line);
        let rss: f64 = residuals.iter().map(|r| r * r).sum();
        let stderr = if self.n() > 2 {
            libm::sqrt((rss / (n - 2.0)) / self.sxx)
        } else {
            0.0
        };

        self.result(line, stderr, &residuals)
    }

    fn weighted(&self, weights: &[f64]) -> Option<Line> {
        let (mut sw, mut swt, mut swy, mut swtt, mut swty) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for ((w, t), y) in weights.iter().zip(&self.centred).zip(self.values) {
            sw += w;
            swt += w * t;
            swy += w * y;
            swtt += w * t * t;
            swty += w * t * y;
        }
        let det = sw * swtt - swt * swt;
        if !(det.is_finite() && det > 0.0) {
            return None;
        }
        let slope = (sw * swty - swt * swy) / det;
        // Re-express the intercept at t̄ (centred zero)
        Some(Line {
            slope,
            level: (swy - slope * swt) / sw,
        })
    }

    fn robust(&self, ols: RegressionResult) -> RegressionResult {
        let mut line = Line {
            slope: ols.slope,
            level: ols.intercept + ols.slope * self.t_mean,
        };
        let mut residuals = self.residuals(&line);
        let mut scale = mad_about_zero(&residuals);
        if scale <= 0.0 {
            return ols;
        }

        for _ in 0..IRLS_MAX_ITERATIONS {
            let weights: Vec<f64> = residuals.iter().map(|r| huber_weight(r / scale)).collect();
            let Some(next) = self.weighted(&weights) else {
                break;
            };

            let step = (next.slope - line.slope)
                .abs()
                .max((next.level - line.level).abs());
            let size = next.slope.abs().max(next.level.abs()).max(1.0);

            line = next;
            residuals = self.residuals(&line);
            scale = mad_about_zero(&residuals);

            if scale <= 0.0 || step <= IRLS_TOLERANCE * size {
                break;
            }
        }

        let stderr = if scale > 0.0 {
            self.huber_h1_stderr(&residuals, scale).unwrap_or(ols.stderr)
        } else {
            0.0
        };
        self.result(line, stderr, &residuals)
    }

    fn huber_h1_stderr(&self, residuals: &[f64], scale: f64) -> Option<f64> {
        let n = self.n() as f64;
        let params = 2.0;
        let scaled: Vec<f64> = residuals.iter().map(|r| r / scale).collect();

        let derivs: Vec<f64> = scaled.iter().map(|u| huber_psi_deriv(*u)).collect();
        let m = derivs.iter().sum::<f64>() / n;
        if m <= 0.0 {
            return None;
        }
        let var_deriv = derivs.iter().map(|d| (d - m) * (d - m)).sum::<f64>() / n;
        let k = 1.0 + (params / n) * var_deriv / (m * m);

        let ss_psi: f64 = scaled.iter().map(|u| huber_psi(*u) * huber_psi(*u)).sum();
        let var = k * k * (ss_psi / (n - params)) * scale * scale / (m * m) / self.sxx;
        var.is_finite().then(|| libm::sqrt(var.max(0.0)))
    }
}

/// Huber ψ: identity inside ±t, clipped outside
#[inline]
fn huber_psi(u: f64) -> f64 {
    u.clamp(-HUBER_T, HUBER_T)
}

/// ψ'(u): 1 inside ±t, 0 outside
#[inline]
fn huber_psi_deriv(u: f64) -> f64 {
    if u.abs() <= HUBER_T {
        1.0
    } else {
        0.0
    }
}

/// IRLS weight ψ(u)/u
#[inline]
fn huber_weight(u: f64) -> f64 {
    let a = u.abs();
    if a <= HUBER_T {
        1.0
    } else {
        HUBER_T / a
    }
}

/// Normalised median absolute deviation about zero
fn mad_about_zero(residuals: &[f64]) -> f64 {
    let mut abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
    abs.sort_by(f64::total_cmp);
    let mid = abs.len() / 2;
    let median = if abs.is_empty() {
        0.0
    } else if abs.len() % 2 == 1 {
        abs[mid]
    } else {
        0.5 * (abs[mid - 1] + abs[mid])
    };
    median / MAD_NORMAL_CONSISTENCY
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seconds(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn noiseless_line_has_exact_slope_and_zero_error() {
        let t = seconds(12);
        let y: Vec<f64> = t.iter().map(|t| 400.0 + 0.25 * t).collect();

        for estimator in [SlopeEstimator::ordinary(), SlopeEstimator::robust()] {
            let fit = estimator.fit(&t, &y).unwrap();
            assert_relative_eq!(fit.slope, 0.25, epsilon = 1e-12);
            assert_relative_eq!(fit.intercept, 400.0, epsilon = 1e-9);
            assert!(fit.stderr.abs() < 1e-9);
            assert_eq!(fit.n, 12);
        }
    }

    #[test]
    fn constant_series_has_zero_slope() {
        let t = seconds(8);
        let y = vec![412.0; 8];
        let fit = SlopeEstimator::ordinary().fit(&t, &y).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.stderr, 0.0);
        assert_eq!(fit.r_squared, None);
    }

    #[test]
    fn stderr_matches_closed_form() {
        // Residuals +1, -1, -1, +1 around y = 2t
        let t = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 1.0, 3.0, 7.0];
        let fit = SlopeEstimator::ordinary().fit(&t, &y).unwrap();
        // Sxx = 5, slope = Σ t'(y-ȳ)/Sxx = 10/5
        assert_relative_eq!(fit.slope, 2.0, epsilon = 1e-12);
        // RSS = 4 → sqrt(4/2/5)
        assert_relative_eq!(fit.stderr, (0.4_f64).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(fit.rmse, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn epoch_timestamps_are_centred() {
        let t: Vec<f64> = (0..10).map(|i| 1.7e9 + i as f64).collect();
        let y: Vec<f64> = (0..10).map(|i| 400.0 - 0.1 * i as f64).collect();
        let fit = SlopeEstimator::ordinary().fit(&t, &y).unwrap();
        assert_relative_eq!(fit.slope, -0.1, epsilon = 1e-9);
    }

    #[test]
    fn robust_fit_resists_single_outlier() {
        let t = seconds(12);
        let mut y: Vec<f64> = t.iter().map(|t| 400.0 + 0.5 * t + 0.05 * (t * 1.7).sin()).collect();
        y[9] += 60.0;

        let ols = SlopeEstimator::ordinary().fit(&t, &y).unwrap();
        let robust = SlopeEstimator::robust().fit(&t, &y).unwrap();

        assert!((ols.slope - 0.5).abs() > 0.5);
        assert!((robust.slope - 0.5).abs() < 0.1);
        assert!(robust.stderr > 0.0);
        assert!(robust.stderr < ols.stderr);
    }

    #[test]
    fn invalid_inputs_are_reported() {
        let est = SlopeEstimator::ordinary();
        assert_eq!(
            est.fit(&[0.0, 1.0], &[1.0, 2.0]),
            Err(EstimationError::InsufficientData {
                required: 3,
                available: 2
            })
        );
        assert_eq!(
            est.fit(&[0.0, 1.0, 2.0], &[1.0, 2.0]),
            Err(EstimationError::LengthMismatch {
                times: 3,
                values: 2
            })
        );
        assert_eq!(
            est.fit(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]),
            Err(EstimationError::DegenerateAbscissa)
        );
        assert!(matches!(
            est.fit(&[0.0, 1.0, 2.0], &[1.0, f64::NAN, 3.0]),
            Err(EstimationError::NonFinite { .. })
        ));
    }

    #[test]
    fn interval_brackets_slope() {
        let fit = RegressionResult {
            slope: 0.3,
            intercept: 0.0,
            stderr: 0.1,
            n: 10,
            r_squared: None,
            rmse: 0.0,
        };
        let (lo, hi) = fit.interval(1.96);
        assert_relative_eq!(lo, 0.104, epsilon = 1e-12);
        assert_relative_eq!(hi, 0.496, epsilon = 1e-12);
    }
}

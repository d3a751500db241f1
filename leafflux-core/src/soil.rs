//! Soil respiration offset estimation
//!
//! Run the chamber with only the pot (no leaf) on the chamber basis. Every
//! window gives a net flux; with no leaf the only source is respiration, so
//! the values are negative. Their trimmed mean, per unit soil surface, is
//! the offset later configured as `soil_respiration_correction`.
//!
//! ```text
//! keep   v < 0, after the settling period
//! drop   v ≤ mean − 3σ              (population σ)
//! offset mean(kept) / top_area_m2
//! ```
//!
//! Only the low tail is trimmed: a burst of CO₂ from disturbed soil shows up
//! as a large negative value, while values near zero are genuine.

use alloc::vec::Vec;

use crate::constants::physics::CM2_PER_M2;
use crate::time::Timestamp;

/// Surface area (m²) of a rectangular pot opening given in cm
pub fn rectangular_area_m2(width_cm: f64, length_cm: f64) -> f64 {
    width_cm * length_cm / CM2_PER_M2
}

/// Accumulates respiration fluxes from a soil-only run
#[derive(Debug, Clone, PartialEq)]
pub struct SoilRespirationEstimator {
    top_area_m2: f64,
    settle_s: f64,
    started_at: Option<Timestamp>,
    values: Vec<f64>,
}

impl SoilRespirationEstimator {
    /// Estimator for a soil surface of `top_area_m2`, ignoring the first
    /// `settle_s` seconds after the first recorded window
    pub fn new(top_area_m2: f64, settle_s: f64) -> Self {
        Self {
            top_area_m2,
            settle_s,
            started_at: None,
            values: Vec::new(),
        }
    }

    /// Record one chamber-basis flux (µmol s⁻¹, uptake positive)
    ///
    /// Returns the per-area value when it was kept.
    pub fn record(&mut self, timestamp: Timestamp, flux_umol_s: f64) -> Option<f64> {
        let started = *self.started_at.get_or_insert(timestamp);
        if timestamp - started <= self.settle_s || !flux_umol_s.is_finite() {
            return None;
        }
        if flux_umol_s >= 0.0 {
            return None;
        }
        self.values.push(flux_umol_s);
        Some(flux_umol_s / self.top_area_m2)
    }

    /// Respiration values kept so far
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing has been kept yet
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Plain mean of the kept values (µmol m⁻² s⁻¹)
    pub fn running_mean_m2(&self) -> Option<f64> {
        mean(&self.values).map(|m| m / self.top_area_m2)
    }

    /// Trimmed-mean respiration offset (µmol m⁻² s⁻¹)
    pub fn estimate_m2(&self) -> Option<f64> {
        let m = mean(&self.values)?;
        let n = self.values.len() as f64;
        let var = self.values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
        let floor = m - 3.0 * libm::sqrt(var);

        let kept: Vec<f64> = self.values.iter().copied().filter(|v| *v > floor).collect();
        let trimmed = mean(&kept).unwrap_or(m);
        Some(trimmed / self.top_area_m2)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn positive_and_settling_values_are_skipped() {
        let mut soil = SoilRespirationEstimator::new(0.0025, 30.0);
        assert_eq!(soil.record(0.0, -0.001), None);
        assert_eq!(soil.record(20.0, -0.001), None);
        assert_eq!(soil.record(40.0, 0.002), None);
        assert_relative_eq!(soil.record(50.0, -0.001).unwrap(), -0.4, epsilon = 1e-12);
        assert_eq!(soil.len(), 1);
    }

    #[test]
    fn low_outlier_is_trimmed() {
        let mut soil = SoilRespirationEstimator::new(1.0, 0.0);
        soil.record(0.0, -1.0);
        for i in 1..=30 {
            soil.record(i as f64, -1.0 - 0.01 * (i % 3) as f64);
        }
        soil.record(31.0, -25.0);

        let running = soil.running_mean_m2().unwrap();
        let trimmed = soil.estimate_m2().unwrap();
        assert!(running < -1.5);
        assert_relative_eq!(trimmed, -1.01, epsilon = 0.01);
    }

    #[test]
    fn identical_values_survive_trimming() {
        let mut soil = SoilRespirationEstimator::new(0.5, 0.0);
        soil.record(0.0, -1.0);
        for i in 1..5 {
            soil.record(i as f64, -1.0);
        }
        assert_relative_eq!(soil.estimate_m2().unwrap(), -2.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_has_no_estimate() {
        let soil = SoilRespirationEstimator::new(1.0, 0.0);
        assert!(soil.is_empty());
        assert_eq!(soil.estimate_m2(), None);
        assert_relative_eq!(rectangular_area_m2(5.0, 5.0), 0.0025, epsilon = 1e-15);
    }
}

//! Slope → Molar Flux Conversion
//!
//! ## Ideal Gas Conversion
//!
//! A chamber of volume V at pressure P and temperature T holds
//! `P·V / (R·T)` mol of air. A CO₂ mole fraction changing at `dC/dt` ppm/s
//! (µmol mol⁻¹ s⁻¹) therefore moves
//!
//! ```text
//! an = dC/dt · P · V / (R · T)        µmol s⁻¹
//! ```
//!
//! of CO₂ into (positive) or out of (negative) the chamber air.
//!
//! ## Sign Convention
//!
//! A photosynthesising leaf removes CO₂, so a falling concentration means
//! positive assimilation. The reported value is
//!
//! ```text
//! A_net = −an / leaf_area_m2          µmol m⁻² s⁻¹   (area basis)
//! A_net = −an                         µmol s⁻¹       (chamber basis)
//! ```
//!
//! The same conversion is applied to both ends of the slope interval.
//! Negation flips their order, so the bounds are swapped back afterwards to
//! keep `lower ≤ value ≤ upper`.
//!
//! ## Temperature
//!
//! Override (if configured), else the newest window sample, else 298.15 K.
//!
//! ## Respiration Offset
//!
//! When the chamber also holds a pot of soil, soil respiration adds CO₂
//! that the leaf did not produce. A separate soil-only run (see
//! [`SoilRespirationEstimator`](crate::SoilRespirationEstimator)) measures
//! it, and the configured offset is added to negative values and their
//! bounds.

use crate::constants::physics::{
    CELSIUS_TO_KELVIN, CM2_PER_M2, CM3_PER_LITRE, DEFAULT_CHAMBER_TEMPERATURE_K,
    GAS_CONSTANT_J_PER_MOL_K, LITRES_PER_M3,
};
use crate::time::Timestamp;
use crate::traits::Timestamped;

/// Rectangular box volume (L) from outside dimensions in cm
pub fn box_volume_l(width_cm: f64, height_cm: f64, length_cm: f64) -> f64 {
    width_cm * height_cm * length_cm / CM3_PER_LITRE
}

/// Square frustum volume (L): `h/3 · (a² + ab + b²)` with top side `a`,
/// base side `b`
pub fn frustum_volume_l(top_width_cm: f64, base_width_cm: f64, height_cm: f64) -> f64 {
    let (a, b) = (top_width_cm, base_width_cm);
    (height_cm / 3.0) * (a * a + a * b + b * b) / CM3_PER_LITRE
}

/// What the flux is normalised by
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FluxBasis {
    /// Per projected leaf area: µmol m⁻² s⁻¹
    Area {
        /// Leaf area (cm²), > 0
        leaf_area_cm2: f64,
    },
    /// Whole chamber: µmol s⁻¹
    Chamber,
}

impl FluxBasis {
    /// Unit label for display and CSV headers
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Area { .. } => "µmol m⁻² s⁻¹",
            Self::Chamber => "µmol s⁻¹",
        }
    }
}

/// Net assimilation with its confidence band
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FluxEstimate {
    /// When the window ended
    pub timestamp: Timestamp,
    /// A_net
    pub value: f64,
    /// Lower bound, ≤ value
    pub lower: f64,
    /// Upper bound, ≥ value
    pub upper: f64,
}

impl Timestamped for FluxEstimate {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Converts corrected CO₂ slopes to A_net
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxConverter {
    volume_l: f64,
    pressure_pa: f64,
    basis: FluxBasis,
    temperature_override_c: Option<f64>,
    respiration_correction: f64,
}

impl FluxConverter {
    /// Converter for a chamber of `volume_l` at `pressure_pa`
    pub fn new(volume_l: f64, pressure_pa: f64, basis: FluxBasis) -> Self {
        Self {
            volume_l,
            pressure_pa,
            basis,
            temperature_override_c: None,
            respiration_correction: 0.0,
        }
    }

    /// Use a fixed temperature (°C) instead of the sensor reading
    pub fn with_temperature_override(mut self, temperature_c: Option<f64>) -> Self {
        self.temperature_override_c = temperature_c;
        self
    }

    /// Offset added to negative values
    pub fn with_respiration_correction(mut self, offset: f64) -> Self {
        self.respiration_correction = offset;
        self
    }

    /// Reporting basis
    pub fn basis(&self) -> FluxBasis {
        self.basis
    }

    /// Switch to a new leaf area, keeping the area basis
    ///
    /// No effect on the chamber basis.
    pub fn set_leaf_area(&mut self, leaf_area_cm2: f64) {
        if let FluxBasis::Area { .. } = self.basis {
            self.basis = FluxBasis::Area { leaf_area_cm2 };
        }
    }

    /// Effective chamber volume (L)
    pub fn volume_l(&self) -> f64 {
        self.volume_l
    }

    /// Temperature used for the conversion (K)
    pub fn temperature_k(&self, latest_sample_c: Option<f64>) -> f64 {
        match self.temperature_override_c.or(latest_sample_c) {
            Some(celsius) => celsius + CELSIUS_TO_KELVIN,
            None => DEFAULT_CHAMBER_TEMPERATURE_K,
        }
    }

    /// Molar flux into the chamber air (µmol s⁻¹) for a slope in ppm/s
    pub fn molar_flux(&self, slope_ppm_s: f64, temperature_k: f64) -> f64 {
        let volume_m3 = self.volume_l / LITRES_PER_M3;
        (slope_ppm_s * self.pressure_pa * volume_m3) / (GAS_CONSTANT_J_PER_MOL_K * temperature_k)
    }

    /// A_net for a single slope, before any respiration offset
    pub fn assimilation(&self, slope_ppm_s: f64, temperature_k: f64) -> f64 {
        let an = self.molar_flux(slope_ppm_s, temperature_k);
        match self.basis {
            FluxBasis::Area { leaf_area_cm2 } => -an / (leaf_area_cm2 / CM2_PER_M2),
            FluxBasis::Chamber => -an,
        }
    }

    /// Convert a slope and its interval to an estimate
    pub fn to_flux(
        &self,
        timestamp: Timestamp,
        slope_ppm_s: f64,
        slope_lower: f64,
        slope_upper: f64,
        latest_temperature_c: Option<f64>,
    ) -> FluxEstimate {
        let temperature_k = self.temperature_k(latest_temperature_c);

        let mut value = self.assimilation(slope_ppm_s, temperature_k);
        let a = self.assimilation(slope_lower, temperature_k);
        let b = self.assimilation(slope_upper, temperature_k);
        let (mut lower, mut upper) = if a <= b { (a, b) } else { (b, a) };

        if value < 0.0 && self.respiration_correction != 0.0 {
            value += self.respiration_correction;
            lower += self.respiration_correction;
            upper += self.respiration_correction;
        }

        FluxEstimate {
            timestamp,
            value,
            lower,
            upper,
        }
    }
}

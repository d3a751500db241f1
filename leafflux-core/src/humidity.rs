//! Dry-Air CO₂ Correction
//!
//! ## Physics Background
//!
//! NDIR sensors report the CO₂ mole fraction of the air they see, water
//! vapour included. As a leaf transpires, vapour dilutes the chamber air and
//! the wet reading falls even if no CO₂ is taken up. Referencing CO₂ to dry
//! air removes that artefact:
//!
//! ```text
//! dry_ppm = wet_ppm / (1 - e / P)
//! e       = es(T) · RH / 100          (Pa)
//! ```
//!
//! ### Saturation Vapour Pressure
//!
//! Tetens' formula, with separate coefficients over water and over ice:
//!
//! ```text
//! es(T) = a · exp(b·T / (T + c))      (kPa)
//!
//! T ≥ 0 °C   a = 0.61078  b = 17.27   c = 237.3   (Monteith & Unsworth)
//! T < 0 °C   a = 0.61078  b = 21.875  c = 265.5   (Murray 1967)
//! ```
//!
//! Both branches give `a` at exactly 0 °C, so the curve is continuous.
//!
//! ## Numerical Notes
//!
//! - `e / P` stays below 0.08 anywhere inside the sensor's 60 °C limit, so
//!   the denominator never approaches zero on validated samples.
//! - Everything is pure; NaN in gives NaN out.

use alloc::vec::Vec;

use crate::constants::physics::{
    PA_PER_KPA, SEA_LEVEL_PRESSURE_PA, TETENS_A_KPA, TETENS_B_ICE, TETENS_B_WATER, TETENS_C_ICE,
    TETENS_C_WATER,
};

/// One branch of Tetens' saturation vapour pressure formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TetensCoefficients {
    /// Pressure at 0 °C (kPa)
    pub a: f64,
    /// Dimensionless slope
    pub b: f64,
    /// Temperature offset (°C)
    pub c: f64,
}

impl TetensCoefficients {
    /// Saturation vapour pressure (kPa) at `temp_c`
    #[inline]
    pub fn evaluate(&self, temp_c: f64) -> f64 {
        self.a * libm::exp((self.b * temp_c) / (temp_c + self.c))
    }
}

/// Over liquid water, used at and above 0 °C
pub const TETENS_ABOVE_FREEZING: TetensCoefficients = TetensCoefficients {
    a: TETENS_A_KPA,
    b: TETENS_B_WATER,
    c: TETENS_C_WATER,
};

/// Over ice, used below 0 °C
pub const TETENS_BELOW_FREEZING: TetensCoefficients = TetensCoefficients {
    a: TETENS_A_KPA,
    b: TETENS_B_ICE,
    c: TETENS_C_ICE,
};

/// Saturation vapour pressure (kPa) with the branch picked by temperature
#[inline]
pub fn saturation_vapour_pressure_kpa(temp_c: f64) -> f64 {
    if temp_c >= 0.0 {
        TETENS_ABOVE_FREEZING.evaluate(temp_c)
    } else {
        TETENS_BELOW_FREEZING.evaluate(temp_c)
    }
}

/// Vapour pressure deficit (kPa): `es - ea`
pub fn vapour_pressure_deficit_kpa(temp_c: f64, rh_pct: f64) -> f64 {
    let es = saturation_vapour_pressure_kpa(temp_c);
    let ea = es * (rh_pct / 100.0);
    es - ea
}

/// Converts wet CO₂ readings to dry-air mole fractions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumidityCorrector {
    pressure_pa: f64,
}

impl Default for HumidityCorrector {
    fn default() -> Self {
        Self::new(SEA_LEVEL_PRESSURE_PA)
    }
}

impl HumidityCorrector {
    /// Corrector for air at `pressure_pa`
    pub fn new(pressure_pa: f64) -> Self {
        Self { pressure_pa }
    }

    /// Total air pressure used for the mole fraction (Pa)
    pub fn pressure_pa(&self) -> f64 {
        self.pressure_pa
    }

    /// Partial pressure of water vapour (Pa)
    #[inline]
    pub fn vapour_pressure_pa(&self, temp_c: f64, rh_pct: f64) -> f64 {
        saturation_vapour_pressure_kpa(temp_c) * PA_PER_KPA * (rh_pct / 100.0)
    }

    /// Dry-air CO₂ (ppm) from a wet reading
    #[inline]
    pub fn dry_ppm(&self, wet_ppm: f64, rh_pct: f64, temp_c: f64) -> f64 {
        let e = self.vapour_pressure_pa(temp_c, rh_pct);
        wet_ppm / (1.0 - e / self.pressure_pa)
    }

    /// Dry-correct a whole window, element by element
    ///
    /// The three slices are expected to have equal length; the output is as
    /// long as the shortest of them.
    pub fn dry_series(&self, wet_ppm: &[f64], rh_pct: &[f64], temp_c: &[f64]) -> Vec<f64> {
        wet_ppm
            .iter()
            .zip(rh_pct)
            .zip(temp_c)
            .map(|((&co2, &rh), &t)| self.dry_ppm(co2, rh, t))
            .collect()
    }
}

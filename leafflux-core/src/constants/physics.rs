//! Physical Constants for leafflux
//!
//! Fundamental constants and empirical coefficients used by the dry-air
//! correction and the ideal-gas flux conversion. All values match the ones
//! the measurement protocol was calibrated against; do not "improve" them
//! without re-validating against reference gas-exchange data.

// ===== FUNDAMENTAL PHYSICS CONSTANTS =====

/// Universal gas constant (J·mol⁻¹·K⁻¹).
///
/// Truncated to the value used by the chamber protocol so that results are
/// reproducible against previously logged sessions.
///
/// Source: CODATA 2018 (8.314462618), truncated
pub const GAS_CONSTANT_J_PER_MOL_K: f64 = 8.314;

/// Offset between Celsius and Kelvin scales.
///
/// Source: SI definition of the kelvin
pub const CELSIUS_TO_KELVIN: f64 = 273.15;

/// Standard atmospheric pressure at sea level (Pa).
///
/// Default chamber pressure when no barometer is available.
///
/// Source: International Standard Atmosphere (ISA)
pub const SEA_LEVEL_PRESSURE_PA: f64 = 101_325.0;

/// Fallback chamber temperature (K) when no sample has reported one yet.
///
/// 25 °C, the usual growth-room setpoint.
pub const DEFAULT_CHAMBER_TEMPERATURE_K: f64 = 298.15;

// ===== UNIT CONVERSIONS =====

/// Litres per cubic metre.
pub const LITRES_PER_M3: f64 = 1000.0;

/// Square centimetres per square metre.
pub const CM2_PER_M2: f64 = 10_000.0;

/// Cubic centimetres per litre.
pub const CM3_PER_LITRE: f64 = 1000.0;

/// Pascals per kilopascal.
pub const PA_PER_KPA: f64 = 1000.0;

// ===== SATURATION VAPOUR PRESSURE (TETENS) =====

/// Tetens scale coefficient `a` (kPa), shared by both branches.
///
/// Source: Monteith & Unsworth (2008); Murray (1967)
pub const TETENS_A_KPA: f64 = 0.61078;

/// Tetens exponent coefficient `b` over liquid water (T ≥ 0 °C).
///
/// Source: Monteith & Unsworth (2008), Principles of Environmental Physics
pub const TETENS_B_WATER: f64 = 17.27;

/// Tetens offset `c` over liquid water (°C, T ≥ 0 °C).
///
/// Source: Monteith & Unsworth (2008)
pub const TETENS_C_WATER: f64 = 237.3;

/// Tetens exponent coefficient `b` over ice (T < 0 °C).
///
/// Source: Murray (1967), J. Appl. Meteorol. 6, 203–204
pub const TETENS_B_ICE: f64 = 21.875;

/// Tetens offset `c` over ice (°C, T < 0 °C).
///
/// Source: Murray (1967)
pub const TETENS_C_ICE: f64 = 265.5;

// ===== ROBUST REGRESSION =====

/// Huber T tuning constant.
///
/// Gives 95% efficiency relative to OLS when residuals are Gaussian.
///
/// Source: Huber (1981), Robust Statistics
pub const HUBER_T: f64 = 1.345;

/// Normal-consistency divisor for the median absolute deviation.
///
/// MAD / 0.6745 estimates σ for Gaussian residuals.
pub const MAD_NORMAL_CONSISTENCY: f64 = 0.6745;

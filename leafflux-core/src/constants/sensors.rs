//! Sensor Specifications and Limits
//!
//! Operating limits for the NDIR / photoacoustic CO₂ sensors the chamber is
//! built around (Sensirion SCD4x, Infineon XENSIV PAS CO2).

// ===== TEMPERATURE =====

/// Minimum specified operating temperature (°C).
///
/// Source: Sensirion SCD4x datasheet, operating conditions
pub const TEMP_SENSOR_MIN_C: f64 = -40.0;

/// Maximum specified operating temperature (°C).
///
/// Source: Sensirion SCD4x datasheet, operating conditions (extended range)
pub const TEMP_SENSOR_MAX_C: f64 = 60.0;

// ===== HUMIDITY =====

/// Minimum relative humidity (%). Readings below are clamped.
pub const HUMIDITY_SENSOR_MIN_PCT: f64 = 0.0;

/// Maximum relative humidity (%). Readings above are clamped.
pub const HUMIDITY_SENSOR_MAX_PCT: f64 = 100.0;

// ===== CO2 =====

/// Recalibration targets accepted by forced recalibration (ppm).
///
/// Source: Infineon PAS CO2 application note, forced compensation
pub const FORCED_RECALIBRATION_MIN_PPM: u16 = 350;

/// Upper bound for forced recalibration targets (ppm).
pub const FORCED_RECALIBRATION_MAX_PPM: u16 = 1500;

/// Outdoor reference concentration used for forced recalibration (ppm).
pub const AMBIENT_REFERENCE_PPM: u16 = 420;

// ===== POLLING =====

/// Minimum refresh interval of the SCD4x periodic measurement mode (s).
///
/// Polling faster only returns "no fresh data".
///
/// Source: Sensirion SCD4x datasheet, periodic measurement
pub const SCD4X_REFRESH_INTERVAL_S: f64 = 5.0;

/// Interval between polls while a measurement mode is active (s).
pub const DEFAULT_POLL_INTERVAL_S: f64 = 0.5;

/// Back-off while neither logging nor zero-run is active (s).
pub const DEFAULT_IDLE_BACKOFF_S: f64 = 0.5;

/// Attempts made at the sensor boundary before a reading is skipped.
pub const DEFAULT_SENSOR_RETRIES: u32 = 3;

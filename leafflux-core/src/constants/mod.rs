//! Constants for leafflux Core
//!
//! Centralized, documented constants used throughout the estimation core.
//!
//! ## Organization
//!
//! Constants are grouped by domain:
//! - **Physics**: gas constant, unit conversions, Tetens coefficients
//! - **Sensors**: operating limits and polling cadence of the CO₂ sensors
//! - **Time**: zero-run durations
//! - **Buffers**: window capacity limits
//! - **Estimation**: filter, confidence and acceptance defaults
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. Use descriptive names that include units
//! 3. Anything a user may reasonably tune belongs in `Configuration`, with
//!    the constant here as its default

/// Physical constants and empirical coefficients.
pub mod physics;

/// Sensor specifications and polling cadence.
pub mod sensors;

/// Time-related constants.
pub mod time;

/// Window and series limits.
pub mod buffers;

/// Conditioning, confidence and zero-run defaults.
pub mod estimation;

// Re-export commonly used constants for convenience
pub use physics::{
    CELSIUS_TO_KELVIN, DEFAULT_CHAMBER_TEMPERATURE_K, GAS_CONSTANT_J_PER_MOL_K,
    SEA_LEVEL_PRESSURE_PA,
};

pub use sensors::{TEMP_SENSOR_MAX_C, TEMP_SENSOR_MIN_C};

pub use time::{DEFAULT_ZERO_RUN_DURATION_S, DEFAULT_ZERO_RUN_EXTENSION_S};

pub use buffers::{DEFAULT_PLOT_WINDOW_S, DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE, MIN_WINDOW_SIZE};

pub use estimation::{DEFAULT_ANOMALOUS_ZERO_SLOPE_PPM_S, DEFAULT_CONFIDENCE_Z};

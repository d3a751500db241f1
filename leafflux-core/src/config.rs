//! Session configuration
//!
//! Every tunable parameter of a measurement session. Built once before the
//! session starts and checked with [`Configuration::validate`]; only the leaf
//! area can change afterwards, through a validated command.
//!
//! With the `serde` feature every struct deserializes with field-level
//! defaults, so a TOML file only needs the values that differ.

use crate::conditioning::SignalConditioner;
use crate::constants::buffers::{
    DEFAULT_PLOT_WINDOW_S, DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE, MIN_WINDOW_SIZE,
};
use crate::constants::estimation::{
    DEFAULT_ANOMALOUS_ZERO_SLOPE_PPM_S, DEFAULT_CONFIDENCE_Z, DEFAULT_LOW_PASS_CUTOFF_HZ,
    DEFAULT_LOW_PASS_ORDER, DEFAULT_MEDIAN_KERNEL, DEFAULT_SAVGOL_ORDER, DEFAULT_SAVGOL_WINDOW,
};
use crate::constants::physics::{CELSIUS_TO_KELVIN, SEA_LEVEL_PRESSURE_PA};
use crate::constants::sensors::{
    DEFAULT_IDLE_BACKOFF_S, DEFAULT_POLL_INTERVAL_S, DEFAULT_SENSOR_RETRIES,
    HUMIDITY_SENSOR_MAX_PCT, HUMIDITY_SENSOR_MIN_PCT, TEMP_SENSOR_MAX_C, TEMP_SENSOR_MIN_C,
};
use crate::constants::time::{DEFAULT_ZERO_RUN_DURATION_S, DEFAULT_ZERO_RUN_EXTENSION_S};
use crate::drift::ZeroDriftTracker;
use crate::errors::ConfigError;
use crate::flux::{self, FluxBasis, FluxConverter};
use crate::humidity::HumidityCorrector;
use crate::pipeline::FluxPipeline;
use crate::regression::{RegressionKind, SlopeEstimator};

/// Acceptance limits applied to every raw reading
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SampleLimits {
    /// Lowest accepted temperature (°C)
    pub temperature_min_c: f64,
    /// Highest accepted temperature (°C)
    pub temperature_max_c: f64,
    /// Humidity clamp floor (%)
    pub humidity_min_pct: f64,
    /// Humidity clamp ceiling (%)
    pub humidity_max_pct: f64,
}

impl Default for SampleLimits {
    fn default() -> Self {
        Self {
            temperature_min_c: TEMP_SENSOR_MIN_C,
            temperature_max_c: TEMP_SENSOR_MAX_C,
            humidity_min_pct: HUMIDITY_SENSOR_MIN_PCT,
            humidity_max_pct: HUMIDITY_SENSOR_MAX_PCT,
        }
    }
}

/// Parameters of the conditioning cascade
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConditioningConfig {
    /// Run the median filter
    pub median_enabled: bool,
    /// Median kernel (samples, odd)
    pub median_kernel: usize,
    /// Run the Savitzky–Golay smoother
    pub savgol_enabled: bool,
    /// Smoother window (samples, odd)
    pub savgol_window: usize,
    /// Smoother polynomial order
    pub savgol_order: usize,
    /// Run the Butterworth low-pass
    pub low_pass_enabled: bool,
    /// Low-pass cutoff (Hz)
    pub low_pass_cutoff_hz: f64,
    /// Low-pass order
    pub low_pass_order: usize,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            median_enabled: true,
            median_kernel: DEFAULT_MEDIAN_KERNEL,
            savgol_enabled: true,
            savgol_window: DEFAULT_SAVGOL_WINDOW,
            savgol_order: DEFAULT_SAVGOL_ORDER,
            low_pass_enabled: true,
            low_pass_cutoff_hz: DEFAULT_LOW_PASS_CUTOFF_HZ,
            low_pass_order: DEFAULT_LOW_PASS_ORDER,
        }
    }
}

/// Plant pot inside the chamber, subtracted from the chamber volume
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "shape", rename_all = "lowercase"))]
pub enum PotGeometry {
    /// Rectangular pot
    Box {
        /// Width (cm)
        width_cm: f64,
        /// Height (cm)
        height_cm: f64,
        /// Length (cm)
        length_cm: f64,
    },
    /// Square pot with sloped sides
    Frustum {
        /// Side of the top opening (cm)
        top_width_cm: f64,
        /// Side of the base (cm)
        base_width_cm: f64,
        /// Height (cm)
        height_cm: f64,
    },
}

impl PotGeometry {
    /// Pot volume (L)
    pub fn volume_l(&self) -> f64 {
        match *self {
            Self::Box {
                width_cm,
                height_cm,
                length_cm,
            } => flux::box_volume_l(width_cm, height_cm, length_cm),
            Self::Frustum {
                top_width_cm,
                base_width_cm,
                height_cm,
            } => flux::frustum_volume_l(top_width_cm, base_width_cm, height_cm),
        }
    }

    fn dimensions(&self) -> [f64; 3] {
        match *self {
            Self::Box {
                width_cm,
                height_cm,
                length_cm,
            } => [width_cm, height_cm, length_cm],
            Self::Frustum {
                top_width_cm,
                base_width_cm,
                height_cm,
            } => [top_width_cm, base_width_cm, height_cm],
        }
    }
}

/// Everything a session needs to know before it starts
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Configuration {
    // --- Chamber ---
    /// Chamber air volume (L), before pot subtraction
    pub chamber_volume_l: f64,
    /// Pot occupying part of the chamber
    pub pot: Option<PotGeometry>,
    /// Projected leaf area (cm²)
    pub leaf_area_cm2: f64,
    /// Report per leaf area (µmol m⁻² s⁻¹) instead of per chamber (µmol s⁻¹)
    pub area_basis: bool,
    /// Air pressure (Pa)
    pub pressure_pa: f64,
    /// Fixed chamber temperature (°C) instead of the sensor reading
    pub temperature_override_c: Option<f64>,
    /// Respiration offset added to negative fluxes
    pub soil_respiration_correction: f64,

    // --- Estimation ---
    /// Regression window (samples)
    pub window_size: usize,
    /// Regression method
    pub regression: RegressionKind,
    /// Reference CO₂ to dry air before fitting
    pub dry_correction: bool,
    /// Master switch for the conditioning cascade
    pub smoothing_enabled: bool,
    /// Cascade parameters
    pub conditioning: ConditioningConfig,
    /// Normal quantile for the slope interval
    pub confidence_z: f64,

    // --- Zero run ---
    /// Minimum zero-run length (s)
    pub zero_run_duration_s: f64,
    /// Extension on a short or rejected zero run (s)
    pub zero_run_extension_s: f64,
    /// Largest acceptable zero-run slope magnitude (ppm/s)
    pub anomalous_zero_slope_ppm_s: f64,

    // --- Output ---
    /// Live series horizon (s)
    pub plot_window_s: f64,

    // --- Acquisition ---
    /// Reading acceptance limits
    pub limits: SampleLimits,
    /// Poll interval while measuring (s)
    pub poll_interval_s: f64,
    /// Back-off while idle (s)
    pub idle_backoff_s: f64,
    /// Attempts per reading before it is skipped
    pub sensor_retries: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            // Chamber
            chamber_volume_l: 1.2,
            pot: None,
            leaf_area_cm2: 100.0,
            area_basis: true,
            pressure_pa: SEA_LEVEL_PRESSURE_PA,
            temperature_override_c: None,
            soil_respiration_correction: 0.0,

            // Estimation
            window_size: DEFAULT_WINDOW_SIZE,
            regression: RegressionKind::Ordinary,
            dry_correction: true,
            smoothing_enabled: false,
            conditioning: ConditioningConfig::default(),
            confidence_z: DEFAULT_CONFIDENCE_Z,

            // Zero run
            zero_run_duration_s: DEFAULT_ZERO_RUN_DURATION_S,
            zero_run_extension_s: DEFAULT_ZERO_RUN_EXTENSION_S,
            anomalous_zero_slope_ppm_s: DEFAULT_ANOMALOUS_ZERO_SLOPE_PPM_S,

            // Output
            plot_window_s: DEFAULT_PLOT_WINDOW_S,

            // Acquisition
            limits: SampleLimits::default(),
            poll_interval_s: DEFAULT_POLL_INTERVAL_S,
            idle_backoff_s: DEFAULT_IDLE_BACKOFF_S,
            sensor_retries: DEFAULT_SENSOR_RETRIES,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

fn odd(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value % 2 == 1 {
        Ok(())
    } else {
        Err(ConfigError::EvenWindow { field, value })
    }
}

/// Check a leaf area (cm²) for use on the area basis
pub fn validate_leaf_area(leaf_area_cm2: f64) -> Result<f64, ConfigError> {
    positive("leaf_area_cm2", leaf_area_cm2).map(|()| leaf_area_cm2)
}

impl Configuration {
    /// Reject configurations a session cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&self.window_size) {
            return Err(ConfigError::WindowSizeOutOfRange {
                size: self.window_size,
                min: MIN_WINDOW_SIZE,
                max: MAX_WINDOW_SIZE,
            });
        }

        positive("chamber_volume_l", self.chamber_volume_l)?;
        if let Some(pot) = &self.pot {
            for dim in pot.dimensions() {
                positive("pot dimension", dim)?;
            }
        }
        positive("effective_volume_l", self.effective_volume_l())?;
        validate_leaf_area(self.leaf_area_cm2)?;
        positive("pressure_pa", self.pressure_pa)?;
        if let Some(t) = self.temperature_override_c {
            positive("temperature_override_k", t + CELSIUS_TO_KELVIN)?;
        }
        if !self.soil_respiration_correction.is_finite() {
            return Err(ConfigError::Inconsistent {
                reason: "soil_respiration_correction is not finite",
            });
        }

        non_negative("confidence_z", self.confidence_z)?;
        positive("zero_run_duration_s", self.zero_run_duration_s)?;
        positive("zero_run_extension_s", self.zero_run_extension_s)?;
        non_negative("anomalous_zero_slope_ppm_s", self.anomalous_zero_slope_ppm_s)?;
        positive("plot_window_s", self.plot_window_s)?;
        positive("poll_interval_s", self.poll_interval_s)?;
        positive("idle_backoff_s", self.idle_backoff_s)?;

        let c = &self.conditioning;
        odd("median_kernel", c.median_kernel)?;
        odd("savgol_window", c.savgol_window)?;
        if c.savgol_order >= c.savgol_window {
            return Err(ConfigError::Inconsistent {
                reason: "savgol_order must be below savgol_window",
            });
        }
        positive("low_pass_cutoff_hz", c.low_pass_cutoff_hz)?;
        if c.low_pass_order == 0 {
            return Err(ConfigError::Inconsistent {
                reason: "low_pass_order must be at least 1",
            });
        }

        let l = &self.limits;
        if !(l.temperature_min_c < l.temperature_max_c) {
            return Err(ConfigError::Inconsistent {
                reason: "temperature limits are empty or inverted",
            });
        }
        if !(l.humidity_min_pct <= l.humidity_max_pct) {
            return Err(ConfigError::Inconsistent {
                reason: "humidity limits are inverted",
            });
        }

        Ok(())
    }

    /// Chamber volume minus the pot (L)
    pub fn effective_volume_l(&self) -> f64 {
        let pot = self.pot.as_ref().map_or(0.0, PotGeometry::volume_l);
        self.chamber_volume_l - pot
    }

    /// Reporting basis for the configured leaf area
    pub fn flux_basis(&self) -> FluxBasis {
        if self.area_basis {
            FluxBasis::Area {
                leaf_area_cm2: self.leaf_area_cm2,
            }
        } else {
            FluxBasis::Chamber
        }
    }

    /// Flux converter for this chamber
    pub fn flux_converter(&self) -> FluxConverter {
        FluxConverter::new(self.effective_volume_l(), self.pressure_pa, self.flux_basis())
            .with_temperature_override(self.temperature_override_c)
            .with_respiration_correction(self.soil_respiration_correction)
    }

    /// Dry-air corrector at the configured pressure
    pub fn humidity_corrector(&self) -> HumidityCorrector {
        HumidityCorrector::new(self.pressure_pa)
    }

    /// Slope estimator for the configured method
    pub fn slope_estimator(&self) -> SlopeEstimator {
        SlopeEstimator::new(self.regression)
    }

    /// Conditioning cascade
    pub fn signal_conditioner(&self) -> SignalConditioner {
        SignalConditioner::from_config(self.smoothing_enabled, &self.conditioning)
    }

    /// Zero-run state machine
    pub fn drift_tracker(&self) -> ZeroDriftTracker {
        ZeroDriftTracker::new(
            self.zero_run_duration_s,
            self.zero_run_extension_s,
            self.anomalous_zero_slope_ppm_s,
            self.window_size,
        )
    }

    /// Evaluation chain
    pub fn pipeline(&self) -> FluxPipeline {
        FluxPipeline::new(
            self.dry_correction.then(|| self.humidity_corrector()),
            self.signal_conditioner(),
            self.slope_estimator(),
            self.confidence_z,
        )
    }
}

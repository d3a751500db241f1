//! Error Types for the Estimation Core
//!
//! ## Design Philosophy
//!
//! Nothing that can go wrong while a chamber is being measured is fatal.
//! Every failure here maps to one of a small set of responses:
//!
//! 1. **Drop the reading** (`ValidationError`): the sample never enters the
//!    window, the window is left as it was.
//! 2. **No result this tick** (`EstimationError`): the window is too short or
//!    degenerate; the next sample may fix it.
//! 3. **Refuse before starting** (`ConfigError`): the session is never built
//!    from an invalid configuration.
//! 4. **Tell the operator** (`CommandError`): a mode change that would break
//!    the zero-run/logging exclusion is refused, and the message is shown
//!    as-is.
//!
//! All variants carry inline data only (`&'static str` labels, numbers) so
//! they are `Copy` and usable without an allocator in the hot path.
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use leafflux_core::{PushOutcome, RawSample, SampleBuffer, SampleLimits, ValidationError};
//!
//! let mut window = SampleBuffer::new(12).unwrap();
//! let raw = RawSample { co2_ppm: -3.0, temperature_c: 22.0, humidity_pct: 50.0 };
//!
//! match window.offer(1.0, raw, &SampleLimits::default()) {
//!     PushOutcome::Accepted { .. } => {}
//!     PushOutcome::Rejected(ValidationError::NonPositiveConcentration { .. }) => {
//!         // Sensor glitch: skip it, keep measuring
//!     }
//!     PushOutcome::Rejected(_) => {}
//! }
//! assert!(window.is_empty());
//! ```

use thiserror_no_std::Error;

/// Result type for sample validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Why a sample was refused entry into the window
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ValidationError {
    /// CO₂ reading is zero or negative (sensor not ready, bus glitch)
    #[error("CO2 reading {value} ppm is not positive")]
    NonPositiveConcentration {
        /// The rejected reading
        value: f64,
    },

    /// A field is NaN or infinite
    #[error("{field} is not a finite number")]
    InvalidValue {
        /// Which field failed
        field: &'static str,
    },

    /// Value outside the sensor's specified operating range
    #[error("{field} {value} outside range [{min}, {max}]")]
    OutOfRange {
        /// Which field failed
        field: &'static str,
        /// The rejected reading
        value: f64,
        /// Lower limit
        min: f64,
        /// Upper limit
        max: f64,
    },

    /// Timestamp not strictly after the newest sample in the window
    #[error("timestamp {received} does not follow {previous}")]
    NonIncreasingTimestamp {
        /// Newest timestamp already in the window
        previous: f64,
        /// Timestamp of the refused sample
        received: f64,
    },
}

/// Why a slope could not be estimated on this tick
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum EstimationError {
    /// Not enough points for a fit with a residual degree of freedom
    #[error("insufficient data: need {required}, have {available}")]
    InsufficientData {
        /// Minimum number of points
        required: usize,
        /// Points supplied
        available: usize,
    },

    /// Time and concentration vectors differ in length
    #[error("length mismatch: {times} times, {values} values")]
    LengthMismatch {
        /// Length of the time vector
        times: usize,
        /// Length of the value vector
        values: usize,
    },

    /// Every timestamp is identical, so the slope is undefined
    #[error("time axis has zero spread")]
    DegenerateAbscissa,

    /// A NaN or infinity reached the fit
    #[error("non-finite value in {stage}")]
    NonFinite {
        /// Stage that produced or received it
        stage: &'static str,
    },
}

/// Configuration rejected before a session starts
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Window size outside what the fixed-capacity buffer supports
    #[error("window size {size} outside [{min}, {max}]")]
    WindowSizeOutOfRange {
        /// Requested size
        size: usize,
        /// Smallest supported window
        min: usize,
        /// Largest supported window
        max: usize,
    },

    /// A quantity that must be strictly positive is not
    #[error("{field} must be greater than zero (got {value})")]
    NotPositive {
        /// Offending field
        field: &'static str,
        /// Value supplied
        value: f64,
    },

    /// A quantity that must be finite and non-negative is not
    #[error("{field} must be non-negative (got {value})")]
    Negative {
        /// Offending field
        field: &'static str,
        /// Value supplied
        value: f64,
    },

    /// A filter window that must be odd is even
    #[error("{field} must be odd (got {value})")]
    EvenWindow {
        /// Offending field
        field: &'static str,
        /// Value supplied
        value: usize,
    },

    /// A pair of settings is inconsistent
    #[error("invalid configuration: {reason}")]
    Inconsistent {
        /// What is wrong
        reason: &'static str,
    },
}

/// A mode command was refused; the session state is unchanged
///
/// The Display text is meant to be shown to the operator verbatim.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CommandError {
    /// `StartZeroRun` while a zero run is active
    #[error("Zero run already in progress.")]
    ZeroRunInProgress,

    /// `StartZeroRun` while logging
    #[error("Stop logging before starting zero run.")]
    LoggingActive,

    /// `StartLogging` while a zero run is active
    #[error("Wait for zero calibration to finish before logging.")]
    ZeroRunActive,

    /// `StartLogging` while already logging
    #[error("Logging already in progress.")]
    LoggingInProgress,

    /// `StopLogging` while not logging
    #[error("Logging is not active.")]
    NotLogging,

    /// `CancelZeroRun` with no zero run active
    #[error("No zero run in progress.")]
    NoZeroRun,

    /// Leaf area change with a non-positive or non-finite value
    #[error("Leaf area must be greater than zero (got {value} cm2).")]
    InvalidLeafArea {
        /// Value supplied
        value: f64,
    },

    /// Any command after `Stop`
    #[error("Session has been stopped.")]
    Stopped,
}

/// Any error the core can produce
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum LeafFluxError {
    /// Sample validation failed
    #[error("validation: {0}")]
    Validation(ValidationError),

    /// Slope estimation failed
    #[error("estimation: {0}")]
    Estimation(EstimationError),

    /// Configuration rejected
    #[error("configuration: {0}")]
    Config(ConfigError),

    /// Mode command refused
    #[error("{0}")]
    Command(CommandError),
}

impl From<ValidationError> for LeafFluxError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<EstimationError> for LeafFluxError {
    fn from(err: EstimationError) -> Self {
        Self::Estimation(err)
    }
}

impl From<ConfigError> for LeafFluxError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<CommandError> for LeafFluxError {
    fn from(err: CommandError) -> Self {
        Self::Command(err)
    }
}

//! Core estimation engine for leafflux
//!
//! Turns a stream of CO₂/temperature/humidity readings from a closed chamber
//! into a live net assimilation rate (A_net) with a confidence band.
//!
//! ```text
//! RawSample → SampleBuffer → dry correction → SignalConditioner
//!           → SlopeEstimator → ZeroDriftTracker → FluxConverter → LiveSeries
//! ```
//!
//! Key constraints:
//! - The window never grows past its configured capacity (fixed storage)
//! - Bad readings are dropped and logged, never fatal
//! - Every stage is a pure function of a window snapshot, so estimation can
//!   run outside whatever lock guards the acquisition state
//!
//! ```no_run
//! use leafflux_core::{Configuration, RawSample, Session};
//!
//! let mut session = Session::new(Configuration::default())?;
//! session.start_logging(1_700_000_000.0)?;
//!
//! let raw = RawSample { co2_ppm: 412.0, temperature_c: 24.1, humidity_pct: 55.0 };
//! let outcome = session.step(1_700_000_000.0, raw);
//! if let Some(estimate) = outcome.estimate() {
//!     println!("A_net = {:+.2}", estimate.flux.value);
//! }
//! # Ok::<(), leafflux_core::LeafFluxError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

// Logging compiles out entirely without the `log` feature
#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_info {
    ($($arg:tt)*) => { log::info!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_info {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

pub mod buffer;
pub mod conditioning;
pub mod config;
pub mod constants;
pub mod drift;
pub mod errors;
pub mod flux;
pub mod humidity;
pub mod pipeline;
pub mod regression;
pub mod series;
pub mod session;
pub mod soil;
pub mod time;
pub mod traits;
pub mod validators;

// Public API
pub use buffer::{PushOutcome, SampleBuffer, WindowSnapshot};
pub use conditioning::SignalConditioner;
pub use config::{ConditioningConfig, Configuration, PotGeometry, SampleLimits};
pub use drift::{DriftBaseline, DriftProgress, ExtensionReason, ZeroDriftTracker};
pub use errors::{
    CommandError, ConfigError, EstimationError, LeafFluxError, ValidationError, ValidationResult,
};
pub use flux::{FluxBasis, FluxConverter, FluxEstimate};
pub use humidity::HumidityCorrector;
pub use pipeline::{Evaluation, FluxPipeline, SlopeInterval};
pub use regression::{RegressionKind, RegressionResult, SlopeEstimator};
pub use series::{EnvironmentPoint, LiveSeries};
pub use session::{
    Command, CommandOutcome, Mode, Session, SessionSnapshot, StepOutcome, Tick, WindowJob,
    ZeroRunStatus,
};
pub use soil::SoilRespirationEstimator;
pub use time::Timestamp;
pub use traits::{ConditioningStage, Timestamped};
pub use validators::{RawSample, Sample};

/// Crate version, for log banners and CSV metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

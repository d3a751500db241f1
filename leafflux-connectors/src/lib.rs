//! Acquisition Edge for leafflux
//!
//! ## Overview
//!
//! Everything between the estimation core and the outside world:
//!
//! ```text
//!  Sensor ──read_with_retry──► acquisition thread ──► Session (Mutex)
//!                                   │    ▲                 │
//!                          RowSink ◄┘    │ Command         │ ChartFrame
//!                       (CSV, console)   │ (mpsc)          ▼
//!                                   operator ◄── Notice ── render loop ──► ChartSink
//! ```
//!
//! ## Components
//!
//! - [`sensor`]: the sensor collaborator trait and the retry boundary
//! - [`simulated`]: a chamber model standing in for hardware
//! - [`sinks`]: CSV and console row sinks
//! - [`chart`]: frames handed to a renderer
//! - [`runtime`]: the two-thread acquisition runtime
//! - [`settings`]: TOML run settings
//!
//! ## Error Boundary
//!
//! The core reports typed errors without allocation. This crate wraps them
//! with I/O, CSV and TOML failures into [`ConnectorError`]; the binary
//! converts that to `anyhow` at the very top.
//!
//! ## Example Usage
//!
//! ```no_run
//! use leafflux_connectors::{runtime::Runtime, simulated::SimulatedChamber};
//! use leafflux_core::{time::SystemClock, Command, Configuration};
//!
//! let chamber = SimulatedChamber::new(Default::default());
//! let runtime = Runtime::start(Configuration::default(), chamber, SystemClock, Vec::new())?;
//! runtime.send(Command::StartLogging)?;
//! let frame = runtime.frame();
//! println!("{}", frame.status_line());
//! runtime.shutdown()?;
//! # Ok::<(), leafflux_connectors::ConnectorError>(())
//! ```

pub mod chart;
pub mod runtime;
pub mod sensor;
pub mod settings;
pub mod simulated;
pub mod sinks;

// Re-export common types
pub use chart::{ChartFrame, ChartSink, FrameRecorder};
pub use runtime::{Notice, Runtime, RuntimeHandle, RuntimeOptions};
pub use sensor::{read_with_retry, Sensor, SensorError, SensorStats};
pub use settings::Settings;
pub use simulated::{LeafSwitch, SimulatedChamber, SimulationParams};
pub use sinks::{ConsoleSink, CsvSink, LogRow, RowSink, TimeFormat};

use leafflux_core::LeafFluxError;
use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Sensor failure that could not be retried away
    #[error("sensor: {0}")]
    Sensor(#[from] SensorError),

    /// Core rejected a configuration or command
    #[error(transparent)]
    Core(#[from] LeafFluxError),

    /// File or stream I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Settings file could not be parsed
    #[error("settings: {0}")]
    Settings(#[from] toml::de::Error),

    /// Settings could not be rendered as TOML
    #[error("settings: {0}")]
    SettingsOutput(#[from] toml::ser::Error),

    /// The acquisition thread is gone
    #[error("acquisition thread has stopped")]
    Disconnected,

    /// The acquisition thread panicked
    #[error("acquisition thread panicked")]
    Panicked,
}

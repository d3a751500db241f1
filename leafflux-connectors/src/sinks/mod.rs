//! Row Sinks
//!
//! One [`LogRow`] per estimate, written in order by the acquisition thread
//! after the session lock is released. A sink failure is logged and the
//! session keeps running; losing an output file never stops acquisition.

mod console;
mod csv;

pub use self::console::ConsoleSink;
pub use self::csv::{CsvSink, TimeFormat};

use leafflux_core::{Evaluation, Timestamp};

use crate::ConnectorError;

/// One output record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRow {
    /// End of the window
    pub timestamp: Timestamp,
    /// Newest CO₂ reading (ppm)
    pub co2_ppm: f64,
    /// Newest temperature (°C)
    pub temperature_c: f64,
    /// Newest relative humidity (%)
    pub humidity_pct: f64,
    /// Vapour pressure deficit (kPa)
    pub vpd_kpa: f64,
    /// Net assimilation
    pub a_net: f64,
    /// Lower bound of A_net
    pub a_net_lower: f64,
    /// Upper bound of A_net
    pub a_net_upper: f64,
}

impl From<&Evaluation> for LogRow {
    fn from(evaluation: &Evaluation) -> Self {
        Self {
            timestamp: evaluation.flux.timestamp,
            co2_ppm: evaluation.co2_ppm,
            temperature_c: evaluation.temperature_c,
            humidity_pct: evaluation.humidity_pct,
            vpd_kpa: evaluation.vpd_kpa,
            a_net: evaluation.flux.value,
            a_net_lower: evaluation.flux.lower,
            a_net_upper: evaluation.flux.upper,
        }
    }
}

/// Destination for estimate rows
pub trait RowSink: Send {
    /// Write one row; it must be durable when this returns
    fn write_row(&mut self, row: &LogRow) -> Result<(), ConnectorError>;

    /// Flush anything still buffered
    fn flush(&mut self) -> Result<(), ConnectorError>;
}

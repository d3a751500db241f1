use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use leafflux_core::Timestamp;

use super::{LogRow, RowSink};
use crate::ConnectorError;

/// Column order of every CSV log
pub const CSV_HEADER: [&str; 6] = ["time", "co2", "temp", "rh", "vpd", "a_net"];

/// How the `time` column is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFormat {
    /// UTC ISO 8601 with milliseconds; timestamps are Unix seconds
    #[default]
    Iso8601,
    /// Seconds as recorded, for clocks that do not count from the epoch
    Seconds,
}

impl TimeFormat {
    fn render(self, timestamp: Timestamp) -> String {
        match self {
            Self::Iso8601 => {
                let secs = timestamp.floor();
                let nanos = ((timestamp - secs) * 1e9).round().min(999_999_999.0) as u32;
                DateTime::<Utc>::from_timestamp(secs as i64, nanos)
                    .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
                    .unwrap_or_else(|| format!("{:.3}", timestamp))
            }
            Self::Seconds => format!("{:.3}", timestamp),
        }
    }
}

/// CSV log, one flushed row per estimate
pub struct CsvSink<W: Write> {
    writer: ::csv::Writer<W>,
    time_format: TimeFormat,
    rows: u64,
}

impl CsvSink<File> {
    /// Create (or truncate) `path` and write the header
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, ConnectorError> {
        let file = File::create(path.as_ref())?;
        log::info!("logging to {}", path.as_ref().display());
        Self::new(file, TimeFormat::Iso8601)
    }
}

impl<W: Write> CsvSink<W> {
    /// Wrap `writer` and write the header
    pub fn new(writer: W, time_format: TimeFormat) -> Result<Self, ConnectorError> {
        let mut writer = ::csv::Writer::from_writer(writer);
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;
        Ok(Self {
            writer,
            time_format,
            rows: 0,
        })
    }

    /// Rows written so far
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and hand back the writer
    pub fn into_inner(self) -> Result<W, ConnectorError> {
        self.writer
            .into_inner()
            .map_err(|err| ConnectorError::Io(err.into_error()))
    }
}

impl<W: Write + Send> RowSink for CsvSink<W> {
    fn write_row(&mut self, row: &LogRow) -> Result<(), ConnectorError> {
        self.writer.write_record([
            self.time_format.render(row.timestamp),
            format!("{:.2}", row.co2_ppm),
            format!("{:.2}", row.temperature_c),
            format!("{:.2}", row.humidity_pct),
            format!("{:.3}", row.vpd_kpa),
            format!("{:.4}", row.a_net),
        ])?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConnectorError> {
        self.writer.flush()?;
        Ok(())
    }
}

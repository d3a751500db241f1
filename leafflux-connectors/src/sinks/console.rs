use super::{LogRow, RowSink};
use crate::ConnectorError;

/// Prints each row through the `log` facade
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    unit: &'static str,
}

impl ConsoleSink {
    /// Sink labelling A_net with `unit`
    pub fn new(unit: &'static str) -> Self {
        Self { unit }
    }
}

impl RowSink for ConsoleSink {
    fn write_row(&mut self, row: &LogRow) -> Result<(), ConnectorError> {
        log::info!(
            "CO2 {:.1} ppm | T {:.1} °C | RH {:.1} % | VPD {:.2} kPa | A_net {:.2} [{:.2}, {:.2}] {}",
            row.co2_ppm,
            row.temperature_c,
            row.humidity_pct,
            row.vpd_kpa,
            row.a_net,
            row.a_net_lower,
            row.a_net_upper,
            self.unit
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

//! Run Settings
//!
//! One TOML file describes a run: the session configuration, the simulated
//! chamber, outputs and run control. Every table and field has a default,
//! so a file only lists what differs:
//!
//! ```toml
//! [session]
//! leaf_area_cm2 = 35.0
//! window_size = 20
//!
//! [session.pot]
//! shape = "box"
//! width_cm = 8.0
//! height_cm = 7.0
//! length_cm = 8.0
//!
//! [output]
//! csv = "leaf.csv"
//!
//! [run]
//! zero_run_first = true
//! ```
//!
//! Command-line flags are applied on top after loading.

use std::fs;
use std::path::{Path, PathBuf};

use leafflux_core::{Configuration, LeafFluxError};
use serde::{Deserialize, Serialize};

use crate::simulated::SimulationParams;
use crate::ConnectorError;

/// Where estimate rows go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// CSV log path
    pub csv: Option<PathBuf>,
    /// Log each row through the console
    pub console: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            csv: None,
            console: true,
        }
    }
}

/// How long and in what order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Stop after this many seconds; run until interrupted when absent
    pub duration_s: Option<f64>,
    /// Take a zero run with the chamber empty before logging
    pub zero_run_first: bool,
    /// Seconds between redraws
    pub frame_interval_s: f64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            duration_s: None,
            zero_run_first: false,
            frame_interval_s: 1.0,
        }
    }
}

/// Everything a `leafflux` run reads from its settings file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Session configuration
    pub session: Configuration,
    /// Simulated chamber
    pub simulation: SimulationParams,
    /// Outputs
    pub output: OutputSettings,
    /// Run control
    pub run: RunSettings,
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConnectorError> {
        let settings: Self = toml::from_str(text)?;
        settings.session.validate().map_err(LeafFluxError::from)?;
        Ok(settings)
    }

    /// Read and parse a settings file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConnectorError> {
        let text = fs::read_to_string(path.as_ref())?;
        log::debug!("loaded settings from {}", path.as_ref().display());
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConnectorError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leafflux_core::{ConfigError, PotGeometry, RegressionKind};

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let text = r#"
            [session]
            leaf_area_cm2 = 35.0
            window_size = 20
            regression = "robust"

            [session.pot]
            shape = "box"
            width_cm = 8.0
            height_cm = 7.0
            length_cm = 8.0

            [output]
            csv = "leaf.csv"
        "#;
        let settings = Settings::from_toml_str(text).unwrap();

        assert_eq!(settings.session.leaf_area_cm2, 35.0);
        assert_eq!(settings.session.window_size, 20);
        assert_eq!(settings.session.regression, RegressionKind::Robust);
        assert_eq!(
            settings.session.pot,
            Some(PotGeometry::Box {
                width_cm: 8.0,
                height_cm: 7.0,
                length_cm: 8.0
            })
        );
        assert_eq!(settings.output.csv, Some(PathBuf::from("leaf.csv")));
        assert!(settings.output.console);
        assert_eq!(settings.session.chamber_volume_l, Configuration::default().chamber_volume_l);
        assert_eq!(settings.simulation, SimulationParams::default());
    }

    #[test]
    fn invalid_configuration_is_refused() {
        let err = Settings::from_toml_str("[session]\nleaf_area_cm2 = -1.0\n").unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Core(LeafFluxError::Config(ConfigError::NotPositive { .. }))
        ));
    }

    #[test]
    fn unparseable_toml_is_a_settings_error() {
        let err = Settings::from_toml_str("[session\n").unwrap_err();
        assert!(matches!(err, ConnectorError::Settings(_)));
    }
}

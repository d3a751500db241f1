//! Sensor Collaborator Boundary
//!
//! ## Overview
//!
//! Drivers for the SCD4x (I2C) and PAS CO2 (serial) families live outside
//! this workspace. They plug in through [`Sensor`], which exposes only what
//! the acquisition loop needs: bring-up, one reading at a time,
//! calibration control and shutdown.
//!
//! ## Failure Classes
//!
//! | Error            | Class     | Handling                                  |
//! |------------------|-----------|-------------------------------------------|
//! | `NoResponse`     | transient | retried, then the reading is skipped      |
//! | `Malformed`      | transient | retried, then the reading is skipped      |
//! | `Checksum`       | transient | retried, then the reading is skipped      |
//! | `Io` (timeout)   | transient | retried, then the reading is skipped      |
//! | `NotConnected`   | fatal     | session aborts                            |
//! | `Initialization` | fatal     | session never starts                      |
//! | `Io` (other)     | fatal     | session aborts                            |
//!
//! Retries happen here, at the boundary, so the runtime only ever sees a
//! reading, "nothing fresh yet", or a failure it should act on.

use std::io;
use std::thread;
use std::time::Duration;

use leafflux_core::constants::sensors::{
    FORCED_RECALIBRATION_MAX_PPM, FORCED_RECALIBRATION_MIN_PPM,
};
use leafflux_core::RawSample;
use thiserror::Error;

/// Sensor-specific errors
#[derive(Debug, Error)]
pub enum SensorError {
    /// Port or bus not open
    #[error("sensor not connected")]
    NotConnected,

    /// Bring-up sequence failed
    #[error("sensor initialization failed: {0}")]
    InitializationFailed(String),

    /// Device did not answer in time
    #[error("no response from sensor")]
    NoResponse,

    /// Frame could not be decoded
    #[error("malformed sensor frame: {0}")]
    Malformed(String),

    /// CRC mismatch on a received frame
    #[error("sensor checksum mismatch")]
    Checksum,

    /// Recalibration target outside the accepted range
    #[error("recalibration target {target_ppm} ppm outside {min}..={max} ppm")]
    RecalibrationOutOfRange {
        /// Requested target
        target_ppm: u16,
        /// Lowest accepted target
        min: u16,
        /// Highest accepted target
        max: u16,
    },

    /// Underlying transport error
    #[error("sensor I/O: {0}")]
    Io(#[from] io::Error),
}

impl SensorError {
    /// Whether retrying the same operation can succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NoResponse | Self::Malformed(_) | Self::Checksum => true,
            Self::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
            Self::NotConnected
            | Self::InitializationFailed(_)
            | Self::RecalibrationOutOfRange { .. } => false,
        }
    }
}

/// Check a forced-recalibration target against the accepted range
pub fn check_recalibration_target(target_ppm: u16) -> Result<u16, SensorError> {
    if (FORCED_RECALIBRATION_MIN_PPM..=FORCED_RECALIBRATION_MAX_PPM).contains(&target_ppm) {
        Ok(target_ppm)
    } else {
        Err(SensorError::RecalibrationOutOfRange {
            target_ppm,
            min: FORCED_RECALIBRATION_MIN_PPM,
            max: FORCED_RECALIBRATION_MAX_PPM,
        })
    }
}

/// Trait for CO₂/temperature/humidity sensors
pub trait Sensor: Send {
    /// Open the port or bus
    fn connect(&mut self) -> Result<(), SensorError>;

    /// Put the device into its measurement mode
    fn initialize(&mut self) -> Result<(), SensorError>;

    /// Read one sample; `Ok(None)` when no fresh reading is available yet
    fn read_sample(&mut self) -> Result<Option<RawSample>, SensorError>;

    /// Enable or disable automatic self-calibration
    fn set_auto_calibration(&mut self, enabled: bool) -> Result<(), SensorError>;

    /// Force the baseline to `target_ppm` (sensor must be in that air)
    fn force_recalibration(&mut self, target_ppm: u16) -> Result<(), SensorError>;

    /// Stop measuring and release the port
    fn close(&mut self) -> Result<(), SensorError>;
}

/// Read counters kept by the acquisition loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SensorStats {
    /// Fresh readings returned
    pub readings: u64,
    /// Polls that found nothing new
    pub empty_polls: u64,
    /// Transient failures that were retried
    pub retries: u64,
    /// Readings given up on after all attempts
    pub skipped: u64,
}

/// Read with up to `attempts` tries on transient failures
///
/// Waits `delay`, doubling after each failure. Fatal errors return at once.
pub fn read_with_retry<S: Sensor + ?Sized>(
    sensor: &mut S,
    attempts: u32,
    delay: Duration,
    stats: &mut SensorStats,
) -> Result<Option<RawSample>, SensorError> {
    let attempts = attempts.max(1);
    let mut wait = delay;

    for attempt in 1..=attempts {
        match sensor.read_sample() {
            Ok(Some(raw)) => {
                stats.readings += 1;
                return Ok(Some(raw));
            }
            Ok(None) => {
                stats.empty_polls += 1;
                return Ok(None);
            }
            Err(err) if err.is_transient() && attempt < attempts => {
                log::debug!("sensor read attempt {}/{} failed: {}", attempt, attempts, err);
                stats.retries += 1;
                if !wait.is_zero() {
                    thread::sleep(wait);
                    wait = wait.saturating_mul(2);
                }
            }
            Err(err) => {
                if err.is_transient() {
                    stats.skipped += 1;
                }
                return Err(err);
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a script of read results
    struct Scripted {
        script: VecDeque<Result<Option<RawSample>, SensorError>>,
        reads: usize,
    }

    impl Scripted {
        fn new(script: Vec<Result<Option<RawSample>, SensorError>>) -> Self {
            Self {
                script: script.into(),
                reads: 0,
            }
        }
    }

    impl Sensor for Scripted {
        fn connect(&mut self) -> Result<(), SensorError> {
            Ok(())
        }
        fn initialize(&mut self) -> Result<(), SensorError> {
            Ok(())
        }
        fn read_sample(&mut self) -> Result<Option<RawSample>, SensorError> {
            self.reads += 1;
            self.script.pop_front().unwrap_or(Ok(None))
        }
        fn set_auto_calibration(&mut self, _enabled: bool) -> Result<(), SensorError> {
            Ok(())
        }
        fn force_recalibration(&mut self, target_ppm: u16) -> Result<(), SensorError> {
            check_recalibration_target(target_ppm).map(|_| ())
        }
        fn close(&mut self) -> Result<(), SensorError> {
            Ok(())
        }
    }

    fn sample() -> RawSample {
        RawSample {
            co2_ppm: 415.0,
            temperature_c: 23.0,
            humidity_pct: 45.0,
        }
    }

    #[test]
    fn transient_failures_are_retried() {
        let mut sensor = Scripted::new(vec![
            Err(SensorError::Checksum),
            Err(SensorError::NoResponse),
            Ok(Some(sample())),
        ]);
        let mut stats = SensorStats::default();

        let read = read_with_retry(&mut sensor, 3, Duration::ZERO, &mut stats).unwrap();
        assert_eq!(read, Some(sample()));
        assert_eq!(sensor.reads, 3);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.readings, 1);
    }

    #[test]
    fn exhausted_retries_skip_the_reading() {
        let mut sensor = Scripted::new(vec![
            Err(SensorError::Checksum),
            Err(SensorError::Checksum),
            Ok(Some(sample())),
        ]);
        let mut stats = SensorStats::default();

        let err = read_with_retry(&mut sensor, 2, Duration::ZERO, &mut stats).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(stats.skipped, 1);
        assert_eq!(sensor.reads, 2);
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let mut sensor = Scripted::new(vec![Err(SensorError::NotConnected)]);
        let mut stats = SensorStats::default();

        let err = read_with_retry(&mut sensor, 5, Duration::ZERO, &mut stats).unwrap_err();
        assert!(matches!(err, SensorError::NotConnected));
        assert_eq!(sensor.reads, 1);
        assert_eq!(stats, SensorStats::default());
    }

    #[test]
    fn io_timeouts_are_transient() {
        let timeout = SensorError::from(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        let broken = SensorError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(timeout.is_transient());
        assert!(!broken.is_transient());
    }

    #[test]
    fn recalibration_target_is_range_checked() {
        assert_eq!(check_recalibration_target(420).unwrap(), 420);
        assert!(matches!(
            check_recalibration_target(5000),
            Err(SensorError::RecalibrationOutOfRange { target_ppm: 5000, .. })
        ));
    }
}

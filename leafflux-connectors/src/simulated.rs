//! Simulated Chamber Sensor
//!
//! Stands in for an SCD4x/PAS CO2 when no hardware is attached, and drives
//! the integration tests. The model is a sealed chamber:
//!
//! ```text
//! dCO₂/dt = drift + uptake · [leaf present]        (ppm/s, floored at Γ*)
//! dRH/dt  = transpiration · [leaf present]         (%/s, capped at 100)
//! reading = CO₂ + offset + N(0, noise²)
//! ```
//!
//! Readings refresh every `refresh_interval_s` of clock time, like the
//! sensors' periodic measurement mode; polling faster returns `Ok(None)`.
//! With `glitch_probability > 0` some reads fail with a checksum error so
//! the retry path gets exercised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use leafflux_core::time::{MonotonicClock, TimeSource, Timestamp};
use leafflux_core::RawSample;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::sensor::{check_recalibration_target, Sensor, SensorError};

/// CO₂ compensation point: a leaf cannot draw the chamber below this (ppm)
const COMPENSATION_POINT_PPM: f64 = 50.0;

/// Chamber model parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// CO₂ when the chamber is sealed (ppm)
    pub co2_start_ppm: f64,
    /// CO₂ slope caused by the leaf (ppm/s, negative for net uptake)
    pub uptake_ppm_s: f64,
    /// CO₂ slope of the empty chamber (ppm/s)
    pub drift_ppm_s: f64,
    /// Reading noise standard deviation (ppm)
    pub noise_ppm: f64,
    /// Chamber temperature (°C)
    pub temperature_c: f64,
    /// Starting relative humidity (%)
    pub humidity_pct: f64,
    /// Humidity rise from transpiration (%/s)
    pub transpiration_pct_s: f64,
    /// Chance that a read fails with a checksum error
    pub glitch_probability: f64,
    /// Seconds between fresh readings
    pub refresh_interval_s: f64,
    /// Whether a leaf is in the chamber at start
    pub leaf_present: bool,
    /// RNG seed
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            co2_start_ppm: 420.0,
            uptake_ppm_s: -0.4,
            drift_ppm_s: 0.01,
            noise_ppm: 0.5,
            temperature_c: 24.0,
            humidity_pct: 45.0,
            transpiration_pct_s: 0.02,
            glitch_probability: 0.0,
            refresh_interval_s: 1.0,
            leaf_present: true,
            seed: 7,
        }
    }
}

/// Shared switch for putting the leaf in or taking it out
#[derive(Debug, Clone)]
pub struct LeafSwitch(Arc<AtomicBool>);

impl LeafSwitch {
    /// Put the leaf in (`true`) or take it out
    pub fn set(&self, present: bool) {
        self.0.store(present, Ordering::Release);
    }

    /// Whether the leaf is in
    pub fn is_present(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Simulated closed-chamber sensor
#[derive(Debug)]
pub struct SimulatedChamber<C = MonotonicClock> {
    params: SimulationParams,
    clock: C,
    rng: StdRng,
    leaf: LeafSwitch,
    connected: bool,
    measuring: bool,
    auto_calibration: bool,
    co2_ppm: f64,
    humidity_pct: f64,
    offset_ppm: f64,
    last_update: Option<Timestamp>,
    last_reading: Option<Timestamp>,
}

impl SimulatedChamber<MonotonicClock> {
    /// Chamber on a monotonic clock starting now
    pub fn new(params: SimulationParams) -> Self {
        Self::with_clock(params, MonotonicClock::new())
    }
}

impl<C: TimeSource> SimulatedChamber<C> {
    /// Chamber driven by `clock`
    pub fn with_clock(params: SimulationParams, clock: C) -> Self {
        Self {
            rng: StdRng::seed_from_u64(params.seed),
            leaf: LeafSwitch(Arc::new(AtomicBool::new(params.leaf_present))),
            connected: false,
            measuring: false,
            auto_calibration: true,
            co2_ppm: params.co2_start_ppm,
            humidity_pct: params.humidity_pct,
            offset_ppm: 0.0,
            last_update: None,
            last_reading: None,
            params,
            clock,
        }
    }

    /// Handle for moving the leaf in and out while the chamber runs
    pub fn leaf_switch(&self) -> LeafSwitch {
        self.leaf.clone()
    }

    /// Whether automatic self-calibration is on
    pub fn auto_calibration(&self) -> bool {
        self.auto_calibration
    }

    /// Noise-free CO₂ as the sensor would report it (ppm)
    pub fn true_co2_ppm(&self) -> f64 {
        self.co2_ppm + self.offset_ppm
    }

    fn advance(&mut self, now: Timestamp) {
        let dt = match self.last_update {
            Some(last) if now > last => now - last,
            Some(_) => 0.0,
            None => 0.0,
        };
        self.last_update = Some(now);

        let leaf = self.leaf.is_present();
        let mut rate = self.params.drift_ppm_s;
        if leaf {
            rate += self.params.uptake_ppm_s;
            self.humidity_pct =
                (self.humidity_pct + self.params.transpiration_pct_s * dt).clamp(0.0, 100.0);
        }
        self.co2_ppm = (self.co2_ppm + rate * dt).max(COMPENSATION_POINT_PPM);
    }

    /// Standard normal draw (Box–Muller)
    fn gaussian(&mut self) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

impl<C: TimeSource + Send> Sensor for SimulatedChamber<C> {
    fn connect(&mut self) -> Result<(), SensorError> {
        self.connected = true;
        Ok(())
    }

    fn initialize(&mut self) -> Result<(), SensorError> {
        if !self.connected {
            return Err(SensorError::NotConnected);
        }
        if !(self.params.refresh_interval_s >= 0.0 && self.params.co2_start_ppm > 0.0) {
            return Err(SensorError::InitializationFailed(
                "simulation parameters out of range".into(),
            ));
        }
        self.measuring = true;
        let now = self.clock.now();
        self.last_update = Some(now);
        log::info!("simulated chamber measuring, refresh {} s", self.params.refresh_interval_s);
        Ok(())
    }

    fn read_sample(&mut self) -> Result<Option<RawSample>, SensorError> {
        if !self.connected {
            return Err(SensorError::NotConnected);
        }
        if !self.measuring {
            return Ok(None);
        }

        let now = self.clock.now();
        self.advance(now);

        if let Some(last) = self.last_reading {
            if now - last < self.params.refresh_interval_s {
                return Ok(None);
            }
        }

        let glitch = self.params.glitch_probability.clamp(0.0, 1.0);
        if glitch > 0.0 && self.rng.gen_bool(glitch) {
            return Err(SensorError::Checksum);
        }

        self.last_reading = Some(now);
        let noise = self.params.noise_ppm * self.gaussian();
        Ok(Some(RawSample {
            co2_ppm: self.true_co2_ppm() + noise,
            temperature_c: self.params.temperature_c,
            humidity_pct: self.humidity_pct,
        }))
    }

    fn set_auto_calibration(&mut self, enabled: bool) -> Result<(), SensorError> {
        if !self.connected {
            return Err(SensorError::NotConnected);
        }
        self.auto_calibration = enabled;
        Ok(())
    }

    fn force_recalibration(&mut self, target_ppm: u16) -> Result<(), SensorError> {
        if !self.connected {
            return Err(SensorError::NotConnected);
        }
        let target = check_recalibration_target(target_ppm)?;
        self.offset_ppm = f64::from(target) - self.co2_ppm;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SensorError> {
        self.measuring = false;
        self.connected = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use parking_lot::Mutex;

    /// Clock the test moves by hand
    #[derive(Clone)]
    struct ManualClock(Arc<Mutex<f64>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(0.0)))
        }
        fn set(&self, t: f64) {
            *self.0.lock() = t;
        }
    }

    impl TimeSource for ManualClock {
        fn now(&self) -> Timestamp {
            *self.0.lock()
        }
        fn is_wall_clock(&self) -> bool {
            false
        }
    }

    fn quiet() -> SimulationParams {
        SimulationParams {
            noise_ppm: 0.0,
            drift_ppm_s: 0.0,
            uptake_ppm_s: -0.5,
            transpiration_pct_s: 0.0,
            ..SimulationParams::default()
        }
    }

    fn ready(params: SimulationParams) -> (SimulatedChamber<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut chamber = SimulatedChamber::with_clock(params, clock.clone());
        chamber.connect().unwrap();
        chamber.initialize().unwrap();
        (chamber, clock)
    }

    #[test]
    fn unconnected_sensor_refuses_reads() {
        let mut chamber = SimulatedChamber::new(SimulationParams::default());
        assert!(matches!(chamber.read_sample(), Err(SensorError::NotConnected)));
        assert!(matches!(chamber.initialize(), Err(SensorError::NotConnected)));
    }

    #[test]
    fn readings_follow_the_leaf_slope() {
        let (mut chamber, clock) = ready(quiet());

        let first = chamber.read_sample().unwrap().unwrap();
        clock.set(10.0);
        let second = chamber.read_sample().unwrap().unwrap();

        assert_relative_eq!(first.co2_ppm, 420.0, epsilon = 1e-9);
        assert_relative_eq!(second.co2_ppm, 415.0, epsilon = 1e-9);
    }

    #[test]
    fn polling_faster_than_refresh_returns_nothing() {
        let (mut chamber, clock) = ready(quiet());
        assert!(chamber.read_sample().unwrap().is_some());
        clock.set(0.5);
        assert!(chamber.read_sample().unwrap().is_none());
        clock.set(1.0);
        assert!(chamber.read_sample().unwrap().is_some());
    }

    #[test]
    fn removing_the_leaf_stops_uptake() {
        let (mut chamber, clock) = ready(quiet());
        let leaf = chamber.leaf_switch();
        leaf.set(false);

        chamber.read_sample().unwrap();
        clock.set(20.0);
        let reading = chamber.read_sample().unwrap().unwrap();
        assert_relative_eq!(reading.co2_ppm, 420.0, epsilon = 1e-9);
        assert!(!leaf.is_present());
    }

    #[test]
    fn glitches_surface_as_checksum_errors() {
        let params = SimulationParams {
            glitch_probability: 1.0,
            ..quiet()
        };
        let (mut chamber, _clock) = ready(params);
        let err = chamber.read_sample().unwrap_err();
        assert!(matches!(err, SensorError::Checksum));
        assert!(err.is_transient());
    }

    #[test]
    fn forced_recalibration_shifts_readings() {
        let (mut chamber, clock) = ready(quiet());
        chamber.leaf_switch().set(false);
        chamber.force_recalibration(400).unwrap();

        clock.set(1.0);
        let reading = chamber.read_sample().unwrap().unwrap();
        assert_relative_eq!(reading.co2_ppm, 400.0, epsilon = 1e-9);
        assert!(chamber.force_recalibration(100).is_err());

        chamber.set_auto_calibration(false).unwrap();
        assert!(!chamber.auto_calibration());
    }

    #[test]
    fn same_seed_same_noise() {
        let noisy = SimulationParams {
            noise_ppm: 1.0,
            refresh_interval_s: 0.0,
            ..SimulationParams::default()
        };
        let (mut a, _ca) = ready(noisy);
        let (mut b, _cb) = ready(noisy);
        for _ in 0..5 {
            assert_eq!(a.read_sample().unwrap(), b.read_sample().unwrap());
        }
    }
}

//! Shared generators for integration tests
//!
//! Produces chamber traces with a known CO₂ slope so that tests can check
//! recovered slopes and fluxes against the truth:
//! - linear CO₂ trend plus bounded pseudo-random noise
//! - optional spikes at chosen indices
//! - slowly rising humidity from transpiration

#![allow(dead_code)]

use leafflux_core::{Configuration, RawSample, Session, StepOutcome, Timestamp};

/// Deterministic uniform noise (LCG), reproducible across runs
pub struct Noise {
    seed: u32,
}

impl Noise {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Uniform in `[0, 1]`
    pub fn uniform(&mut self) -> f64 {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.seed as f64 / u32::MAX as f64
    }

    /// Uniform in `[-amplitude, amplitude]`
    pub fn symmetric(&mut self, amplitude: f64) -> f64 {
        (self.uniform() - 0.5) * 2.0 * amplitude
    }
}

/// Parameters of a synthetic chamber trace
#[derive(Debug, Clone)]
pub struct ChamberTrace {
    pub start: Timestamp,
    pub interval_s: f64,
    pub co2_start_ppm: f64,
    pub slope_ppm_s: f64,
    pub noise_ppm: f64,
    pub temperature_c: f64,
    pub humidity_start_pct: f64,
    pub humidity_rise_pct_s: f64,
    pub spikes: Vec<(usize, f64)>,
    pub seed: u32,
}

impl Default for ChamberTrace {
    fn default() -> Self {
        Self {
            start: 1_700_000_000.0,
            interval_s: 1.0,
            co2_start_ppm: 420.0,
            slope_ppm_s: -0.5,
            noise_ppm: 0.0,
            temperature_c: 25.0,
            humidity_start_pct: 0.0,
            humidity_rise_pct_s: 0.0,
            spikes: Vec::new(),
            seed: 42,
        }
    }
}

impl ChamberTrace {
    /// The first `n` readings with their timestamps
    pub fn samples(&self, n: usize) -> Vec<(Timestamp, RawSample)> {
        let mut noise = Noise::new(self.seed);
        (0..n)
            .map(|i| {
                let dt = i as f64 * self.interval_s;
                let spike = self
                    .spikes
                    .iter()
                    .find(|(at, _)| *at == i)
                    .map_or(0.0, |(_, size)| *size);
                let raw = RawSample {
                    co2_ppm: self.co2_start_ppm
                        + self.slope_ppm_s * dt
                        + noise.symmetric(self.noise_ppm)
                        + spike,
                    temperature_c: self.temperature_c,
                    humidity_pct: (self.humidity_start_pct + self.humidity_rise_pct_s * dt)
                        .min(100.0),
                };
                (self.start + dt, raw)
            })
            .collect()
    }
}

/// Feed every reading to `session.step`, collecting the outcomes
pub fn drive(session: &mut Session, samples: &[(Timestamp, RawSample)]) -> Vec<StepOutcome> {
    samples
        .iter()
        .map(|&(t, raw)| session.step(t, raw))
        .collect()
}

/// Logging session with a fixed 25 °C conversion temperature
pub fn logging_session(config: Configuration) -> Session {
    let mut session = Session::new(config).expect("valid configuration");
    session.start_logging(0.0).expect("idle session starts logging");
    session
}

/// A_net for a slope under the default chamber (1.2 L, 100 cm², 25 °C)
pub fn reference_flux(slope_ppm_s: f64) -> f64 {
    -slope_ppm_s * 101_325.0 * 0.0012 / (8.314 * 298.15) / 0.01
}

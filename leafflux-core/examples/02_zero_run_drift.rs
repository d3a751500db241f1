//! Zero-Run Drift Correction Example
//!
//! Runs the empty chamber first to measure sensor drift, then logs a leaf
//! with that drift subtracted from every slope.
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 02_zero_run_drift
//! ```

use leafflux_core::{Command, Configuration, DriftProgress, RawSample, Session, StepOutcome};

const DRIFT_PPM_S: f64 = 0.02;

fn reading(co2_ppm: f64) -> RawSample {
    RawSample {
        co2_ppm,
        temperature_c: 25.0,
        humidity_pct: 0.0,
    }
}

fn main() -> Result<(), leafflux_core::LeafFluxError> {
    let config = Configuration {
        window_size: 10,
        zero_run_duration_s: 20.0,
        ..Configuration::default()
    };
    let mut session = Session::new(config)?;

    // Empty chamber: only the drift moves CO₂
    session.apply(Command::StartZeroRun, 0.0)?;
    let mut t = 0.0;
    loop {
        match session.step(t, reading(420.0 + DRIFT_PPM_S * t)) {
            StepOutcome::ZeroRun(DriftProgress::Accepted(baseline)) => {
                println!("zero run accepted after {:.0} s: drift {:+.4} ppm/s", t, baseline.slope);
                break;
            }
            StepOutcome::ZeroRun(DriftProgress::Extended { reason, target_s }) => {
                println!("zero run extended to {:.0} s: {}", target_s, reason);
            }
            _ => {}
        }
        t += 1.0;
    }

    // Leaf in: true uptake of 0.5 ppm/s on top of the same drift
    session.apply(Command::StartLogging, t)?;
    let leaf_start = t;
    for _ in 0..15 {
        t += 1.0;
        let co2 = 420.0 + DRIFT_PPM_S * t - 0.5 * (t - leaf_start);
        if let Some(eval) = session.step(t, reading(co2)).estimate() {
            println!(
                "raw slope {:+.3} ppm/s  corrected {:+.3} ppm/s  A_net {:+.2}",
                eval.raw_slope(),
                eval.corrected.slope,
                eval.flux.value
            );
        }
    }
    Ok(())
}

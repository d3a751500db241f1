//! Single-Loop Estimation Example
//!
//! Feeds a synthetic leaf chamber into a [`Session`] one reading at a time
//! and prints A_net once the window is full.
//!
//! ## What You'll Learn
//!
//! - Building a session from a [`Configuration`]
//! - Starting logging and stepping readings through it
//! - Reading the estimate and its confidence band
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 01_single_loop
//! ```

use leafflux_core::{Configuration, RawSample, Session, StepOutcome};

fn main() -> Result<(), leafflux_core::LeafFluxError> {
    println!("leafflux Single-Loop Example");
    println!("============================\n");

    // 35 cm² leaf in a 1.2 L chamber, 12-sample window
    let config = Configuration {
        leaf_area_cm2: 35.0,
        window_size: 12,
        ..Configuration::default()
    };
    let mut session = Session::new(config)?;
    let start = 1_700_000_000.0;
    session.start_logging(start)?;

    for i in 0..30 {
        let t = i as f64;
        // Leaf draws CO₂ down at 0.3 ppm/s while transpiring
        let raw = RawSample {
            co2_ppm: 430.0 - 0.3 * t + 0.2 * (t * 1.3).sin(),
            temperature_c: 24.0,
            humidity_pct: 50.0 + 0.05 * t,
        };

        match session.step(start + t, raw) {
            StepOutcome::Filling { len, capacity } => println!("t={:2}s  filling {}/{}", i, len, capacity),
            StepOutcome::Estimated(eval) => println!(
                "t={:2}s  A_net {:+.2} [{:+.2}, {:+.2}] µmol m⁻² s⁻¹  (slope {:+.3} ppm/s, VPD {:.2} kPa)",
                i, eval.flux.value, eval.flux.lower, eval.flux.upper, eval.corrected.slope, eval.vpd_kpa
            ),
            other => println!("t={:2}s  {:?}", i, other),
        }
    }

    println!("\n{} estimates in the live series", session.flux_series().len());
    Ok(())
}

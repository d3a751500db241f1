//! End-to-end tests: readings in, A_net out
//!
//! Drives a [`Session`] the way the acquisition loop does and checks the
//! recovered flux against the ideal-gas value for the generated slope.

mod common;

use approx::assert_relative_eq;
use leafflux_core::{
    Command, Configuration, DriftProgress, Mode, RegressionKind, Session, StepOutcome, Tick,
};

use common::{drive, logging_session, reference_flux, ChamberTrace};

fn base_config() -> Configuration {
    Configuration {
        window_size: 6,
        dry_correction: false,
        temperature_override_c: Some(25.0),
        ..Configuration::default()
    }
}

fn base_config_with_window(window_size: usize) -> Configuration {
    Configuration {
        window_size,
        ..base_config()
    }
}

#[test]
fn rising_chamber_gives_negative_assimilation() {
    // 400 → 410 ppm over 5 s at 1 Hz
    let trace = ChamberTrace {
        co2_start_ppm: 400.0,
        slope_ppm_s: 2.0,
        ..ChamberTrace::default()
    };
    let mut session = logging_session(base_config());
    let outcomes = drive(&mut session, &trace.samples(6));

    let estimate = outcomes[5].estimate().expect("sixth reading fills the window");
    assert_relative_eq!(estimate.raw_slope(), 2.0, epsilon = 1e-9);
    assert_relative_eq!(estimate.fit.stderr, 0.0, epsilon = 1e-9);
    assert_relative_eq!(estimate.flux.value, -9.81, epsilon = 0.01);
    assert_relative_eq!(estimate.flux.lower, estimate.flux.upper, epsilon = 1e-6);
}

#[test]
fn photosynthesising_leaf_is_tracked_over_time() {
    let trace = ChamberTrace {
        slope_ppm_s: -0.8,
        noise_ppm: 0.3,
        ..ChamberTrace::default()
    };
    let config = Configuration {
        window_size: 12,
        ..base_config()
    };
    let mut session = logging_session(config);
    let outcomes = drive(&mut session, &trace.samples(120));

    let estimates: Vec<_> = outcomes.iter().filter_map(StepOutcome::estimate).collect();
    assert_eq!(estimates.len(), 120 - 11);

    let expected = reference_flux(-0.8);
    let mean = estimates.iter().map(|e| e.flux.value).sum::<f64>() / estimates.len() as f64;
    assert!(mean > 0.0);
    assert_relative_eq!(mean, expected, max_relative = 0.05);

    for e in &estimates {
        assert!(e.flux.lower <= e.flux.value && e.flux.value <= e.flux.upper);
    }
}

#[test]
fn robust_fit_survives_a_sensor_spike() {
    let trace = ChamberTrace {
        slope_ppm_s: -0.5,
        noise_ppm: 0.05,
        spikes: vec![(8, 60.0)],
        ..ChamberTrace::default()
    };

    let ordinary = Configuration {
        window_size: 12,
        ..base_config()
    };
    let robust = Configuration {
        regression: RegressionKind::Robust,
        ..ordinary.clone()
    };

    let samples = trace.samples(12);
    let ols = drive(&mut logging_session(ordinary), &samples)[11]
        .estimate()
        .copied()
        .expect("full window");
    let huber = drive(&mut logging_session(robust), &samples)[11]
        .estimate()
        .copied()
        .expect("full window");

    assert!((huber.raw_slope() + 0.5).abs() < 0.05);
    assert!((ols.raw_slope() + 0.5).abs() > (huber.raw_slope() + 0.5).abs());
}

#[test]
fn smoothing_leaves_a_clean_ramp_unchanged() {
    for window_size in [12, 24] {
        let config = Configuration {
            window_size,
            smoothing_enabled: true,
            ..base_config()
        };
        let mut session = logging_session(config);
        let outcomes = drive(&mut session, &ChamberTrace::default().samples(window_size));

        let estimate = outcomes[window_size - 1].estimate().expect("full window");
        assert_relative_eq!(estimate.raw_slope(), -0.5, epsilon = 1e-9);
        assert_relative_eq!(estimate.flux.value, reference_flux(-0.5), epsilon = 1e-6);
    }
}

#[test]
fn median_filter_removes_spike_before_fit() {
    let trace = ChamberTrace {
        slope_ppm_s: -0.5,
        spikes: vec![(6, 80.0)],
        ..ChamberTrace::default()
    };

    let mut config = Configuration {
        window_size: 12,
        smoothing_enabled: true,
        ..base_config()
    };
    config.conditioning.savgol_enabled = false;
    config.conditioning.low_pass_enabled = false;

    let samples = trace.samples(12);
    let filtered = drive(&mut logging_session(config), &samples)[11]
        .estimate()
        .copied()
        .expect("full window");
    let unfiltered = drive(&mut logging_session(base_config_with_window(12)), &samples)[11]
        .estimate()
        .copied()
        .expect("full window");

    // The spike shifts its neighbours' medians by one step at most
    assert!((filtered.raw_slope() + 0.5).abs() < 0.01, "{}", filtered.raw_slope());
    assert!((unfiltered.raw_slope() + 0.5).abs() > 0.25);
}

#[test]
fn transpiration_does_not_look_like_uptake_when_dry_corrected() {
    // Constant dry CO₂, humidity rising: the wet reading falls
    let dry_ppm = 420.0;
    let config = Configuration {
        window_size: 10,
        dry_correction: true,
        ..base_config()
    };
    let corrector = config.humidity_corrector();
    let trace = ChamberTrace {
        humidity_start_pct: 40.0,
        humidity_rise_pct_s: 0.5,
        slope_ppm_s: 0.0,
        ..ChamberTrace::default()
    };
    let mut samples = trace.samples(10);
    for (_, raw) in samples.iter_mut() {
        let factor = corrector.dry_ppm(1.0, raw.humidity_pct, raw.temperature_c);
        raw.co2_ppm = dry_ppm / factor;
    }

    let dry = drive(&mut logging_session(config.clone()), &samples)[9]
        .estimate()
        .copied()
        .expect("full window");
    let wet = drive(
        &mut logging_session(Configuration {
            dry_correction: false,
            ..config
        }),
        &samples,
    )[9]
    .estimate()
    .copied()
    .expect("full window");

    assert_relative_eq!(dry.raw_slope(), 0.0, epsilon = 1e-9);
    assert!(wet.raw_slope() < 0.0);
    assert!(wet.flux.value > 0.0);
}

#[test]
fn zero_run_then_logging_removes_chamber_drift() {
    let drift = 0.03;
    let mut session = Session::new(base_config()).expect("valid configuration");
    session.start_zero_run(0.0).expect("idle session");

    let empty_chamber = ChamberTrace {
        start: 0.0,
        co2_start_ppm: 415.0,
        slope_ppm_s: drift,
        ..ChamberTrace::default()
    };
    let accepted = drive(&mut session, &empty_chamber.samples(40))
        .into_iter()
        .find_map(|o| match o {
            StepOutcome::ZeroRun(DriftProgress::Accepted(baseline)) => Some(baseline),
            _ => None,
        })
        .expect("flat run accepted");
    assert_relative_eq!(accepted.slope, drift, epsilon = 1e-9);
    assert_eq!(session.mode(), Mode::Idle);

    session.start_logging(100.0).expect("idle after zero run");
    let leaf = ChamberTrace {
        start: 100.0,
        slope_ppm_s: -0.5 + drift,
        ..ChamberTrace::default()
    };
    let outcomes = drive(&mut session, &leaf.samples(6));
    let estimate = outcomes[5].estimate().expect("full window");

    assert_relative_eq!(estimate.corrected.slope, -0.5, epsilon = 1e-9);
    assert_relative_eq!(estimate.flux.value, reference_flux(-0.5), epsilon = 1e-6);
}

#[test]
fn leaf_area_change_applies_to_next_window() {
    let trace = ChamberTrace {
        slope_ppm_s: -0.5,
        ..ChamberTrace::default()
    };
    let samples = trace.samples(8);
    let mut session = logging_session(base_config());

    let before = drive(&mut session, &samples[..6])[5]
        .estimate()
        .copied()
        .expect("full window");
    session
        .apply(Command::SetLeafArea(50.0), samples[5].0)
        .expect("valid area");
    let after = drive(&mut session, &samples[6..7])[0]
        .estimate()
        .copied()
        .expect("window still full");

    assert_relative_eq!(after.flux.value, 2.0 * before.flux.value, epsilon = 1e-6);
}

#[test]
fn two_thread_protocol_matches_single_loop() {
    let trace = ChamberTrace {
        slope_ppm_s: -0.4,
        noise_ppm: 0.2,
        ..ChamberTrace::default()
    };
    let samples = trace.samples(20);

    let mut single = logging_session(base_config());
    let expected: Vec<_> = drive(&mut single, &samples)
        .iter()
        .filter_map(StepOutcome::estimate)
        .map(|e| e.flux)
        .collect();

    let mut split = logging_session(base_config());
    let pipeline = base_config().pipeline();
    let mut produced = Vec::new();
    for &(t, raw) in &samples {
        if let Tick::Ready(job) = split.ingest(t, raw) {
            let evaluation = job.run(&pipeline).expect("estimable window");
            assert!(split.record_estimate(evaluation, t));
            produced.push(evaluation.flux);
        }
    }

    assert_eq!(produced, expected);
    assert_eq!(split.flux_series().len(), expected.len());
}

#[test]
fn live_series_keeps_only_plot_window() {
    let trace = ChamberTrace {
        slope_ppm_s: -0.3,
        interval_s: 5.0,
        ..ChamberTrace::default()
    };
    let config = Configuration {
        plot_window_s: 60.0,
        ..base_config()
    };
    let mut session = logging_session(config);
    drive(&mut session, &trace.samples(100));

    let snapshot = session.snapshot();
    let newest = snapshot.flux.last().expect("estimates").timestamp;
    assert!(snapshot.flux.iter().all(|e| newest - e.timestamp <= 60.0));
    assert_eq!(snapshot.flux.len(), 13);
    assert!(snapshot.environment.len() <= 13);
}

//! Measurement Session
//!
//! ## Overview
//!
//! A [`Session`] owns every piece of mutable acquisition state: the mode,
//! the sample window, the zero-run tracker, the flux converter (whose leaf
//! area can change live) and the two live series. Nothing else is shared.
//!
//! ## Modes
//!
//! ```text
//!                StartZeroRun                     StartLogging
//!   ZeroRun ◄──────────────────── Idle ─────────────────────────► Logging
//!      │  ─── accepted / Cancel ───►  ◄────── StopLogging ──────────  │
//! ```
//!
//! Zero run and logging exclude each other. A refused command returns a
//! [`CommandError`] whose Display text is shown to the operator, and leaves
//! the session exactly as it was.
//!
//! ## Two Ways To Drive It
//!
//! - **Single loop**: [`Session::step`] ingests a reading and, when the
//!   window is full, evaluates it in the same call.
//! - **Two threads**: the acquisition thread calls [`Session::ingest`] under
//!   the lock, gets a [`WindowJob`] back, runs it with its own
//!   [`FluxPipeline`] after releasing the lock, then relocks for
//!   [`Session::record_estimate`].

use alloc::vec::Vec;

use crate::buffer::{PushOutcome, SampleBuffer, WindowSnapshot};
use crate::config::{self, Configuration};
use crate::drift::{DriftBaseline, DriftProgress, ZeroDriftTracker};
use crate::errors::{CommandError, EstimationError, LeafFluxError, ValidationError};
use crate::flux::{FluxBasis, FluxConverter, FluxEstimate};
use crate::humidity::HumidityCorrector;
use crate::pipeline::{Evaluation, FluxPipeline};
use crate::series::{EnvironmentPoint, LiveSeries};
use crate::time::Timestamp;
use crate::validators::{RawSample, Sample};

/// What the session is doing with incoming readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Readings are not requested
    #[default]
    Idle,
    /// Collecting an empty-chamber baseline
    ZeroRun,
    /// Estimating A_net from the rolling window
    Logging,
}

/// Operator request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Begin a zero run
    StartZeroRun,
    /// Abort the active zero run
    CancelZeroRun,
    /// Begin estimating A_net
    StartLogging,
    /// Stop estimating
    StopLogging,
    /// Change the leaf area (cm²)
    SetLeafArea(f64),
    /// Drop the drift baseline
    ResetBaseline,
    /// End the session
    Stop,
}

/// Accepted command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandOutcome {
    /// Now in [`Mode::ZeroRun`]
    ZeroRunStarted,
    /// Back to idle, baseline unchanged
    ZeroRunCancelled,
    /// Now in [`Mode::Logging`], window emptied
    LoggingStarted,
    /// Back to idle
    LoggingStopped,
    /// Leaf area in effect from the next window
    LeafAreaChanged {
        /// New area (cm²)
        leaf_area_cm2: f64,
    },
    /// Baseline back to 0.0
    BaselineReset,
    /// Session stopped; every later command is refused
    Stopped,
}

/// Snapshot plus everything needed to evaluate it away from the session
#[derive(Debug, Clone, PartialEq)]
pub struct WindowJob {
    /// Full window
    pub snapshot: WindowSnapshot,
    /// Baseline in effect when the window filled
    pub baseline: DriftBaseline,
    /// Converter in effect when the window filled
    pub converter: FluxConverter,
}

impl WindowJob {
    /// Evaluate with `pipeline`
    pub fn run(&self, pipeline: &FluxPipeline) -> Result<Evaluation, EstimationError> {
        pipeline.evaluate(&self.snapshot, &self.baseline, &self.converter)
    }
}

/// Result of [`Session::ingest`]
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Reading ignored (idle or stopped)
    Idle,
    /// Reading failed validation
    Rejected(ValidationError),
    /// Reading went to the zero run
    ZeroRun(DriftProgress),
    /// Window accepted the reading but is not full yet
    Filling {
        /// Samples in the window
        len: usize,
        /// Window capacity
        capacity: usize,
    },
    /// Window full; evaluate the job
    Ready(WindowJob),
}

/// Result of [`Session::step`]
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Reading ignored
    Idle,
    /// Reading failed validation
    Rejected(ValidationError),
    /// Reading went to the zero run
    ZeroRun(DriftProgress),
    /// Window not full yet
    Filling {
        /// Samples in the window
        len: usize,
        /// Window capacity
        capacity: usize,
    },
    /// New estimate, already appended to the live series
    Estimated(Evaluation),
    /// Window full but no estimate this tick
    Failed(EstimationError),
}

impl StepOutcome {
    /// The new estimate, if any
    pub fn estimate(&self) -> Option<&Evaluation> {
        match self {
            Self::Estimated(evaluation) => Some(evaluation),
            _ => None,
        }
    }
}

/// Progress of an active zero run
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ZeroRunStatus {
    /// Seconds since the first run sample
    pub elapsed_s: f64,
    /// Current target (s)
    pub target_s: f64,
    /// Samples collected
    pub collected: usize,
}

/// Copy of the display-relevant state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Current mode
    pub mode: Mode,
    /// When the current logging period began
    pub logging_since: Option<Timestamp>,
    /// Whether `Stop` was accepted
    pub stopped: bool,
    /// Reporting basis (carries the leaf area)
    pub basis: FluxBasis,
    /// Drift baseline in effect
    pub baseline: DriftBaseline,
    /// Active zero run, if any
    pub zero_run: Option<ZeroRunStatus>,
    /// Samples in the window
    pub window_len: usize,
    /// Window capacity
    pub window_capacity: usize,
    /// Most recent estimate
    pub latest: Option<Evaluation>,
    /// Flux series, oldest first
    pub flux: Vec<FluxEstimate>,
    /// Environment series, oldest first
    pub environment: Vec<EnvironmentPoint>,
    /// Readings dropped by validation since the session began
    pub rejected_samples: u64,
}

/// Acquisition state for one chamber
#[derive(Debug)]
pub struct Session {
    config: Configuration,
    mode: Mode,
    logging_since: Option<Timestamp>,
    stopped: bool,
    buffer: SampleBuffer,
    tracker: ZeroDriftTracker,
    converter: FluxConverter,
    corrector: Option<HumidityCorrector>,
    pipeline: FluxPipeline,
    flux: LiveSeries<FluxEstimate>,
    environment: LiveSeries<EnvironmentPoint>,
    latest: Option<Evaluation>,
    rejected_samples: u64,
}

impl Session {
    /// Validate `config` and build an idle session
    pub fn new(config: Configuration) -> Result<Self, LeafFluxError> {
        config.validate()?;
        let buffer = SampleBuffer::new(config.window_size)?;

        Ok(Self {
            mode: Mode::Idle,
            logging_since: None,
            stopped: false,
            buffer,
            tracker: config.drift_tracker(),
            converter: config.flux_converter(),
            corrector: config.dry_correction.then(|| config.humidity_corrector()),
            pipeline: config.pipeline(),
            flux: LiveSeries::new(config.plot_window_s),
            environment: LiveSeries::new(config.plot_window_s),
            latest: None,
            rejected_samples: 0,
            config,
        })
    }

    /// Configuration the session was built with, leaf area kept current
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// When the current logging period began
    pub fn logging_since(&self) -> Option<Timestamp> {
        self.logging_since
    }

    /// Whether `Stop` was accepted
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Drift baseline in effect
    pub fn baseline(&self) -> DriftBaseline {
        self.tracker.baseline()
    }

    /// Converter in effect
    pub fn converter(&self) -> FluxConverter {
        self.converter
    }

    /// Evaluation chain used by [`step`](Self::step)
    pub fn pipeline(&self) -> &FluxPipeline {
        &self.pipeline
    }

    /// Flux series
    pub fn flux_series(&self) -> &LiveSeries<FluxEstimate> {
        &self.flux
    }

    /// Environment series
    pub fn environment_series(&self) -> &LiveSeries<EnvironmentPoint> {
        &self.environment
    }

    /// Most recent estimate
    pub fn latest(&self) -> Option<&Evaluation> {
        self.latest.as_ref()
    }

    /// Readings dropped by validation
    pub fn rejected_samples(&self) -> u64 {
        self.rejected_samples
    }

    /// Apply an operator command
    pub fn apply(&mut self, command: Command, now: Timestamp) -> Result<CommandOutcome, CommandError> {
        let result = self.try_apply(command, now);
        match &result {
            Ok(outcome) => log_info!("{:?} at {:.3} → {:?}", command, now, outcome),
            Err(err) => log_warn!("{:?} at {:.3} refused: {}", command, now, err),
        }
        result
    }

    fn try_apply(&mut self, command: Command, now: Timestamp) -> Result<CommandOutcome, CommandError> {
        if self.stopped {
            return Err(CommandError::Stopped);
        }

        match command {
            Command::StartZeroRun => {
                match self.mode {
                    Mode::Logging => return Err(CommandError::LoggingActive),
                    Mode::ZeroRun => return Err(CommandError::ZeroRunInProgress),
                    Mode::Idle => {}
                }
                self.tracker.start(now)?;
                self.mode = Mode::ZeroRun;
                Ok(CommandOutcome::ZeroRunStarted)
            }
            Command::CancelZeroRun => {
                if self.mode != Mode::ZeroRun {
                    return Err(CommandError::NoZeroRun);
                }
                self.tracker.cancel();
                self.mode = Mode::Idle;
                Ok(CommandOutcome::ZeroRunCancelled)
            }
            Command::StartLogging => {
                match self.mode {
                    Mode::ZeroRun => return Err(CommandError::ZeroRunActive),
                    Mode::Logging => return Err(CommandError::LoggingInProgress),
                    Mode::Idle => {}
                }
                self.buffer.clear();
                self.mode = Mode::Logging;
                self.logging_since = Some(now);
                Ok(CommandOutcome::LoggingStarted)
            }
            Command::StopLogging => {
                if self.mode != Mode::Logging {
                    return Err(CommandError::NotLogging);
                }
                self.buffer.clear();
                self.mode = Mode::Idle;
                self.logging_since = None;
                Ok(CommandOutcome::LoggingStopped)
            }
            Command::SetLeafArea(value) => {
                let leaf_area_cm2 = config::validate_leaf_area(value)
                    .map_err(|_| CommandError::InvalidLeafArea { value })?;
                self.config.leaf_area_cm2 = leaf_area_cm2;
                self.converter.set_leaf_area(leaf_area_cm2);
                Ok(CommandOutcome::LeafAreaChanged { leaf_area_cm2 })
            }
            Command::ResetBaseline => {
                self.tracker.reset();
                Ok(CommandOutcome::BaselineReset)
            }
            Command::Stop => {
                self.tracker.cancel();
                self.buffer.clear();
                self.mode = Mode::Idle;
                self.logging_since = None;
                self.stopped = true;
                Ok(CommandOutcome::Stopped)
            }
        }
    }

    /// [`Command::StartLogging`] at `now`
    pub fn start_logging(&mut self, now: Timestamp) -> Result<CommandOutcome, CommandError> {
        self.apply(Command::StartLogging, now)
    }

    /// [`Command::StartZeroRun`] at `now`
    pub fn start_zero_run(&mut self, now: Timestamp) -> Result<CommandOutcome, CommandError> {
        self.apply(Command::StartZeroRun, now)
    }

    /// Route one reading taken at `now` according to the mode
    pub fn ingest(&mut self, now: Timestamp, raw: RawSample) -> Tick {
        if self.stopped {
            return Tick::Idle;
        }
        match self.mode {
            Mode::Idle => Tick::Idle,
            Mode::ZeroRun => self.ingest_zero_run(now, raw),
            Mode::Logging => self.ingest_logging(now, raw),
        }
    }

    fn ingest_zero_run(&mut self, now: Timestamp, raw: RawSample) -> Tick {
        let sample = match Sample::from_raw(now, raw, &self.config.limits) {
            Ok(sample) => sample,
            Err(err) => return self.reject(now, err),
        };
        self.push_environment(&sample, now);

        let ppm = match &self.corrector {
            Some(corrector) => {
                corrector.dry_ppm(sample.co2_ppm(), sample.humidity_pct(), sample.temperature_c())
            }
            None => sample.co2_ppm(),
        };

        let progress = self.tracker.record(now, ppm);
        if let DriftProgress::Accepted(_) = progress {
            self.mode = Mode::Idle;
        }
        Tick::ZeroRun(progress)
    }

    fn ingest_logging(&mut self, now: Timestamp, raw: RawSample) -> Tick {
        match self.buffer.offer(now, raw, &self.config.limits) {
            PushOutcome::Rejected(err) => {
                self.rejected_samples += 1;
                Tick::Rejected(err)
            }
            PushOutcome::Accepted { .. } => {
                if let Some(sample) = self.buffer.latest().copied() {
                    self.push_environment(&sample, now);
                }
                if self.buffer.is_full() {
                    Tick::Ready(WindowJob {
                        snapshot: self.buffer.snapshot(),
                        baseline: self.tracker.baseline(),
                        converter: self.converter,
                    })
                } else {
                    Tick::Filling {
                        len: self.buffer.len(),
                        capacity: self.buffer.capacity(),
                    }
                }
            }
        }
    }

    fn reject(&mut self, now: Timestamp, err: ValidationError) -> Tick {
        log_warn!("dropping reading at t={}: {}", now, err);
        self.rejected_samples += 1;
        Tick::Rejected(err)
    }

    fn push_environment(&mut self, sample: &Sample, now: Timestamp) {
        self.environment.append(
            EnvironmentPoint {
                timestamp: sample.timestamp(),
                temperature_c: sample.temperature_c(),
                humidity_pct: sample.humidity_pct(),
            },
            now,
        );
    }

    /// Store an estimate computed from a [`WindowJob`]
    ///
    /// Dropped (returns false) when logging stopped while it was computed.
    pub fn record_estimate(&mut self, evaluation: Evaluation, now: Timestamp) -> bool {
        if self.mode != Mode::Logging || self.stopped {
            log_debug!("discarding estimate for t={}", evaluation.flux.timestamp);
            return false;
        }
        self.flux.append(evaluation.flux, now);
        self.latest = Some(evaluation);
        true
    }

    /// Ingest and, when the window is full, evaluate in one call
    pub fn step(&mut self, now: Timestamp, raw: RawSample) -> StepOutcome {
        match self.ingest(now, raw) {
            Tick::Idle => StepOutcome::Idle,
            Tick::Rejected(err) => StepOutcome::Rejected(err),
            Tick::ZeroRun(progress) => StepOutcome::ZeroRun(progress),
            Tick::Filling { len, capacity } => StepOutcome::Filling { len, capacity },
            Tick::Ready(job) => match job.run(&self.pipeline) {
                Ok(evaluation) => {
                    self.record_estimate(evaluation, now);
                    StepOutcome::Estimated(evaluation)
                }
                Err(err) => {
                    log_debug!("no estimate at t={}: {}", now, err);
                    StepOutcome::Failed(err)
                }
            },
        }
    }

    /// Drop series entries older than the horizon at `now`
    pub fn evict(&mut self, now: Timestamp) {
        self.flux.evict(now);
        self.environment.evict(now);
    }

    /// Copy of the display-relevant state
    pub fn snapshot(&self) -> SessionSnapshot {
        let zero_run = match (self.tracker.target_s(), self.mode) {
            (Some(target_s), Mode::ZeroRun) => Some(ZeroRunStatus {
                elapsed_s: self.tracker.elapsed_s().unwrap_or(0.0),
                target_s,
                collected: self.tracker.collected(),
            }),
            _ => None,
        };

        SessionSnapshot {
            mode: self.mode,
            logging_since: self.logging_since,
            stopped: self.stopped,
            basis: self.converter.basis(),
            baseline: self.tracker.baseline(),
            zero_run,
            window_len: self.buffer.len(),
            window_capacity: self.buffer.capacity(),
            latest: self.latest,
            flux: self.flux.snapshot(),
            environment: self.environment.snapshot(),
            rejected_samples: self.rejected_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> Configuration {
        Configuration {
            window_size: 6,
            dry_correction: false,
            temperature_override_c: Some(25.0),
            ..Configuration::default()
        }
    }

    fn raw(co2_ppm: f64) -> RawSample {
        RawSample {
            co2_ppm,
            temperature_c: 25.0,
            humidity_pct: 40.0,
        }
    }

    #[test]
    fn invalid_configuration_is_refused() {
        let bad = Configuration {
            window_size: 1,
            ..Configuration::default()
        };
        assert!(matches!(Session::new(bad), Err(LeafFluxError::Config(_))));
    }

    #[test]
    fn idle_session_ignores_readings() {
        let mut session = Session::new(config()).unwrap();
        assert_eq!(session.step(0.0, raw(400.0)), StepOutcome::Idle);
        assert!(session.environment_series().is_empty());
    }

    #[test]
    fn logging_estimates_once_window_is_full() {
        let mut session = Session::new(config()).unwrap();
        session.start_logging(0.0).unwrap();

        for i in 0..5 {
            let outcome = session.step(i as f64, raw(400.0 + 2.0 * i as f64));
            assert_eq!(outcome, StepOutcome::Filling { len: i + 1, capacity: 6 });
        }
        let outcome = session.step(5.0, raw(410.0));
        let estimate = outcome.estimate().expect("window full");
        assert_relative_eq!(estimate.raw_slope(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(estimate.flux.value, -9.8103, epsilon = 1e-3);

        assert_eq!(session.flux_series().len(), 1);
        assert_eq!(session.environment_series().len(), 6);
        assert!(session.step(6.0, raw(412.0)).estimate().is_some());
    }

    #[test]
    fn rejected_reading_leaves_window_alone() {
        let mut session = Session::new(config()).unwrap();
        session.start_logging(0.0).unwrap();
        session.step(0.0, raw(400.0));

        let outcome = session.step(1.0, raw(-5.0));
        assert!(matches!(
            outcome,
            StepOutcome::Rejected(ValidationError::NonPositiveConcentration { .. })
        ));
        assert_eq!(session.snapshot().window_len, 1);
        assert_eq!(session.rejected_samples(), 1);
    }

    #[test]
    fn zero_run_and_logging_exclude_each_other() {
        let mut session = Session::new(config()).unwrap();

        session.start_logging(0.0).unwrap();
        assert_eq!(session.start_zero_run(0.0), Err(CommandError::LoggingActive));
        assert_eq!(session.mode(), Mode::Logging);

        session.apply(Command::StopLogging, 0.0).unwrap();
        session.start_zero_run(1.0).unwrap();
        assert_eq!(session.start_logging(1.5), Err(CommandError::ZeroRunActive));
        assert_eq!(session.start_zero_run(2.0), Err(CommandError::ZeroRunInProgress));
        assert_eq!(session.mode(), Mode::ZeroRun);
    }

    #[test]
    fn logging_period_starts_at_the_command_time() {
        let mut session = Session::new(config()).unwrap();
        assert_eq!(session.logging_since(), None);

        session.start_logging(1_700_000_042.5).unwrap();
        assert_eq!(session.logging_since(), Some(1_700_000_042.5));

        // A refused restart keeps the original start
        assert_eq!(session.start_logging(1_700_000_050.0), Err(CommandError::LoggingInProgress));
        assert_eq!(session.snapshot().logging_since, Some(1_700_000_042.5));

        session.apply(Command::StopLogging, 1_700_000_060.0).unwrap();
        assert_eq!(session.logging_since(), None);
    }

    #[test]
    fn refused_commands_report_operator_text() {
        let mut session = Session::new(config()).unwrap();
        assert_eq!(
            session.apply(Command::StopLogging, 0.0),
            Err(CommandError::NotLogging)
        );
        assert_eq!(
            session.apply(Command::CancelZeroRun, 0.0),
            Err(CommandError::NoZeroRun)
        );
        session.start_logging(0.0).unwrap();
        let err = session.start_logging(0.0).unwrap_err();
        assert_eq!(err.to_string(), "Logging already in progress.");
    }

    #[test]
    fn zero_run_baseline_is_applied_to_logging() {
        let mut session = Session::new(config()).unwrap();
        session.start_zero_run(0.0).unwrap();

        let mut t = 0.0;
        loop {
            match session.step(t, raw(415.0 + 0.02 * t)) {
                StepOutcome::ZeroRun(DriftProgress::Accepted(baseline)) => {
                    assert_relative_eq!(baseline.slope, 0.02, epsilon = 1e-9);
                    break;
                }
                StepOutcome::ZeroRun(_) => t += 1.0,
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(session.mode(), Mode::Idle);
        assert!(session.baseline().accepted);

        session.start_logging(0.0).unwrap();
        let mut last = None;
        for i in 0..6 {
            let t = 100.0 + i as f64;
            last = session.step(t, raw(400.0 + 0.02 * i as f64)).estimate().copied();
        }
        let estimate = last.expect("window full");
        assert_relative_eq!(estimate.corrected.slope, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn anomalous_zero_run_stays_active() {
        let mut session = Session::new(config()).unwrap();
        session.start_zero_run(0.0).unwrap();
        for i in 0..=30 {
            session.step(i as f64, raw(415.0 + 0.5 * i as f64));
        }
        let snap = session.snapshot();
        assert_eq!(snap.mode, Mode::ZeroRun);
        assert_eq!(snap.zero_run.map(|z| z.target_s), Some(36.0));
        assert!(!snap.baseline.accepted);
    }

    #[test]
    fn leaf_area_change_is_validated() {
        let mut session = Session::new(config()).unwrap();
        assert_eq!(
            session.apply(Command::SetLeafArea(0.0), 0.0),
            Err(CommandError::InvalidLeafArea { value: 0.0 })
        );
        assert_eq!(session.config().leaf_area_cm2, 100.0);

        session.apply(Command::SetLeafArea(50.0), 0.0).unwrap();
        assert_eq!(
            session.converter().basis(),
            FluxBasis::Area { leaf_area_cm2: 50.0 }
        );
    }

    #[test]
    fn estimate_arriving_after_stop_is_discarded() {
        let mut session = Session::new(config()).unwrap();
        session.start_logging(0.0).unwrap();

        let mut job = None;
        for i in 0..6 {
            if let Tick::Ready(ready) = session.ingest(i as f64, raw(400.0 + i as f64)) {
                job = Some(ready);
            }
        }
        let job = job.expect("window full");
        let evaluation = job.run(session.pipeline()).unwrap();

        session.apply(Command::StopLogging, 6.0).unwrap();
        assert!(!session.record_estimate(evaluation, 6.0));
        assert!(session.flux_series().is_empty());
    }

    #[test]
    fn stop_refuses_everything_after() {
        let mut session = Session::new(config()).unwrap();
        session.start_zero_run(0.0).unwrap();
        assert_eq!(session.apply(Command::Stop, 1.0), Ok(CommandOutcome::Stopped));
        assert!(session.is_stopped());
        assert_eq!(session.mode(), Mode::Idle);
        assert_eq!(session.start_logging(0.0), Err(CommandError::Stopped));
        assert_eq!(session.step(2.0, raw(400.0)), StepOutcome::Idle);
    }
}

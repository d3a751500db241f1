//! Two-Thread Acquisition Runtime
//!
//! ## Threads
//!
//! - **Acquisition** (spawned): polls the sensor, feeds the [`Session`],
//!   evaluates full windows and writes rows.
//! - **Caller** (usually the render loop): sends [`Command`]s, reads
//!   [`Notice`]s and copies [`ChartFrame`]s.
//!
//! ## Locking
//!
//! The session sits behind one `parking_lot::Mutex`. Each acquisition tick
//! takes it three times, briefly:
//!
//! ```text
//! lock ─ mode ─ unlock ─ sensor read ─ lock ─ ingest ─ unlock
//!      ─ evaluate window ─ lock ─ record_estimate ─ unlock ─ write rows
//! ```
//!
//! Sensor I/O, estimation and row writes all happen unlocked, so a slow
//! sensor or disk never stalls a redraw.
//!
//! ## Stopping
//!
//! One `AtomicBool` checked at every iteration. [`RuntimeHandle::stop`] sets
//! it and also sends [`Command::Stop`] so a thread waiting on the command
//! channel wakes at once. On the way out the sensor is closed and every row
//! sink flushed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use leafflux_core::time::{TimeSource, Timestamp};
use leafflux_core::{
    Command, CommandError, CommandOutcome, Configuration, DriftBaseline, DriftProgress,
    ExtensionReason, FluxEstimate, FluxPipeline, Mode, Session, Tick, WindowJob,
};
use parking_lot::Mutex;

use crate::chart::ChartFrame;
use crate::sensor::{read_with_retry, Sensor, SensorStats};
use crate::sinks::{LogRow, RowSink};
use crate::ConnectorError;

/// First retry delay after a transient sensor failure
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Timing and bring-up options for the acquisition thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeOptions {
    /// Wait between reads while measuring
    pub poll_interval: Duration,
    /// Wait between checks while idle
    pub idle_backoff: Duration,
    /// Attempts per reading
    pub sensor_retries: u32,
    /// First wait after a transient failure, doubled per attempt
    pub retry_delay: Duration,
    /// Leave the sensor's automatic self-calibration on
    pub auto_calibration: bool,
    /// Force the sensor baseline to this CO₂ (ppm) before starting
    pub recalibrate_ppm: Option<u16>,
}

impl RuntimeOptions {
    /// Options taken from the session configuration
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            poll_interval: seconds(config.poll_interval_s),
            idle_backoff: seconds(config.idle_backoff_s),
            sensor_retries: config.sensor_retries,
            ..Self::default()
        }
    }
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        let config = Configuration::default();
        Self {
            poll_interval: seconds(config.poll_interval_s),
            idle_backoff: seconds(config.idle_backoff_s),
            sensor_retries: config.sensor_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
            auto_calibration: false,
            recalibrate_ppm: None,
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Something the operator should hear about
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A command was applied or refused
    Command {
        /// What was sent
        command: Command,
        /// What the session made of it
        result: Result<CommandOutcome, CommandError>,
    },
    /// Zero run finished with this baseline
    ZeroRunAccepted(DriftBaseline),
    /// Zero run could not finish yet and was lengthened
    ZeroRunExtended {
        /// Why
        reason: ExtensionReason,
        /// New target (s)
        target_s: f64,
    },
    /// New A_net estimate
    Estimate(FluxEstimate),
    /// A reading was given up on after all retries
    SensorSkipped(String),
    /// The acquisition thread has exited
    Stopped,
}

/// Cloneable control surface of a running acquisition thread
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    session: Arc<Mutex<Session>>,
    commands: Sender<Command>,
    stop: Arc<AtomicBool>,
}

impl RuntimeHandle {
    /// Queue a command for the acquisition thread
    pub fn send(&self, command: Command) -> Result<(), ConnectorError> {
        self.commands
            .send(command)
            .map_err(|_| ConnectorError::Disconnected)
    }

    /// Copy the current display state
    pub fn frame(&self) -> ChartFrame {
        let session = self.session.lock();
        ChartFrame::capture(&session)
    }

    /// Ask the acquisition thread to finish
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        // Wakes a thread parked on the command channel; it may already be gone
        let _ = self.commands.send(Command::Stop);
    }

    /// Whether a stop was requested or accepted
    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// Running acquisition thread plus its channels
pub struct Runtime {
    handle: RuntimeHandle,
    notices: Receiver<Notice>,
    thread: Option<JoinHandle<Result<SensorStats, ConnectorError>>>,
}

impl Runtime {
    /// Bring up `sensor` and start acquiring with options from `config`
    pub fn start<S, C>(
        config: Configuration,
        sensor: S,
        clock: C,
        rows: Vec<Box<dyn RowSink>>,
    ) -> Result<Self, ConnectorError>
    where
        S: Sensor + 'static,
        C: TimeSource + Send + 'static,
    {
        let options = RuntimeOptions::from_config(&config);
        Self::start_with(config, options, sensor, clock, rows)
    }

    /// Bring up `sensor` and start acquiring
    ///
    /// The configuration is validated and the sensor connected and
    /// initialized before the thread spawns; any failure there is returned
    /// and nothing keeps running.
    pub fn start_with<S, C>(
        config: Configuration,
        options: RuntimeOptions,
        mut sensor: S,
        clock: C,
        rows: Vec<Box<dyn RowSink>>,
    ) -> Result<Self, ConnectorError>
    where
        S: Sensor + 'static,
        C: TimeSource + Send + 'static,
    {
        let session = Session::new(config)?;
        let pipeline = session.config().pipeline();

        bring_up(&mut sensor, &options)?;

        let session = Arc::new(Mutex::new(session));
        let stop = Arc::new(AtomicBool::new(false));
        let (command_tx, command_rx) = mpsc::channel();
        let (notice_tx, notice_rx) = mpsc::channel();

        let acquisition = Acquisition {
            session: Arc::clone(&session),
            stop: Arc::clone(&stop),
            commands: command_rx,
            notices: notice_tx,
            sensor,
            clock,
            rows,
            pipeline,
            options,
            stats: SensorStats::default(),
        };

        let thread = thread::Builder::new()
            .name("leafflux-acquisition".into())
            .spawn(move || acquisition.run())?;

        Ok(Self {
            handle: RuntimeHandle {
                session,
                commands: command_tx,
                stop,
            },
            notices: notice_rx,
            thread: Some(thread),
        })
    }

    /// Cloneable control handle
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Queue a command
    pub fn send(&self, command: Command) -> Result<(), ConnectorError> {
        self.handle.send(command)
    }

    /// Copy the current display state
    pub fn frame(&self) -> ChartFrame {
        self.handle.frame()
    }

    /// Notices from the acquisition thread
    pub fn notices(&self) -> &Receiver<Notice> {
        &self.notices
    }

    /// Everything noticed since the last call
    pub fn drain_notices(&self) -> Vec<Notice> {
        self.notices.try_iter().collect()
    }

    /// Whether the acquisition thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Ask the acquisition thread to finish
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Wait for the acquisition thread and return its read counters
    pub fn join(mut self) -> Result<SensorStats, ConnectorError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| ConnectorError::Panicked)?,
            None => Err(ConnectorError::Disconnected),
        }
    }

    /// [`stop`](Self::stop) then [`join`](Self::join)
    pub fn shutdown(self) -> Result<SensorStats, ConnectorError> {
        self.stop();
        self.join()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.handle.stop();
        }
    }
}

fn bring_up<S: Sensor>(sensor: &mut S, options: &RuntimeOptions) -> Result<(), ConnectorError> {
    sensor.connect().map_err(|err| {
        log::error!("could not connect to sensor: {}", err);
        err
    })?;
    sensor.initialize().map_err(|err| {
        log::error!("sensor initialization failed: {}", err);
        err
    })?;

    if let Err(err) = sensor.set_auto_calibration(options.auto_calibration) {
        log::warn!("could not set automatic self-calibration: {}", err);
    }
    if let Some(target_ppm) = options.recalibrate_ppm {
        sensor.force_recalibration(target_ppm)?;
        log::info!("sensor baseline forced to {} ppm", target_ppm);
    }
    Ok(())
}

/// State owned by the acquisition thread
struct Acquisition<S, C> {
    session: Arc<Mutex<Session>>,
    stop: Arc<AtomicBool>,
    commands: Receiver<Command>,
    notices: Sender<Notice>,
    sensor: S,
    clock: C,
    rows: Vec<Box<dyn RowSink>>,
    pipeline: FluxPipeline,
    options: RuntimeOptions,
    stats: SensorStats,
}

impl<S: Sensor, C: TimeSource> Acquisition<S, C> {
    fn run(mut self) -> Result<SensorStats, ConnectorError> {
        log::info!("acquisition started");
        let result = self.run_loop();
        if let Err(err) = &result {
            log::error!("acquisition aborted: {}", err);
        }

        if let Err(err) = self.sensor.close() {
            log::warn!("closing sensor: {}", err);
        }
        for sink in &mut self.rows {
            if let Err(err) = sink.flush() {
                log::warn!("flushing row sink: {}", err);
            }
        }
        self.stop.store(true, Ordering::Release);
        self.notify(Notice::Stopped);

        log::info!(
            "acquisition stopped: {} readings, {} retries, {} skipped",
            self.stats.readings,
            self.stats.retries,
            self.stats.skipped
        );
        result.map(|()| self.stats)
    }

    fn run_loop(&mut self) -> Result<(), ConnectorError> {
        while !self.stop.load(Ordering::Acquire) {
            let mode = {
                let session = self.session.lock();
                if session.is_stopped() {
                    break;
                }
                session.mode()
            };

            let wait = match mode {
                Mode::Idle => self.options.idle_backoff,
                Mode::ZeroRun | Mode::Logging => {
                    self.poll()?;
                    self.options.poll_interval
                }
            };

            if !self.wait_for_commands(wait) {
                break;
            }
        }
        Ok(())
    }

    /// One sensor read routed through the session
    fn poll(&mut self) -> Result<(), ConnectorError> {
        let attempts = self.options.sensor_retries;
        let delay = self.options.retry_delay;
        let raw = match read_with_retry(&mut self.sensor, attempts, delay, &mut self.stats) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(()),
            Err(err) if err.is_transient() => {
                log::warn!("skipping reading: {}", err);
                self.notify(Notice::SensorSkipped(err.to_string()));
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let now = self.clock.now();
        let tick = self.session.lock().ingest(now, raw);

        match tick {
            Tick::Ready(job) => self.evaluate(job, now),
            Tick::ZeroRun(DriftProgress::Accepted(baseline)) => {
                self.notify(Notice::ZeroRunAccepted(baseline));
            }
            Tick::ZeroRun(DriftProgress::Extended { reason, target_s }) => {
                self.notify(Notice::ZeroRunExtended { reason, target_s });
            }
            Tick::Rejected(err) => log::debug!("reading rejected: {}", err),
            Tick::Idle | Tick::ZeroRun(_) | Tick::Filling { .. } => {}
        }
        Ok(())
    }

    fn evaluate(&mut self, job: WindowJob, now: Timestamp) {
        let evaluation = match job.run(&self.pipeline) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                log::debug!("no estimate at t={}: {}", now, err);
                return;
            }
        };

        let kept = {
            let mut session = self.session.lock();
            let kept = session.record_estimate(evaluation, now);
            session.evict(now);
            kept
        };
        if !kept {
            return;
        }

        let row = LogRow::from(&evaluation);
        for sink in &mut self.rows {
            if let Err(err) = sink.write_row(&row) {
                log::error!("writing row: {}", err);
            }
        }
        self.notify(Notice::Estimate(evaluation.flux));
    }

    /// Wait up to `wait` for commands and apply all that arrived
    ///
    /// Returns false once every command sender is gone.
    fn wait_for_commands(&mut self, wait: Duration) -> bool {
        match self.commands.recv_timeout(wait) {
            Ok(command) => self.apply(command),
            Err(RecvTimeoutError::Timeout) => return true,
            Err(RecvTimeoutError::Disconnected) => {
                log::info!("command channel closed");
                return false;
            }
        }
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
        true
    }

    fn apply(&mut self, command: Command) {
        let now = self.clock.now();
        let result = self.session.lock().apply(command, now);
        if let Ok(CommandOutcome::Stopped) = result {
            self.stop.store(true, Ordering::Release);
        }
        self.notify(Notice::Command { command, result });
    }

    fn notify(&self, notice: Notice) {
        // Nobody listening is fine
        let _ = self.notices.send(notice);
    }
}

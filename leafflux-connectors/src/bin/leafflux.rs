//! leafflux command-line entry point
//!
//! Runs a measurement against the simulated chamber: optional zero run with
//! the chamber empty, then live A_net with a CSV log and a console status
//! line. `soil` measures the pot alone for the respiration offset; `config`
//! prints the effective settings as TOML.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use leafflux_connectors::{
    ChartFrame, ChartSink, ConsoleSink, CsvSink, Notice, RowSink, Runtime, RuntimeOptions,
    Settings, SimulatedChamber,
};
use leafflux_core::soil::rectangular_area_m2;
use leafflux_core::time::SystemClock;
use leafflux_core::{Command, PotGeometry, RegressionKind, SoilRespirationEstimator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "leafflux", version, about = "Live leaf gas-exchange from a closed chamber")]
struct Cli {
    /// TOML settings file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (error, warn, info, debug, trace or an EnvFilter directive)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Measure net assimilation of a leaf
    Measure(MeasureArgs),
    /// Measure soil respiration of the pot alone
    Soil(SoilArgs),
    /// Print the effective settings as TOML
    Config(ChamberArgs),
}

/// Chamber and estimation overrides shared by every subcommand
#[derive(Args, Debug)]
struct ChamberArgs {
    /// Chamber air volume (L)
    #[arg(long)]
    chamber_volume: Option<f64>,

    /// Pot inside the chamber: box:WxHxL or frustum:TOPxBASExH (cm)
    #[arg(long, value_parser = parse_pot)]
    pot: Option<PotGeometry>,

    /// Regression window (samples)
    #[arg(short, long)]
    window: Option<usize>,

    /// Enable the conditioning cascade
    #[arg(long)]
    smoothing: bool,

    /// Huber regression instead of ordinary least squares
    #[arg(long)]
    robust: bool,

    /// Fit wet CO₂ without dry-air correction
    #[arg(long)]
    no_dry_correction: bool,

    /// CSV log path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Simulation seed
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated sensor noise (ppm)
    #[arg(long)]
    noise: Option<f64>,

    /// Force the sensor baseline to this CO₂ (ppm) before starting
    #[arg(long)]
    recalibrate: Option<u16>,

    /// Do not print a line per estimate
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct MeasureArgs {
    #[command(flatten)]
    chamber: ChamberArgs,

    /// Projected leaf area (cm²)
    #[arg(short, long)]
    leaf_area: Option<f64>,

    /// Report per chamber (µmol s⁻¹) instead of per leaf area
    #[arg(long)]
    chamber_basis: bool,

    /// Take a zero run with the chamber empty first
    #[arg(short, long)]
    zero_run: bool,

    /// Simulated leaf CO₂ slope (ppm/s, negative for uptake)
    #[arg(long, allow_negative_numbers = true)]
    uptake: Option<f64>,
}

#[derive(Args, Debug)]
struct SoilArgs {
    #[command(flatten)]
    chamber: ChamberArgs,

    /// Pot top width (cm)
    #[arg(long)]
    top_width: f64,

    /// Pot top length (cm)
    #[arg(long)]
    top_length: f64,

    /// Seconds ignored after the first estimate while the chamber settles
    #[arg(long, default_value_t = 60.0)]
    settle: f64,

    /// Simulated soil CO₂ slope (ppm/s)
    #[arg(long, default_value_t = 0.2)]
    efflux: f64,
}

fn parse_pot(text: &str) -> Result<PotGeometry, String> {
    let (shape, dims) = text
        .split_once(':')
        .ok_or_else(|| format!("expected SHAPE:AxBxC, got {text:?}"))?;
    let dims = dims
        .split('x')
        .map(|d| d.trim().parse::<f64>().map_err(|e| format!("{d:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let [a, b, c]: [f64; 3] = dims
        .try_into()
        .map_err(|dims: Vec<f64>| format!("expected three dimensions, got {}", dims.len()))?;
    match shape.trim().to_ascii_lowercase().as_str() {
        "box" => Ok(PotGeometry::Box {
            width_cm: a,
            height_cm: b,
            length_cm: c,
        }),
        "frustum" => Ok(PotGeometry::Frustum {
            top_width_cm: a,
            base_width_cm: b,
            height_cm: c,
        }),
        other => Err(format!("unknown pot shape {other:?} (box or frustum)")),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("reading settings from {}", path.display()))?,
        None => Settings::default(),
    };

    match cli.command {
        Commands::Measure(args) => {
            args.chamber.apply(&mut settings);
            args.apply(&mut settings);
            measure(settings, args.chamber.recalibrate)
        }
        Commands::Soil(args) => {
            args.chamber.apply(&mut settings);
            soil(settings, &args)
        }
        Commands::Config(args) => {
            args.apply(&mut settings);
            print!("{}", settings.to_toml()?);
            Ok(())
        }
    }
}

impl ChamberArgs {
    fn apply(&self, settings: &mut Settings) {
        let session = &mut settings.session;
        if let Some(volume) = self.chamber_volume {
            session.chamber_volume_l = volume;
        }
        if self.pot.is_some() {
            session.pot = self.pot;
        }
        if let Some(window) = self.window {
            session.window_size = window;
        }
        if self.smoothing {
            session.smoothing_enabled = true;
        }
        if self.robust {
            session.regression = RegressionKind::Robust;
        }
        if self.no_dry_correction {
            session.dry_correction = false;
        }
        if self.output.is_some() {
            settings.output.csv = self.output.clone();
        }
        if self.duration.is_some() {
            settings.run.duration_s = self.duration;
        }
        if let Some(seed) = self.seed {
            settings.simulation.seed = seed;
        }
        if let Some(noise) = self.noise {
            settings.simulation.noise_ppm = noise;
        }
        if self.quiet {
            settings.output.console = false;
        }
    }
}

impl MeasureArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(area) = self.leaf_area {
            settings.session.leaf_area_cm2 = area;
        }
        if self.chamber_basis {
            settings.session.area_basis = false;
        }
        if self.zero_run {
            settings.run.zero_run_first = true;
        }
        if let Some(uptake) = self.uptake {
            settings.simulation.uptake_ppm_s = uptake;
        }
    }
}

/// Logs the status line whenever it changes
#[derive(Default)]
struct StatusLine {
    last: String,
}

impl ChartSink for StatusLine {
    fn render(&mut self, frame: &ChartFrame) {
        let line = frame.status_line();
        if line != self.last {
            log::info!("{}", line);
            self.last = line;
        }
    }
}

fn row_sinks(settings: &Settings) -> anyhow::Result<Vec<Box<dyn RowSink>>> {
    let mut rows: Vec<Box<dyn RowSink>> = Vec::new();
    if let Some(path) = &settings.output.csv {
        let sink = CsvSink::create(path)
            .with_context(|| format!("creating CSV log {}", path.display()))?;
        rows.push(Box::new(sink));
    }
    if settings.output.console {
        rows.push(Box::new(ConsoleSink::new(settings.session.flux_basis().unit())));
    }
    Ok(rows)
}

fn start(
    settings: &Settings,
    chamber: SimulatedChamber,
    recalibrate_ppm: Option<u16>,
) -> anyhow::Result<Runtime> {
    let options = RuntimeOptions {
        recalibrate_ppm,
        ..RuntimeOptions::from_config(&settings.session)
    };
    let rows = row_sinks(settings)?;
    Runtime::start_with(settings.session.clone(), options, chamber, SystemClock, rows)
        .context("starting acquisition")
}

fn measure(settings: Settings, recalibrate_ppm: Option<u16>) -> anyhow::Result<()> {
    let chamber = SimulatedChamber::new(settings.simulation);
    let leaf = chamber.leaf_switch();
    if settings.run.zero_run_first {
        leaf.set(false);
    }

    let runtime = start(&settings, chamber, recalibrate_ppm)?;
    if settings.run.zero_run_first {
        log::info!("zero run with the chamber empty");
        runtime.send(Command::StartZeroRun)?;
    } else {
        runtime.send(Command::StartLogging)?;
    }

    render_loop(&runtime, &settings, |notice| match notice {
        Notice::ZeroRunAccepted(baseline) => {
            log::info!("zero run accepted, drift {:+.4} ppm/s; leaf in", baseline.slope);
            leaf.set(true);
            Some(Command::StartLogging)
        }
        Notice::ZeroRunExtended { reason, target_s } => {
            log::warn!("zero run extended to {:.0} s: {}", target_s, reason);
            None
        }
        _ => None,
    })?;

    let stats = runtime.shutdown()?;
    log::info!("{} readings, {} skipped", stats.readings, stats.skipped);
    Ok(())
}

fn soil(mut settings: Settings, args: &SoilArgs) -> anyhow::Result<()> {
    let top_area_m2 = rectangular_area_m2(args.top_width, args.top_length);
    if !(top_area_m2.is_finite() && top_area_m2 > 0.0) {
        bail!("pot top must have a positive area");
    }
    settings.session.area_basis = false;
    settings.simulation.uptake_ppm_s = args.efflux;
    settings.simulation.transpiration_pct_s = 0.0;

    let mut estimator = SoilRespirationEstimator::new(top_area_m2, args.settle);
    let runtime = start(&settings, SimulatedChamber::new(settings.simulation), None)?;
    runtime.send(Command::StartLogging)?;

    render_loop(&runtime, &settings, |notice| {
        if let Notice::Estimate(flux) = notice {
            if estimator.record(flux.timestamp, flux.value).is_some() {
                if let Some(mean) = estimator.running_mean_m2() {
                    log::debug!("soil respiration so far {:.3} µmol m⁻² s⁻¹", mean);
                }
            }
        }
        None
    })?;
    runtime.shutdown()?;

    match estimator.estimate_m2() {
        Some(offset) => {
            log::info!(
                "soil respiration {:.3} µmol m⁻² s⁻¹ from {} windows",
                offset,
                estimator.len()
            );
            println!("soil_respiration_correction = {offset}");
            Ok(())
        }
        None => bail!("no usable soil windows; run longer than the settling period"),
    }
}

/// Redraw until the duration ends or the acquisition thread stops
///
/// `on_notice` may answer a notice with a follow-up command.
fn render_loop<F>(runtime: &Runtime, settings: &Settings, mut on_notice: F) -> anyhow::Result<()>
where
    F: FnMut(&Notice) -> Option<Command>,
{
    let started = Instant::now();
    let deadline = settings.run.duration_s.and_then(|s| Duration::try_from_secs_f64(s).ok());
    let frame_interval = Duration::try_from_secs_f64(settings.run.frame_interval_s)
        .unwrap_or(Duration::from_secs(1));
    let mut status = StatusLine::default();

    loop {
        for notice in runtime.drain_notices() {
            if let Notice::Command {
                command,
                result: Err(err),
            } = &notice
            {
                log::warn!("{:?}: {}", command, err);
            }
            if notice == Notice::Stopped {
                return Ok(());
            }
            if let Some(command) = on_notice(&notice) {
                runtime.send(command)?;
            }
        }

        status.render(&runtime.frame());

        if deadline.is_some_and(|d| started.elapsed() >= d) {
            log::info!("run duration reached");
            return Ok(());
        }
        if runtime.is_finished() {
            return Ok(());
        }
        thread::sleep(frame_interval);
    }
}

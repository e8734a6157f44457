use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use sat_o_track::config::{Config, ConfigError, DriverKind, RotatorConfig};
use sat_o_track::predict::{
    format_next_pass, match_satellites, Ephemeris, Observer, PredictError, Satellite, TleCatalog,
};
use sat_o_track::rotator::{map_to_rotator, ActuatorDriver, PwmServo, RotatorLimits, SimulatedRotator};
use sat_o_track::scoring;
use sat_o_track::tracker::{
    compute_frame, parse_command, CachedFrame, Command, ComputeScheduler, NextPassCache,
    TickOutcome, TrackerError, TrackingController,
};

const STATUS_EVERY: StdDuration = StdDuration::from_secs(5);

#[derive(Parser)]
#[command(name = "sat-o-track")]
#[command(about = "Point an az/el rotator at the most trackable satellite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track satellites, reading operator commands from stdin
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the current score board
    Rank {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show how a sky direction maps onto the rotator
    #[command(allow_negative_numbers = true)]
    Map {
        azimuth: f64,
        elevation: f64,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Error)]
enum AppError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("satellites: {0}")]
    Predict(#[from] PredictError),
    #[error("tracker: {0}")]
    Tracker(#[from] TrackerError),
    #[error("nothing to track: {0}")]
    NothingToTrack(String),
    #[error("runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config } => run(&config),
        Commands::Rank { config, json } => rank(&config, json),
        Commands::Map {
            azimuth,
            elevation,
            config,
        } => map(azimuth, elevation, config.as_deref()),
        Commands::Validate { config } => validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Satellites chosen for tracking plus the propagator serving them.
struct TrackedSet {
    satellites: Arc<[Satellite]>,
    ephemeris: Arc<dyn Ephemeris>,
    observer: Observer,
}

fn load_tracked(config: &Config) -> Result<TrackedSet, AppError> {
    let observer = config.observer()?;
    let (all, ephemeris) = TleCatalog::load(&config.satellites.tle_file)?.into_ephemeris();

    let selected = if config.satellites.wants_best() {
        let board = scoring::score(&ephemeris, &all, &observer, Utc::now(), &config.scoring);
        let picked: Vec<Satellite> = board
            .ranked()
            .into_iter()
            .take(config.satellites.best_count.min(config.satellites.max_tracked))
            .map(|i| all[i].clone())
            .collect();
        if picked.is_empty() {
            return Err(AppError::NothingToTrack(
                "no satellite is above the horizon".to_string(),
            ));
        }
        log::info!(
            "Best satellites: {}",
            picked
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        picked
    } else {
        let (picked, missing) =
            match_satellites(&all, &config.satellites.names, config.satellites.max_tracked);
        for name in missing {
            log::warn!("'{}' not found in {}", name, config.satellites.tle_file.display());
        }
        if picked.is_empty() {
            return Err(AppError::NothingToTrack(format!(
                "none of {:?} found",
                config.satellites.names
            )));
        }
        picked
    };

    Ok(TrackedSet {
        satellites: selected.into(),
        ephemeris: Arc::new(ephemeris),
        observer,
    })
}

fn open_driver(config: &RotatorConfig) -> Box<dyn ActuatorDriver> {
    match config.driver {
        DriverKind::Simulated => Box::new(SimulatedRotator::new(config.limits)),
        DriverKind::Pwm => Box::new(PwmServo::open(&config.pwm, config.limits)),
    }
}

fn run(path: &std::path::Path) -> Result<(), AppError> {
    let config = Config::from_file(path)?;
    let tracked = load_tracked(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(control_loop(config, tracked))
}

async fn control_loop(config: Config, tracked: TrackedSet) -> Result<(), AppError> {
    let TrackedSet {
        satellites,
        ephemeris,
        observer,
    } = tracked;

    for (i, sat) in satellites.iter().enumerate() {
        log::info!("{}: {} (NORAD {})", i + 1, sat.name, sat.norad_id);
    }

    let mut scheduler = ComputeScheduler::new(ephemeris.clone(), config.scheduler_settings());
    scheduler.start()?;

    let driver = open_driver(&config.rotator);
    log::info!(
        "Rotator driver {} (hardware {})",
        config.rotator.driver,
        if driver.hardware_available() { "available" } else { "unavailable" }
    );
    let mut controller = TrackingController::new(
        ephemeris,
        satellites.clone(),
        observer,
        driver,
        config.controller_settings(),
    );

    let (command_tx, mut command_rx) = mpsc::channel::<Command>(16);
    // Off the runtime: a pending stdin read would block its shutdown.
    std::thread::spawn(move || read_commands(std::io::stdin().lock(), command_tx));

    let mut ticker = tokio::time::interval(config.intervals.control_tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_status: Option<(Arc<CachedFrame>, tokio::time::Instant)> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                let frame = scheduler.maybe_refresh(&satellites, &observer, now);
                let outcome = controller.tick(now, frame.as_deref());
                if let TickOutcome::Gliding { done: true, .. } = outcome {
                    log::info!("Glide complete");
                }

                if let Some(frame) = frame {
                    let due = match &last_status {
                        None => true,
                        Some((shown, at)) => {
                            !Arc::ptr_eq(shown, &frame) && at.elapsed() >= STATUS_EVERY
                        }
                    };
                    if due {
                        log_status(&controller, &frame, &satellites, now);
                        last_status = Some((frame, tokio::time::Instant::now()));
                    }
                }
            }
            command = command_rx.recv() => match command {
                Some(command) => {
                    if let Err(e) = controller.handle(command, Utc::now()) {
                        log::warn!("{:?} rejected: {}", command, e);
                    }
                }
                None => {
                    log::info!("Input closed, stopping");
                    break;
                }
            },
            _ = &mut shutdown => {
                log::info!("Interrupted, stopping");
                break;
            }
        }
    }

    drop(controller);
    scheduler.shutdown().await;
    Ok(())
}

fn read_commands(input: impl BufRead, tx: mpsc::Sender<Command>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Reading commands failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(command) => {
                if tx.blocking_send(command).is_err() {
                    break;
                }
            }
            Err(e) => log::warn!("{}", e),
        }
    }
}

fn log_status<D: ActuatorDriver>(
    controller: &TrackingController<D>,
    frame: &CachedFrame,
    satellites: &[Satellite],
    now: chrono::DateTime<Utc>,
) {
    log::info!("{}", frame.summary(satellites));

    let status = controller.status();
    let focus = match controller.focus_position(now, Some(frame)) {
        Some((sat, sky)) => format!(
            "{} az {:.1}° el {:.1}° {:.0} km",
            sat.name, sky.azimuth_deg, sky.elevation_deg, sky.distance_km
        ),
        None => "no target".to_string(),
    };
    log::info!(
        "{:?} | {} | auto {} | rotator az {:.1}° el {:.1}°{}",
        status.target,
        focus,
        if status.auto_tracking { "on" } else { "off" },
        status.azimuth_deg,
        status.elevation_deg,
        if status.gliding { " (gliding)" } else { "" }
    );
}

#[derive(Serialize)]
struct RankEntry<'a> {
    number: usize,
    name: &'a str,
    norad_id: u32,
    score: f64,
    best: bool,
    elevation_deg: Option<f64>,
    next_pass_s: Option<i64>,
}

fn rank(path: &std::path::Path, json: bool) -> Result<(), AppError> {
    let config = Config::from_file(path)?;
    let tracked = load_tracked(&config)?;
    let settings = config.scheduler_settings();
    let mut passes = NextPassCache::new(settings.next_pass_refresh);
    let frame = compute_frame(
        tracked.ephemeris.as_ref(),
        &tracked.satellites,
        &tracked.observer,
        Utc::now(),
        &settings.frame,
        &mut passes,
    );

    let entries: Vec<RankEntry> = tracked
        .satellites
        .iter()
        .enumerate()
        .map(|(i, sat)| RankEntry {
            number: i + 1,
            name: &sat.name,
            norad_id: sat.norad_id,
            score: frame.scores.score(i),
            best: frame.scores.best == Some(i),
            elevation_deg: frame.telemetry[i].as_ref().map(|t| t.sky.elevation_deg),
            next_pass_s: frame.next_passes[i].map(|d| d.num_seconds()),
        })
        .collect();

    if json {
        match serde_json::to_string_pretty(&entries) {
            Ok(text) => println!("{}", text),
            Err(e) => return Err(AppError::Runtime(e.into())),
        }
        return Ok(());
    }

    for entry in &entries {
        let elevation = entry
            .elevation_deg
            .map(|el| format!("{:6.1}°", el))
            .unwrap_or_else(|| "      -".to_string());
        println!(
            "{:>2}{} {:<24} {:>9.2} {} next {}",
            entry.number,
            if entry.best { "*" } else { " " },
            entry.name,
            entry.score,
            elevation,
            format_next_pass(frame.next_passes[entry.number - 1])
        );
    }
    Ok(())
}

fn map(azimuth: f64, elevation: f64, config: Option<&std::path::Path>) -> Result<(), AppError> {
    let limits = match config {
        Some(path) => Config::from_file(path)?.rotator.limits,
        None => RotatorLimits::default(),
    };
    let angle = map_to_rotator(azimuth, elevation, &limits);
    println!(
        "sky az {:.2}° el {:.2}° -> rotator az {:.2}° el {:.2}° ({})",
        azimuth,
        elevation,
        angle.azimuth_deg,
        angle.elevation_deg,
        if angle.flipped { "flipped" } else { "direct" }
    );
    Ok(())
}

fn validate(path: &std::path::Path) -> Result<(), AppError> {
    let config = Config::from_file(path)?;
    let observer = config.observer()?;
    println!("Config is valid");
    println!(
        "  station {} at {:.4}, {:.4} ({} m)",
        config.station.name.as_deref().unwrap_or("(unnamed)"),
        observer.latitude_deg,
        observer.longitude_deg,
        observer.altitude_m
    );
    println!(
        "  satellites {:?} from {}",
        config.satellites.names,
        config.satellites.tle_file.display()
    );
    println!(
        "  tick {}, frame {}, next pass {}",
        humantime::format_duration(config.intervals.control_tick),
        humantime::format_duration(config.intervals.frame_refresh),
        humantime::format_duration(config.intervals.next_pass_refresh)
    );
    println!("  rotator driver {}", config.rotator.driver);
    Ok(())
}

//! CardioZone CLI - Command-line interface for CardioZone
//!
//! Commands:
//! - zones: Print the heart-rate training zones for an age and gender
//! - simulate: Run a guided workout in virtual time and emit one record per tick
//! - run: Run a guided workout in real time, controlled from stdin

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cardiozone::config::EFFORT_STEP;
use cardiozone::types::{Announcement, SessionSnapshot};
use cardiozone::zones::find_zone;
use cardiozone::{
    calculate_zones, max_heart_rate, select_target_zone, ChannelSpeech, Gender, HeartRateZone,
    SessionConfig, SessionHandle, WorkoutError, WorkoutSession, CARDIOZONE_VERSION,
};

/// Upper bound for `simulate --ticks`
const MAX_SIMULATED_TICKS: u64 = 86_400;

/// CardioZone - heart-rate training zones and guided workouts
#[derive(Parser)]
#[command(name = "cardiozone")]
#[command(version = CARDIOZONE_VERSION)]
#[command(about = "Heart-rate training zones and a guided workout simulator", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the training zones for an age and gender
    Zones {
        /// Age in years (18-100)
        #[arg(short, long)]
        age: u32,

        /// Gender (m or f)
        #[arg(short, long)]
        gender: Gender,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a guided workout in virtual time (no waiting)
    Simulate {
        #[command(flatten)]
        session: SessionArgs,

        /// Number of ticks to simulate (at most one day of seconds)
        #[arg(
            long,
            default_value = "60",
            value_parser = clap::value_parser!(u64).range(1..=MAX_SIMULATED_TICKS)
        )]
        ticks: u64,

        /// Output format
        #[arg(long, default_value = "text")]
        output_format: OutputFormat,
    },

    /// Run a guided workout in real time (stdin: + - p m q)
    Run {
        #[command(flatten)]
        session: SessionArgs,

        /// Stop automatically after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Age in years (18-100)
    #[arg(short, long)]
    age: u32,

    /// Gender (m or f)
    #[arg(short, long)]
    gender: Gender,

    /// Target zone id (defaults to the designated target zone)
    #[arg(long)]
    zone: Option<String>,

    /// Initial effort level (0-100)
    #[arg(long)]
    effort: Option<u8>,

    /// Random seed for a reproducible session
    #[arg(long)]
    seed: Option<u64>,

    /// Start with voice feedback muted
    #[arg(long)]
    muted: bool,

    /// Voice locale
    #[arg(long)]
    locale: Option<String>,

    /// Chance of announcing while in the target zone (0-1)
    #[arg(long)]
    in_target_probability: Option<f64>,

    /// Session configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One status line per tick
    Text,
    /// Newline-delimited JSON (one record per tick)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "cardiozone=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), CardioCliError> {
    match cli.command {
        Commands::Zones { age, gender, json } => cmd_zones(age, gender, json),

        Commands::Simulate {
            session,
            ticks,
            output_format,
        } => cmd_simulate(&session, ticks, output_format),

        Commands::Run { session, duration } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(cmd_run(&session, duration.map(Duration::from_secs)))
        }
    }
}

fn cmd_zones(age: u32, gender: Gender, json: bool) -> Result<(), CardioCliError> {
    let max = max_heart_rate(age, gender)?;
    let zones = calculate_zones(age, gender)?;

    if json {
        let table = serde_json::json!({
            "age": age,
            "gender": gender,
            "max_heart_rate": max,
            "zones": zones,
        });
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!("Max heart rate: {} bpm (age {}, {})", max, age, gender.as_str());
    println!();
    println!(
        "{:<18} {:<10} {:<8} {:<11} {}",
        "ZONE", "BPM", "% MAX", "DURATION", "GOAL"
    );
    for zone in &zones {
        let name = if zone.is_target {
            format!("{} *", zone.name)
        } else {
            zone.name.clone()
        };
        println!(
            "{:<18} {:<10} {:<8} {:<11} {}",
            name,
            format!("{}-{}", zone.min_bpm, zone.max_bpm),
            zone.range_label(),
            zone.duration,
            zone.goal
        );
    }
    println!();
    println!("* target zone for guided workouts");

    Ok(())
}

/// Resolve configuration, max heart rate and target zone from the flags
fn prepare(args: &SessionArgs) -> Result<(SessionConfig, i32, HeartRateZone), CardioCliError> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_json(&fs::read_to_string(path)?)?,
        None => SessionConfig::default(),
    };

    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(effort) = args.effort {
        config.simulator.initial_effort = effort;
    }
    if let Some(locale) = &args.locale {
        config.announcer.locale = locale.clone();
    }
    if let Some(probability) = args.in_target_probability {
        config.announcer.in_target_probability = probability;
    }
    config.validate()?;

    let max = max_heart_rate(args.age, args.gender)?;
    let zones = calculate_zones(args.age, args.gender)?;
    let zone = match &args.zone {
        Some(id) => find_zone(&zones, id)?.clone(),
        None => select_target_zone(&zones)
            .cloned()
            .ok_or(WorkoutError::InvalidZone)?,
    };

    Ok((config, max, zone))
}

/// Tick times spaced one period apart, stopping early if the clock would overflow
fn virtual_instants(base: Instant, period: Duration, ticks: u64) -> impl Iterator<Item = Instant> {
    let count = usize::try_from(ticks).unwrap_or(usize::MAX);
    std::iter::successors(Some(base), move |now| now.checked_add(period)).take(count)
}

#[derive(serde::Serialize)]
struct TickRecord {
    #[serde(flatten)]
    snapshot: SessionSnapshot,
    announcement: Option<Announcement>,
}

fn cmd_simulate(
    args: &SessionArgs,
    ticks: u64,
    output_format: OutputFormat,
) -> Result<(), CardioCliError> {
    let (config, max, zone) = prepare(args)?;
    let period = config.tick_period();

    let mut session = WorkoutSession::new(config)?;
    session.start(Some(zone), max)?;
    session.set_muted(args.muted)?;

    let mut records = Vec::new();

    for now in virtual_instants(Instant::now(), period, ticks) {
        let Some(report) = session.tick_at(now) else {
            break;
        };
        if let Some(announcement) = &report.announcement {
            info!(
                elapsed_seconds = announcement.elapsed_seconds,
                text = %announcement.text,
                "announcement"
            );
        }
        records.push(TickRecord {
            snapshot: session.snapshot(),
            announcement: report.announcement,
        });
    }

    session.close();
    let summary = session.snapshot();

    match output_format {
        OutputFormat::Text => {
            for record in &records {
                println!("{}", status_line(&record.snapshot));
                if let Some(a) = &record.announcement {
                    println!("{}", voice_line(&a.locale, &a.text));
                }
            }
            println!("{}", summary_line(&summary));
        }
        OutputFormat::Ndjson => {
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(&records)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&records)?),
    }

    Ok(())
}

async fn cmd_run(args: &SessionArgs, duration: Option<Duration>) -> Result<(), CardioCliError> {
    let (config, max, zone) = prepare(args)?;

    let (speech, mut utterances) = ChannelSpeech::channel();
    let session = WorkoutSession::new(config)?.with_speech(speech);
    let mut handle = SessionHandle::spawn(session);

    handle.start(Some(zone), max).await?;
    handle.set_muted(args.muted).await?;

    if atty::is(atty::Stream::Stdin) {
        eprintln!("Controls: + more effort, - less effort, p pause/resume, m mute, q quit");
    }

    let mut snapshots = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut last_elapsed = 0;

    let stop = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,

            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        if !handle_input(&handle, line.trim()).await? {
                            break;
                        }
                    }
                    None if duration.is_some() => stdin_open = false,
                    None => break,
                }
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.elapsed_seconds != last_elapsed {
                    last_elapsed = snapshot.elapsed_seconds;
                    println!("{}", status_line(&snapshot));
                }
            }

            Some(utterance) = utterances.recv() => {
                println!("{}", voice_line(&utterance.locale, &utterance.text));
            }
        }
    }

    let summary = handle.close().await;
    println!("{}", summary_line(&summary));
    Ok(())
}

/// Apply one stdin command; false means quit
async fn handle_input(handle: &SessionHandle, input: &str) -> Result<bool, CardioCliError> {
    match input {
        "+" => {
            handle.adjust_effort(EFFORT_STEP).await?;
        }
        "-" => {
            handle.adjust_effort(-EFFORT_STEP).await?;
        }
        "p" => {
            let phase = handle.toggle_running().await?;
            eprintln!("Session {}", phase);
        }
        "m" => {
            let muted = !handle.snapshot().is_muted;
            handle.set_muted(muted).await?;
            eprintln!("Voice {}", if muted { "muted" } else { "on" });
        }
        "q" => return Ok(false),
        "" => {}
        other => eprintln!("Unknown command '{}' (use + - p m q)", other),
    }
    Ok(true)
}

fn status_line(snapshot: &SessionSnapshot) -> String {
    let message = snapshot
        .feedback
        .as_ref()
        .map(|f| f.message.as_str())
        .unwrap_or("Warm-up");
    format!(
        "{}  {:>3} bpm  effort {:>3}%  {}",
        snapshot.elapsed_display, snapshot.current_bpm, snapshot.effort_level, message
    )
}

fn voice_line(locale: &str, text: &str) -> String {
    format!("[voice {}] {}", locale, text)
}

fn summary_line(snapshot: &SessionSnapshot) -> String {
    let tally = &snapshot.time_in_zone;
    format!(
        "Session {} after {}: {}s below, {}s in target ({:.0}%), {}s above",
        snapshot.phase,
        snapshot.elapsed_display,
        tally.below,
        tally.in_target,
        tally.in_target_ratio() * 100.0,
        tally.above
    )
}

// Error types

#[derive(Debug)]
enum CardioCliError {
    Io(io::Error),
    Workout(WorkoutError),
    Json(serde_json::Error),
}

impl From<io::Error> for CardioCliError {
    fn from(e: io::Error) -> Self {
        CardioCliError::Io(e)
    }
}

impl From<WorkoutError> for CardioCliError {
    fn from(e: WorkoutError) -> Self {
        CardioCliError::Workout(e)
    }
}

impl From<serde_json::Error> for CardioCliError {
    fn from(e: serde_json::Error) -> Self {
        CardioCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CardioCliError> for CliError {
    fn from(e: CardioCliError) -> Self {
        match e {
            CardioCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CardioCliError::Workout(e) => {
                let hint = match &e {
                    WorkoutError::InvalidAge(_) => Some("Age must be between 18 and 100"),
                    WorkoutError::UnknownZone(_) => {
                        Some("Valid zones: warmup, light, aerobic, anaerobic")
                    }
                    WorkoutError::InvalidConfig(_) | WorkoutError::JsonError(_) => {
                        Some("Check the session configuration file")
                    }
                    _ => None,
                };
                CliError {
                    code: "WORKOUT_ERROR".to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            CardioCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
        }
    }
}

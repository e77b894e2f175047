use clap::{App, Arg, SubCommand};
use colored::*;
use replaybus::demo::{DriveLayer, ImuLayer};
use replaybus::error::ReplayError;
use replaybus::replay::load_log_file;
use replaybus::{IoBus, ReplayPhase, ReplayScheduler};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time;

// Process exit codes for scripted callers.
const EXIT_FILE_NOT_FOUND: i32 = 2;
const EXIT_WRONG_EXTENSION: i32 = 3;
const EXIT_PARSE_FAILURE: i32 = 4;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let matches = App::new("replaybus")
        .version("0.1.0")
        .author("Robot Systems Engineering Team")
        .about("Telemetry capture and deterministic replay engine")
        .subcommand(
            SubCommand::with_name("replay")
                .about("Replay a captured log file into the demo layers")
                .arg(
                    Arg::with_name("file")
                        .value_name("FILE")
                        .help("Path to a captured .rbus log file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("period")
                        .long("period")
                        .value_name("MS")
                        .help("Override the replay tick period in milliseconds")
                        .takes_value(true)
                        .validator(|v| {
                            v.parse::<u64>()
                                .map(|_| ())
                                .map_err(|_| "period must be a number of milliseconds".into())
                        }),
                ),
        )
        .subcommand(
            SubCommand::with_name("inspect")
                .about("Parse a captured log file and print its channel summary")
                .arg(
                    Arg::with_name("file")
                        .value_name("FILE")
                        .help("Path to a captured .rbus log file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("format")
                        .short("f")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format")
                        .takes_value(true)
                        .possible_values(&["table", "json"])
                        .default_value("table"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        ("replay", Some(sub)) => {
            let file = sub.value_of("file").unwrap_or_default();
            let period = sub.value_of("period").and_then(|v| v.parse::<u64>().ok());
            run_replay(Path::new(file), period).await;
        }
        ("inspect", Some(sub)) => {
            let file = sub.value_of("file").unwrap_or_default();
            let format = sub.value_of("format").unwrap_or("table");
            run_inspect(Path::new(file), format);
        }
        _ => {
            eprintln!("{}", "No subcommand given; try `replaybus --help`.".yellow());
            std::process::exit(1);
        }
    }
}

fn load_or_exit(path: &Path) -> replaybus::ReplayLog {
    match load_log_file(path) {
        Ok(log) => log,
        Err(error) => {
            eprintln!("{} {}", "error:".red().bold(), error);
            let code = match error {
                ReplayError::FileNotFound(_) => EXIT_FILE_NOT_FOUND,
                ReplayError::WrongExtension(..) => EXIT_WRONG_EXTENSION,
                ReplayError::ParseFailure(_) => EXIT_PARSE_FAILURE,
                _ => 1,
            };
            std::process::exit(code);
        }
    }
}

async fn run_replay(path: &Path, period_override: Option<u64>) {
    let log = load_or_exit(path);

    if log.truncated() {
        eprintln!(
            "{} stream was truncated; replaying the {} recovered cycles",
            "warning:".yellow().bold(),
            log.cycles()
        );
    }

    let mut bus = IoBus::new();
    let drive = Arc::new(Mutex::new(DriveLayer::new()));
    let imu = Arc::new(Mutex::new(ImuLayer::new()));

    let layers: [replaybus::LayerHandle; 2] = [drive, imu];
    for layer in layers {
        if let Err(error) = bus.register(layer) {
            eprintln!("{} {}", "error:".red().bold(), error);
            std::process::exit(1);
        }
    }

    let mut scheduler = ReplayScheduler::new();
    if let Some(period) = period_override {
        scheduler.set_period_ms(period);
    }

    let total = log.cycles();
    if let Err(error) = scheduler.enter_replay(&bus, log) {
        eprintln!("{} {}", "error:".red().bold(), error);
        std::process::exit(1);
    }

    println!(
        "{} {} cycles at {}ms",
        "replaying".green().bold(),
        total,
        scheduler.period_ms()
    );

    let mut interval = time::interval(Duration::from_millis(scheduler.period_ms()));
    while scheduler.phase() == ReplayPhase::Replaying {
        interval.tick().await;
        scheduler.tick(&bus);
    }

    let stats = scheduler.stats();
    println!(
        "{} {} ticks, {} writes, {} skipped",
        "replay complete:".green().bold(),
        stats.ticks,
        stats.writes,
        stats.skipped
    );
}

fn run_inspect(path: &Path, format: &str) {
    let log = load_or_exit(path);
    let summary = log.summary();

    if format == "json" {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(error) => {
                eprintln!("{} {}", "error:".red().bold(), error);
                std::process::exit(1);
            }
        }
        return;
    }

    println!("{}", path.display().to_string().bold());
    println!(
        "  cycles: {} ({} early, {} data){}",
        summary.cycles,
        summary.early_cycles,
        summary.data_cycles,
        if summary.truncated {
            " [truncated]".red().to_string()
        } else {
            String::new()
        }
    );
    println!("  messages: {}", summary.messages);
    println!("  channels:");

    for channel in &summary.channels {
        let span = match (channel.first_cycle, channel.last_cycle) {
            (Some(first), Some(last)) => format!("cycles {first}..={last}"),
            _ => "empty".into(),
        };
        println!(
            "    {} {:?} - {} entries, {}",
            channel.name.cyan(),
            channel.kind,
            channel.entries,
            span
        );
    }
}

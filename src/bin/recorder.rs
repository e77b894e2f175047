use replaybus::demo::{DriveLayer, ImuLayer};
use replaybus::sampler::DEFAULT_SAMPLE_PERIOD_MS;
use replaybus::sink::FileSink;
use replaybus::{AutoSampler, IoBus};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time;
use tracing::{info, warn};

const DEFAULT_CAPTURE_SECONDS: u64 = 10;

/// Fixed-rate capture runner: registers the demo layers, samples them at
/// the standard cadence and writes the framed stream to a log file.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let seconds: u64 = match args.next() {
        Some(raw) => raw.parse()?,
        None => DEFAULT_CAPTURE_SECONDS,
    };
    let sink = match args.next() {
        Some(path) => FileSink::new(PathBuf::from(path)),
        None => FileSink::at_default_path(),
    };
    let path = sink.path().to_path_buf();

    let drive = Arc::new(Mutex::new(DriveLayer::new()));
    let imu = Arc::new(Mutex::new(ImuLayer::new()));

    let mut bus = IoBus::new();
    bus.register(drive.clone())?;
    bus.register(imu.clone())?;

    let mut sampler = AutoSampler::new(Box::new(sink))?;
    sampler.log_line(&format!("capture session started, {seconds}s"));

    info!(path = %path.display(), seconds, "recording");

    let total_ticks = seconds * 1000 / DEFAULT_SAMPLE_PERIOD_MS;
    let mut interval = time::interval(Duration::from_millis(DEFAULT_SAMPLE_PERIOD_MS));

    for _ in 0..total_ticks {
        interval.tick().await;

        // Advance the simulated sources, then capture them.
        if let Ok(mut drive) = drive.lock() {
            drive.simulate();
        }
        if let Ok(mut imu) = imu.lock() {
            imu.simulate();
        }

        sampler.tick(&bus);
    }

    sampler.log_line("capture session ended");
    let stats = sampler.stats();
    if let Err(error) = sampler.close() {
        warn!(%error, "sink close failed");
    }
    bus.close_all();

    info!(
        cycles = stats.cycles,
        records = stats.records_written,
        skipped = stats.records_skipped,
        path = %path.display(),
        "capture complete"
    );

    Ok(())
}

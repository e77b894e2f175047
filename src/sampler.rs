use crate::bus::IoBus;
use crate::codec::FrameEncoder;
use crate::error::SinkError;
use crate::sink::LogSink;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Capture cadence. Replay runs at the same interval so a recorded session
/// re-executes on the original timeline.
pub const DEFAULT_SAMPLE_PERIOD_MS: u64 = 100;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SamplerStats {
    pub cycles: u64,
    pub records_written: u64,
    pub records_skipped: u64,
    pub lines_written: u64,
}

/// The auto-sample scheduler: once per tick it samples the bus, encodes
/// each record and appends the frames plus a cycle-boundary marker to the
/// sink.
///
/// The fixed-rate timer lives with the caller (see `bin/recorder.rs`);
/// `tick` itself is synchronous so the capture path stays testable without
/// a runtime.
pub struct AutoSampler {
    encoder: FrameEncoder,
    sink: Box<dyn LogSink>,
    cycle: u64,
    seen_data: bool,
    stats: SamplerStats,
}

impl AutoSampler {
    /// Opens the sink and returns a sampler at cycle zero.
    pub fn new(mut sink: Box<dyn LogSink>) -> Result<Self, SinkError> {
        sink.open()?;

        Ok(Self {
            encoder: FrameEncoder::new(),
            sink,
            cycle: 0,
            seen_data: false,
            stats: SamplerStats::default(),
        })
    }

    /// Runs one sampling pass.
    ///
    /// A sink failure on one record skips that record only; the
    /// cycle-boundary frame is still written and the cycle counter always
    /// advances, so one bad producer can never stall the stream.
    pub fn tick(&mut self, bus: &IoBus) {
        for record in bus.sample(self.cycle) {
            let frames = self.encoder.encode_record(&record);
            if frames.is_empty() {
                // Unchanged value; the parser gap-fills it on replay.
                continue;
            }

            let mut failed = false;
            for frame in &frames {
                if let Err(error) = self.sink.append_record(frame) {
                    warn!(channel = %record.name, %error, "sink write failed, record dropped");
                    failed = true;
                    break;
                }
            }

            if failed {
                self.stats.records_skipped += 1;
            } else {
                self.seen_data = true;
                self.stats.records_written += 1;
            }
        }

        let early = !self.seen_data;
        if let Err(error) = self
            .sink
            .append_record(&FrameEncoder::encode_cycle_mark(early))
        {
            warn!(cycle = self.cycle, %error, "cycle mark write failed");
        }

        self.cycle += 1;
        self.stats.cycles += 1;
    }

    /// Forwards a free-text line to the sink, independent of the sampling
    /// path. Lines are not typed channels and are not replayable.
    pub fn log_line(&mut self, line: &str) {
        match self.sink.append_line(line) {
            Ok(()) => self.stats.lines_written += 1,
            Err(error) => warn!(%error, "line write failed"),
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }

    pub fn close(&mut self) -> Result<(), SinkError> {
        self.sink.close()
    }
}

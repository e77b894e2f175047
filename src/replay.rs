use crate::bus::{lock_layer, IoBus};
use crate::error::{ReplayError, SeriesError};
use crate::parser::ReplayLog;
use crate::sampler::DEFAULT_SAMPLE_PERIOD_MS;
use crate::sink::LOG_EXTENSION;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayPhase {
    Idle,
    Replaying,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReplayStats {
    pub ticks: u64,
    pub writes: u64,
    pub skipped: u64,
}

/// One resolved pairing: the recorded read channel and the write channel
/// that accepts its replayed values.
#[derive(Debug, Clone)]
struct ResolvedLink {
    series: String,
    target: String,
}

/// Drives recorded values back into live layers at the original cadence.
///
/// While a replay is active every linked layer is flagged "not real", so
/// its hardware-backed data path is bypassed and consumers observe exactly
/// the recorded values.
pub struct ReplayScheduler {
    phase: ReplayPhase,
    log: Option<ReplayLog>,
    cycle: u64,
    links: Vec<ResolvedLink>,
    saved_real: Vec<(String, bool)>,
    missing_warned: HashSet<String>,
    stats: ReplayStats,
    period_ms: u64,
}

impl Default for ReplayScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayScheduler {
    pub fn new() -> Self {
        Self {
            phase: ReplayPhase::Idle,
            log: None,
            cycle: 0,
            links: Vec::new(),
            saved_real: Vec::new(),
            missing_warned: HashSet::new(),
            stats: ReplayStats::default(),
            period_ms: DEFAULT_SAMPLE_PERIOD_MS,
        }
    }

    pub fn phase(&self) -> ReplayPhase {
        self.phase
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    /// Tick interval, matching the recording cadence by default.
    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn set_period_ms(&mut self, period_ms: u64) {
        self.period_ms = period_ms;
    }

    /// Starts a replay session over every registered layer that declares a
    /// replay link: saves each one's real flag, forces it to "not real",
    /// runs its `replay_init` hook and resolves the link table.
    pub fn enter_replay(&mut self, bus: &IoBus, log: ReplayLog) -> Result<(), ReplayError> {
        if self.phase == ReplayPhase::Replaying {
            return Err(ReplayError::AlreadyReplaying);
        }

        self.links.clear();
        self.saved_real.clear();
        self.missing_warned.clear();
        self.stats = ReplayStats::default();

        for handle in bus.replay_targets() {
            let mut layer = lock_layer(&handle);
            let descriptor = layer.descriptor();
            let base_name = descriptor.base_name().to_owned();

            for (read, write) in descriptor.replay_links() {
                self.links.push(ResolvedLink {
                    series: descriptor.channel_key(read),
                    target: descriptor.channel_key(write),
                });
            }

            self.saved_real.push((base_name, layer.is_real()));
            layer.set_real(false);
            layer.replay_init();
        }

        info!(
            cycles = log.cycles(),
            links = self.links.len(),
            "entering replay"
        );

        self.cycle = 0;
        self.log = Some(log);
        self.phase = ReplayPhase::Replaying;
        Ok(())
    }

    /// Runs one replay tick: every linked channel gets the gap-filled value
    /// for the current cycle. A channel that was never recorded, or has no
    /// data yet at this cycle, is skipped for the tick only.
    ///
    /// When the cycle counter reaches the log's total the session exits
    /// automatically.
    pub fn tick(&mut self, bus: &IoBus) -> ReplayPhase {
        if self.phase == ReplayPhase::Idle {
            return ReplayPhase::Idle;
        }

        let Some(log) = self.log.as_ref() else {
            return ReplayPhase::Idle;
        };
        let total_cycles = log.cycles();

        for link in &self.links {
            match log.series_at(&link.series, self.cycle) {
                Ok(value) => match bus.write(&link.target, value.clone()) {
                    Ok(()) => self.stats.writes += 1,
                    Err(error) => {
                        warn!(channel = %link.target, %error, "replay write rejected");
                        self.stats.skipped += 1;
                    }
                },
                Err(SeriesError::UnknownSeries(_)) => {
                    if self.missing_warned.insert(link.series.clone()) {
                        warn!(channel = %link.series, "channel was never recorded, skipping for the whole replay");
                    }
                    self.stats.skipped += 1;
                }
                Err(SeriesError::NoDataYet { .. }) => {
                    debug!(channel = %link.series, cycle = self.cycle, "no data yet, channel skipped this tick");
                    self.stats.skipped += 1;
                }
            }
        }

        self.cycle += 1;
        self.stats.ticks += 1;

        if self.cycle >= total_cycles {
            self.exit_replay(bus);
        }

        self.phase
    }

    /// Ends the session: restores each layer's saved real flag and runs its
    /// `exit_replay` hook. Idempotent, and safe to call mid-tick since every
    /// channel write is independent.
    pub fn exit_replay(&mut self, bus: &IoBus) {
        if self.phase == ReplayPhase::Idle {
            return;
        }

        for (base_name, real) in self.saved_real.drain(..) {
            if let Some(handle) = bus.layer(&base_name) {
                let mut layer = lock_layer(handle);
                layer.set_real(real);
                layer.exit_replay();
            }
        }

        info!(ticks = self.stats.ticks, writes = self.stats.writes, "exiting replay");

        self.links.clear();
        self.log = None;
        self.phase = ReplayPhase::Idle;
    }
}

/// Loads and parses a captured log file: the thin entry surface behind the
/// CLI's "enter replay from file path X".
pub fn load_log_file(path: &Path) -> Result<ReplayLog, ReplayError> {
    if !path.exists() {
        return Err(ReplayError::FileNotFound(path.to_path_buf()));
    }

    let extension_ok = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(LOG_EXTENSION))
        .unwrap_or(false);

    if !extension_ok {
        return Err(ReplayError::WrongExtension(
            path.to_path_buf(),
            LOG_EXTENSION,
        ));
    }

    let bytes = std::fs::read(path)?;
    Ok(ReplayLog::parse(&bytes)?)
}

use crate::codec::{decode_stream, FrameEvent};
use crate::error::{ParseError, SeriesError};
use crate::value::{Value, ValueKind};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// One sparse update in a channel's reconstructed history.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEntry {
    pub cycle: u64,
    pub value: Value,
}

/// The ordered update history of one channel, indexed by cycle.
///
/// Entries are strictly increasing in cycle; a re-sample at the same cycle
/// replaces the previous entry.
#[derive(Debug, Clone)]
pub struct DataSeries {
    name: String,
    kind: ValueKind,
    entries: Vec<SeriesEntry>,
}

impl DataSeries {
    fn new(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, cycle: u64, value: Value) {
        if let Some(last) = self.entries.last_mut() {
            if last.cycle == cycle {
                last.value = value;
                return;
            }
        }
        self.entries.push(SeriesEntry { cycle, value });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn entries(&self) -> &[SeriesEntry] {
        &self.entries
    }

    pub fn first_cycle(&self) -> Option<u64> {
        self.entries.first().map(|e| e.cycle)
    }

    pub fn last_cycle(&self) -> Option<u64> {
        self.entries.last().map(|e| e.cycle)
    }

    /// Gap-fill query: the value of the latest entry with `entry.cycle <=
    /// cycle`. Querying before the first entry fails rather than inventing
    /// a default; callers decide how to handle pre-roll.
    pub fn at_cycle(&self, cycle: u64) -> Result<&Value, SeriesError> {
        let upto = self.entries.partition_point(|e| e.cycle <= cycle);

        if upto == 0 {
            return Err(SeriesError::NoDataYet {
                channel: self.name.clone(),
                cycle,
            });
        }

        Ok(&self.entries[upto - 1].value)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    pub name: String,
    pub kind: ValueKind,
    pub entries: usize,
    pub first_cycle: Option<u64>,
    pub last_cycle: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogSummary {
    pub channels: Vec<ChannelSummary>,
    pub cycles: u64,
    pub early_cycles: u64,
    pub data_cycles: u64,
    pub messages: usize,
    pub truncated: bool,
}

/// A fully parsed capture: one time series per channel plus cycle counts.
#[derive(Debug, Clone)]
pub struct ReplayLog {
    series: HashMap<String, DataSeries>,
    messages: Vec<String>,
    cycles: u64,
    early_cycles: u64,
    truncated: bool,
}

impl ReplayLog {
    /// Walks a finalized stream and reconstructs every channel's series.
    ///
    /// A data frame citing an undeclared reference, like any structural
    /// corruption, ends the usable stream at that point: the cycles parsed
    /// so far stay usable and the log is marked truncated. A duplicate
    /// declaration is fatal, since neither binding can be trusted.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let decoded = decode_stream(bytes);

        let mut references: HashMap<u32, String> = HashMap::new();
        let mut series: HashMap<String, DataSeries> = HashMap::new();
        let mut messages = Vec::new();
        let mut cycles = 0u64;
        let mut early_cycles = 0u64;
        let mut truncated = decoded.truncated;

        for event in decoded.events {
            match event {
                FrameEvent::Declare {
                    reference,
                    name,
                    kind,
                } => {
                    if references.contains_key(&reference) {
                        return Err(ParseError::DuplicateReference(reference));
                    }
                    references.insert(reference, name.clone());
                    series
                        .entry(name.clone())
                        .or_insert_with(|| DataSeries::new(&name, kind));
                }
                FrameEvent::Data { reference, value } => {
                    let Some(name) = references.get(&reference) else {
                        warn!(reference, recovered_cycles = cycles, "data frame cites undeclared reference, stream truncated");
                        truncated = true;
                        break;
                    };

                    let Some(channel) = series.get_mut(name) else {
                        // Unreachable by construction; treat as corruption.
                        truncated = true;
                        break;
                    };

                    if value.kind() != channel.kind {
                        warn!(channel = %name, recovered_cycles = cycles, "data frame kind disagrees with declaration, stream truncated");
                        truncated = true;
                        break;
                    }

                    channel.push(cycles, value);
                }
                FrameEvent::CycleMark { early } => {
                    cycles += 1;
                    if early {
                        early_cycles += 1;
                    }
                }
                FrameEvent::Message(text) => messages.push(text),
            }
        }

        Ok(Self {
            series,
            messages,
            cycles,
            early_cycles,
            truncated,
        })
    }

    pub fn series(&self, name: &str) -> Option<&DataSeries> {
        self.series.get(name)
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }

    /// Gap-fill lookup on a named channel.
    pub fn series_at(&self, name: &str, cycle: u64) -> Result<&Value, SeriesError> {
        self.series
            .get(name)
            .ok_or_else(|| SeriesError::UnknownSeries(name.into()))?
            .at_cycle(cycle)
    }

    /// Total recorded ticks.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Ticks recorded before the first real data (startup noise).
    pub fn early_cycles(&self) -> u64 {
        self.early_cycles
    }

    /// Steady-state ticks.
    pub fn data_cycles(&self) -> u64 {
        self.cycles - self.early_cycles
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn summary(&self) -> LogSummary {
        let mut channels: Vec<ChannelSummary> = self
            .series
            .values()
            .map(|s| ChannelSummary {
                name: s.name().into(),
                kind: s.kind(),
                entries: s.entries().len(),
                first_cycle: s.first_cycle(),
                last_cycle: s.last_cycle(),
            })
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));

        LogSummary {
            channels,
            cycles: self.cycles,
            early_cycles: self.early_cycles,
            data_cycles: self.data_cycles(),
            messages: self.messages.len(),
            truncated: self.truncated,
        }
    }
}

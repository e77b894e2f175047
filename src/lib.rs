//! # Replay Bus
//!
//! A telemetry capture and deterministic replay engine for robot-control
//! frameworks: named layers register typed channels on a central bus, a
//! fixed-rate sampler frames every auto-logged value into an append-only
//! sink, and a recorded stream can later be parsed back into per-channel
//! time series and replayed into the same layers with their live data
//! paths suppressed.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use replaybus::demo::DriveLayer;
//! use replaybus::sink::BufferSink;
//! use replaybus::{AutoSampler, IoBus};
//!
//! let mut bus = IoBus::new();
//! bus.register(Arc::new(Mutex::new(DriveLayer::new()))).unwrap();
//!
//! let sink = BufferSink::new();
//! let mut sampler = AutoSampler::new(Box::new(sink.clone())).unwrap();
//!
//! // One capture tick: sample every auto-logged channel, frame the
//! // records, mark the cycle boundary.
//! sampler.tick(&bus);
//! assert!(!sink.contents().is_empty());
//! ```
//!
//! ## Architecture
//!
//! - [`value`] - the closed set of typed values channels can carry
//! - [`layer`] - layer trait, member descriptors, permission and link checks
//! - [`bus`] - the channel registry shared by capture and replay
//! - [`codec`] - marker-delimited framing of sampled records
//! - [`sink`] - pluggable append-only destinations (file, buffer, no-op)
//! - [`sampler`] - the fixed-rate auto-sample scheduler
//! - [`parser`] - stream reconstruction into gap-fillable time series
//! - [`replay`] - the replay state machine and log-file entry surface

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod bus;
pub mod codec;
pub mod demo;
pub mod error;
pub mod layer;
pub mod parser;
pub mod replay;
pub mod sampler;
pub mod sink;
pub mod value;

// Re-export the main public types for convenience
pub use bus::IoBus;
pub use layer::{Layer, LayerDescriptor, LayerHandle, MemberSpec, Permission};
pub use parser::ReplayLog;
pub use replay::{ReplayPhase, ReplayScheduler};
pub use sampler::AutoSampler;
pub use value::{Value, ValueKind};

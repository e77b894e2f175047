use crate::value::ValueKind;
use std::path::PathBuf;
use thiserror::Error;

/// Wiring errors caught at layer construction or registration time.
///
/// These are fatal: a layer that fails any of these checks must not be
/// allowed onto the bus, so that telemetry is never silently dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("layer `{layer}` declares `{declared}` permission but its members do not match")]
    PermissionMismatch { layer: String, declared: String },

    #[error("layer `{layer}` links read member `{member}` to missing write member `{target}`")]
    UnresolvedReplayLink {
        layer: String,
        member: String,
        target: String,
    },

    #[error("layer `{layer}` claims write member `{target}` as the target of more than one replay link")]
    DuplicateLinkTarget { layer: String, target: String },

    #[error("layer `{layer}` declares member `{member}` more than once")]
    DuplicateMember { layer: String, member: String },

    #[error("name `{0}` is empty or contains a reserved character")]
    InvalidName(String),

    #[error("a layer named `{0}` is already registered")]
    DuplicateLayer(String),
}

/// Routing errors on the live write-back path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("no channel registered under `{0}`")]
    UnknownChannel(String),

    #[error("channel `{0}` is not write-capable")]
    PermissionDenied(String),

    #[error("channel `{channel}` carries {expected:?} values, got {got:?}")]
    KindMismatch {
        channel: String,
        expected: ValueKind,
        got: ValueKind,
    },

    #[error("layer rejected write to `{channel}`: {reason}")]
    WriteRejected { channel: String, reason: String },
}

/// Byte-level framing and payload errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("stream ended before the frame was complete")]
    ShortFrame,

    #[error("unknown value tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("unknown frame kind 0x{0:02x}")]
    UnknownFrameKind(u8),

    #[error("expected separator or end marker at offset")]
    BadMarker,

    #[error("boolean byte must be 0 or 1, got {0}")]
    InvalidBoolean(u8),

    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors that make a captured stream unusable from the start.
///
/// Mid-stream corruption is not reported here: the parser truncates at the
/// first bad frame and keeps everything recovered before it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("reference {0} declared twice")]
    DuplicateReference(u32),
}

/// Per-channel lookup failures during reconstruction queries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SeriesError {
    #[error("channel `{0}` does not appear in the log")]
    UnknownSeries(String),

    #[error("cycle {cycle} precedes the first recorded entry for `{channel}`")]
    NoDataYet { channel: String, cycle: u64 },
}

/// Replay entry and state-machine errors.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("a replay is already in progress")]
    AlreadyReplaying,

    #[error("log file `{0}` does not exist")]
    FileNotFound(PathBuf),

    #[error("`{0}` is not a `.{1}` log file")]
    WrongExtension(PathBuf, &'static str),

    #[error("log file could not be parsed: {0}")]
    ParseFailure(#[from] ParseError),

    #[error("log file could not be read: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the pluggable log destination.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink has not been opened")]
    NotOpen,

    #[error("sink I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

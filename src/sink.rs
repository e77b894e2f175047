use crate::error::SinkError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Private extension for captured streams, so the replay entry point never
/// ingests unrelated files.
pub const LOG_EXTENSION: &str = "rbus";

/// Directory under the operator's home directory that holds captured logs.
pub const DEFAULT_LOG_DIR: &str = "replaybus-logs";

/// Abstract append-only destination for encoded frames and free-text lines.
///
/// Implementations may be swapped at startup; a run with no sink configured
/// uses [`NoopSink`].
pub trait LogSink: Send {
    fn open(&mut self) -> Result<(), SinkError>;
    fn append_record(&mut self, frame: &[u8]) -> Result<(), SinkError>;
    fn append_line(&mut self, line: &str) -> Result<(), SinkError>;
    fn close(&mut self) -> Result<(), SinkError>;
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Default log path: `<home>/replaybus-logs/session-<unix-seconds>.rbus`.
pub fn default_log_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);

    home.join(DEFAULT_LOG_DIR)
        .join(format!("session-{}.{}", unix_millis() / 1000, LOG_EXTENSION))
}

/// Append-only file sink. Writes a human-readable banner line on open and
/// close; the parser tolerates these as messages.
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn at_default_path() -> Self {
        Self::new(default_log_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> Result<&mut File, SinkError> {
        self.file.as_mut().ok_or(SinkError::NotOpen)
    }
}

impl LogSink for FileSink {
    fn open(&mut self) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "log opened at {}", unix_millis())?;
        self.file = Some(file);
        Ok(())
    }

    fn append_record(&mut self, frame: &[u8]) -> Result<(), SinkError> {
        self.file()?.write_all(frame)?;
        Ok(())
    }

    fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
        writeln!(self.file()?, "{line}")?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut file) = self.file.take() {
            writeln!(file, "log closed at {}", unix_millis())?;
            file.flush()?;
        }
        Ok(())
    }
}

/// Shared in-memory sink, used in tests and as a stand-in for a network
/// destination.
#[derive(Default, Clone)]
pub struct BufferSink {
    buffer: Arc<Mutex<Vec<u8>>>,
    open: bool,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle onto the same underlying buffer.
    pub fn shared(&self) -> Arc<Mutex<Vec<u8>>> {
        self.buffer.clone()
    }

    pub fn contents(&self) -> Vec<u8> {
        match self.buffer.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, bytes: &[u8]) {
        match self.buffer.lock() {
            Ok(mut guard) => guard.extend_from_slice(bytes),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(bytes),
        }
    }
}

impl LogSink for BufferSink {
    fn open(&mut self) -> Result<(), SinkError> {
        self.open = true;
        Ok(())
    }

    fn append_record(&mut self, frame: &[u8]) -> Result<(), SinkError> {
        if !self.open {
            return Err(SinkError::NotOpen);
        }
        self.push(frame);
        Ok(())
    }

    fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
        if !self.open {
            return Err(SinkError::NotOpen);
        }
        self.push(line.as_bytes());
        self.push(b"\n");
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.open = false;
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn open(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn append_record(&mut self, _frame: &[u8]) -> Result<(), SinkError> {
        Ok(())
    }

    fn append_line(&mut self, _line: &str) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

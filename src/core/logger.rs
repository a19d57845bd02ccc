//! Session transcript logging
//!
//! Records every command written to the modem and every line read back,
//! with timestamps, optionally mirrored to a file.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Entries kept in memory by default
const MAX_BUFFER: usize = 10_000;

/// Transcript file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `[timestamp] TX text`
    #[default]
    Text,
    /// `[timestamp] TX 41 54 0D`
    Hex,
    /// One JSON object per line
    JsonLines,
}

impl LogFormat {
    /// Get file extension for format
    pub fn extension(&self) -> &'static str {
        match self {
            LogFormat::Text => "txt",
            LogFormat::Hex => "hex",
            LogFormat::JsonLines => "jsonl",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "hex" => Ok(Self::Hex),
            "json" | "jsonl" | "jsonlines" => Ok(Self::JsonLines),
            other => Err(format!("unknown transcript format '{other}'")),
        }
    }
}

/// Data direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Read from the modem
    Received,
    /// Written to the modem
    Sent,
    /// Annotation
    Info,
}

impl Direction {
    fn tag(self) -> &'static str {
        match self {
            Direction::Received => "RX",
            Direction::Sent => "TX",
            Direction::Info => "##",
        }
    }
}

/// A single transcript entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the data crossed the link
    pub timestamp: DateTime<Local>,
    /// Which way it went
    pub direction: Direction,
    /// Payload
    pub data: Vec<u8>,
}

impl LogEntry {
    /// Create new entry stamped now
    pub fn new(direction: Direction, data: Vec<u8>) -> Self {
        Self {
            timestamp: Local::now(),
            direction,
            data,
        }
    }

    /// Format as text, control characters escaped
    pub fn to_text(&self) -> String {
        format!(
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.direction.tag(),
            String::from_utf8_lossy(&self.data).escape_debug()
        )
    }

    /// Format as hex
    pub fn to_hex(&self) -> String {
        let hex: Vec<String> = self.data.iter().map(|b| format!("{b:02X}")).collect();
        format!(
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.direction.tag(),
            hex.join(" ")
        )
    }

    /// Format as JSON line
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn render(&self, format: LogFormat) -> String {
        match format {
            LogFormat::Text => self.to_text(),
            LogFormat::Hex => self.to_hex(),
            LogFormat::JsonLines => self.to_json(),
        }
    }
}

/// In-memory transcript with an optional file mirror
pub struct Transcript {
    file: Option<BufWriter<File>>,
    format: LogFormat,
    path: Option<PathBuf>,
    buffer: Vec<LogEntry>,
    max_buffer: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    /// Memory-only transcript
    pub fn new() -> Self {
        Self {
            file: None,
            format: LogFormat::Text,
            path: None,
            buffer: Vec::new(),
            max_buffer: MAX_BUFFER,
        }
    }

    /// Transcript appending to `path`
    pub fn to_file(path: &Path, format: LogFormat) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(BufWriter::new(file)),
            format,
            path: Some(path.to_path_buf()),
            buffer: Vec::new(),
            max_buffer: MAX_BUFFER,
        })
    }

    /// Mirror file path, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record data
    pub fn log(&mut self, direction: Direction, data: &[u8]) {
        let entry = LogEntry::new(direction, data.to_vec());

        if let Some(ref mut file) = self.file {
            if let Err(e) = writeln!(file, "{}", entry.render(self.format)) {
                tracing::warn!("transcript write failed: {}", e);
            }
        }

        self.buffer.push(entry);
        if self.buffer.len() > self.max_buffer {
            self.buffer.remove(0);
        }
    }

    /// Record data written to the modem
    pub fn log_tx(&mut self, data: &[u8]) {
        self.log(Direction::Sent, data);
    }

    /// Record data read from the modem
    pub fn log_rx(&mut self, data: &[u8]) {
        self.log(Direction::Received, data);
    }

    /// Record an annotation
    pub fn log_info(&mut self, message: &str) {
        self.log(Direction::Info, message.as_bytes());
    }

    /// Entries kept in memory
    pub fn entries(&self) -> &[LogEntry] {
        &self.buffer
    }

    /// Set max buffer size
    pub fn set_max_buffer(&mut self, size: usize) {
        self.max_buffer = size;
    }

    /// Flush to disk
    pub fn flush(&mut self) -> std::io::Result<()> {
        match self.file {
            Some(ref mut file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for Transcript {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("transcript flush failed: {}", e);
        }
    }
}

/// Transcript filename with a timestamp, e.g. `modem_20260101_120000.txt`
pub fn generate_log_filename(prefix: &str, format: LogFormat) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", prefix, timestamp, format.extension())
}

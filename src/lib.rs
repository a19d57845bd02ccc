//! # modemchat Core Library
//!
//! An AT command engine for cellular modems on a serial link:
//! - Command formatting and CRLF line reading under a per-byte timeout
//! - Answer collection with `OK` / error classification
//! - SIM-busy aware retry policy
//! - SMS sending in text and PDU mode (semi-octets, GSM 7-bit packing)
//! - Vendor reset sequence (TI Calypso over sysfs power controls)
//! - GSM check suite with operator confirmations
//!
//! ## Features
//!
//! - Any `AsyncRead + AsyncWrite` stream as transport, `tokio-serial` for hardware
//! - Timestamped TX/RX transcripts (text, hex, JSON lines)
//! - TOML configuration
//! - CLI with exit codes
//!
//! ## Example
//!
//! ```rust,no_run
//! use modemchat_core::{Command, ModemSession, SerialConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut session = ModemSession::open(&SerialConfig::new("/dev/ttyUSB2"))?;
//!     session.initialize().await?;
//!
//!     let cfun = session.chat(&Command::new("+CFUN?")).await?;
//!     println!("functionality level: {}", cfun);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ConfigError};
pub use crate::core::device::{CalypsoReset, DeviceControl, ModemReset, NoReset, SysfsControl};
pub use crate::core::logger::{LogEntry, LogFormat, Transcript};
pub use crate::core::protocol::{
    format_command, parse_answer, read_answer, read_line, Arg, AtError, Command, ModemError, Pdu,
    PduError, RawAnswer, RetryPolicy, Value,
};
pub use crate::core::session::{ModemSession, SessionState};
pub use crate::core::suite::{
    ErrorPolicy, GsmSuite, Reporter, Section, SuiteContext, SuiteError, SuiteReport, SuiteSettings,
};
pub use crate::core::transport::{ModemStream, SerialConfig, SerialFlowControl, TransportError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

//! CLI Exit Codes
//!
//! Standard exit codes for CLI operations and automation.

use crate::config::ConfigError;
use crate::core::protocol::{AtError, ModemError};
use crate::core::suite::SuiteError;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error, or failed suite checks
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// The modem did not answer in time
    pub const TIMEOUT: u8 = 4;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// The modem answered with an error
    pub const PROTOCOL_ERROR: u8 = 9;

    /// Modem reset failed
    pub const RESET_FAILED: u8 = 12;

    /// SIM busy
    pub const DEVICE_BUSY: u8 = 13;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 14;

    /// Input rejected before reaching the modem (bad number, text)
    pub const VALIDATION_FAILED: u8 = 17;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with a message
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Error with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) => Some(msg),
            Self::Error(_, msg) => Some(msg),
            _ => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

fn transport_code(err: &TransportError) -> u8 {
    match err {
        TransportError::PortNotFound(_) => ExitCodes::PORT_NOT_FOUND,
        TransportError::PermissionDenied(_) => ExitCodes::PERMISSION_DENIED,
        TransportError::InvalidConfiguration(_) => ExitCodes::CONFIG_ERROR,
        TransportError::ConnectionFailed(_) | TransportError::IoError(_) => {
            ExitCodes::CONNECTION_FAILED
        }
    }
}

fn modem_code(err: &ModemError) -> u8 {
    match err {
        ModemError::At(AtError::Timeout) => ExitCodes::TIMEOUT,
        ModemError::At(AtError::SimBusy) => ExitCodes::DEVICE_BUSY,
        ModemError::At(AtError::Generic(_)) | ModemError::UnexpectedAnswer { .. } => {
            ExitCodes::PROTOCOL_ERROR
        }
        ModemError::Transport(e) => transport_code(e),
        ModemError::Disconnected => ExitCodes::CONNECTION_FAILED,
        ModemError::Pdu(_) => ExitCodes::VALIDATION_FAILED,
        ModemError::Reset(_) => ExitCodes::RESET_FAILED,
    }
}

impl From<&TransportError> for CliResult {
    fn from(err: &TransportError) -> Self {
        Self::Error(transport_code(err), err.to_string())
    }
}

impl From<&ModemError> for CliResult {
    fn from(err: &ModemError) -> Self {
        Self::Error(modem_code(err), err.to_string())
    }
}

impl From<&SuiteError> for CliResult {
    fn from(err: &SuiteError) -> Self {
        match err {
            SuiteError::Modem(e) => e.into(),
            SuiteError::Aborted(msg) => Self::Error(ExitCodes::ERROR, msg.clone()),
        }
    }
}

impl From<&ConfigError> for CliResult {
    fn from(err: &ConfigError) -> Self {
        Self::Error(ExitCodes::CONFIG_ERROR, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error or failed checks",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "Modem timeout",
        7 => "Permission denied",
        8 => "Configuration error",
        9 => "Modem reported an error",
        12 => "Modem reset failed",
        13 => "SIM busy",
        14 => "Port not found",
        17 => "Invalid number or message",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in [0, 1, 2, 3, 4, 7, 8, 9, 12, 13, 14, 17] {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

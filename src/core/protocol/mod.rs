//! AT command protocol engine
//!
//! Provides the pieces a modem session is assembled from:
//! - Command formatting (`AT<name><args>\r`)
//! - CRLF line reading under a per-byte timeout
//! - Response collection, error classification and answer parsing
//! - Retry policy for transient SIM-busy conditions
//! - SMS-SUBMIT PDU encoding (semi-octets, GSM 7-bit packing)
//! - Phonebook (`+CPBR`) reply parsing

pub mod command;
pub mod contacts;
pub mod line;
pub mod pdu;
pub mod response;
pub mod retry;

pub use command::{format_command, Arg, Command};
pub use contacts::{parse_contact, parse_contact_range, Contact, ContactRange};
pub use line::read_line;
pub use pdu::{pack_gsm7, semi_octets, Pdu, PduError};
pub use response::{classify_line, parse_answer, read_answer, LineKind, RawAnswer, Value};
pub use retry::{RetryOn, RetryPolicy};

use crate::core::transport::TransportError;
use thiserror::Error;

/// Errors reported by the modem itself, or by the line discipline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtError {
    /// Any device-reported error line, kept verbatim
    #[error("{0}")]
    Generic(String),

    /// `+CMS ERROR` mentioning "SIM busy"; transient
    #[error("SIM busy")]
    SimBusy,

    /// No line terminator before the read deadline
    #[error("Timeout")]
    Timeout,
}

impl AtError {
    /// Whether the default retry policy retries this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SimBusy)
    }
}

/// Errors of a modem session operation
#[derive(Error, Debug)]
pub enum ModemError {
    /// The modem answered with an error, or did not answer in time
    #[error(transparent)]
    At(#[from] AtError),

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The stream reached end of file
    #[error("Modem closed the connection")]
    Disconnected,

    /// PDU could not be built
    #[error(transparent)]
    Pdu(#[from] PduError),

    /// A command-specific parser rejected the answer
    #[error("Unexpected answer to AT{command}: {answer}")]
    UnexpectedAnswer {
        /// Command name, without the `AT` prefix
        command: String,
        /// Offending answer text
        answer: String,
    },

    /// Vendor reset sequence failed
    #[error("Reset failed: {0}")]
    Reset(String),
}

impl ModemError {
    /// The device-level error, if this is one
    pub fn at_error(&self) -> Option<&AtError> {
        match self {
            Self::At(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the modem reported SIM busy
    pub fn is_sim_busy(&self) -> bool {
        matches!(self, Self::At(AtError::SimBusy))
    }

    /// Whether a read deadline expired
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::At(AtError::Timeout))
    }
}

impl From<std::io::Error> for ModemError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::Disconnected,
            _ => Self::Transport(TransportError::IoError(err)),
        }
    }
}

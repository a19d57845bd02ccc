//! Transport layer for the modem link
//!
//! The protocol engine only depends on a duplex byte stream: anything that is
//! `AsyncRead + AsyncWrite + Unpin + Send` can carry an AT session. The serial
//! binding used against real hardware lives in [`serial`].

mod serial;

pub use serial::{
    list_ports, open_serial, SerialConfig, SerialFlowControl, SerialParity, DEFAULT_READ_TIMEOUT,
    MODEM_BAUD_RATE,
};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream a modem session can run over
pub trait ModemStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ModemStream for T {}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the error comes from a missing device node
    pub fn is_port_not_found(&self) -> bool {
        matches!(self, Self::PortNotFound(_))
    }
}

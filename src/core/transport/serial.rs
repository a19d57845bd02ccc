//! Serial port transport for the modem link

use super::TransportError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

/// Baud rate the modem firmware expects
pub const MODEM_BAUD_RATE: u32 = 115_200;

/// Default per-byte read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Serial port flow control type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialFlowControl {
    /// No flow control
    None,
    /// Hardware flow control (RTS/CTS)
    #[default]
    Hardware,
    /// Software flow control (XON/XOFF)
    Software,
}

impl std::str::FromStr for SerialFlowControl {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "hardware" | "hw" | "rtscts" => Ok(Self::Hardware),
            "software" | "sw" | "xonxoff" => Ok(Self::Software),
            other => Err(TransportError::InvalidConfiguration(format!(
                "unknown flow control '{other}'"
            ))),
        }
    }
}

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., /dev/ttySAC0, COM3)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Flow control
    pub flow_control: SerialFlowControl,
    /// Per-byte read timeout
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Modem defaults: 115200 8N1 with RTS/CTS and a 10 second read timeout
    pub fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
            baud_rate: MODEM_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            flow_control: SerialFlowControl::Hardware,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Set baud rate
    #[must_use]
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set flow control
    #[must_use]
    pub fn flow_control(mut self, flow: SerialFlowControl) -> Self {
        self.flow_control = flow;
        self
    }

    /// Set the per-byte read timeout
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Short description for logs
    pub fn connection_info(&self) -> String {
        format!(
            "{} @ {} baud ({}{}{} {})",
            self.port,
            self.baud_rate,
            self.data_bits,
            match self.parity {
                SerialParity::None => "N",
                SerialParity::Odd => "O",
                SerialParity::Even => "E",
            },
            self.stop_bits,
            match self.flow_control {
                SerialFlowControl::None => "No FC",
                SerialFlowControl::Hardware => "HW FC",
                SerialFlowControl::Software => "SW FC",
            }
        )
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttySAC0")
    }
}

/// Open the serial device described by `config`
///
/// The returned stream owns the device handle; dropping it closes the port.
pub fn open_serial(config: &SerialConfig) -> Result<SerialStream, TransportError> {
    let data_bits = match config.data_bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    };

    let stop_bits = match config.stop_bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    };

    let parity = match config.parity {
        SerialParity::Odd => Parity::Odd,
        SerialParity::Even => Parity::Even,
        SerialParity::None => Parity::None,
    };

    let flow_control = match config.flow_control {
        SerialFlowControl::Hardware => FlowControl::Hardware,
        SerialFlowControl::Software => FlowControl::Software,
        SerialFlowControl::None => FlowControl::None,
    };

    tracing::info!("opening {}", config.connection_info());

    tokio_serial::new(&config.port, config.baud_rate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity)
        .flow_control(flow_control)
        .open_native_async()
        .map_err(|e| match e.kind() {
            tokio_serial::ErrorKind::NoDevice => TransportError::PortNotFound(config.port.clone()),
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                TransportError::PortNotFound(config.port.clone())
            }
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                TransportError::PermissionDenied(config.port.clone())
            }
            _ => TransportError::ConnectionFailed(e.to_string()),
        })
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::IoError(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modem_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB2");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.flow_control, SerialFlowControl::Hardware);
        assert_eq!(config.read_timeout, Duration::from_secs(10));
        assert_eq!(config.connection_info(), "/dev/ttyUSB2 @ 115200 baud (8N1 HW FC)");
    }

    #[test]
    fn test_flow_control_from_str() {
        assert_eq!("hw".parse::<SerialFlowControl>().unwrap(), SerialFlowControl::Hardware);
        assert_eq!("None".parse::<SerialFlowControl>().unwrap(), SerialFlowControl::None);
        assert!("bogus".parse::<SerialFlowControl>().is_err());
    }

    #[tokio::test]
    async fn test_open_missing_port() {
        let config = SerialConfig::new("/dev/modemchat-does-not-exist");
        let Err(err) = open_serial(&config) else {
            panic!("opened a port that does not exist");
        };
        assert!(err.is_port_not_found(), "{err}");
    }
}

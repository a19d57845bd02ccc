//! Application settings

use super::{default_config_path, log_dir, ConfigError};
use crate::core::device::{ResetKind, DEFAULT_SYSFS_DIR};
use crate::core::logger::{generate_log_filename, LogFormat};
use crate::core::protocol::{RetryOn, RetryPolicy};
use crate::core::suite::{SuiteSettings, DEFAULT_SMS_TEXT};
use crate::core::transport::{SerialConfig, SerialFlowControl, MODEM_BAUD_RATE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial device and reset
    pub device: DeviceConfig,
    /// Check suite parameters
    pub suite: SuiteConfig,
    /// Diagnostics and transcript
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load config from the default location
    ///
    /// A missing file gives the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path()?)
    }

    /// Load config from `path`; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = default_config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Serial device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device path
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Flow control
    pub flow_control: SerialFlowControl,
    /// Per-byte read timeout (seconds)
    pub read_timeout_secs: u64,
    /// Reset sequence run before the suite
    pub reset: ResetKind,
    /// Sysfs directory of the power and reset controls
    pub sysfs_dir: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let serial = SerialConfig::default();
        Self {
            port: serial.port,
            baud_rate: MODEM_BAUD_RATE,
            flow_control: serial.flow_control,
            read_timeout_secs: serial.read_timeout.as_secs(),
            reset: ResetKind::None,
            sysfs_dir: PathBuf::from(DEFAULT_SYSFS_DIR),
        }
    }
}

impl DeviceConfig {
    /// Serial port settings for these values
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig::new(&self.port)
            .baud_rate(self.baud_rate)
            .flow_control(self.flow_control)
            .read_timeout(Duration::from_secs(self.read_timeout_secs))
    }
}

/// Retry settings of one suite step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts
    pub attempts: u32,
    /// Delay between attempts (seconds)
    pub delay_secs: u64,
    /// Which failures are retried
    #[serde(default)]
    pub retry_on: RetryOn,
}

impl RetrySettings {
    /// Retry policy for these values
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.attempts,
            delay: Duration::from_secs(self.delay_secs),
            retry_on: self.retry_on,
        }
    }
}

impl From<&RetryPolicy> for RetrySettings {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            attempts: policy.max_attempts,
            delay_secs: policy.delay.as_secs(),
            retry_on: policy.retry_on,
        }
    }
}

/// Check suite settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Number to call and text
    pub callable_number: Option<String>,
    /// `name:number` expected in the SIM phonebook
    pub sim_contact: Option<String>,
    /// Text of the test messages
    pub sms_text: String,
    /// Retry around `+CPBR=?`
    pub contact_range_retry: RetrySettings,
    /// Retry around the text SMS send
    pub sms_retry: RetrySettings,
    /// Retry around the PDU SMS send
    pub pdu_sms_retry: RetrySettings,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        let settings = SuiteSettings::default();
        Self {
            callable_number: None,
            sim_contact: None,
            sms_text: DEFAULT_SMS_TEXT.to_string(),
            contact_range_retry: (&settings.contact_range_retry).into(),
            sms_retry: (&settings.sms_retry).into(),
            pdu_sms_retry: (&settings.pdu_sms_retry).into(),
        }
    }
}

impl SuiteConfig {
    /// Suite settings for these values
    pub fn settings(&self) -> SuiteSettings {
        SuiteSettings {
            callable_number: self.callable_number.clone(),
            sim_contact: self.sim_contact.clone(),
            sms_text: self.sms_text.clone(),
            contact_range_retry: self.contact_range_retry.policy(),
            sms_retry: self.sms_retry.policy(),
            pdu_sms_retry: self.pdu_sms_retry.policy(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// JSON log lines instead of text
    pub json: bool,
    /// Transcript file
    pub transcript: Option<PathBuf>,
    /// Record a transcript under the log directory when no file is set
    pub record: bool,
    /// Transcript format
    pub transcript_format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            transcript: None,
            record: false,
            transcript_format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Where the transcript goes, if anywhere
    ///
    /// An explicit file wins; otherwise `record` picks a timestamped file in
    /// [`log_dir`](super::log_dir).
    pub fn transcript_path(&self) -> Option<PathBuf> {
        match &self.transcript {
            Some(path) => Some(path.clone()),
            None if self.record => log_dir()
                .map(|dir| dir.join(generate_log_filename("modem", self.transcript_format))),
            None => None,
        }
    }
}

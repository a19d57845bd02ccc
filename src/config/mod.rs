//! Configuration module
//!
//! Handles the TOML settings file: device, suite and logging sections

mod settings;

pub use settings::{AppConfig, DeviceConfig, LoggingConfig, RetrySettings, SuiteConfig};

use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration file name inside [`config_dir`]
pub const CONFIG_FILE: &str = "config.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The platform has no configuration directory for this user
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for [`AppConfig`]
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("Could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "modemchat", "modemchat")
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the log directory, where transcripts go by default
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

/// Default configuration file path
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    config_dir()
        .map(|dir| dir.join(CONFIG_FILE))
        .ok_or(ConfigError::NoConfigDir)
}

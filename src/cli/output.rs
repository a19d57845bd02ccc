//! Output formatting for CLI results

use serde::Serialize;
use std::fmt::Display;

/// How results are printed on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human readable text
    #[default]
    Text,
    /// One JSON document per result
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

/// Render `value` as text or JSON
pub fn format_output<T: Serialize + Display>(value: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => value.to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            tracing::warn!("JSON output failed: {}", e);
            value.to_string()
        }),
    }
}

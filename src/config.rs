//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `aquapulse.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: Where the dashboard and json api listen.
//!     - PollingConfig: How often the sensor list is refreshed.
//!     - SourceConfig: Where readings come from (upstream http or simulated).
//!     - LoggingConfig: Default log level and per-sensor output.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PulseConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:5000".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    pub interval_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_seconds: 30 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Http,
    #[default]
    Simulated,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    /// upstream endpoint returning a json array of sensor records (http only)
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// size of the simulated network
    #[serde(default = "default_sensor_count")]
    pub sensor_count: usize,
    /// fixed seed for reproducible simulated readings
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_timeout() -> u64 {
    10
}

fn default_sensor_count() -> usize {
    120
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Simulated,
            url: None,
            request_timeout_seconds: default_timeout(),
            sensor_count: default_sensor_count(),
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: false }
    }
}

impl PulseConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: PulseConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        if config.source.kind == SourceKind::Http && config.source.url.is_none() {
            anyhow::bail!("source.kind = \"http\" requires source.url");
        }
        if config.polling.interval_seconds == 0 {
            anyhow::bail!("polling.interval_seconds must be at least 1");
        }
        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("aquapulse.toml"),
            PathBuf::from("..").join("config").join("aquapulse.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("[CONFIG] Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::warn!("[CONFIG] No config file found - using defaults");
        Self::default()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let source = match self.source.kind {
            SourceKind::Http => self.source.url.clone().unwrap_or_default(),
            SourceKind::Simulated => format!("simulated ({} sensors)", self.source.sensor_count),
        };
        tracing::info!("┌─────────────────────────────────────────┐");
        tracing::info!("│         AQUAPULSE CONFIGURATION         │");
        tracing::info!("├─────────────────────────────────────────┤");
        tracing::info!("│ Bind: {}", self.server.bind);
        tracing::info!("│ Source: {}", source);
        tracing::info!("│ Poll Interval: {}s", self.polling.interval_seconds);
        tracing::info!("│ Log Level: {}", self.logging.level);
        tracing::info!("└─────────────────────────────────────────┘");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = PulseConfig::parse("").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert_eq!(config.polling.interval_seconds, 30);
        assert_eq!(config.source.kind, SourceKind::Simulated);
        assert_eq!(config.source.sensor_count, 120);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn http_source_is_parsed() {
        let config = PulseConfig::parse(
            r#"
            [polling]
            interval_seconds = 5

            [source]
            kind = "http"
            url = "http://hub.local:5000/api/sensor-data"
            request_timeout_seconds = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.polling.interval_seconds, 5);
        assert_eq!(config.source.kind, SourceKind::Http);
        assert_eq!(config.source.url.as_deref(), Some("http://hub.local:5000/api/sensor-data"));
        assert_eq!(config.source.request_timeout_seconds, 3);
    }

    #[test]
    fn http_source_without_url_is_rejected() {
        let err = PulseConfig::parse("[source]\nkind = \"http\"\n").unwrap_err();
        assert!(err.to_string().contains("source.url"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(PulseConfig::parse("[polling]\ninterval_seconds = 0\n").is_err());
    }

    #[test]
    fn shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config").join("aquapulse.toml");
        let config = PulseConfig::load(path).unwrap();
        assert_eq!(config.source.kind, SourceKind::Simulated);
    }
}

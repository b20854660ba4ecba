//! Daemon configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `PPG__`-prefixed environment variables using `__` between
//! nested keys (`PPG__ACQUISITION__QUEUE_CAPACITY=8`).

use acquisition::AcquisitionConfig;
use config::{Config, ConfigError, Environment, File, FileFormat};
use max30102::SensorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Where the sensor is attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// I2C adapter device node
    pub i2c_device: String,
    /// 7-bit sensor address
    pub address: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            i2c_device: "/dev/i2c-0".to_string(),
            address: max30102::DEFAULT_ADDRESS,
        }
    }
}

/// Synthetic signal fed to the simulated sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Time between synthetic conversions (ms)
    pub sample_interval_ms: u64,
    /// Conversions queued before each interrupt edge
    pub samples_per_edge: usize,
    /// Simulated pulse rate
    pub heart_rate_bpm: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 10,
            samples_per_edge: 4,
            heart_rate_bpm: 72.0,
        }
    }
}

impl SimulationConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub bus: BusConfig,
    pub sensor: SensorConfig,
    pub acquisition: AcquisitionConfig,
    /// Use the in-memory sensor and edge source instead of hardware
    pub simulate: bool,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
    /// Output queue polling period (ms)
    pub poll_interval_ms: u64,
    /// Period of the reading summary log line (s)
    pub summary_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            sensor: SensorConfig::default(),
            acquisition: AcquisitionConfig::default(),
            simulate: false,
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
            poll_interval_ms: 50,
            summary_interval_secs: 10,
        }
    }
}

impl DaemonConfig {
    /// Simulated sensor with default settings
    pub fn simulated() -> Self {
        Self {
            simulate: true,
            ..Default::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_secs.max(1))
    }
}

/// Load configuration from an optional TOML file and the environment
pub fn load_config(path: Option<&Path>) -> Result<DaemonConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml));
    }

    builder
        .add_source(
            Environment::with_prefix("PPG")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// Parse configuration from TOML text alone
pub fn parse_config(toml: &str) -> Result<DaemonConfig, ConfigError> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use max30102::LedMode;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert!(!config.simulate);
        assert_eq!(config.bus.address, 0x57);
        assert_eq!(config.acquisition.queue_capacity, 16);
        assert_eq!(config.sensor.led_mode, LedMode::RedIr);
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        assert_eq!(parse_config("").unwrap(), DaemonConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = parse_config(
            r#"
            simulate = true

            [bus]
            i2c_device = "/dev/i2c-1"

            [sensor]
            led_mode = "red_only"
            sample_rate_hz = 100

            [acquisition]
            edge_line = 17
            queue_capacity = 4
            "#,
        )
        .unwrap();

        assert!(config.simulate);
        assert_eq!(config.bus.i2c_device, "/dev/i2c-1");
        assert_eq!(config.bus.address, 0x57);
        assert_eq!(config.sensor.led_mode, LedMode::RedOnly);
        assert_eq!(config.sensor.sample_rate_hz, 100);
        assert_eq!(config.sensor.sample_average, SensorConfig::default().sample_average);
        assert_eq!(config.acquisition.edge_line, 17);
        assert_eq!(config.acquisition.queue_capacity, 4);
        assert_eq!(config.acquisition.history_capacity, 32);
    }

    #[test]
    fn test_unknown_led_mode_rejected() {
        assert!(parse_config("[sensor]\nled_mode = \"green\"").is_err());
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("PPG__ACQUISITION__PUBLISH_BACKOFF_MS", "9");
        let config = load_config(None);
        std::env::remove_var("PPG__ACQUISITION__PUBLISH_BACKOFF_MS");

        assert_eq!(config.unwrap().acquisition.publish_backoff_ms, 9);
    }
}

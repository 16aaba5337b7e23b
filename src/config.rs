//! Configuration management module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Lowest non-reserved 7-bit I2C address.
pub const FIRST_USABLE_ADDRESS: u8 = 0x08;
/// Highest non-reserved 7-bit I2C address.
pub const LAST_USABLE_ADDRESS: u8 = 0x77;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// I2C bus settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Linux I2C bus number (`/dev/i2c-N`).
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u8,
    /// First address probed during discovery.
    #[serde(default = "default_scan_first")]
    pub scan_first: u8,
    /// Last address probed during discovery (inclusive).
    #[serde(default = "default_scan_last")]
    pub scan_last: u8,
    /// How long a read may wait for the device to answer.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Delay between read attempts while waiting.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_i2c_bus() -> u8 {
    1
}

fn default_scan_first() -> u8 {
    FIRST_USABLE_ADDRESS
}

fn default_scan_last() -> u8 {
    LAST_USABLE_ADDRESS
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    1
}

/// Fob reader interaction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Pause between a positive presence check and the tag data request.
    #[serde(default = "default_tag_read_delay_ms")]
    pub tag_read_delay_ms: u64,
}

fn default_tag_read_delay_ms() -> u64 {
    2
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily log files; empty disables file logging.
    #[serde(default)]
    pub directory: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Get config file path (same directory as executable).
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.scan_first < FIRST_USABLE_ADDRESS {
            return Err(ConfigError::Validation(format!(
                "Scan start 0x{:02X} is a reserved address (minimum 0x{FIRST_USABLE_ADDRESS:02X})",
                self.bus.scan_first
            )));
        }
        if self.bus.scan_last > LAST_USABLE_ADDRESS {
            return Err(ConfigError::Validation(format!(
                "Scan end 0x{:02X} is a reserved address (maximum 0x{LAST_USABLE_ADDRESS:02X})",
                self.bus.scan_last
            )));
        }
        if self.bus.scan_first > self.bus.scan_last {
            return Err(ConfigError::Validation(
                "Scan start must not be greater than scan end".to_string(),
            ));
        }
        if self.bus.read_timeout_ms < 1 {
            return Err(ConfigError::Validation(
                "Read timeout must be at least 1 ms".to_string(),
            ));
        }
        if self.bus.poll_interval_ms < 1 {
            return Err(ConfigError::Validation(
                "Poll interval must be at least 1 ms".to_string(),
            ));
        }
        if self.bus.poll_interval_ms >= self.bus.read_timeout_ms {
            return Err(ConfigError::Validation(
                "Poll interval must be shorter than the read timeout".to_string(),
            ));
        }
        if self.reader.tag_read_delay_ms > 1000 {
            return Err(ConfigError::Validation(
                "Tag read delay cannot exceed 1000 ms".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown log level '{}' (expected one of {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl BusConfig {
    /// Inclusive range of addresses probed during discovery.
    pub fn scan_range(&self) -> std::ops::RangeInclusive<u8> {
        self.scan_first..=self.scan_last
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ReaderConfig {
    pub fn tag_read_delay(&self) -> Duration {
        Duration::from_millis(self.tag_read_delay_ms)
    }
}

impl LoggingConfig {
    /// Log directory, if file logging is enabled.
    pub fn directory(&self) -> Option<&Path> {
        let dir = self.directory.trim();
        if dir.is_empty() { None } else { Some(Path::new(dir)) }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            i2c_bus: default_i2c_bus(),
            scan_first: default_scan_first(),
            scan_last: default_scan_last(),
            read_timeout_ms: default_read_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            tag_read_delay_ms: default_tag_read_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_scan_range() {
        let config = AppConfig::default();
        assert_eq!(config.bus.scan_range(), 0x08..=0x77);
    }

    #[test]
    fn test_validation_reserved_addresses() {
        let mut config = AppConfig::default();
        config.bus.scan_first = 0x03;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.bus.scan_last = 0x7F;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_inverted_scan_range() {
        let mut config = AppConfig::default();
        config.bus.scan_first = 0x50;
        config.bus.scan_last = 0x40;
        assert!(config.validate().is_err());

        config.bus.scan_last = 0x50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_timeouts() {
        let mut config = AppConfig::default();
        config.bus.read_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.bus.poll_interval_ms = config.bus.read_timeout_ms;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.reader.tag_read_delay_ms = 5000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str("[bus]\ni2c_bus = 0\n").unwrap();
        assert_eq!(config.bus.i2c_bus, 0);
        assert_eq!(config.bus.read_timeout_ms, 1000);
        assert_eq!(config.reader.tag_read_delay_ms, 2);
        assert!(config.logging.directory().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.bus.i2c_bus = 3;
        config.logging.directory = "logs".to_string();
        config.save(&path).unwrap();

        match AppConfig::try_load(&path) {
            ConfigLoadResult::Loaded(loaded) => assert_eq!(loaded, config),
            other => panic!("expected loaded config, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(matches!(AppConfig::try_load(&path), ConfigLoadResult::Missing));

        std::fs::write(&path, "[bus]\nscan_first = 200\n").unwrap();
        assert!(matches!(
            AppConfig::try_load(&path),
            ConfigLoadResult::Invalid(ConfigError::Validation(_))
        ));

        std::fs::write(&path, "not toml at all [").unwrap();
        assert!(matches!(
            AppConfig::try_load(&path),
            ConfigLoadResult::Invalid(ConfigError::Parse(_))
        ));
    }
}

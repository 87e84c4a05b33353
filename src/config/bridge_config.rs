//! Bridge Configuration - serial, connection, bundle and runtime settings
//!
//! Every section implements `Default` with the built-in constants from
//! [`super::defaults`], so a missing file or a partial file behaves exactly
//! like the stock deployment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::connection::LinkSettings;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` on the command line
    Explicit(PathBuf),
    /// The `AQI_BRIDGE_CONFIG` environment variable
    Environment(PathBuf),
    /// `./bridge_config.toml`
    Local(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Explicit(p) => write!(f, "{} (--config)", p.display()),
            ConfigSource::Environment(p) => {
                write!(f, "{} (${})", p.display(), defaults::CONFIG_ENV_VAR)
            }
            ConfigSource::Local(p) => write!(f, "{}", p.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with [`BridgeConfig::load`], which searches:
/// 1. an explicit path (`--config`)
/// 2. `$AQI_BRIDGE_CONFIG`
/// 3. `./bridge_config.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Model bundle artifact locations
    #[serde(default)]
    pub bundle: BundleConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl BridgeConfig {
    /// Resolve the config using the standard search order.
    ///
    /// A file that exists but cannot be read, parsed or validated is an
    /// error; it never silently falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        // 1. Command line
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded bridge config from --config");
            return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
        }

        // 2. Env var
        if let Ok(raw) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let path = PathBuf::from(&raw);
            if path.exists() {
                let config = Self::load_from_file(&path)?;
                info!(path = %path.display(), "Loaded bridge config from {}", defaults::CONFIG_ENV_VAR);
                return Ok((config, ConfigSource::Environment(path)));
            }
            warn!(
                path = %raw,
                "{} points to a non-existent file, falling back",
                defaults::CONFIG_ENV_VAR
            );
        }

        // 3. Working directory
        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!("Loaded bridge config from ./{}", defaults::LOCAL_CONFIG_FILE);
            return Ok((config, ConfigSource::Local(local)));
        }

        // 4. Defaults
        info!("No {} found, using built-in defaults", defaults::LOCAL_CONFIG_FILE);
        Ok((Self::default(), ConfigSource::Defaults))
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document, warning on unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Bridge config saved");
        Ok(())
    }

    /// Check every setting, collecting all problems before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.serial.port.trim().is_empty() {
            errors.push("serial.port must not be empty".to_string());
        }
        if self.serial.baud_rate == 0 {
            errors.push("serial.baud_rate must be > 0".to_string());
        }
        if self.serial.read_timeout_secs == 0 {
            errors.push("serial.read_timeout_secs must be > 0".to_string());
        }
        if self.connection.retry_backoff_secs == 0 {
            errors.push("connection.retry_backoff_secs must be > 0".to_string());
        }
        if self.runtime.poll_interval_ms == 0 {
            errors.push("runtime.poll_interval_ms must be > 0".to_string());
        }

        for (key, path) in [
            ("bundle.model_path", &self.bundle.model_path),
            ("bundle.scaler_path", &self.bundle.scaler_path),
            ("bundle.encoder_path", &self.bundle.encoder_path),
        ] {
            if path.as_os_str().is_empty() {
                errors.push(format!("{key} must not be empty"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            port: self.serial.port.clone(),
            baud_rate: self.serial.baud_rate,
            read_timeout: self.serial.read_timeout(),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

fn default_port() -> String {
    defaults::SERIAL_PORT.to_string()
}
fn default_baud_rate() -> u32 {
    defaults::BAUD_RATE
}
fn default_read_timeout_secs() -> u64 {
    defaults::READ_TIMEOUT_SECS
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Fixed delay between failed connect attempts
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Reconnect after a steady-state disconnect instead of exiting
    #[serde(default = "default_reconnect_on_loss")]
    pub reconnect_on_loss: bool,
}

fn default_retry_backoff_secs() -> u64 {
    defaults::RETRY_BACKOFF_SECS
}
fn default_reconnect_on_loss() -> bool {
    defaults::RECONNECT_ON_LOSS
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_backoff_secs: default_retry_backoff_secs(),
            reconnect_on_loss: default_reconnect_on_loss(),
        }
    }
}

impl ConnectionConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleConfig {
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,

    #[serde(default = "default_encoder_path")]
    pub encoder_path: PathBuf,
}

fn default_model_path() -> PathBuf {
    PathBuf::from(defaults::MODEL_PATH)
}
fn default_scaler_path() -> PathBuf {
    PathBuf::from(defaults::SCALER_PATH)
}
fn default_encoder_path() -> PathBuf {
    PathBuf::from(defaults::ENCODER_PATH)
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            scaler_path: default_scaler_path(),
            encoder_path: default_encoder_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Idle sleep when no input is pending
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    defaults::POLL_INTERVAL_MS
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl RuntimeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_deployment() {
        let config = BridgeConfig::default();
        assert_eq!(config.serial.port, "/dev/cu.usbmodem2101");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.read_timeout(), Duration::from_secs(2));
        assert_eq!(config.connection.retry_backoff(), Duration::from_secs(5));
        assert!(!config.connection.reconnect_on_loss);
        assert_eq!(config.runtime.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.bundle.model_path, PathBuf::from("aqi_dual_model.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = BridgeConfig::from_toml_str("[serial]\nport = \"/dev/ttyACM0\"\n").unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.bundle, BundleConfig::default());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = BridgeConfig::default();
        config.serial.port = "  ".to_string();
        config.serial.baud_rate = 0;
        config.serial.read_timeout_secs = 0;

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 3, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("serial.port")));
                assert!(errors.iter().any(|e| e.contains("baud_rate")));
                assert!(errors.iter().any(|e| e.contains("read_timeout_secs")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_link_settings() {
        let settings = BridgeConfig::default().link_settings();
        assert_eq!(settings.port, "/dev/cu.usbmodem2101");
        assert_eq!(settings.read_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_toml_round_trip_preserves_values() {
        let mut config = BridgeConfig::default();
        config.connection.reconnect_on_loss = true;
        let text = config.to_toml().unwrap();
        assert!(text.contains("reconnect_on_loss = true"));
        assert_eq!(BridgeConfig::from_toml_str(&text).unwrap(), config);
    }
}

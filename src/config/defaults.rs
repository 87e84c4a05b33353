//! Built-in default constants.
//!
//! These are the values the bridge runs with when no config file is present.

// ============================================================================
// Serial
// ============================================================================

/// Device path of the sensor board.
pub const SERIAL_PORT: &str = "/dev/cu.usbmodem2101";

pub const BAUD_RATE: u32 = 115_200;

/// Per-read timeout (seconds). Also bounds how long an interrupt can go unnoticed.
pub const READ_TIMEOUT_SECS: u64 = 2;

// ============================================================================
// Connection
// ============================================================================

/// Fixed delay between failed connect attempts (seconds).
pub const RETRY_BACKOFF_SECS: u64 = 5;

/// Re-enter connect after a steady-state disconnect instead of exiting.
pub const RECONNECT_ON_LOSS: bool = false;

// ============================================================================
// Model bundle
// ============================================================================

pub const MODEL_PATH: &str = "aqi_dual_model.json";
pub const SCALER_PATH: &str = "scaler.json";
pub const ENCODER_PATH: &str = "label_encoder.json";

// ============================================================================
// Runtime
// ============================================================================

/// Idle sleep when no input is pending (milliseconds).
pub const POLL_INTERVAL_MS: u64 = 100;

// ============================================================================
// Config discovery
// ============================================================================

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AQI_BRIDGE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "bridge_config.toml";

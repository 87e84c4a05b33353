//! Config Validation Tests
//!
//! Typo detection and value validation for `BridgeConfig`, exercised through
//! real files the way the binary loads them.

use aqi_bridge::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use aqi_bridge::config::{BridgeConfig, ConfigError, ConfigSource};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_serial_section_warns_with_suggestion() {
    let toml_str = r#"
[serial]
prot = "/dev/ttyACM0"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("prot"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("serial.port"));
}

#[test]
fn typo_in_connection_section_warns() {
    let toml_str = r#"
[connection]
retry_backof_secs = 10
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("connection.retry_backoff_secs")
    );
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[serial]
port = "/dev/ttyUSB0"
baud_rate = 9600
read_timeout_secs = 1

[connection]
retry_backoff_secs = 3
reconnect_on_loss = true

[bundle]
model_path = "models/aqi.json"
scaler_path = "models/scaler.json"
encoder_path = "models/encoder.json"

[runtime]
poll_interval_ms = 50
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
}

#[test]
fn unknown_section_warns_without_suggestion() {
    let warnings = validate_unknown_keys("[mqtt]\nbroker = \"localhost\"\n");
    assert!(warnings.iter().any(|w| w.field == "mqtt"));
    assert!(warnings.iter().any(|w| w.field == "mqtt.broker"));
    assert!(warnings.iter().all(|w| w.suggestion.is_none()));
}

#[test]
fn unknown_keys_do_not_reject_config() {
    let config = BridgeConfig::from_toml_str("[serial]\nbaudrate = 9600\n").unwrap();
    assert_eq!(config, BridgeConfig::default());
}

#[test]
fn known_keys_cover_every_default_field() {
    let rendered = BridgeConfig::default().to_toml().unwrap();
    assert!(validate_unknown_keys(&rendered).is_empty());

    let known = known_config_keys();
    assert!(known.contains("bundle.encoder_path"));
    assert!(suggest_correction("runtime.pol_interval_ms", &known).is_some());
}

// ============================================================================
// Value Validation
// ============================================================================

#[test]
fn zero_baud_is_rejected() {
    let err = BridgeConfig::from_toml_str("[serial]\nbaud_rate = 0\n").unwrap_err();
    match err {
        ConfigError::Validation(errors) => {
            assert!(errors.iter().any(|e| e.contains("baud_rate")));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn zero_read_timeout_and_empty_port_are_both_reported() {
    let toml_str = r#"
[serial]
port = ""
read_timeout_secs = 0
"#;
    match BridgeConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2, "{errors:?}"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn wrong_type_is_a_parse_error_naming_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge_config.toml");
    std::fs::write(&path, "[serial]\nbaud_rate = \"fast\"\n").unwrap();

    let err = BridgeConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(ref p, _) if *p == path));
    assert!(err.to_string().contains("bridge_config.toml"));
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn explicit_path_wins() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[serial]\nport = \"/dev/ttyS1\"\n").unwrap();

    let (config, source) = BridgeConfig::load(Some(path.as_path())).unwrap();
    assert_eq!(config.serial.port, "/dev/ttyS1");
    assert_eq!(source, ConfigSource::Explicit(path));
}

#[test]
fn explicit_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = BridgeConfig::load(Some(path.as_path())).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.toml");

    let mut config = BridgeConfig::default();
    config.serial.port = "/dev/ttyACM3".to_string();
    config.runtime.poll_interval_ms = 250;
    config.save_to_file(&path).unwrap();

    assert_eq!(BridgeConfig::load_from_file(&path).unwrap(), config);
}

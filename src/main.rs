//! AQI Serial Bridge
//!
//! Reads `DATA:<pm25>,<aqi>` lines from the sensor board, runs them through
//! the model bundle and answers each reading with `BUCKET:<label>`.
//!
//! # Usage
//!
//! ```bash
//! # Run against the default device
//! cargo run --release
//!
//! # Another device, reconnecting after unplug
//! ./aqi-bridge --port /dev/ttyACM0 --reconnect-on-loss
//!
//! # One-off prediction without hardware
//! ./aqi-bridge predict --pm25 12.5 --aqi 34
//! ```
//!
//! # Environment Variables
//!
//! - `AQI_BRIDGE_CONFIG`: Path to a TOML config file
//! - `AQI_BRIDGE_PORT`, `AQI_BRIDGE_BAUD`: Override the serial device
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use aqi_bridge::config::BridgeConfig;
use aqi_bridge::connection::{list_ports, SerialPortOpener};
use aqi_bridge::pipeline::{self, Bridge, RuntimeContext, SessionEnd};
use aqi_bridge::protocol;
use aqi_bridge::types::SensorReading;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "aqi-bridge")]
#[command(about = "Serial bridge between an air-quality sensor board and a pretrained AQI model")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides the search order)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Serial device path
    #[arg(long, global = true, env = "AQI_BRIDGE_PORT")]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long, global = true, env = "AQI_BRIDGE_BAUD")]
    baud: Option<u32>,

    /// Model artifact (.json dense checkpoint, or .onnx with the `onnx` feature)
    #[arg(long, global = true, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Scaler artifact
    #[arg(long, global = true, value_name = "PATH")]
    scaler: Option<PathBuf>,

    /// Label encoder artifact
    #[arg(long, global = true, value_name = "PATH")]
    encoder: Option<PathBuf>,

    /// Reconnect after the device disappears instead of exiting
    #[arg(long, global = true)]
    reconnect_on_loss: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the bridge loop (default)
    Run,

    /// Load the bundle, predict one reading and print the response line
    Predict {
        #[arg(long)]
        pm25: f64,
        #[arg(long)]
        aqi: f64,
    },

    /// List available serial devices
    Ports,

    /// Load, validate and print the effective configuration
    CheckConfig,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve the config file, then apply command-line overrides.
fn resolve_config(args: &CliArgs) -> Result<BridgeConfig> {
    let (mut config, source) =
        BridgeConfig::load(args.config.as_deref()).context("Failed to load bridge config")?;
    info!(source = %source, "Configuration resolved");

    if let Some(port) = &args.port {
        config.serial.port.clone_from(port);
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(model) = &args.model {
        config.bundle.model_path.clone_from(model);
    }
    if let Some(scaler) = &args.scaler {
        config.bundle.scaler_path.clone_from(scaler);
    }
    if let Some(encoder) = &args.encoder {
        config.bundle.encoder_path.clone_from(encoder);
    }
    if args.reconnect_on_loss {
        config.connection.reconnect_on_loss = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

// ============================================================================
// Subcommands
// ============================================================================

async fn run_bridge(config: BridgeConfig) -> Result<()> {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  AQI Serial Bridge");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let ctx = RuntimeContext::load(config).context("Failed to load model bundle")?;

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let report = Bridge::new(&ctx, Box::new(SerialPortOpener), cancel_token)
        .run()
        .await;

    finish_session(report.end, &ctx.config.serial.port)
}

/// Both session endings are orderly exits; only the log differs.
fn finish_session(end: SessionEnd, port: &str) -> Result<()> {
    match end {
        SessionEnd::Interrupted => info!("Shutdown complete"),
        SessionEnd::LinkLost => error!(
            port = %port,
            "Serial connection lost, exiting (use --reconnect-on-loss to keep running)"
        ),
    }
    Ok(())
}

fn run_predict(config: BridgeConfig, pm25: f64, aqi: f64) -> Result<()> {
    let ctx = RuntimeContext::load(config).context("Failed to load model bundle")?;
    let reading = SensorReading::new(pm25, aqi);

    let prediction = pipeline::predict(&ctx.bundle, &reading).context("Prediction failed")?;
    info!("Predicted pollutant levels: {}", prediction.pollutant_levels);
    print!("{}", protocol::encode_response(&prediction));
    Ok(())
}

fn run_ports() -> Result<()> {
    let ports = list_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        info!("No serial ports found");
    }
    for (path, description) in ports {
        println!("{path}\t{description}");
    }
    Ok(())
}

fn run_check_config(config: &BridgeConfig) -> Result<()> {
    let text = config.to_toml().context("Failed to render config")?;
    print!("{text}");
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    if matches!(args.command, Some(SubCommand::Ports)) {
        return run_ports();
    }

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return Err(e);
        }
    };

    match args.command {
        None | Some(SubCommand::Run) => run_bridge(config).await,
        Some(SubCommand::Predict { pm25, aqi }) => run_predict(config, pm25, aqi),
        Some(SubCommand::CheckConfig) => run_check_config(&config),
        Some(SubCommand::Ports) => run_ports(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_loss_exits_cleanly() {
        assert!(finish_session(SessionEnd::LinkLost, "/dev/ttyUSB0").is_ok());
    }

    #[test]
    fn test_interrupt_exits_cleanly() {
        assert!(finish_session(SessionEnd::Interrupted, "/dev/ttyUSB0").is_ok());
    }

    #[test]
    fn test_predict_subcommand_parses() {
        let args = CliArgs::parse_from(["aqi-bridge", "predict", "--pm25", "12.5", "--aqi", "34"]);
        assert!(matches!(
            args.command,
            Some(SubCommand::Predict { pm25, aqi }) if pm25 == 12.5 && aqi == 34.0
        ));
    }
}

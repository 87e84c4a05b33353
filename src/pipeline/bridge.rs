//! Bridge Loop
//!
//! One sequential control loop per process:
//!
//! ```text
//! connect (retry forever) -> poll -> read line -> parse -> predict -> write BUCKET
//!                              ^                                         |
//!                              +-----------------------------------------+
//! ```
//!
//! Parse and inference failures drop the line and keep going. A steady-state
//! disconnect ends the session, or re-enters connect when
//! `connection.reconnect_on_loss` is set. Cancellation is checked every
//! iteration and during every sleep.

use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::inference;
use crate::config::BridgeConfig;
use crate::connection::{ConnectionManager, LinkOpener};
use crate::model::{AssetLoadError, ModelBundle};
use crate::protocol;
use crate::types::UNKNOWN_BUCKET;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Everything the loop needs that outlives a single connection.
#[derive(Debug)]
pub struct RuntimeContext {
    pub config: BridgeConfig,
    pub bundle: ModelBundle,
}

impl RuntimeContext {
    pub fn new(config: BridgeConfig, bundle: ModelBundle) -> Self {
        Self { config, bundle }
    }

    /// Load the model bundle named by `config.bundle`.
    pub fn load(config: BridgeConfig) -> Result<Self, AssetLoadError> {
        let paths = &config.bundle;
        let bundle = ModelBundle::load(
            Path::new(&paths.model_path),
            Path::new(&paths.scaler_path),
            Path::new(&paths.encoder_path),
        )?;
        Ok(Self::new(config, bundle))
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// Interrupt received; clean shutdown.
    Interrupted,
    /// The device went away and reconnecting is disabled.
    LinkLost,
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub lines_read: u64,
    pub readings_parsed: u64,
    /// Lines without the `DATA:` marker
    pub lines_ignored: u64,
    pub parse_failures: u64,
    pub predictions: u64,
    pub inference_failures: u64,
    pub responses_sent: u64,
    pub write_failures: u64,
    pub connections: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeReport {
    pub end: SessionEnd,
    pub stats: BridgeStats,
}

pub struct Bridge<'a> {
    ctx: &'a RuntimeContext,
    connection: ConnectionManager,
    cancel: CancellationToken,
    stats: BridgeStats,
}

impl<'a> Bridge<'a> {
    pub fn new(ctx: &'a RuntimeContext, opener: Box<dyn LinkOpener>, cancel: CancellationToken) -> Self {
        let connection = ConnectionManager::new(
            opener,
            ctx.config.link_settings(),
            ctx.config.connection.retry_backoff(),
        );
        Self {
            ctx,
            connection,
            cancel,
            stats: BridgeStats::default(),
        }
    }

    /// Run until interrupted or, without `reconnect_on_loss`, until the link drops.
    pub async fn run(mut self) -> BridgeReport {
        info!(
            port = %self.ctx.config.serial.port,
            baud_rate = self.ctx.config.serial.baud_rate,
            "Starting AQI serial bridge"
        );
        info!("{RULE}");

        let end = loop {
            if self.connection.connect(&self.cancel).await.is_err() {
                info!("Shutdown signal received while connecting");
                break SessionEnd::Interrupted;
            }

            match self.serve().await {
                SessionEnd::LinkLost if self.ctx.config.connection.reconnect_on_loss => {
                    warn!("Serial link lost, reconnecting");
                }
                end => break end,
            }
        };

        self.connection.close();
        self.stats.connections = self.connection.connections();
        self.log_summary(end);

        BridgeReport {
            end,
            stats: self.stats,
        }
    }

    /// Read loop over one established connection.
    async fn serve(&mut self) -> SessionEnd {
        let poll_interval = self.ctx.config.runtime.poll_interval();

        loop {
            if self.cancel.is_cancelled() {
                info!("Shutdown signal received");
                return SessionEnd::Interrupted;
            }

            let pending = match self.connection.has_data() {
                Ok(pending) => pending,
                Err(e) => {
                    debug!(error = %e, "Availability check failed");
                    return SessionEnd::LinkLost;
                }
            };

            if pending {
                match self.connection.read_line().await {
                    Ok(Some(line)) => self.handle_line(&line).await,
                    Ok(None) => {}
                    Err(e) => {
                        debug!(error = %e, "Read failed");
                        return SessionEnd::LinkLost;
                    }
                }
                continue;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown signal received");
                    return SessionEnd::Interrupted;
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    async fn handle_line(&mut self, line: &str) {
        self.stats.lines_read += 1;

        let reading = match protocol::parse_line(line) {
            Ok(Some(reading)) => reading,
            Ok(None) => {
                self.stats.lines_ignored += 1;
                debug!(line = %line, "Ignoring non-data line");
                return;
            }
            Err(e) => {
                self.stats.parse_failures += 1;
                error!(line = %line, error = %e, "Error parsing data");
                return;
            }
        };
        self.stats.readings_parsed += 1;
        info!(pm25 = reading.pm25, aqi = reading.aqi_raw, "Extracted data");

        let prediction = match inference::predict(&self.ctx.bundle, &reading) {
            Ok(prediction) => prediction,
            Err(e) => {
                self.stats.inference_failures += 1;
                error!(
                    kind = e.kind(),
                    error = %e,
                    bucket = UNKNOWN_BUCKET,
                    "Error during prediction, no response sent"
                );
                return;
            }
        };
        self.stats.predictions += 1;
        info!("Predicted pollutant levels: {}", prediction.pollutant_levels);
        info!(bucket = %prediction.aqi_bucket, "Predicted AQI classification");

        let response = protocol::encode_response(&prediction);
        match self.connection.write_line(&response).await {
            Ok(()) => {
                self.stats.responses_sent += 1;
                debug!(response = %response.trim_end(), "Sent response");
            }
            Err(e) => {
                self.stats.write_failures += 1;
                error!(error = %e, "Error sending response");
            }
        }
    }

    fn log_summary(&self, end: SessionEnd) {
        let s = &self.stats;
        info!("");
        info!("{RULE}");
        info!("FINAL STATISTICS ({end:?})");
        info!("{RULE}");
        info!("   Connections:          {}", s.connections);
        info!("   Lines Read:           {}", s.lines_read);
        info!("   Readings Parsed:      {}", s.readings_parsed);
        info!("   Lines Ignored:        {}", s.lines_ignored);
        info!("   Parse Failures:       {}", s.parse_failures);
        info!("   Predictions:          {}", s.predictions);
        info!("   Inference Failures:   {}", s.inference_failures);
        info!("   Responses Sent:       {}", s.responses_sent);
        info!("   Write Failures:       {}", s.write_failures);
        info!("{RULE}");
    }
}

//! AQI Serial Bridge
//!
//! Connects an air-quality sensor board to a pretrained two-headed model.
//!
//! ## Architecture
//!
//! - **Connection**: serial link with infinite fixed-backoff connect
//! - **Protocol**: `DATA:<pm25>,<aqi>` in, `BUCKET:<label>` out
//! - **Model**: scaler, dense (or ONNX) network and label encoder bundle
//! - **Pipeline**: the sequential read/predict/respond loop

pub mod config;
pub mod connection;
pub mod model;
pub mod pipeline;
pub mod protocol;
pub mod types;

// Re-export configuration
pub use config::{BridgeConfig, ConfigError};

// Re-export commonly used types
pub use types::{PollutantLevels, Prediction, SensorReading, UNKNOWN_BUCKET};

// Re-export connection components
pub use connection::{ConnectionManager, ConnectionState, LinkError, LinkOpener, SerialLink};

// Re-export model components
pub use model::{AssetLoadError, InferenceError, ModelBundle};

// Re-export pipeline
pub use pipeline::{Bridge, BridgeReport, BridgeStats, RuntimeContext, SessionEnd};
pub use protocol::ParseError;

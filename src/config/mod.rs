//! Bridge Configuration Module
//!
//! Operator-tunable settings loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `AQI_BRIDGE_CONFIG` environment variable (path to TOML file)
//! 3. `bridge_config.toml` in the current working directory
//! 4. Built-in defaults ([`defaults`])
//!
//! The resolved [`BridgeConfig`] is owned by the runtime context and passed
//! down explicitly.

mod bridge_config;
pub mod defaults;
pub mod validation;

pub use bridge_config::*;

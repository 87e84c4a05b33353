//! Processing Pipeline Module
//!
//! ```text
//! serial line -> protocol::parse_line -> inference::predict -> protocol::encode_response
//! ```
//!
//! [`Bridge`] drives the loop over a [`crate::connection::ConnectionManager`];
//! [`inference`] is the pure per-reading transform it calls.

mod bridge;
pub mod inference;

pub use bridge::{Bridge, BridgeReport, BridgeStats, RuntimeContext, SessionEnd};
pub use inference::{argmax, predict};

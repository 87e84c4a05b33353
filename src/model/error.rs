//! Errors raised while loading the model bundle or running inference.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which bundle artifact an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    Scaler,
    Encoder,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Model => write!(f, "model"),
            ArtifactKind::Scaler => write!(f, "scaler"),
            ArtifactKind::Encoder => write!(f, "label encoder"),
        }
    }
}

/// Startup failure loading one of the bundle artifacts. Always fatal.
#[derive(Debug, Error)]
pub enum AssetLoadError {
    #[error("{kind} artifact not found: {}", .path.display())]
    Missing { kind: ArtifactKind, path: PathBuf },

    #[error("failed to read {kind} artifact {}: {source}", .path.display())]
    Io {
        kind: ArtifactKind,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{kind} artifact {} is corrupt: {reason}", .path.display())]
    Corrupt {
        kind: ArtifactKind,
        path: PathBuf,
        reason: String,
    },

    #[error(
        "model artifact {} has format version {found}, this runtime supports version {supported}",
        .path.display()
    )]
    IncompatibleVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("{kind} artifact {} is invalid: {reason}", .path.display())]
    Invalid {
        kind: ArtifactKind,
        path: PathBuf,
        reason: String,
    },

    #[error("unsupported model format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },
}

/// Per-reading inference failure. Recoverable: the reading is dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("shape mismatch in {stage}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("numerical failure in {stage}: {detail}")]
    Numerical { stage: &'static str, detail: String },

    #[error("label encoder has no class at index {index} ({classes} classes known)")]
    EncoderLookup { index: usize, classes: usize },

    #[error("model backend error: {0}")]
    Backend(String),
}

impl InferenceError {
    /// Short stable tag for structured log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            InferenceError::ShapeMismatch { .. } => "shape_mismatch",
            InferenceError::Numerical { .. } => "numerical",
            InferenceError::EncoderLookup { .. } => "encoder_lookup",
            InferenceError::Backend(_) => "backend",
        }
    }
}

/// Reject non-finite values produced by a pipeline stage.
pub(crate) fn ensure_finite(stage: &'static str, values: &[f64]) -> Result<(), InferenceError> {
    match values.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(i) => Err(InferenceError::Numerical {
            stage,
            detail: format!("non-finite value {} at position {}", values[i], i),
        }),
    }
}

//! Model Bundle
//!
//! The three read-only artifacts produced by the training pipeline:
//!
//! - **Model**: two-headed network (pollutant regression + AQI bucket scores)
//! - **Scaler**: feature normalization fitted on the training set
//! - **Encoder**: class index -> bucket label mapping
//!
//! Loaded once at startup with [`ModelBundle::load`]; any failure is a
//! deployment error and aborts the process. Each artifact sits behind a trait
//! so alternative backends (or test stubs) plug in via [`ModelBundle::new`].

mod encoder;
mod error;
mod network;
#[cfg(feature = "onnx")]
mod onnx;
mod scaler;

pub use encoder::LabelEncoder;
pub use error::{ArtifactKind, AssetLoadError, InferenceError};
pub(crate) use error::ensure_finite;
pub use network::{Activation, DenseLayer, DenseNetwork, SUPPORTED_FORMAT_VERSION};
#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;
pub use scaler::Scaler;

use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{info, warn};

/// Raw outputs of one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    /// Regressed pollutant levels (expected length 5)
    pub pollutants: Vec<f64>,
    /// Per-class scores or probabilities over the encoder's label space
    pub class_scores: Vec<f64>,
}

/// Pretrained inference model.
pub trait InferenceModel: Send + Sync {
    /// Run one forward pass on a scaled feature row.
    fn predict(&self, features: &[f64]) -> Result<ModelOutput, InferenceError>;

    /// Human-readable backend name for logging (e.g. "dense-json", "onnx").
    fn backend_name(&self) -> &str;

    /// Number of classes scored, when the backend knows it up front.
    fn class_count(&self) -> Option<usize> {
        None
    }
}

/// Fitted feature scaler.
pub trait FeatureScaler: Send + Sync {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, InferenceError>;
}

/// Inverse label mapping.
pub trait LabelDecoder: Send + Sync {
    fn inverse_transform(&self, index: usize) -> Result<&str, InferenceError>;

    fn class_count(&self) -> usize;
}

/// Immutable set of loaded artifacts, shared read-only by every inference call.
pub struct ModelBundle {
    model: Box<dyn InferenceModel>,
    scaler: Box<dyn FeatureScaler>,
    encoder: Box<dyn LabelDecoder>,
}

impl ModelBundle {
    /// Assemble a bundle from already-constructed components.
    pub fn new(
        model: Box<dyn InferenceModel>,
        scaler: Box<dyn FeatureScaler>,
        encoder: Box<dyn LabelDecoder>,
    ) -> Self {
        Self {
            model,
            scaler,
            encoder,
        }
    }

    /// Load all three artifacts from disk.
    ///
    /// Emits one confirmation line per artifact. The model backend is chosen
    /// by file extension: `.json` dense checkpoint, or `.onnx` when built
    /// with the `onnx` feature.
    pub fn load(
        model_path: &Path,
        scaler_path: &Path,
        encoder_path: &Path,
    ) -> Result<Self, AssetLoadError> {
        info!(path = %model_path.display(), "Loading AI model...");
        let model = load_model(model_path)?;
        info!(backend = model.backend_name(), "Model loaded successfully");

        let scaler = Scaler::load(scaler_path)?;
        info!(path = %scaler_path.display(), "Scaler loaded successfully");

        let encoder = LabelEncoder::load(encoder_path)?;
        info!(
            path = %encoder_path.display(),
            classes = encoder.classes().len(),
            "Label encoder loaded successfully"
        );

        if let Some(model_classes) = model.class_count() {
            if model_classes != encoder.classes().len() {
                warn!(
                    model_classes,
                    encoder_classes = encoder.classes().len(),
                    "Model class head and label encoder disagree on class count"
                );
            }
        }

        Ok(Self::new(model, Box::new(scaler), Box::new(encoder)))
    }

    pub fn model(&self) -> &dyn InferenceModel {
        self.model.as_ref()
    }

    pub fn scaler(&self) -> &dyn FeatureScaler {
        self.scaler.as_ref()
    }

    pub fn encoder(&self) -> &dyn LabelDecoder {
        self.encoder.as_ref()
    }
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("backend", &self.model.backend_name())
            .field("classes", &self.encoder.class_count())
            .finish()
    }
}

fn load_model(path: &Path) -> Result<Box<dyn InferenceModel>, AssetLoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("json") => Ok(Box::new(DenseNetwork::load(path)?)),
        #[cfg(feature = "onnx")]
        Some("onnx") => Ok(Box::new(OnnxModel::load(path)?)),
        _ => Err(AssetLoadError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Read and deserialize a JSON artifact, mapping failures onto [`AssetLoadError`].
pub(crate) fn read_json_artifact<T: DeserializeOwned>(
    kind: ArtifactKind,
    path: &Path,
) -> Result<T, AssetLoadError> {
    if !path.exists() {
        return Err(AssetLoadError::Missing {
            kind,
            path: path.to_path_buf(),
        });
    }
    let data = std::fs::read(path).map_err(|source| AssetLoadError::Io {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|e| AssetLoadError::Corrupt {
        kind,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.keras");
        std::fs::write(&path, b"not a checkpoint").unwrap();

        let result = load_model(&path);
        assert!(matches!(
            result,
            Err(AssetLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = Scaler::load(&dir.path().join("scaler.json")).unwrap_err();
        assert!(matches!(
            err,
            AssetLoadError::Missing {
                kind: ArtifactKind::Scaler,
                ..
            }
        ));
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label_encoder.json");
        std::fs::write(&path, b"{ classes: ").unwrap();

        let err = LabelEncoder::load(&path).unwrap_err();
        assert!(matches!(err, AssetLoadError::Corrupt { .. }));
        assert!(err.to_string().contains("label encoder"));
    }
}

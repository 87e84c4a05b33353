//! Label encoder mapping class indices back to AQI bucket names.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::error::{ArtifactKind, AssetLoadError, InferenceError};
use super::{read_json_artifact, LabelDecoder};

/// Characters that would corrupt the outbound `BUCKET:` frame.
const RESERVED_CHARS: [char; 3] = [':', '\n', '\r'];

/// Ordered class list as fitted at training time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self, String> {
        let encoder = Self { classes };
        encoder.validate()?;
        Ok(encoder)
    }

    /// Load and validate a label encoder artifact.
    pub fn load(path: &Path) -> Result<Self, AssetLoadError> {
        let encoder: Self = read_json_artifact(ArtifactKind::Encoder, path)?;
        encoder.validate().map_err(|reason| AssetLoadError::Invalid {
            kind: ArtifactKind::Encoder,
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(encoder)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("class list is empty".to_string());
        }
        let mut seen = HashSet::new();
        for class in &self.classes {
            if class.trim().is_empty() {
                return Err("class labels must not be blank".to_string());
            }
            if class.contains(&RESERVED_CHARS[..]) {
                return Err(format!("class label {class:?} contains a reserved character"));
            }
            if !seen.insert(class.as_str()) {
                return Err(format!("duplicate class label {class:?}"));
            }
        }
        Ok(())
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

impl LabelDecoder for LabelEncoder {
    fn inverse_transform(&self, index: usize) -> Result<&str, InferenceError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(InferenceError::EncoderLookup {
                index,
                classes: self.classes.len(),
            })
    }

    fn class_count(&self) -> usize {
        self.classes.len()
    }
}

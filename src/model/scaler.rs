//! Feature scaling fitted at training time.
//!
//! The training pipeline exports its fitted scaler as JSON:
//!
//! ```json
//! { "kind": "standard", "mean": [35.2, 88.1], "scale": [21.7, 54.3] }
//! { "kind": "min_max", "data_min": [0.0, 0.0], "data_max": [500.0, 500.0] }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ensure_finite, ArtifactKind, AssetLoadError, InferenceError};
use super::{read_json_artifact, FeatureScaler};
use crate::types::FEATURE_COUNT;

/// A fitted, stateless affine scaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// z-score: `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `(x - min) / (max - min) * (hi - lo) + lo`
    MinMax {
        data_min: Vec<f64>,
        data_max: Vec<f64>,
        #[serde(default = "default_feature_range")]
        feature_range: [f64; 2],
    },
}

const fn default_feature_range() -> [f64; 2] {
    [0.0, 1.0]
}

impl Scaler {
    /// Load and validate a scaler artifact.
    pub fn load(path: &Path) -> Result<Self, AssetLoadError> {
        let scaler: Self = read_json_artifact(ArtifactKind::Scaler, path)?;
        scaler.validate().map_err(|reason| AssetLoadError::Invalid {
            kind: ArtifactKind::Scaler,
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(scaler)
    }

    /// Check parameter shapes and values against the two-feature input.
    pub fn validate(&self) -> Result<(), String> {
        let (a, b, a_name, b_name) = match self {
            Scaler::Standard { mean, scale } => (mean, scale, "mean", "scale"),
            Scaler::MinMax {
                data_min, data_max, ..
            } => (data_min, data_max, "data_min", "data_max"),
        };

        if a.len() != FEATURE_COUNT || b.len() != FEATURE_COUNT {
            return Err(format!(
                "expected {FEATURE_COUNT} features, got {a_name}={} {b_name}={}",
                a.len(),
                b.len()
            ));
        }
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err("parameters must be finite".to_string());
        }

        match self {
            Scaler::Standard { scale, .. } => {
                if scale.iter().any(|s| *s == 0.0) {
                    return Err("scale must be non-zero".to_string());
                }
            }
            Scaler::MinMax {
                data_min,
                data_max,
                feature_range,
            } => {
                if data_min.iter().zip(data_max).any(|(lo, hi)| lo == hi) {
                    return Err("data_max must differ from data_min".to_string());
                }
                if !(feature_range[0] < feature_range[1]) {
                    return Err(format!(
                        "feature_range must be increasing, got {:?}",
                        feature_range
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn feature_count(&self) -> usize {
        match self {
            Scaler::Standard { mean, .. } => mean.len(),
            Scaler::MinMax { data_min, .. } => data_min.len(),
        }
    }
}

impl FeatureScaler for Scaler {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, InferenceError> {
        if features.len() != self.feature_count() {
            return Err(InferenceError::ShapeMismatch {
                stage: "scaler",
                expected: self.feature_count(),
                actual: features.len(),
            });
        }

        let scaled: Vec<f64> = match self {
            Scaler::Standard { mean, scale } => features
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| (x - m) / s)
                .collect(),
            Scaler::MinMax {
                data_min,
                data_max,
                feature_range: [lo, hi],
            } => features
                .iter()
                .zip(data_min.iter().zip(data_max))
                .map(|(x, (min, max))| (x - min) / (max - min) * (hi - lo) + lo)
                .collect(),
        };

        ensure_finite("scaler", &scaled)?;
        Ok(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> Scaler {
        Scaler::Standard {
            mean: vec![10.0, 50.0],
            scale: vec![2.0, 25.0],
        }
    }

    #[test]
    fn test_standard_transform() {
        let out = standard().transform(&[12.5, 34.0]).unwrap();
        assert!((out[0] - 1.25).abs() < 1e-12);
        assert!((out[1] - (-0.64)).abs() < 1e-12);
    }

    #[test]
    fn test_min_max_transform() {
        let scaler = Scaler::MinMax {
            data_min: vec![0.0, 0.0],
            data_max: vec![100.0, 500.0],
            feature_range: [0.0, 1.0],
        };
        let out = scaler.transform(&[25.0, 250.0]).unwrap();
        assert_eq!(out, vec![0.25, 0.5]);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = standard().transform(&[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            InferenceError::ShapeMismatch {
                stage: "scaler",
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_non_finite_input_is_numerical() {
        let err = standard().transform(&[f64::NAN, 2.0]).unwrap_err();
        assert_eq!(err.kind(), "numerical");
    }

    #[test]
    fn test_validate_rejects_zero_scale() {
        let scaler = Scaler::Standard {
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 0.0],
        };
        assert!(scaler.validate().unwrap_err().contains("non-zero"));
    }

    #[test]
    fn test_validate_rejects_wrong_feature_count() {
        let scaler = Scaler::Standard {
            mean: vec![0.0],
            scale: vec![1.0],
        };
        assert!(scaler.validate().is_err());
    }

    #[test]
    fn test_deserialize_tagged() {
        let json = r#"{"kind":"min_max","data_min":[0.0,0.0],"data_max":[1.0,2.0]}"#;
        let scaler: Scaler = serde_json::from_str(json).unwrap();
        assert!(scaler.validate().is_ok());
        assert!(matches!(
            scaler,
            Scaler::MinMax {
                feature_range: [0.0, 1.0],
                ..
            }
        ));
    }
}

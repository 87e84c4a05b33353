//! ONNX Runtime backend for models exported with `tf2onnx`.
//!
//! Expects one float input of shape `[1, 2]` and two outputs: the pollutant
//! regression `[1, 5]` and the bucket scores `[1, K]`. Outputs are matched by
//! name (`pollutant*` / `class*`, `aqi*`) and otherwise taken in graph order.

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::info;

use super::error::{ArtifactKind, AssetLoadError, InferenceError};
use super::{InferenceModel, ModelOutput};
use crate::types::FEATURE_COUNT;

pub struct OnnxModel {
    session: Mutex<Session>,
    input_name: String,
    pollutant_output: String,
    class_output: String,
}

impl OnnxModel {
    pub fn load(path: &Path) -> Result<Self, AssetLoadError> {
        if !path.exists() {
            return Err(AssetLoadError::Missing {
                kind: ArtifactKind::Model,
                path: path.to_path_buf(),
            });
        }

        let session = build_session(path).map_err(|reason| AssetLoadError::Corrupt {
            kind: ArtifactKind::Model,
            path: path.to_path_buf(),
            reason,
        })?;

        let invalid = |reason: &str| AssetLoadError::Invalid {
            kind: ArtifactKind::Model,
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| invalid("graph declares no inputs"))?;

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.len() < 2 {
            return Err(invalid("graph must declare a pollutant output and a class output"));
        }

        let find = |hints: &[&str]| {
            output_names
                .iter()
                .find(|name| {
                    let lower = name.to_lowercase();
                    hints.iter().any(|h| lower.contains(h))
                })
                .cloned()
        };
        let pollutant_output = find(&["pollutant"]).unwrap_or_else(|| output_names[0].clone());
        let class_output = find(&["class", "aqi"])
            .filter(|name| *name != pollutant_output)
            .unwrap_or_else(|| output_names[1].clone());

        info!(
            input = %input_name,
            pollutant_output = %pollutant_output,
            class_output = %class_output,
            "ONNX graph bound"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            pollutant_output,
            class_output,
        })
    }
}

fn build_session(path: &Path) -> Result<Session, String> {
    Session::builder()
        .map_err(|e| e.to_string())?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| e.to_string())?
        .with_intra_threads(1)
        .map_err(|e| e.to_string())?
        .commit_from_file(path)
        .map_err(|e| e.to_string())
}

impl InferenceModel for OnnxModel {
    fn predict(&self, features: &[f64]) -> Result<ModelOutput, InferenceError> {
        if features.len() != FEATURE_COUNT {
            return Err(InferenceError::ShapeMismatch {
                stage: "model",
                expected: FEATURE_COUNT,
                actual: features.len(),
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let data: Vec<f32> = features.iter().map(|v| *v as f32).collect();
        let input_array = Array2::<f32>::from_shape_vec((1, FEATURE_COUNT), data)
            .map_err(|e| InferenceError::Backend(format!("array error: {e}")))?;
        let input_tensor = Value::from_array(input_array)
            .map_err(|e| InferenceError::Backend(format!("tensor error: {e}")))?;

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| InferenceError::Backend(format!("run failed: {e}")))?;

        let extract = |name: &str| -> Result<Vec<f64>, InferenceError> {
            let value = outputs
                .get(name)
                .ok_or_else(|| InferenceError::Backend(format!("missing output {name}")))?;
            let (_, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| InferenceError::Backend(format!("extract {name}: {e}")))?;
            Ok(data.iter().map(|v| f64::from(*v)).collect())
        };

        Ok(ModelOutput {
            pollutants: extract(&self.pollutant_output)?,
            class_scores: extract(&self.class_output)?,
        })
    }

    fn backend_name(&self) -> &str {
        "onnx"
    }
}

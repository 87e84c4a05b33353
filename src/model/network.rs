//! Dense two-headed network evaluated natively.
//!
//! The training side exports its weights as a JSON checkpoint:
//!
//! ```text
//! features [2] -> trunk (shared dense layers) -> hidden
//! hidden -> pollutant_head -> [5]   (PM10, NO2, SO2, CO, O3)
//! hidden -> class_head     -> [K]   (AQI bucket scores)
//! ```
//!
//! `weights` are stored row-major as `[out][in]`, matching how Keras dense
//! kernels are transposed on export.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ensure_finite, ArtifactKind, AssetLoadError, InferenceError};
use super::{read_json_artifact, InferenceModel, ModelOutput};
use crate::types::{FEATURE_COUNT, POLLUTANT_COUNT};

/// Checkpoint format version understood by this runtime.
pub const SUPPORTED_FORMAT_VERSION: u32 = 1;

/// Element-wise (or, for softmax, row-wise) output activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Tanh,
    Sigmoid,
    Softmax,
}

impl Activation {
    fn apply(self, values: &mut [f64]) {
        match self {
            Activation::Linear => {}
            Activation::Relu => values.iter_mut().for_each(|v| *v = v.max(0.0)),
            Activation::Tanh => values.iter_mut().for_each(|v| *v = v.tanh()),
            Activation::Sigmoid => values
                .iter_mut()
                .for_each(|v| *v = 1.0 / (1.0 + (-*v).exp())),
            Activation::Softmax => {
                // Shift by the max for numerical stability
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mut sum = 0.0;
                for v in values.iter_mut() {
                    *v = (*v - max).exp();
                    sum += *v;
                }
                for v in values.iter_mut() {
                    *v /= sum;
                }
            }
        }
    }
}

/// One fully connected layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// `[out][in]`
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    pub fn new(weights: Vec<Vec<f64>>, bias: Vec<f64>, activation: Activation) -> Self {
        Self {
            weights,
            bias,
            activation,
        }
    }

    pub fn output_dim(&self) -> usize {
        self.weights.len()
    }

    fn validate(&self, expected_in: usize, name: &str) -> Result<(), String> {
        if self.weights.is_empty() {
            return Err(format!("{name}: layer has no output units"));
        }
        if let Some((row, w)) = self
            .weights
            .iter()
            .enumerate()
            .find(|(_, w)| w.len() != expected_in)
        {
            return Err(format!(
                "{name}: weight row {row} has {} inputs, expected {expected_in}",
                w.len()
            ));
        }
        if self.bias.len() != self.weights.len() {
            return Err(format!(
                "{name}: bias has {} entries for {} output units",
                self.bias.len(),
                self.weights.len()
            ));
        }
        let all_finite = self
            .weights
            .iter()
            .flatten()
            .chain(self.bias.iter())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(format!("{name}: parameters must be finite"));
        }
        Ok(())
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut out: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect();
        self.activation.apply(&mut out);
        out
    }
}

/// Versioned dense network checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseNetwork {
    pub format_version: u32,
    pub input_dim: usize,
    #[serde(default)]
    pub trunk: Vec<DenseLayer>,
    pub pollutant_head: Vec<DenseLayer>,
    pub class_head: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Load a checkpoint, rejecting other format versions and inconsistent shapes.
    pub fn load(path: &Path) -> Result<Self, AssetLoadError> {
        let network: Self = read_json_artifact(ArtifactKind::Model, path)?;

        if network.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(AssetLoadError::IncompatibleVersion {
                path: path.to_path_buf(),
                found: network.format_version,
                supported: SUPPORTED_FORMAT_VERSION,
            });
        }

        network.validate().map_err(|reason| AssetLoadError::Invalid {
            kind: ArtifactKind::Model,
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(network)
    }

    /// Check that layer shapes chain from the input through both heads.
    pub fn validate(&self) -> Result<(), String> {
        if self.input_dim != FEATURE_COUNT {
            return Err(format!(
                "input_dim is {}, expected {FEATURE_COUNT}",
                self.input_dim
            ));
        }

        let mut dim = self.input_dim;
        for (i, layer) in self.trunk.iter().enumerate() {
            layer.validate(dim, &format!("trunk[{i}]"))?;
            dim = layer.output_dim();
        }

        let pollutant_dim = validate_head(&self.pollutant_head, dim, "pollutant_head")?;
        if pollutant_dim != POLLUTANT_COUNT {
            return Err(format!(
                "pollutant_head produces {pollutant_dim} outputs, expected {POLLUTANT_COUNT}"
            ));
        }
        validate_head(&self.class_head, dim, "class_head")?;
        Ok(())
    }

    /// Number of AQI classes scored by the class head.
    pub fn class_count(&self) -> usize {
        self.class_head.last().map_or(0, DenseLayer::output_dim)
    }

    pub fn num_params(&self) -> usize {
        self.trunk
            .iter()
            .chain(&self.pollutant_head)
            .chain(&self.class_head)
            .map(|l| l.weights.iter().map(Vec::len).sum::<usize>() + l.bias.len())
            .sum()
    }
}

fn validate_head(layers: &[DenseLayer], input_dim: usize, name: &str) -> Result<usize, String> {
    if layers.is_empty() {
        return Err(format!("{name} has no layers"));
    }
    let mut dim = input_dim;
    for (i, layer) in layers.iter().enumerate() {
        layer.validate(dim, &format!("{name}[{i}]"))?;
        dim = layer.output_dim();
    }
    Ok(dim)
}

fn run_stack(layers: &[DenseLayer], input: &[f64]) -> Vec<f64> {
    layers
        .iter()
        .fold(input.to_vec(), |acc, layer| layer.forward(&acc))
}

impl InferenceModel for DenseNetwork {
    fn predict(&self, features: &[f64]) -> Result<ModelOutput, InferenceError> {
        if features.len() != self.input_dim {
            return Err(InferenceError::ShapeMismatch {
                stage: "model",
                expected: self.input_dim,
                actual: features.len(),
            });
        }

        let hidden = run_stack(&self.trunk, features);
        ensure_finite("model trunk", &hidden)?;

        let pollutants = run_stack(&self.pollutant_head, &hidden);
        ensure_finite("pollutant head", &pollutants)?;

        let class_scores = run_stack(&self.class_head, &hidden);
        ensure_finite("class head", &class_scores)?;

        Ok(ModelOutput {
            pollutants,
            class_scores,
        })
    }

    fn backend_name(&self) -> &str {
        "dense-json"
    }

    fn class_count(&self) -> Option<usize> {
        Some(DenseNetwork::class_count(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Identity trunk, pollutant head = [x0, x1, x0+x1, x0-x1, 2*x0],
    /// class head scores 3 classes from x0.
    fn small_network() -> DenseNetwork {
        DenseNetwork {
            format_version: SUPPORTED_FORMAT_VERSION,
            input_dim: 2,
            trunk: vec![DenseLayer::new(
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![0.0, 0.0],
                Activation::Linear,
            )],
            pollutant_head: vec![DenseLayer::new(
                vec![
                    vec![1.0, 0.0],
                    vec![0.0, 1.0],
                    vec![1.0, 1.0],
                    vec![1.0, -1.0],
                    vec![2.0, 0.0],
                ],
                vec![0.0; 5],
                Activation::Linear,
            )],
            class_head: vec![DenseLayer::new(
                vec![vec![-1.0, 0.0], vec![0.0, 0.0], vec![1.0, 0.0]],
                vec![0.0; 3],
                Activation::Softmax,
            )],
        }
    }

    #[test]
    fn test_forward_pass() {
        let net = small_network();
        let out = net.predict(&[2.0, 3.0]).unwrap();
        assert_eq!(out.pollutants, vec![2.0, 3.0, 5.0, -1.0, 4.0]);

        let sum: f64 = out.class_scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12, "softmax must sum to 1");
        assert!(out.class_scores[2] > out.class_scores[1]);
        assert!(out.class_scores[1] > out.class_scores[0]);
    }

    #[test]
    fn test_relu_clamps_negative() {
        let mut values = [-2.0, 0.0, 3.5];
        Activation::Relu.apply(&mut values);
        assert_eq!(values, [0.0, 0.0, 3.5]);
    }

    #[test]
    fn test_validate_accepts_small_network() {
        let net = small_network();
        assert!(net.validate().is_ok());
        assert_eq!(net.class_count(), 3);
        assert_eq!(net.num_params(), 6 + 15 + 9);
    }

    #[test]
    fn test_validate_rejects_broken_chain() {
        let mut net = small_network();
        net.pollutant_head[0].weights[2] = vec![1.0, 1.0, 1.0];
        let err = net.validate().unwrap_err();
        assert!(err.contains("pollutant_head[0]"), "{err}");
    }

    #[test]
    fn test_validate_rejects_wrong_pollutant_width() {
        let mut net = small_network();
        net.pollutant_head[0].weights.pop();
        net.pollutant_head[0].bias.pop();
        assert!(net.validate().unwrap_err().contains("expected 5"));
    }

    #[test]
    fn test_input_shape_mismatch() {
        let err = small_network().predict(&[1.0]).unwrap_err();
        assert_eq!(err.kind(), "shape_mismatch");
    }

    #[test]
    fn test_overflow_is_numerical_failure() {
        let err = small_network().predict(&[f64::MAX, f64::MAX]).unwrap_err();
        assert_eq!(err.kind(), "numerical");
    }
}

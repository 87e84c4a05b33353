//! Model Bundle Loading Tests
//!
//! Writes real artifact files to a temp directory and loads them through
//! `ModelBundle::load`, the same path the binary takes at startup.

use std::path::{Path, PathBuf};

use aqi_bridge::model::{ArtifactKind, AssetLoadError, FeatureScaler, ModelBundle};
use aqi_bridge::pipeline::predict;
use aqi_bridge::protocol::{encode_response, parse_line};
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

/// Identity trunk; pollutant head echoes the scaled features; class head
/// scores "Good" for low scaled PM2.5 and "Severe" for high.
fn network_json(format_version: u32) -> serde_json::Value {
    json!({
        "format_version": format_version,
        "input_dim": 2,
        "trunk": [
            { "weights": [[1.0, 0.0], [0.0, 1.0]], "bias": [0.0, 0.0], "activation": "linear" }
        ],
        "pollutant_head": [
            {
                "weights": [[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, -1.0], [2.0, 0.0]],
                "bias": [0.0, 0.0, 0.0, 0.0, 0.0]
            }
        ],
        "class_head": [
            {
                "weights": [[-1.0, 0.0], [1.0, 0.0]],
                "bias": [0.0, 0.0],
                "activation": "softmax"
            }
        ]
    })
}

struct Artifacts {
    _dir: TempDir,
    model: PathBuf,
    scaler: PathBuf,
    encoder: PathBuf,
}

impl Artifacts {
    fn write(model: &serde_json::Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Self {
            model: dir.path().join("aqi_dual_model.json"),
            scaler: dir.path().join("scaler.json"),
            encoder: dir.path().join("label_encoder.json"),
            _dir: dir,
        };
        write_json(&artifacts.model, model);
        write_json(
            &artifacts.scaler,
            &json!({ "kind": "standard", "mean": [50.0, 100.0], "scale": [10.0, 20.0] }),
        );
        write_json(&artifacts.encoder, &json!({ "classes": ["Good", "Severe"] }));
        artifacts
    }

    fn load(&self) -> Result<ModelBundle, AssetLoadError> {
        ModelBundle::load(&self.model, &self.scaler, &self.encoder)
    }
}

fn write_json(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn loaded_bundle_answers_readings_end_to_end() {
    let artifacts = Artifacts::write(&network_json(1));
    let bundle = artifacts.load().unwrap();

    // scaled = [(70-50)/10, (140-100)/20] = [2, 2]
    let reading = parse_line("DATA:70.0,140.0").unwrap().unwrap();
    let prediction = predict(&bundle, &reading).unwrap();

    assert_eq!(prediction.pollutant_levels.0, [2.0, 2.0, 4.0, 0.0, 4.0]);
    assert_eq!(encode_response(&prediction), "BUCKET:Severe\n");

    // scaled pm25 = -2 -> class 0
    let reading = parse_line("DATA:30.0,140.0").unwrap().unwrap();
    assert_eq!(predict(&bundle, &reading).unwrap().aqi_bucket, "Good");
}

#[test]
fn scaler_transform_matches_standardization() {
    let artifacts = Artifacts::write(&network_json(1));
    let bundle = artifacts.load().unwrap();

    let scaled = bundle.scaler().transform(&[65.0, 90.0]).unwrap();
    assert_eq!(scaled, vec![1.5, -0.5]);
}

#[test]
fn wrong_format_version_is_incompatible() {
    let artifacts = Artifacts::write(&network_json(2));
    match artifacts.load() {
        Err(AssetLoadError::IncompatibleVersion { found, supported, .. }) => {
            assert_eq!(found, 2);
            assert_eq!(supported, 1);
        }
        other => panic!("expected IncompatibleVersion, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn missing_encoder_is_reported_by_kind() {
    let artifacts = Artifacts::write(&network_json(1));
    std::fs::remove_file(&artifacts.encoder).unwrap();

    match artifacts.load() {
        Err(AssetLoadError::Missing { kind, path }) => {
            assert_eq!(kind, ArtifactKind::Encoder);
            assert_eq!(path, artifacts.encoder);
        }
        other => panic!("expected Missing, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn zero_scale_is_invalid() {
    let artifacts = Artifacts::write(&network_json(1));
    write_json(
        &artifacts.scaler,
        &json!({ "kind": "standard", "mean": [0.0, 0.0], "scale": [1.0, 0.0] }),
    );

    let err = artifacts.load().map(|_| ()).unwrap_err();
    assert!(matches!(
        err,
        AssetLoadError::Invalid {
            kind: ArtifactKind::Scaler,
            ..
        }
    ));
}

#[test]
fn min_max_scaler_artifact_loads() {
    let artifacts = Artifacts::write(&network_json(1));
    write_json(
        &artifacts.scaler,
        &json!({ "kind": "min_max", "data_min": [0.0, 0.0], "data_max": [500.0, 250.0] }),
    );

    let bundle = artifacts.load().unwrap();
    let scaled = bundle.scaler().transform(&[250.0, 50.0]).unwrap();
    assert_eq!(scaled, vec![0.5, 0.2]);
}

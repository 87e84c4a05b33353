//! Inference Pipeline
//!
//! ```text
//! SensorReading -> [pm25, aqi_raw] -> scaler -> model -> (pollutants[5], scores[K])
//!                                                        -> arg-max -> encoder -> bucket
//! ```
//!
//! Every stage failure is returned as a typed [`InferenceError`]; the caller
//! drops the reading and the read loop carries on.

use crate::model::{ensure_finite, InferenceError, ModelBundle};
use crate::types::{PollutantLevels, Prediction, SensorReading, FEATURE_COUNT, POLLUTANT_COUNT};

/// Run one reading through scaler, model and label encoder.
///
/// Deterministic: the same reading against the same bundle always yields
/// the same prediction.
pub fn predict(bundle: &ModelBundle, reading: &SensorReading) -> Result<Prediction, InferenceError> {
    let features = reading.features();

    let scaled = bundle.scaler().transform(&features)?;
    if scaled.len() != FEATURE_COUNT {
        return Err(InferenceError::ShapeMismatch {
            stage: "scaler output",
            expected: FEATURE_COUNT,
            actual: scaled.len(),
        });
    }

    let output = bundle.model().predict(&scaled)?;

    let pollutants: [f64; POLLUTANT_COUNT] =
        output
            .pollutants
            .as_slice()
            .try_into()
            .map_err(|_| InferenceError::ShapeMismatch {
                stage: "pollutant output",
                expected: POLLUTANT_COUNT,
                actual: output.pollutants.len(),
            })?;
    ensure_finite("pollutant output", &pollutants)?;

    let index = argmax(&output.class_scores)?;
    let bucket = bundle.encoder().inverse_transform(index)?;

    Ok(Prediction::new(PollutantLevels(pollutants), bucket))
}

/// Index of the highest score; ties resolve to the lowest index.
pub fn argmax(scores: &[f64]) -> Result<usize, InferenceError> {
    if scores.is_empty() {
        return Err(InferenceError::ShapeMismatch {
            stage: "class output",
            expected: 1,
            actual: 0,
        });
    }
    if let Some(i) = scores.iter().position(|s| s.is_nan()) {
        return Err(InferenceError::Numerical {
            stage: "class output",
            detail: format!("NaN score at index {i}"),
        });
    }

    let mut best = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] {
            best = i;
        }
    }
    Ok(best)
}

//! Line Protocol Codec
//!
//! The sensor board speaks a minimal newline-framed ASCII protocol:
//!
//! ```text
//! board -> host:  DATA:<pm25>,<aqi_raw>\n     e.g. DATA:12.5,34.0
//! host -> board:  BUCKET:<label>\n            e.g. BUCKET:Moderate
//! ```
//!
//! Lines without the `DATA:` marker are not errors, they simply carry no
//! reading (boot banners, debug prints from the firmware). Lines that do carry
//! the marker but fail validation are [`ParseError`]s; the caller logs and
//! drops them.

use crate::types::{Prediction, SensorReading};
use thiserror::Error;

/// Marker that opens every inbound reading frame.
pub const DATA_MARKER: &str = "DATA:";

/// Marker that opens every outbound response frame.
pub const BUCKET_MARKER: &str = "BUCKET:";

/// Inbound frame validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed frame {line:?}: expected exactly one ':' separator")]
    MalformedFrame { line: String },

    #[error("expected 2 comma-separated values, found {found}")]
    FieldCount { found: usize },

    #[error("invalid number for {field}: {token:?}")]
    InvalidNumber { field: &'static str, token: String },
}

/// Field names in frame order, used in error reports.
const FIELD_NAMES: [&str; 2] = ["pm25", "aqi_raw"];

/// Parse one inbound line.
///
/// Returns `Ok(None)` for lines that are not reading frames, `Ok(Some(..))`
/// for valid frames, and `Err` for frames that start with `DATA:` but do
/// not validate.
pub fn parse_line(line: &str) -> Result<Option<SensorReading>, ParseError> {
    if !line.starts_with(DATA_MARKER) {
        return Ok(None);
    }

    let segments: Vec<&str> = line.split(':').collect();
    let [_, values] = segments.as_slice() else {
        return Err(ParseError::MalformedFrame {
            line: line.to_string(),
        });
    };

    let fields: Vec<&str> = values.split(',').collect();
    if fields.len() != FIELD_NAMES.len() {
        return Err(ParseError::FieldCount {
            found: fields.len(),
        });
    }

    let pm25 = parse_field(FIELD_NAMES[0], fields[0])?;
    let aqi_raw = parse_field(FIELD_NAMES[1], fields[1])?;

    Ok(Some(SensorReading::new(pm25, aqi_raw)))
}

fn parse_field(field: &'static str, token: &str) -> Result<f64, ParseError> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber {
            field,
            token: token.to_string(),
        })
}

/// Serialize a bucket label into the outbound frame, newline included.
///
/// No escaping: labels come from the closed label-encoder class set, which is
/// validated at load time to contain no delimiters.
pub fn encode_bucket(bucket: &str) -> String {
    format!("{BUCKET_MARKER}{bucket}\n")
}

/// Serialize a prediction into the outbound frame, newline included.
pub fn encode_response(prediction: &Prediction) -> String {
    encode_bucket(&prediction.aqi_bucket)
}

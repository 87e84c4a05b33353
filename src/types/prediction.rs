//! Model predictions: regressed pollutant levels and the AQI bucket label.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of regressed pollutant outputs.
pub const POLLUTANT_COUNT: usize = 5;

/// Pollutant names in model output order.
pub const POLLUTANT_NAMES: [&str; POLLUTANT_COUNT] = ["PM10", "NO2", "SO2", "CO", "O3"];

/// Bucket reported internally when no prediction is available.
///
/// Never sent over the wire: a failed inference skips the response entirely.
pub const UNKNOWN_BUCKET: &str = "Unknown";

/// Predicted pollutant concentrations, ordered as [`POLLUTANT_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollutantLevels(pub [f64; POLLUTANT_COUNT]);

impl PollutantLevels {
    /// `(name, value)` pairs in output order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        POLLUTANT_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

impl fmt::Display for PollutantLevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in self.named() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value:.2}")?;
            first = false;
        }
        Ok(())
    }
}

/// Output of one successful inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub pollutant_levels: PollutantLevels,
    /// Decoded AQI category, e.g. "Good" or "Moderate"
    pub aqi_bucket: String,
}

impl Prediction {
    pub fn new(pollutant_levels: PollutantLevels, aqi_bucket: impl Into<String>) -> Self {
        Self {
            pollutant_levels,
            aqi_bucket: aqi_bucket.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_levels_follow_output_order() {
        let levels = PollutantLevels([5.0, 10.0, 15.0, 20.0, 25.0]);
        let names: Vec<_> = levels.named().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["PM10", "NO2", "SO2", "CO", "O3"]);
        let co = levels.named().find(|(n, _)| *n == "CO").map(|(_, v)| v);
        assert_eq!(co, Some(20.0));
    }

    #[test]
    fn test_levels_display_two_decimals() {
        let levels = PollutantLevels([5.0, 10.126, 15.0, 20.0, 25.5]);
        assert_eq!(
            levels.to_string(),
            "PM10=5.00, NO2=10.13, SO2=15.00, CO=20.00, O3=25.50"
        );
    }
}

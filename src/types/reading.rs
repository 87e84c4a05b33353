//! Sensor readings decoded from inbound frames.

use serde::{Deserialize, Serialize};

/// Number of model input features (pm25, aqi_raw).
pub const FEATURE_COUNT: usize = 2;

/// One validated reading from the sensor board.
///
/// Created by the protocol codec from a single `DATA:` line and consumed
/// immediately by the inference pipeline. Never retained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// PM2.5 concentration as reported by the board (µg/m³)
    pub pm25: f64,
    /// Raw AQI value computed on the board
    pub aqi_raw: f64,
}

impl SensorReading {
    pub const fn new(pm25: f64, aqi_raw: f64) -> Self {
        Self { pm25, aqi_raw }
    }

    /// Feature vector in the order the scaler was fitted with.
    pub const fn features(&self) -> [f64; FEATURE_COUNT] {
        [self.pm25, self.aqi_raw]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_order() {
        let reading = SensorReading::new(12.5, 34.0);
        assert_eq!(reading.features(), [12.5, 34.0]);
    }
}

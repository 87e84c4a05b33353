//! Shared data structures for the sensor-to-model bridge
//!
//! - `SensorReading`: one validated `DATA:` frame from the board
//! - `Prediction`: model output for a reading (pollutant levels + AQI bucket)

mod reading;
mod prediction;

pub use reading::*;
pub use prediction::*;

//! Data models
//!
//! Internal record types plus wire formats for the third-party air-quality
//! and weather APIs.

pub mod camera;
pub mod iqair;
pub mod openaq;
pub mod openweather;
pub mod reading;

pub use camera::{Camera, CaptureOutcome};
pub use reading::{
    CollectionRecord, PairRecommendation, PmReading, RegressionMetrics, SensorDistance,
    SensorLocation, SensorReport, WeatherReading,
};

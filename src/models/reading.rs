//! Internal record types for air-quality readings, sensor surveys and
//! collected samples

use crate::quality::FrameMetrics;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One PM2.5 measurement from any provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmReading {
    /// Provider that produced the reading ("OpenAQ", "IQAir", ...)
    pub source: String,

    /// Station or location name, if the provider reports one
    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    /// PM2.5 concentration in µg/m³
    pub pm25: Option<f64>,

    /// US AQI value, when the provider reports AQI rather than concentration
    #[serde(default)]
    pub pm25_aqi: Option<f64>,

    #[serde(default)]
    pub unit: Option<String>,

    /// Measurement timestamp as reported by the provider
    #[serde(default)]
    pub timestamp: Option<String>,

    pub fetched_at: DateTime<Local>,
}

/// One weather snapshot from any provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReading {
    pub source: String,

    /// Air temperature in °C
    pub temperature: Option<f64>,

    /// Relative humidity in %
    pub humidity: Option<f64>,

    /// Pressure in hPa
    pub pressure: Option<f64>,

    /// Wind speed in m/s
    pub wind_speed: Option<f64>,

    /// Cloud cover in %
    #[serde(default)]
    pub clouds: Option<f64>,

    /// Visibility in metres
    #[serde(default)]
    pub visibility: Option<f64>,

    #[serde(default)]
    pub timestamp: Option<String>,

    pub fetched_at: DateTime<Local>,
}

/// A PM2.5 sensor with known coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorLocation {
    #[serde(default)]
    pub id: Option<i64>,

    pub name: String,
    pub latitude: f64,
    pub longitude: f64,

    /// Data provider or network operating the sensor
    #[serde(default)]
    pub provider: Option<String>,

    /// Where we learned about the sensor (API, manual list, ...)
    #[serde(default)]
    pub source: Option<String>,
}

/// Distance from one camera to one sensor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorDistance {
    pub sensor_name: String,
    pub distance_km: f64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Best sensor choice for a camera, with a usability judgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRecommendation {
    pub sensor: String,
    pub distance_km: f64,
    pub grade: String,
    pub usable: bool,
}

/// Full output of a sensor survey, persisted as `sensor_locations.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReport {
    pub sensors: Vec<SensorLocation>,

    /// Per camera id, distances to every sensor sorted nearest-first
    pub distances: BTreeMap<String, Vec<SensorDistance>>,

    /// Per camera id, the closest sensor and whether the pair is usable
    pub recommendations: BTreeMap<String, PairRecommendation>,

    pub generated_at: DateTime<Local>,
}

/// One collected sample: a captured frame joined with the readings that were
/// current at capture time. Written per camera per collection tick and later
/// consumed by the baseline model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub timestamp: DateTime<Local>,
    pub camera_id: String,

    #[serde(default)]
    pub image_path: Option<PathBuf>,

    #[serde(default)]
    pub quality: Option<FrameMetrics>,

    /// PM2.5 concentration in µg/m³ current at capture time
    #[serde(default)]
    pub pm25: Option<f64>,

    #[serde(default)]
    pub weather: Option<WeatherReading>,
}

/// Evaluation metrics for the regression baseline
#[derive(Debug, Clone, Serialize)]
pub struct RegressionMetrics {
    /// Mean absolute error in µg/m³
    pub mae: f64,

    /// Root mean squared error in µg/m³
    pub rmse: f64,

    /// Coefficient of determination
    pub r2: f64,

    pub n_samples: usize,
}

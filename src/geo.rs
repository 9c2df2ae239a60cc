//! Camera-to-sensor geography
//!
//! Haversine distances between cameras and PM2.5 sensors, pair grading, and
//! the `sensors` survey that decides which camera/sensor pairings are usable
//! for dataset collection.

use crate::core::config::Config;
use crate::core::providers::OpenAqProvider;
use crate::models::{
    Camera, PairRecommendation, SensorDistance, SensorLocation, SensorReport,
};
use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two (latitude, longitude) points in
/// kilometres. Symmetric; zero for identical coordinates.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().asin() * EARTH_RADIUS_KM
}

/// How good a camera/sensor pairing is, judged purely by distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairGrade {
    /// Under 1 km
    Excellent,
    /// Under 2 km
    Good,
    /// Under 5 km; usable but a stated limitation
    Marginal,
    /// 5 km or more; the pairing should not be used
    Unusable,
}

impl PairGrade {
    pub fn from_distance_km(distance_km: f64) -> Self {
        if distance_km < 1.0 {
            PairGrade::Excellent
        } else if distance_km < 2.0 {
            PairGrade::Good
        } else if distance_km < 5.0 {
            PairGrade::Marginal
        } else {
            PairGrade::Unusable
        }
    }

    /// Whether the pairing is close enough to collect training data
    pub fn usable(&self) -> bool {
        !matches!(self, PairGrade::Unusable)
    }
}

impl fmt::Display for PairGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PairGrade::Excellent => "excellent",
            PairGrade::Good => "good",
            PairGrade::Marginal => "marginal",
            PairGrade::Unusable => "unusable",
        };
        f.write_str(s)
    }
}

/// Distances from every camera (with known coordinates) to every sensor,
/// sorted nearest-first per camera
pub fn distance_table(
    cameras: &[Camera],
    sensors: &[SensorLocation],
) -> BTreeMap<String, Vec<SensorDistance>> {
    let mut table = BTreeMap::new();

    for camera in cameras {
        let Some((cam_lat, cam_lon)) = camera.coordinates() else {
            warn!(camera = %camera.id, "camera has no coordinates, skipping");
            continue;
        };

        let mut distances: Vec<SensorDistance> = sensors
            .iter()
            .map(|sensor| SensorDistance {
                sensor_name: sensor.name.clone(),
                distance_km: haversine_km(cam_lat, cam_lon, sensor.latitude, sensor.longitude),
                latitude: sensor.latitude,
                longitude: sensor.longitude,
            })
            .collect();

        distances.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        table.insert(camera.id.clone(), distances);
    }

    table
}

/// Closest sensor per camera, with the usability judgement
pub fn recommend_pairs(
    distances: &BTreeMap<String, Vec<SensorDistance>>,
) -> BTreeMap<String, PairRecommendation> {
    let mut recommendations = BTreeMap::new();

    for (camera_id, sensor_list) in distances {
        let Some(closest) = sensor_list.first() else {
            continue;
        };

        let grade = PairGrade::from_distance_km(closest.distance_km);
        recommendations.insert(
            camera_id.clone(),
            PairRecommendation {
                sensor: closest.sensor_name.clone(),
                distance_km: closest.distance_km,
                grade: grade.to_string(),
                usable: grade.usable(),
            },
        );
    }

    recommendations
}

/// Known Bishkek stations, used when OpenAQ discovery returns nothing
pub fn known_sensors() -> Vec<SensorLocation> {
    let manual = |name: &str, latitude: f64, longitude: f64, source: &str| SensorLocation {
        id: None,
        name: name.to_string(),
        latitude,
        longitude,
        provider: None,
        source: Some(source.to_string()),
    };

    vec![
        manual("US Embassy Bishkek", 42.8746, 74.6122, "US Embassy / AQICN"),
        manual("Chuy Avenue", 42.8756, 74.6038, "AQICN"),
        manual("UN House Bishkek", 42.8757, 74.6036, "PurpleAir"),
        manual("Ak-Orgo", 42.85, 74.59, "AQICN"),
    ]
}

/// `sensors` command: discover sensors, compute distances, grade pairs and
/// persist the report.
pub async fn survey_sensors(config: &Config) -> Result<SensorReport> {
    let p = &config.providers;
    let openaq = OpenAqProvider::new(
        p.openaq_base_url.clone(),
        config.city.name.clone(),
        config.city.latitude,
        config.city.longitude,
        p.request_timeout_secs,
    );

    let sensors = match openaq.find_sensors(p.sensor_radius_km).await {
        Ok(sensors) if !sensors.is_empty() => {
            info!("found {} PM2.5 sensors via OpenAQ", sensors.len());
            sensors
        }
        Ok(_) => {
            warn!("OpenAQ returned no sensors, using the known station list");
            known_sensors()
        }
        Err(e) => {
            warn!("OpenAQ sensor discovery failed ({e}), using the known station list");
            known_sensors()
        }
    };

    let cameras = config.recommended_cameras();
    let distances = distance_table(&cameras, &sensors);
    let recommendations = recommend_pairs(&distances);

    for (camera_id, rec) in &recommendations {
        info!(
            camera = %camera_id,
            sensor = %rec.sensor,
            distance_km = format!("{:.2}", rec.distance_km),
            grade = %rec.grade,
            "closest sensor"
        );
    }

    let report = SensorReport {
        sensors,
        distances,
        recommendations,
        generated_at: Local::now(),
    };

    save_report(&report, &config.sensor_report_path)?;
    info!("sensor report written to {}", config.sensor_report_path.display());

    Ok(report)
}

pub fn save_report(report: &SensorReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create data directory")?;
    }
    fs::write(path, serde_json::to_vec_pretty(report)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_report(path: &Path) -> Result<SensorReport> {
    let content = fs::read_to_string(path).with_context(|| {
        format!(
            "Sensor report {} not found; run the `sensors` command first",
            path.display()
        )
    })?;
    serde_json::from_str(&content).context("Failed to parse sensor report")
}

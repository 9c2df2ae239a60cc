//! Wire formats for the OpenAQ API (v2 `latest` and v3 `locations`)

use serde::Deserialize;

/// Response of `GET /v2/latest`
#[derive(Debug, Deserialize)]
pub struct LatestResponse {
    #[serde(default)]
    pub results: Vec<StationResult>,
}

#[derive(Debug, Deserialize)]
pub struct StationResult {
    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub coordinates: Option<Coordinates>,

    #[serde(default)]
    pub measurements: Vec<Measurement>,
}

#[derive(Debug, Deserialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Measurement {
    pub parameter: String,

    pub value: Option<f64>,

    #[serde(default)]
    pub unit: Option<String>,

    #[serde(default, rename = "lastUpdated")]
    pub last_updated: Option<String>,
}

/// Response of `GET /v3/locations`
#[derive(Debug, Deserialize)]
pub struct LocationsResponse {
    #[serde(default)]
    pub results: Vec<LocationResult>,
}

#[derive(Debug, Deserialize)]
pub struct LocationResult {
    #[serde(default)]
    pub id: Option<i64>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub locality: Option<String>,

    #[serde(default)]
    pub country: Option<NamedEntity>,

    #[serde(default)]
    pub coordinates: Option<Coordinates>,

    #[serde(default)]
    pub sensors: Vec<LocationSensor>,

    #[serde(default)]
    pub provider: Option<NamedEntity>,
}

#[derive(Debug, Deserialize)]
pub struct NamedEntity {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocationSensor {
    #[serde(default)]
    pub parameter: Option<SensorParameter>,
}

#[derive(Debug, Deserialize)]
pub struct SensorParameter {
    #[serde(default)]
    pub name: Option<String>,
}

impl LocationResult {
    /// True when the location carries at least one PM2.5 sensor
    pub fn has_pm25(&self) -> bool {
        self.sensors
            .iter()
            .any(|s| s.parameter.as_ref().and_then(|p| p.name.as_deref()) == Some("pm25"))
    }
}

//! OpenAQ provider implementation
//!
//! OpenAQ is the only keyless source: v2 `latest` serves current PM2.5
//! readings for the city, v3 `locations` backs the sensor survey.

use crate::core::provider::{AirQualityProvider, ProviderError, ProviderObservation};
use crate::models::openaq::{LatestResponse, LocationsResponse};
use crate::models::{PmReading, SensorLocation};
use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use std::time::Duration;

pub struct OpenAqProvider {
    client: Client,
    base_url: String,
    city: String,
    latitude: f64,
    longitude: f64,
}

impl OpenAqProvider {
    /// Create a new OpenAQ provider
    ///
    /// # Arguments
    ///
    /// * `base_url` - API base URL (no trailing slash)
    /// * `city` - City name used by the v2 latest endpoint
    /// * `latitude`/`longitude` - Center for sensor discovery
    /// * `timeout` - Request timeout in seconds
    pub fn new(base_url: String, city: String, latitude: f64, longitude: f64, timeout: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            city,
            latitude,
            longitude,
        }
    }

    /// Find PM2.5 sensor locations within `radius_km` of the city center
    /// (v3 locations endpoint).
    ///
    /// # Errors
    ///
    /// Returns ProviderError for transport or API failures; an empty result
    /// set is not an error.
    pub async fn find_sensors(&self, radius_km: f64) -> Result<Vec<SensorLocation>, ProviderError> {
        let url = format!("{}/v3/locations", self.base_url);
        let radius_m = (radius_km * 1000.0).round() as i64;

        let response = self
            .client
            .get(&url)
            .query(&[
                ("coordinates", format!("{},{}", self.latitude, self.longitude)),
                ("radius", radius_m.to_string()),
                ("limit", "100".to_string()),
                ("parameter", "pm25".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Unexpected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let locations: LocationsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Failed to parse response: {e}")))?;

        Ok(sensors_from_locations(locations))
    }
}

#[async_trait]
impl AirQualityProvider for OpenAqProvider {
    async fn fetch_current(&self) -> Result<ProviderObservation, ProviderError> {
        let url = format!("{}/v2/latest", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("city", self.city.as_str()),
                ("parameter", "pm25"),
                ("limit", "100"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Unexpected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let latest: LatestResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Failed to parse response: {e}")))?;

        let readings = readings_from_latest(latest);
        if readings.is_empty() {
            return Err(ProviderError::NoData(format!(
                "no PM2.5 stations reporting for {}",
                self.city
            )));
        }

        Ok(ProviderObservation {
            pm25: readings,
            weather: None,
        })
    }

    fn provider_name(&self) -> &'static str {
        "OpenAQ"
    }
}

/// Flatten a v2 latest response into per-station PM2.5 readings
fn readings_from_latest(latest: LatestResponse) -> Vec<PmReading> {
    let fetched_at = Local::now();
    let mut readings = Vec::new();

    for station in latest.results {
        let (latitude, longitude) = station
            .coordinates
            .as_ref()
            .map(|c| (c.latitude, c.longitude))
            .unwrap_or((None, None));

        for measurement in station.measurements {
            if measurement.parameter != "pm25" {
                continue;
            }
            readings.push(PmReading {
                source: "OpenAQ".to_string(),
                location: station.location.clone(),
                latitude,
                longitude,
                pm25: measurement.value,
                pm25_aqi: None,
                unit: measurement.unit,
                timestamp: measurement.last_updated,
                fetched_at,
            });
        }
    }

    readings
}

/// Keep only locations that carry a PM2.5 sensor and known coordinates
fn sensors_from_locations(locations: LocationsResponse) -> Vec<SensorLocation> {
    locations
        .results
        .into_iter()
        .filter_map(|loc| {
            if !loc.has_pm25() {
                return None;
            }
            let coords = loc.coordinates.as_ref()?;
            let (latitude, longitude) = (coords.latitude?, coords.longitude?);

            Some(SensorLocation {
                id: loc.id,
                name: loc
                    .name
                    .or(loc.locality)
                    .unwrap_or_else(|| "Unknown".to_string()),
                latitude,
                longitude,
                provider: loc.provider.and_then(|p| p.name),
                source: Some("OpenAQ".to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATEST_FIXTURE: &str = r#"{
        "results": [
            {
                "location": "US Embassy Bishkek",
                "coordinates": {"latitude": 42.8746, "longitude": 74.6122},
                "measurements": [
                    {"parameter": "pm25", "value": 84.3, "unit": "µg/m³", "lastUpdated": "2025-01-15T09:00:00Z"},
                    {"parameter": "pm10", "value": 120.0, "unit": "µg/m³"}
                ]
            },
            {
                "location": "No PM Station",
                "measurements": [
                    {"parameter": "o3", "value": 12.0}
                ]
            }
        ]
    }"#;

    const LOCATIONS_FIXTURE: &str = r#"{
        "results": [
            {
                "id": 42,
                "name": "Chuy Avenue",
                "locality": "Bishkek",
                "country": {"name": "Kyrgyzstan"},
                "coordinates": {"latitude": 42.8756, "longitude": 74.6038},
                "sensors": [{"parameter": {"name": "pm25"}}],
                "provider": {"name": "PurpleAir"}
            },
            {
                "id": 43,
                "name": "Ozone Only",
                "coordinates": {"latitude": 42.8, "longitude": 74.6},
                "sensors": [{"parameter": {"name": "o3"}}]
            },
            {
                "id": 44,
                "name": "No Coordinates",
                "sensors": [{"parameter": {"name": "pm25"}}]
            }
        ]
    }"#;

    #[test]
    fn test_latest_keeps_only_pm25_measurements() {
        let latest: LatestResponse = serde_json::from_str(LATEST_FIXTURE).unwrap();
        let readings = readings_from_latest(latest);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].location.as_deref(), Some("US Embassy Bishkek"));
        assert_eq!(readings[0].pm25, Some(84.3));
        assert_eq!(readings[0].latitude, Some(42.8746));
    }

    #[test]
    fn test_locations_filter_requires_pm25_and_coordinates() {
        let locations: LocationsResponse = serde_json::from_str(LOCATIONS_FIXTURE).unwrap();
        let sensors = sensors_from_locations(locations);
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].name, "Chuy Avenue");
        assert_eq!(sensors[0].provider.as_deref(), Some("PurpleAir"));
    }
}

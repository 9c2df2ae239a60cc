//! IQAir (AirVisual) provider implementation
//!
//! The `nearest_city` endpoint returns US AQI plus a weather block in one
//! call. Free-plan responses often omit the raw PM2.5 concentration, in
//! which case it is derived from the AQI via the EPA breakpoint table.

use crate::core::aqi::aqi_to_ugm3;
use crate::core::provider::{AirQualityProvider, ProviderError, ProviderObservation};
use crate::models::iqair::NearestCityResponse;
use crate::models::{PmReading, WeatherReading};
use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use std::time::Duration;

pub struct IqAirProvider {
    client: Client,
    api_key: String,
    base_url: String,
    latitude: f64,
    longitude: f64,
}

impl IqAirProvider {
    /// Create a new IQAir provider
    ///
    /// # Arguments
    ///
    /// * `api_key` - IQAir API key
    /// * `base_url` - API base URL (no trailing slash)
    /// * `latitude`/`longitude` - City coordinates for nearest_city lookup
    /// * `timeout` - Request timeout in seconds
    pub fn new(
        api_key: String,
        base_url: String,
        latitude: f64,
        longitude: f64,
        timeout: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url,
            latitude,
            longitude,
        }
    }
}

#[async_trait]
impl AirQualityProvider for IqAirProvider {
    async fn fetch_current(&self) -> Result<ProviderObservation, ProviderError> {
        let url = format!("{}/nearest_city", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", self.latitude.to_string()),
                ("lon", self.longitude.to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Unexpected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let city: NearestCityResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Failed to parse response: {e}")))?;

        observation_from_response(city)
    }

    fn provider_name(&self) -> &'static str {
        "IQAir"
    }
}

fn observation_from_response(
    response: NearestCityResponse,
) -> Result<ProviderObservation, ProviderError> {
    if response.status != "success" {
        return Err(ProviderError::Api {
            status: 200,
            message: format!("IQAir returned status {:?}", response.status),
        });
    }

    let data = response
        .data
        .ok_or_else(|| ProviderError::NoData("IQAir response had no data block".to_string()))?;

    let pollution = &data.current.pollution;
    let weather = &data.current.weather;
    let fetched_at = Local::now();

    // Prefer the raw concentration, fall back to the AQI conversion
    let pm25 = pollution
        .p2
        .as_ref()
        .and_then(|p| p.conc)
        .or_else(|| pollution.aqius.map(aqi_to_ugm3));

    let reading = PmReading {
        source: "IQAir".to_string(),
        location: data.city.clone(),
        latitude: None,
        longitude: None,
        pm25,
        pm25_aqi: pollution.aqius,
        unit: Some("µg/m³".to_string()),
        timestamp: pollution.ts.clone(),
        fetched_at,
    };

    let weather = WeatherReading {
        source: "IQAir".to_string(),
        temperature: weather.tp,
        humidity: weather.hu,
        pressure: weather.pr,
        wind_speed: weather.ws,
        clouds: None,
        visibility: None,
        timestamp: pollution.ts.clone(),
        fetched_at,
    };

    Ok(ProviderObservation {
        pm25: vec![reading],
        weather: Some(weather),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEAREST_CITY_FIXTURE: &str = r#"{
        "status": "success",
        "data": {
            "city": "Bishkek",
            "current": {
                "pollution": {"aqius": 152, "ts": "2025-01-15T09:00:00.000Z"},
                "weather": {"tp": -4, "hu": 81, "pr": 1024, "ws": 1.5}
            }
        }
    }"#;

    #[test]
    fn test_concentration_derived_from_aqi_when_missing() {
        let response: NearestCityResponse = serde_json::from_str(NEAREST_CITY_FIXTURE).unwrap();
        let observation = observation_from_response(response).unwrap();

        let reading = &observation.pm25[0];
        assert_eq!(reading.pm25_aqi, Some(152.0));
        // AQI 152 sits just inside the unhealthy segment
        let expected = aqi_to_ugm3(152.0);
        assert!((reading.pm25.unwrap() - expected).abs() < 1e-9);

        let weather = observation.weather.unwrap();
        assert_eq!(weather.temperature, Some(-4.0));
        assert_eq!(weather.humidity, Some(81.0));
    }

    #[test]
    fn test_error_status_is_rejected() {
        let response: NearestCityResponse =
            serde_json::from_str(r#"{"status": "call_limit_reached"}"#).unwrap();
        assert!(observation_from_response(response).is_err());
    }

    #[test]
    fn test_raw_concentration_preferred_over_aqi() {
        let fixture = r#"{
            "status": "success",
            "data": {
                "current": {
                    "pollution": {"aqius": 152, "p2": {"conc": 57.1}},
                    "weather": {}
                }
            }
        }"#;
        let response: NearestCityResponse = serde_json::from_str(fixture).unwrap();
        let observation = observation_from_response(response).unwrap();
        assert_eq!(observation.pm25[0].pm25, Some(57.1));
    }
}

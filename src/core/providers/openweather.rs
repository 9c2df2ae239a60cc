//! OpenWeatherMap provider implementation
//!
//! Two endpoints are polled per tick: the air-pollution API for PM2.5/PM10
//! components and the current-weather API for the meteorological snapshot.

use crate::core::provider::{AirQualityProvider, ProviderError, ProviderObservation};
use crate::models::openweather::{AirPollutionResponse, WeatherResponse};
use crate::models::{PmReading, WeatherReading};
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use reqwest::Client;
use std::time::Duration;

/// Offset between Kelvin and Celsius
const KELVIN_OFFSET: f64 = 273.15;

pub struct OpenWeatherProvider {
    client: Client,
    api_key: String,
    base_url: String,
    latitude: f64,
    longitude: f64,
}

impl OpenWeatherProvider {
    /// Create a new OpenWeatherMap provider
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenWeatherMap API key
    /// * `base_url` - API base URL (no trailing slash)
    /// * `latitude`/`longitude` - City coordinates
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

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", self.latitude.to_string()),
                ("lon", self.longitude.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Unexpected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl AirQualityProvider for OpenWeatherProvider {
    async fn fetch_current(&self) -> Result<ProviderObservation, ProviderError> {
        let pollution: AirPollutionResponse = self.get_json("air_pollution").await?;
        let weather: WeatherResponse = self.get_json("weather").await?;

        observation_from_responses(pollution, weather)
    }

    fn provider_name(&self) -> &'static str {
        "OpenWeatherMap"
    }
}

fn observation_from_responses(
    pollution: AirPollutionResponse,
    weather: WeatherResponse,
) -> Result<ProviderObservation, ProviderError> {
    let entry = pollution
        .list
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::NoData("air_pollution returned no entries".to_string()))?;

    let fetched_at = Local::now();
    let measured_at = DateTime::<Utc>::from_timestamp(entry.dt, 0).map(|t| t.to_rfc3339());

    let reading = PmReading {
        source: "OpenWeatherMap".to_string(),
        location: None,
        latitude: None,
        longitude: None,
        pm25: entry.components.pm2_5,
        pm25_aqi: None,
        unit: Some("µg/m³".to_string()),
        timestamp: measured_at.clone(),
        fetched_at,
    };

    let weather = WeatherReading {
        source: "OpenWeatherMap".to_string(),
        temperature: weather.main.temp.map(|k| k - KELVIN_OFFSET),
        humidity: weather.main.humidity,
        pressure: weather.main.pressure,
        wind_speed: weather.wind.and_then(|w| w.speed),
        clouds: weather.clouds.and_then(|c| c.all),
        visibility: weather.visibility,
        timestamp: measured_at,
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

    const POLLUTION_FIXTURE: &str = r#"{
        "list": [
            {"dt": 1736931600, "components": {"pm2_5": 62.4, "pm10": 89.0}}
        ]
    }"#;

    const WEATHER_FIXTURE: &str = r#"{
        "main": {"temp": 269.15, "humidity": 82, "pressure": 1025},
        "wind": {"speed": 1.2},
        "clouds": {"all": 90},
        "visibility": 3200
    }"#;

    #[test]
    fn test_temperature_converted_to_celsius() {
        let pollution: AirPollutionResponse = serde_json::from_str(POLLUTION_FIXTURE).unwrap();
        let weather: WeatherResponse = serde_json::from_str(WEATHER_FIXTURE).unwrap();

        let observation = observation_from_responses(pollution, weather).unwrap();
        assert_eq!(observation.pm25[0].pm25, Some(62.4));

        let weather = observation.weather.unwrap();
        assert!((weather.temperature.unwrap() - (-4.0)).abs() < 1e-9);
        assert_eq!(weather.visibility, Some(3200.0));
        assert_eq!(weather.clouds, Some(90.0));
    }

    #[test]
    fn test_empty_pollution_list_is_no_data() {
        let pollution: AirPollutionResponse = serde_json::from_str(r#"{"list": []}"#).unwrap();
        let weather: WeatherResponse = serde_json::from_str(WEATHER_FIXTURE).unwrap();
        assert!(matches!(
            observation_from_responses(pollution, weather),
            Err(ProviderError::NoData(_))
        ));
    }
}

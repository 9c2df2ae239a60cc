//! Provider implementations and polling orchestration

pub mod iqair;
pub mod openaq;
pub mod openweather;

pub use iqair::IqAirProvider;
pub use openaq::OpenAqProvider;
pub use openweather::OpenWeatherProvider;

use crate::core::config::Config;
use crate::core::provider::{AirQualityProvider, ProviderObservation};
use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use tracing::{info, warn};

/// Build one provider per configured source. OpenAQ needs no key and is
/// always present; IQAir and OpenWeatherMap join when a key is configured.
pub fn build_providers(config: &Config) -> Vec<Box<dyn AirQualityProvider>> {
    let p = &config.providers;
    let city = &config.city;
    let mut providers: Vec<Box<dyn AirQualityProvider>> = vec![Box::new(OpenAqProvider::new(
        p.openaq_base_url.clone(),
        city.name.clone(),
        city.latitude,
        city.longitude,
        p.request_timeout_secs,
    ))];

    if let Some(key) = &p.iqair_api_key {
        providers.push(Box::new(IqAirProvider::new(
            key.clone(),
            p.iqair_base_url.clone(),
            city.latitude,
            city.longitude,
            p.request_timeout_secs,
        )));
    } else {
        info!("IQAir API key not configured, skipping provider");
    }

    if let Some(key) = &p.openweather_api_key {
        providers.push(Box::new(OpenWeatherProvider::new(
            key.clone(),
            p.openweather_base_url.clone(),
            city.latitude,
            city.longitude,
            p.request_timeout_secs,
        )));
    } else {
        info!("OpenWeatherMap API key not configured, skipping provider");
    }

    providers
}

/// Poll every provider once, best-effort. Failures are logged and skipped;
/// successful observations are returned in provider order.
pub async fn poll_providers(
    providers: &[Box<dyn AirQualityProvider>],
) -> Vec<(&'static str, ProviderObservation)> {
    let mut observations = Vec::new();

    for provider in providers {
        let name = provider.provider_name();
        match provider.fetch_current().await {
            Ok(observation) => {
                info!(
                    provider = name,
                    readings = observation.pm25.len(),
                    has_weather = observation.weather.is_some(),
                    "fetched current readings"
                );
                observations.push((name, observation));
            }
            Err(e) => warn!(provider = name, "provider poll failed: {e}"),
        }
    }

    observations
}

/// Merge per-provider observations into the values used for a collection
/// record: the first available PM2.5 concentration and the first available
/// weather snapshot.
pub fn merge_observations(
    observations: &[(&'static str, ProviderObservation)],
) -> (Option<f64>, Option<crate::models::WeatherReading>) {
    let pm25 = observations.iter().find_map(|(_, o)| o.primary_pm25());
    let weather = observations
        .iter()
        .find_map(|(_, o)| o.weather.clone());
    (pm25, weather)
}

/// One-shot `fetch` command: poll all providers and persist each observation
/// as a timestamped JSON file under the readings directory.
pub async fn fetch_and_persist(config: &Config) -> Result<()> {
    let providers = build_providers(config);
    let observations = poll_providers(&providers).await;

    if observations.is_empty() {
        warn!("no provider returned data");
        return Ok(());
    }

    let dir = &config.providers.readings_dir;
    fs::create_dir_all(dir).context("Failed to create readings directory")?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    for (name, observation) in &observations {
        let file = dir.join(format!("{}_{stamp}.json", name.to_lowercase()));

        let payload = serde_json::json!({
            "pm25": observation.pm25,
            "weather": observation.weather,
        });
        fs::write(&file, serde_json::to_vec_pretty(&payload)?)
            .with_context(|| format!("Failed to write {}", file.display()))?;
        info!(provider = name, file = %file.display(), "saved readings");
    }

    let (pm25, weather) = merge_observations(&observations);
    if let Some(value) = pm25 {
        info!("current PM2.5: {value:.1} µg/m³");
    }
    if let Some(w) = weather {
        info!(
            "weather: {:?} °C, {:?} % humidity, {:?} m/s wind",
            w.temperature, w.humidity, w.wind_speed
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PmReading, WeatherReading};
    use chrono::Local;

    fn reading(pm25: Option<f64>) -> PmReading {
        PmReading {
            source: "test".to_string(),
            location: None,
            latitude: None,
            longitude: None,
            pm25,
            pm25_aqi: None,
            unit: None,
            timestamp: None,
            fetched_at: Local::now(),
        }
    }

    fn weather(source: &str) -> WeatherReading {
        WeatherReading {
            source: source.to_string(),
            temperature: Some(1.0),
            humidity: Some(50.0),
            pressure: None,
            wind_speed: Some(2.0),
            clouds: None,
            visibility: None,
            timestamp: None,
            fetched_at: Local::now(),
        }
    }

    #[test]
    fn test_merge_takes_first_available_values() {
        let observations = vec![
            (
                "OpenAQ",
                ProviderObservation {
                    pm25: vec![reading(None), reading(Some(40.0))],
                    weather: None,
                },
            ),
            (
                "IQAir",
                ProviderObservation {
                    pm25: vec![reading(Some(55.0))],
                    weather: Some(weather("IQAir")),
                },
            ),
        ];

        let (pm25, weather) = merge_observations(&observations);
        assert_eq!(pm25, Some(40.0));
        assert_eq!(weather.unwrap().source, "IQAir");
    }

    #[test]
    fn test_merge_of_nothing_is_empty() {
        let (pm25, weather) = merge_observations(&[]);
        assert!(pm25.is_none());
        assert!(weather.is_none());
    }
}

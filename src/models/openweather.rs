//! Wire formats for OpenWeatherMap (air pollution and current weather)

use serde::Deserialize;

/// Response of `GET /data/2.5/air_pollution`
#[derive(Debug, Deserialize)]
pub struct AirPollutionResponse {
    #[serde(default)]
    pub list: Vec<PollutionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PollutionEntry {
    /// Unix timestamp of the measurement
    pub dt: i64,

    pub components: PollutionComponents,
}

#[derive(Debug, Deserialize)]
pub struct PollutionComponents {
    #[serde(default)]
    pub pm2_5: Option<f64>,

    #[serde(default)]
    pub pm10: Option<f64>,
}

/// Response of `GET /data/2.5/weather`
#[derive(Debug, Deserialize)]
pub struct WeatherResponse {
    pub main: WeatherMain,

    #[serde(default)]
    pub wind: Option<WeatherWind>,

    #[serde(default)]
    pub clouds: Option<WeatherClouds>,

    /// Visibility in metres
    #[serde(default)]
    pub visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherMain {
    /// Temperature in Kelvin (converted to °C downstream)
    pub temp: Option<f64>,

    #[serde(default)]
    pub humidity: Option<f64>,

    #[serde(default)]
    pub pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherWind {
    #[serde(default)]
    pub speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherClouds {
    #[serde(default)]
    pub all: Option<f64>,
}

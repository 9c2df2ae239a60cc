//! Wire formats for the IQAir (AirVisual) `nearest_city` endpoint

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct NearestCityResponse {
    pub status: String,

    #[serde(default)]
    pub data: Option<CityData>,
}

#[derive(Debug, Deserialize)]
pub struct CityData {
    #[serde(default)]
    pub city: Option<String>,

    pub current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
pub struct CurrentConditions {
    pub pollution: Pollution,
    pub weather: Weather,
}

#[derive(Debug, Deserialize)]
pub struct Pollution {
    /// US AQI for the dominant pollutant (PM2.5 in practice)
    #[serde(default)]
    pub aqius: Option<f64>,

    /// Raw PM2.5 block, only present on some plans
    #[serde(default)]
    pub p2: Option<PollutantDetail>,

    /// Measurement timestamp (ISO 8601)
    #[serde(default)]
    pub ts: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PollutantDetail {
    /// Concentration in µg/m³
    #[serde(default)]
    pub conc: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Weather {
    /// Temperature in °C
    #[serde(default)]
    pub tp: Option<f64>,

    /// Relative humidity in %
    #[serde(default)]
    pub hu: Option<f64>,

    /// Pressure in hPa
    #[serde(default)]
    pub pr: Option<f64>,

    /// Wind speed in m/s
    #[serde(default)]
    pub ws: Option<f64>,
}

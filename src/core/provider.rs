//! Provider abstraction layer for air-quality and weather APIs
//!
//! This module defines a common trait for the third-party data sources
//! (OpenAQ, IQAir, OpenWeatherMap). Each provider is polled independently;
//! a failing provider is logged and skipped, never fatal.

use crate::models::{PmReading, WeatherReading};
use async_trait::async_trait;
use thiserror::Error;

/// Error types for provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("No data available: {0}")]
    NoData(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ProviderError {
    /// Map an HTTP error status plus body to the matching variant
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => ProviderError::Authentication(message),
            429 => ProviderError::RateLimit(message),
            _ => ProviderError::Api { status, message },
        }
    }
}

/// What one provider poll produced: zero or more PM2.5 readings and at most
/// one weather snapshot
#[derive(Debug, Clone, Default)]
pub struct ProviderObservation {
    pub pm25: Vec<PmReading>,
    pub weather: Option<WeatherReading>,
}

impl ProviderObservation {
    /// First PM2.5 concentration in the observation, if any
    pub fn primary_pm25(&self) -> Option<f64> {
        self.pm25.iter().find_map(|r| r.pm25)
    }
}

/// Trait for air-quality data providers
#[async_trait]
pub trait AirQualityProvider: Send + Sync {
    /// Fetch the current readings near the configured city
    async fn fetch_current(&self) -> Result<ProviderObservation, ProviderError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}

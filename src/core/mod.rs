//! Core application modules
//!
//! Configuration, logging, the AQI conversion, and the air-quality provider
//! abstraction with its implementations.

pub mod aqi;
pub mod config;
pub mod logging;
pub mod provider;
pub mod providers;

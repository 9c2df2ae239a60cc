//! Application configuration management
//!
//! This module handles loading and validating configuration from TOML files.
//! All configuration is validated at startup; the pipeline ships with a
//! complete default configuration (the Bishkek camera set) so every command
//! also works without a config file.

use crate::models::Camera;
use crate::quality::QualityThresholds;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default interval between collection ticks in minutes
const DEFAULT_INTERVAL_MINUTES: u64 = 60;

/// Default number of concurrent frame-grab workers
const DEFAULT_MAX_WORKERS: usize = 5;

/// Default time budget for one ffmpeg frame grab in seconds
const DEFAULT_FRAME_TIMEOUT: u64 = 30;

/// Default timeout for provider HTTP requests in seconds
const DEFAULT_REQUEST_TIMEOUT: u64 = 10;

/// Default radius for sensor discovery in kilometres
const DEFAULT_SENSOR_RADIUS_KM: f64 = 20.0;

#[derive(Debug, Clone, Deserialize)]
pub struct CityConfig {
    #[serde(default = "default_city_name")]
    pub name: String,

    #[serde(default = "default_city_latitude")]
    pub latitude: f64,

    #[serde(default = "default_city_longitude")]
    pub longitude: f64,
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            name: default_city_name(),
            latitude: default_city_latitude(),
            longitude: default_city_longitude(),
        }
    }
}

fn default_city_name() -> String {
    "Bishkek".to_string()
}

fn default_city_latitude() -> f64 {
    42.8746
}

fn default_city_longitude() -> f64 {
    74.5698
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Base directory for captured frames; per-tick metadata lands in a
    /// `metadata/` subdirectory next to the per-camera image directories
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default = "default_frame_timeout")]
    pub frame_timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            interval_minutes: default_interval_minutes(),
            max_workers: default_max_workers(),
            ffmpeg_path: default_ffmpeg_path(),
            frame_timeout_secs: default_frame_timeout(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/images")
}

fn default_interval_minutes() -> u64 {
    DEFAULT_INTERVAL_MINUTES
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_frame_timeout() -> u64 {
    DEFAULT_FRAME_TIMEOUT
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// IQAir API key; falls back to the IQAIR_API_KEY environment variable
    #[serde(default)]
    pub iqair_api_key: Option<String>,

    /// OpenWeatherMap API key; falls back to OPENWEATHER_API_KEY
    #[serde(default)]
    pub openweather_api_key: Option<String>,

    #[serde(default = "default_openaq_base_url")]
    pub openaq_base_url: String,

    #[serde(default = "default_iqair_base_url")]
    pub iqair_base_url: String,

    #[serde(default = "default_openweather_base_url")]
    pub openweather_base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Directory where fetched readings are persisted as JSON
    #[serde(default = "default_readings_dir")]
    pub readings_dir: PathBuf,

    #[serde(default = "default_sensor_radius_km")]
    pub sensor_radius_km: f64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            iqair_api_key: None,
            openweather_api_key: None,
            openaq_base_url: default_openaq_base_url(),
            iqair_base_url: default_iqair_base_url(),
            openweather_base_url: default_openweather_base_url(),
            request_timeout_secs: default_request_timeout(),
            readings_dir: default_readings_dir(),
            sensor_radius_km: default_sensor_radius_km(),
        }
    }
}

fn default_openaq_base_url() -> String {
    "https://api.openaq.org".to_string()
}

fn default_iqair_base_url() -> String {
    "http://api.airvisual.com/v2".to_string()
}

fn default_openweather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_readings_dir() -> PathBuf {
    PathBuf::from("data/pm25")
}

fn default_sensor_radius_km() -> f64 {
    DEFAULT_SENSOR_RADIUS_KM
}

#[derive(Debug, Clone, Deserialize)]
struct TomlConfig {
    #[serde(default = "default_log_level")]
    log_level: String,

    #[serde(default)]
    city: CityConfig,

    #[serde(default)]
    capture: CaptureConfig,

    #[serde(default)]
    quality: Option<QualityThresholds>,

    #[serde(default)]
    providers: ProvidersConfig,

    #[serde(default)]
    cameras: Vec<Camera>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Validated application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub city: CityConfig,
    pub capture: CaptureConfig,
    pub quality: QualityThresholds,
    pub providers: ProvidersConfig,
    pub cameras: Vec<Camera>,

    /// Path of the persisted sensor survey
    pub sensor_report_path: PathBuf,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if camera
    /// ids are missing or duplicated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read configuration file")?;

        let config: TomlConfig =
            toml::from_str(&content).context("Failed to parse TOML configuration")?;

        Self::resolve(config)
    }

    /// Load configuration from the environment.
    ///
    /// Uses CONFIG_PATH when set, otherwise `config.toml` in the current
    /// directory. A missing config file is not an error; the built-in
    /// defaults (Bishkek cameras) are used instead.
    pub fn from_env() -> Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(config_path)
        } else {
            Self::default_config()
        }
    }

    /// Built-in configuration: the Bishkek camera set with default thresholds
    pub fn default_config() -> Result<Self> {
        let config: TomlConfig =
            toml::from_str("").context("Failed to build default configuration")?;
        Self::resolve(config)
    }

    fn resolve(mut config: TomlConfig) -> Result<Self> {
        if config.cameras.is_empty() {
            config.cameras = default_cameras();
        }

        let mut seen = HashSet::new();
        for camera in &config.cameras {
            if camera.id.is_empty() {
                bail!("Camera with empty id in configuration");
            }
            if !seen.insert(camera.id.as_str()) {
                bail!("Duplicate camera id in configuration: {}", camera.id);
            }
        }

        // API keys may live in the environment (.env) instead of the TOML
        let mut providers = config.providers;
        if providers.iqair_api_key.is_none() {
            providers.iqair_api_key = env_key("IQAIR_API_KEY");
        }
        if providers.openweather_api_key.is_none() {
            providers.openweather_api_key = env_key("OPENWEATHER_API_KEY");
        }

        Ok(Config {
            log_level: config.log_level,
            city: config.city,
            capture: config.capture,
            quality: config.quality.unwrap_or_default(),
            providers,
            cameras: config.cameras,
            sensor_report_path: PathBuf::from("data/sensor_locations.json"),
        })
    }

    /// Cameras with a fixed, usable viewpoint
    pub fn recommended_cameras(&self) -> Vec<Camera> {
        self.cameras
            .iter()
            .filter(|c| c.recommended)
            .cloned()
            .collect()
    }

    pub fn camera_by_id(&self, id: &str) -> Option<&Camera> {
        self.cameras.iter().find(|c| c.id == id)
    }

    /// Directory for per-tick collection records
    pub fn metadata_dir(&self) -> PathBuf {
        self.capture.output_dir.join("metadata")
    }
}

fn env_key(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() && !v.starts_with("your_") => Some(v),
        _ => None,
    }
}

/// The Bishkek camera set used when no cameras are configured
fn default_cameras() -> Vec<Camera> {
    vec![
        Camera {
            id: "ala_too_square".to_string(),
            name: "Ala-Too Square".to_string(),
            url: "https://stream.kt.kg:5443/live/camera25.m3u8".to_string(),
            latitude: Some(42.875576),
            longitude: Some(74.603629),
            recommended: true,
            description: Some("Panoramic view over Ala-Too Square".to_string()),
        },
        Camera {
            id: "ala_too_square_2".to_string(),
            name: "Ala-Too Square (camera 2)".to_string(),
            url: "https://stream.kt.kg:5443/live/camera27.m3u8".to_string(),
            latitude: Some(42.875767),
            longitude: Some(74.604619),
            recommended: true,
            description: Some("Alternative angle on Ala-Too Square".to_string()),
        },
        Camera {
            id: "bishkek_panorama".to_string(),
            name: "Bishkek Panorama".to_string(),
            url: "https://stream.kt.kg:5443/live/camera28.m3u8".to_string(),
            latitude: None,
            longitude: None,
            recommended: true,
            description: Some("City panorama, coordinates not yet confirmed".to_string()),
        },
        Camera {
            id: "sovmin".to_string(),
            name: "Sovmin District".to_string(),
            url: "https://stream.kt.kg:5443/live/camera33.m3u8".to_string(),
            latitude: Some(42.804394),
            longitude: Some(74.587977),
            recommended: true,
            description: Some("View over the Sovmin district".to_string()),
        },
        Camera {
            id: "kt_center".to_string(),
            name: "Kyrgyztelecom Center".to_string(),
            url: "https://stream.kt.kg:5443/live/camera35.m3u8".to_string(),
            latitude: Some(42.874689),
            longitude: Some(74.612241),
            recommended: false,
            description: Some("Rotating camera, viewpoint changes over time".to_string()),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            log_level = "debug"

            [city]
            name = "Bishkek"
            latitude = 42.8746
            longitude = 74.5698

            [capture]
            output_dir = "data/test_images"
            interval_minutes = 30
            max_workers = 3

            [quality]
            min_brightness = 60.0
            max_brightness = 240.0
            min_contrast = 40.0
            min_sharpness = 100.0
            min_sky_ratio = 0.4

            [providers]
            iqair_api_key = "test-iqair-key"

            [[cameras]]
            id = "test_cam"
            name = "Test Camera"
            url = "https://example.com/stream.m3u8"
            latitude = 42.87
            longitude = 74.60

            [[cameras]]
            id = "rotating_cam"
            name = "Rotating Camera"
            url = "https://example.com/rotating.m3u8"
            recommended = false
        "#
        )
        .unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_config() {
        let file = create_test_config();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.capture.interval_minutes, 30);
        assert_eq!(config.capture.max_workers, 3);
        assert_eq!(config.quality.min_sharpness, 100.0);
        assert_eq!(
            config.providers.iqair_api_key.as_deref(),
            Some("test-iqair-key")
        );
        assert_eq!(config.cameras.len(), 2);
    }

    #[test]
    fn test_recommended_cameras_excludes_rotating() {
        let file = create_test_config();
        let config = Config::from_file(file.path()).unwrap();
        let recommended = config.recommended_cameras();
        assert_eq!(recommended.len(), 1);
        assert_eq!(recommended[0].id, "test_cam");
    }

    #[test]
    fn test_defaults_apply_for_missing_sections() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "log_level = \"info\"").unwrap();
        file.flush().unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.city.name, "Bishkek");
        assert_eq!(config.capture.interval_minutes, 60);
        assert_eq!(config.quality.min_brightness, 50.0);
        // the built-in camera set kicks in when none are configured
        assert_eq!(config.cameras.len(), 5);
        assert_eq!(config.recommended_cameras().len(), 4);
    }

    #[test]
    fn test_duplicate_camera_id_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [[cameras]]
            id = "dup"
            name = "A"
            url = "https://example.com/a.m3u8"

            [[cameras]]
            id = "dup"
            name = "B"
            url = "https://example.com/b.m3u8"
        "#
        )
        .unwrap();
        file.flush().unwrap();

        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_metadata_dir_is_under_output_dir() {
        let file = create_test_config();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(
            config.metadata_dir(),
            PathBuf::from("data/test_images/metadata")
        );
    }
}

//! PM2.5 Camera Data Collection Pipeline
//!
//! Collects paired training data for camera-based air quality estimation:
//! frames from public HLS city cameras plus ground-truth PM2.5 and weather
//! readings from public APIs, with supporting commands for sensor surveys,
//! feasibility checks and a weather-only regression baseline.

mod baseline;
mod capture;
mod core;
mod feasibility;
mod geo;
mod models;
mod quality;

use crate::capture::MultiCameraCapture;
use crate::capture::rotation;
use crate::core::config::Config;
use crate::core::logging::init_logging;
use crate::core::providers::{build_providers, fetch_and_persist};
use anyhow::Result;
use std::time::Duration;
use tracing::error;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|arg| arg == "--help") {
        print_help();
        return;
    }

    // Load .env before configuration so API keys are visible
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration Error: {e:#}");
            std::process::exit(1);
        }
    };

    init_logging(&config.log_level);
    print_startup_banner(&config);

    let command = args[0].as_str();
    let result = match command {
        "capture" => run_capture(&config, &args).await,
        "collect" => run_collect(&config, &args).await,
        "fetch" => fetch_and_persist(&config).await,
        "sensors" => geo::survey_sensors(&config).await.map(|_| ()),
        "feasibility" => feasibility::check_feasibility(&config).map(|_| ()),
        "baseline" => baseline::train_and_evaluate(&config).map(|_| ()),
        "analyze" => run_analyze(&config, &args).await,
        "cameras" => {
            list_cameras(&config);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("{command} failed: {e:#}");
        std::process::exit(1);
    }
}

fn selected_cameras(config: &Config, args: &[String]) -> Vec<crate::models::Camera> {
    if args.iter().any(|arg| arg == "--all-cameras") {
        config.cameras.clone()
    } else {
        config.recommended_cameras()
    }
}

async fn run_capture(config: &Config, args: &[String]) -> Result<()> {
    let capture = MultiCameraCapture::new(config, selected_cameras(config, args));
    let outcomes = capture.capture_all().await;

    if outcomes.iter().all(|o| !o.success) {
        anyhow::bail!("No camera produced a usable frame");
    }
    Ok(())
}

async fn run_collect(config: &Config, args: &[String]) -> Result<()> {
    let interval_minutes = flag_value(args, "--interval")
        .map(|v| parse_number(&v, "--interval"))
        .unwrap_or(config.capture.interval_minutes);
    let duration_hours = flag_value(args, "--duration").map(|v| parse_number(&v, "--duration"));

    let providers = build_providers(config);
    let capture = MultiCameraCapture::new(config, selected_cameras(config, args));

    capture
        .collect_continuous(
            &providers,
            Duration::from_secs(interval_minutes * 60),
            duration_hours.map(|h| Duration::from_secs(h * 3600)),
        )
        .await
}

async fn run_analyze(config: &Config, args: &[String]) -> Result<()> {
    let camera_id = flag_value(args, "--camera").unwrap_or_else(|| "kt_center".to_string());
    let frames = flag_value(args, "--frames")
        .map(|v| parse_number(&v, "--frames"))
        .unwrap_or(20) as usize;
    let interval_secs = flag_value(args, "--interval-secs")
        .map(|v| parse_number(&v, "--interval-secs"))
        .unwrap_or(15);

    rotation::analyze_camera(config, &camera_id, frames, interval_secs).await
}

fn list_cameras(config: &Config) {
    println!("Configured cameras:");
    for camera in &config.cameras {
        let coords = match camera.coordinates() {
            Some((lat, lon)) => format!("{lat:.4}, {lon:.4}"),
            None => "no coordinates".to_string(),
        };
        println!(
            "  {} - {} ({}){}",
            camera.id,
            camera.name,
            coords,
            if camera.recommended {
                ""
            } else {
                " [not recommended]"
            }
        );
        if let Some(description) = &camera.description {
            println!("      {description}");
        }
    }
}

/// Value of `--name <value>` in the argument list, if present
fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_number(value: &str, flag: &str) -> u64 {
    match value.parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("Invalid value for {flag}: {value}");
            std::process::exit(2);
        }
    }
}

/// Print startup banner with configuration
fn print_startup_banner(config: &Config) {
    println!("🌫  PM2.5 Collection Pipeline v0.1.0");
    println!("✅ Configuration loaded successfully");
    println!(
        "   City: {} ({:.4}, {:.4})",
        config.city.name, config.city.latitude, config.city.longitude
    );
    println!(
        "   Cameras: {} configured, {} recommended",
        config.cameras.len(),
        config.recommended_cameras().len()
    );
    println!("   Image Directory: {}", config.capture.output_dir.display());
    println!("   Capture Interval: {} min", config.capture.interval_minutes);
    println!(
        "   IQAir: {}",
        if config.providers.iqair_api_key.is_some() {
            "Enabled"
        } else {
            "Disabled (no API key)"
        }
    );
    println!(
        "   OpenWeatherMap: {}",
        if config.providers.openweather_api_key.is_some() {
            "Enabled"
        } else {
            "Disabled (no API key)"
        }
    );
    println!();
}

/// Print help message
fn print_help() {
    println!("PM2.5 Collection Pipeline v0.1.0");
    println!();
    println!("Usage: pm25-pipeline <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  capture      Grab one frame from each camera and filter for quality");
    println!("  collect      Continuous collection: frames + PM2.5/weather every tick");
    println!("  fetch        One-shot poll of the air quality providers");
    println!("  sensors      Survey nearby PM2.5 sensors and grade camera pairings");
    println!("  feasibility  Judge project feasibility from the sensor survey");
    println!("  baseline     Fit the weather-only ridge baseline on collected data");
    println!("  analyze      Sample a rotating camera and report its viewpoint pattern");
    println!("  cameras      List the configured cameras");
    println!();
    println!("Options:");
    println!("  --all-cameras        capture/collect: include non-recommended cameras");
    println!("  --interval <min>     collect: minutes between ticks (default: config)");
    println!("  --duration <hours>   collect: stop after this many hours (default: forever)");
    println!("  --camera <id>        analyze: camera to sample (default: kt_center)");
    println!("  --frames <n>         analyze: frames to sample (default: 20)");
    println!("  --interval-secs <s>  analyze: seconds between frames (default: 15)");
    println!("  --help               Display this help message");
    println!();
    println!("Environment variables:");
    println!("  CONFIG_PATH - TOML configuration file (default: config.toml)");
    println!("  IQAIR_API_KEY - IQAir (AirVisual) API key");
    println!("  OPENWEATHER_API_KEY - OpenWeatherMap API key");
    println!("  LOG_LEVEL / RUST_LOG - Logging level (default: info)");
}

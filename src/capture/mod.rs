//! Frame capture from HLS camera streams
//!
//! A frame grab shells out to ffmpeg (one frame per invocation, bounded by a
//! timeout) and decodes the resulting JPEG for quality assessment. The
//! multi-camera path fans one grab task per camera out over a bounded worker
//! pool; cameras are independent and nothing is shared between workers.
//!
//! Everything here is best-effort: a camera that fails to produce a usable
//! frame is logged and skipped until the next tick.

pub mod rotation;

use crate::core::config::Config;
use crate::core::provider::AirQualityProvider;
use crate::core::providers::{merge_observations, poll_providers};
use crate::models::{Camera, CaptureOutcome, CollectionRecord, WeatherReading};
use crate::quality::FrameQualityFilter;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use futures::StreamExt;
use futures::stream;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// Error types for a single frame grab
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("ffmpeg exited with {status}: {stderr}")]
    Ffmpeg { status: String, stderr: String },

    #[error("stream produced no frame")]
    EmptyFrame,

    #[error("timed out after {0:?} waiting for a frame")]
    Timeout(Duration),

    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Grabs single frames from HLS streams via ffmpeg
#[derive(Debug, Clone)]
pub struct FrameGrabber {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FrameGrabber {
    pub fn new(ffmpeg_path: String, timeout: Duration) -> Self {
        Self {
            ffmpeg_path,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.capture.ffmpeg_path.clone(),
            Duration::from_secs(config.capture.frame_timeout_secs),
        )
    }

    /// ffmpeg argument list for a one-frame grab into `dest`
    fn ffmpeg_args(stream_url: &str, dest: &Path) -> Vec<OsString> {
        vec![
            OsString::from("-y"),
            OsString::from("-loglevel"),
            OsString::from("error"),
            OsString::from("-i"),
            OsString::from(stream_url),
            OsString::from("-frames:v"),
            OsString::from("1"),
            OsString::from("-q:v"),
            OsString::from("2"),
            dest.as_os_str().to_os_string(),
        ]
    }

    /// Grab one frame from the stream and write it to `dest` as JPEG.
    ///
    /// # Errors
    ///
    /// Returns CaptureError when ffmpeg cannot be launched, exits non-zero,
    /// exceeds the timeout, or produces an empty file.
    pub async fn grab_frame(&self, stream_url: &str, dest: &Path) -> Result<(), CaptureError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut command = Command::new(&self.ffmpeg_path);
        command.args(Self::ffmpeg_args(stream_url, dest));
        command.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| CaptureError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(CaptureError::Ffmpeg {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match fs::metadata(dest) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(CaptureError::EmptyFrame),
        }
    }
}

/// Concurrent capture across the configured cameras
pub struct MultiCameraCapture {
    cameras: Vec<Camera>,
    grabber: FrameGrabber,
    filter: FrameQualityFilter,
    output_dir: PathBuf,
    max_workers: usize,
}

impl MultiCameraCapture {
    pub fn new(config: &Config, cameras: Vec<Camera>) -> Self {
        Self {
            cameras,
            grabber: FrameGrabber::from_config(config),
            filter: FrameQualityFilter::new(config.quality),
            output_dir: config.capture.output_dir.clone(),
            max_workers: config.capture.max_workers.max(1),
        }
    }

    /// Grab one frame from every camera, at most `max_workers` at a time.
    /// Outcomes are collected as grabs finish; order is not significant.
    pub async fn capture_all(&self) -> Vec<CaptureOutcome> {
        let timestamp = Local::now();
        info!(
            cameras = self.cameras.len(),
            workers = self.max_workers,
            "capturing frames"
        );

        let outcomes: Vec<CaptureOutcome> = stream::iter(self.cameras.iter())
            .map(|camera| self.capture_one(camera, timestamp))
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        for outcome in &outcomes {
            if outcome.success {
                info!(
                    camera = %outcome.camera_id,
                    path = ?outcome.image_path,
                    "frame captured"
                );
            } else if let Some(reason) = &outcome.rejected {
                info!(camera = %outcome.camera_id, "frame rejected: {reason}");
            } else if let Some(error) = &outcome.error {
                warn!(camera = %outcome.camera_id, "capture failed: {error}");
            }
        }

        let successful = outcomes.iter().filter(|o| o.success).count();
        info!("{successful}/{} cameras captured", outcomes.len());

        outcomes
    }

    async fn capture_one(&self, camera: &Camera, timestamp: DateTime<Local>) -> CaptureOutcome {
        let stamp = timestamp.format("%Y%m%d_%H%M%S");
        let path = self
            .output_dir
            .join(&camera.id)
            .join(format!("{}_{stamp}.jpg", camera.id));

        if let Err(e) = self.grabber.grab_frame(&camera.url, &path).await {
            return CaptureOutcome::failure(camera, timestamp, e.to_string());
        }

        let frame = match image::open(&path) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = fs::remove_file(&path);
                return CaptureOutcome::failure(
                    camera,
                    timestamp,
                    CaptureError::Decode(e).to_string(),
                );
            }
        };

        let resolution = (frame.width(), frame.height());
        let assessment = self.filter.analyze(&frame);

        if let Some(reason) = assessment.rejection {
            // Not worth keeping; the next tick will try again
            let _ = fs::remove_file(&path);
            return CaptureOutcome {
                camera_id: camera.id.clone(),
                camera_name: camera.name.clone(),
                timestamp,
                success: false,
                image_path: None,
                resolution: Some(resolution),
                quality: Some(assessment.metrics),
                rejected: Some(reason.to_string()),
                error: None,
            };
        }

        CaptureOutcome {
            camera_id: camera.id.clone(),
            camera_name: camera.name.clone(),
            timestamp,
            success: true,
            image_path: Some(path),
            resolution: Some(resolution),
            quality: Some(assessment.metrics),
            rejected: None,
            error: None,
        }
    }

    /// Continuous collection: capture frames and poll providers every
    /// `interval`, writing joined per-camera records each tick. Runs until
    /// `duration` elapses, or forever when none is given.
    pub async fn collect_continuous(
        &self,
        providers: &[Box<dyn AirQualityProvider>],
        interval: Duration,
        duration: Option<Duration>,
    ) -> Result<()> {
        let started = Instant::now();
        let mut tick: u64 = 0;

        loop {
            tick += 1;
            info!(tick, "collection tick");

            let outcomes = self.capture_all().await;
            let observations = poll_providers(providers).await;
            let (pm25, weather) = merge_observations(&observations);

            let records = build_records(&outcomes, pm25, weather.as_ref());
            if records.is_empty() {
                warn!(tick, "no usable frames this tick");
            } else {
                self.write_records(&records)?;
            }

            if let Some(limit) = duration {
                if started.elapsed() >= limit {
                    info!("collection finished after {tick} ticks");
                    return Ok(());
                }
            }

            info!("next tick in {}s", interval.as_secs());
            tokio::time::sleep(interval).await;
        }
    }

    /// Persist one tick's records as a timestamped JSON file under
    /// `<output_dir>/metadata/`.
    fn write_records(&self, records: &[CollectionRecord]) -> Result<()> {
        let dir = self.output_dir.join("metadata");
        fs::create_dir_all(&dir).context("Failed to create metadata directory")?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("collection_{stamp}.json"));
        fs::write(&path, serde_json::to_vec_pretty(records)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(records = records.len(), file = %path.display(), "tick metadata written");
        Ok(())
    }
}

/// Join successful captures with the readings current at capture time
fn build_records(
    outcomes: &[CaptureOutcome],
    pm25: Option<f64>,
    weather: Option<&WeatherReading>,
) -> Vec<CollectionRecord> {
    outcomes
        .iter()
        .filter(|o| o.success)
        .map(|o| CollectionRecord {
            timestamp: o.timestamp,
            camera_id: o.camera_id.clone(),
            image_path: o.image_path.clone(),
            quality: o.quality,
            pm25,
            weather: weather.cloned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::FrameMetrics;

    #[test]
    fn ffmpeg_args_request_a_single_frame() {
        let args = FrameGrabber::ffmpeg_args(
            "https://example.com/stream.m3u8",
            Path::new("data/images/cam/cam_20250115_090000.jpg"),
        );

        let rendered: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(rendered.contains(&"-i".to_string()));
        assert!(rendered.contains(&"https://example.com/stream.m3u8".to_string()));
        let frames_pos = rendered.iter().position(|a| a == "-frames:v").unwrap();
        assert_eq!(rendered[frames_pos + 1], "1");
        // destination is the final argument
        assert_eq!(
            rendered.last().unwrap(),
            "data/images/cam/cam_20250115_090000.jpg"
        );
    }

    #[tokio::test]
    async fn grab_from_unlaunchable_binary_is_an_io_error() {
        let grabber = FrameGrabber::new(
            "/nonexistent/ffmpeg-binary".to_string(),
            Duration::from_secs(5),
        );
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("frame.jpg");

        let err = grabber
            .grab_frame("https://example.com/stream.m3u8", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
    }

    fn outcome(camera_id: &str, success: bool) -> CaptureOutcome {
        CaptureOutcome {
            camera_id: camera_id.to_string(),
            camera_name: camera_id.to_string(),
            timestamp: Local::now(),
            success,
            image_path: success.then(|| PathBuf::from(format!("data/{camera_id}.jpg"))),
            resolution: Some((1280, 720)),
            quality: Some(FrameMetrics {
                brightness: 120.0,
                contrast: 45.0,
                sharpness: 90.0,
                sky_ratio: 0.4,
            }),
            rejected: None,
            error: (!success).then(|| "stream produced no frame".to_string()),
        }
    }

    #[test]
    fn records_only_cover_successful_captures() {
        let outcomes = vec![outcome("a", true), outcome("b", false), outcome("c", true)];
        let records = build_records(&outcomes, Some(62.4), None);

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.pm25 == Some(62.4)));
        assert!(records.iter().any(|r| r.camera_id == "a"));
        assert!(records.iter().all(|r| r.camera_id != "b"));
    }
}

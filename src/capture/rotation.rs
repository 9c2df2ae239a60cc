//! Rotating-camera viewpoint analysis
//!
//! Some city cameras cycle through several viewpoints, so only part of each
//! rotation shows enough sky for PM2.5 estimation. The `analyze` command
//! captures a short frame sequence, scores each frame with the quality
//! filter, and reports the useful/useless runs so a capture strategy can be
//! chosen (sub-sampling interval, or dropping the camera).

use crate::capture::FrameGrabber;
use crate::core::config::Config;
use crate::quality::{FrameMetrics, FrameQualityFilter};
use anyhow::{Context, Result, bail};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// One scored frame of the sequence
#[derive(Debug, Clone)]
pub struct ScoredFrame {
    pub index: usize,
    pub path: PathBuf,
    pub metrics: Option<FrameMetrics>,
    pub useful: bool,
}

/// A maximal run of consecutive frames with the same usefulness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub useful: bool,
    pub start: usize,
    pub len: usize,
}

/// Collapse a per-frame usefulness sequence into maximal runs
pub fn detect_pattern(flags: &[bool]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();

    for (index, &useful) in flags.iter().enumerate() {
        match segments.last_mut() {
            Some(last) if last.useful == useful => last.len += 1,
            _ => segments.push(Segment {
                useful,
                start: index,
                len: 1,
            }),
        }
    }

    segments
}

/// Capture `frames` frames from one camera at `interval` spacing and score
/// each with the quality filter. Frames are kept on disk for inspection.
pub async fn capture_sequence(
    grabber: &FrameGrabber,
    filter: &FrameQualityFilter,
    stream_url: &str,
    output_dir: &Path,
    frames: usize,
    interval: Duration,
) -> Result<Vec<ScoredFrame>> {
    fs::create_dir_all(output_dir).context("Failed to create analysis directory")?;

    let mut scored = Vec::with_capacity(frames);
    for index in 0..frames {
        let stamp = Local::now().format("%H%M%S");
        let path = output_dir.join(format!("frame_{index:03}_{stamp}.jpg"));

        let frame = match grabber.grab_frame(stream_url, &path).await {
            Ok(()) => image::open(&path).ok(),
            Err(e) => {
                warn!(frame = index, "grab failed: {e}");
                None
            }
        };

        let (metrics, useful) = match frame {
            Some(frame) => {
                let assessment = filter.analyze(&frame);
                (Some(assessment.metrics), assessment.is_useful())
            }
            None => (None, false),
        };

        if let Some(m) = &metrics {
            info!(
                frame = index,
                useful,
                brightness = format!("{:.0}", m.brightness),
                sharpness = format!("{:.0}", m.sharpness),
                sky_ratio = format!("{:.2}", m.sky_ratio),
                "frame scored"
            );
        }

        scored.push(ScoredFrame {
            index,
            path,
            metrics,
            useful,
        });

        if index + 1 < frames {
            tokio::time::sleep(interval).await;
        }
    }

    Ok(scored)
}

/// `analyze` command: sample a rotating camera and report its viewpoint
/// pattern.
pub async fn analyze_camera(
    config: &Config,
    camera_id: &str,
    frames: usize,
    interval_secs: u64,
) -> Result<()> {
    let Some(camera) = config.camera_by_id(camera_id) else {
        bail!("Unknown camera '{camera_id}'");
    };

    info!(
        camera = %camera.id,
        frames,
        interval_secs,
        "analyzing rotation pattern"
    );

    let grabber = FrameGrabber::from_config(config);
    let filter = FrameQualityFilter::new(config.quality);
    let output_dir = config
        .capture
        .output_dir
        .join("camera_analysis")
        .join(&camera.id);

    let scored = capture_sequence(
        &grabber,
        &filter,
        &camera.url,
        &output_dir,
        frames,
        Duration::from_secs(interval_secs),
    )
    .await?;

    summarize(&camera.name, &scored);
    Ok(())
}

fn summarize(camera_name: &str, scored: &[ScoredFrame]) {
    let useful = scored.iter().filter(|f| f.useful).count();
    let total = scored.len();
    info!("{camera_name}: {useful}/{total} frames useful");

    if total == 0 {
        return;
    }

    let flags: Vec<bool> = scored.iter().map(|f| f.useful).collect();
    let segments = detect_pattern(&flags);
    for segment in &segments {
        info!(
            "frames {}..{}: {}",
            segment.start,
            segment.start + segment.len - 1,
            if segment.useful { "useful" } else { "useless" }
        );
    }

    let ratio = useful as f64 / total as f64;
    if ratio >= 0.8 {
        info!("viewpoint looks stable; normal interval capture is fine");
    } else if ratio > 0.0 {
        info!(
            "camera rotates through viewpoints; capture more often and rely on \
             the quality filter to keep the sky-facing frames"
        );
    } else {
        info!("no useful frames observed; consider dropping this camera");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sequence_has_no_segments() {
        assert!(detect_pattern(&[]).is_empty());
    }

    #[test]
    fn uniform_sequence_is_one_segment() {
        let segments = detect_pattern(&[true, true, true]);
        assert_eq!(
            segments,
            vec![Segment {
                useful: true,
                start: 0,
                len: 3
            }]
        );
    }

    #[test]
    fn alternating_runs_are_split_at_transitions() {
        let segments = detect_pattern(&[true, true, false, false, false, true]);
        assert_eq!(segments.len(), 3);
        assert_eq!(
            segments[1],
            Segment {
                useful: false,
                start: 2,
                len: 3
            }
        );
        assert_eq!(
            segments[2],
            Segment {
                useful: true,
                start: 5,
                len: 1
            }
        );
    }
}

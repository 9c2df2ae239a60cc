//! Camera definitions and per-capture outcomes

use crate::quality::FrameMetrics;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single street camera exposing an HLS stream
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Camera {
    /// Stable identifier used for directory and file names
    pub id: String,

    /// Human-readable camera name
    pub name: String,

    /// HLS playlist URL (.m3u8)
    pub url: String,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    /// Whether the camera has a fixed, usable viewpoint. Rotating cameras
    /// are configured with `recommended = false` and only included on
    /// explicit request.
    #[serde(default = "default_recommended")]
    pub recommended: bool,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_recommended() -> bool {
    true
}

impl Camera {
    /// Coordinates as (latitude, longitude), if both are known
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Result of one frame-grab attempt on one camera
#[derive(Debug, Clone, Serialize)]
pub struct CaptureOutcome {
    pub camera_id: String,
    pub camera_name: String,
    pub timestamp: DateTime<Local>,

    /// True when a frame was grabbed, decoded and kept
    pub success: bool,

    /// Path of the saved JPEG (present only on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,

    /// Width and height of the decoded frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<(u32, u32)>,

    /// Quality metrics of the decoded frame, when decoding succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<FrameMetrics>,

    /// Rejection reason when the frame was grabbed but failed the quality
    /// filter (the frame is discarded in that case)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,

    /// Error description when the grab itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptureOutcome {
    /// Outcome for a grab that failed before producing a usable frame
    pub fn failure(camera: &Camera, timestamp: DateTime<Local>, error: String) -> Self {
        Self {
            camera_id: camera.id.clone(),
            camera_name: camera.name.clone(),
            timestamp,
            success: false,
            image_path: None,
            resolution: None,
            quality: None,
            rejected: None,
            error: Some(error),
        }
    }
}

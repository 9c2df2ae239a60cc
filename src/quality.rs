//! Frame-quality heuristics for street-camera frames
//!
//! Rotating cameras spend most of their cycle pointed somewhere useless, and
//! any camera can produce dark, washed-out or motion-blurred frames. This
//! module scores a decoded frame on four cheap grayscale metrics and decides
//! whether it is worth keeping for the dataset.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Luma value above which a pixel counts as sky in the top third of a frame
const SKY_LUMA_THRESHOLD: u8 = 100;

/// Quality metrics computed on the grayscale frame
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameMetrics {
    /// Mean luma (0-255)
    pub brightness: f64,

    /// Standard deviation of luma
    pub contrast: f64,

    /// Variance of the 3x3 Laplacian response; low values mean blur
    pub sharpness: f64,

    /// Fraction of pixels brighter than the sky threshold in the top third
    pub sky_ratio: f64,
}

/// Acceptance thresholds for [`FrameMetrics`]
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QualityThresholds {
    pub min_brightness: f64,
    pub max_brightness: f64,
    pub min_contrast: f64,
    pub min_sharpness: f64,
    pub min_sky_ratio: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_brightness: 50.0,
            max_brightness: 250.0,
            min_contrast: 30.0,
            min_sharpness: 50.0,
            min_sky_ratio: 0.3,
        }
    }
}

/// Why a frame was rejected. Checks run in this order; the first failing
/// metric wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectionReason {
    TooDark { brightness: f64, min: f64 },
    TooBright { brightness: f64, max: f64 },
    LowContrast { contrast: f64, min: f64 },
    Blurry { sharpness: f64, min: f64 },
    NotEnoughSky { sky_ratio: f64, min: f64 },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooDark { brightness, min } => {
                write!(f, "too dark ({brightness:.0} < {min:.0})")
            }
            Self::TooBright { brightness, max } => {
                write!(f, "too bright ({brightness:.0} > {max:.0})")
            }
            Self::LowContrast { contrast, min } => {
                write!(f, "low contrast ({contrast:.0} < {min:.0})")
            }
            Self::Blurry { sharpness, min } => {
                write!(f, "blurry or in motion ({sharpness:.0} < {min:.0})")
            }
            Self::NotEnoughSky { sky_ratio, min } => {
                write!(f, "not enough sky ({:.1}% < {:.0}%)", sky_ratio * 100.0, min * 100.0)
            }
        }
    }
}

/// A scored frame: the measured metrics and the filter's verdict
#[derive(Debug, Clone, Copy)]
pub struct FrameAssessment {
    pub metrics: FrameMetrics,
    pub rejection: Option<RejectionReason>,
}

impl FrameAssessment {
    pub fn is_useful(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Threshold-based frame filter
#[derive(Debug, Clone, Copy)]
pub struct FrameQualityFilter {
    thresholds: QualityThresholds,
}

impl Default for FrameQualityFilter {
    fn default() -> Self {
        Self::new(QualityThresholds::default())
    }
}

impl FrameQualityFilter {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    /// Stricter thresholds for high-quality dataset collection
    pub fn strict() -> Self {
        Self::new(QualityThresholds {
            min_brightness: 60.0,
            max_brightness: 240.0,
            min_contrast: 40.0,
            min_sharpness: 100.0,
            min_sky_ratio: 0.4,
        })
    }

    /// Looser thresholds that keep as many frames as possible
    pub fn lenient() -> Self {
        Self::new(QualityThresholds {
            min_brightness: 40.0,
            max_brightness: 255.0,
            min_contrast: 20.0,
            min_sharpness: 30.0,
            min_sky_ratio: 0.2,
        })
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Measure metrics and apply the thresholds in one pass
    pub fn analyze(&self, frame: &DynamicImage) -> FrameAssessment {
        let metrics = measure(&frame.to_luma8());
        FrameAssessment {
            metrics,
            rejection: self.rejection_reason(&metrics),
        }
    }

    /// True when every metric is within its threshold
    pub fn is_frame_useful(&self, metrics: &FrameMetrics) -> bool {
        self.rejection_reason(metrics).is_none()
    }

    /// First failing check, or None for a useful frame
    pub fn rejection_reason(&self, metrics: &FrameMetrics) -> Option<RejectionReason> {
        let t = &self.thresholds;
        if metrics.brightness < t.min_brightness {
            Some(RejectionReason::TooDark {
                brightness: metrics.brightness,
                min: t.min_brightness,
            })
        } else if metrics.brightness > t.max_brightness {
            Some(RejectionReason::TooBright {
                brightness: metrics.brightness,
                max: t.max_brightness,
            })
        } else if metrics.contrast < t.min_contrast {
            Some(RejectionReason::LowContrast {
                contrast: metrics.contrast,
                min: t.min_contrast,
            })
        } else if metrics.sharpness < t.min_sharpness {
            Some(RejectionReason::Blurry {
                sharpness: metrics.sharpness,
                min: t.min_sharpness,
            })
        } else if metrics.sky_ratio < t.min_sky_ratio {
            Some(RejectionReason::NotEnoughSky {
                sky_ratio: metrics.sky_ratio,
                min: t.min_sky_ratio,
            })
        } else {
            None
        }
    }
}

/// Compute all four metrics on a grayscale frame
pub fn measure(gray: &GrayImage) -> FrameMetrics {
    let (width, height) = gray.dimensions();
    let pixel_count = (width as u64) * (height as u64);

    if pixel_count == 0 {
        return FrameMetrics {
            brightness: 0.0,
            contrast: 0.0,
            sharpness: 0.0,
            sky_ratio: 0.0,
        };
    }

    // Brightness and contrast in a single pass (population std deviation)
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for p in gray.pixels() {
        let v = p.0[0] as f64;
        sum += v;
        sum_sq += v * v;
    }
    let n = pixel_count as f64;
    let brightness = sum / n;
    let variance = (sum_sq / n - brightness * brightness).max(0.0);
    let contrast = variance.sqrt();

    FrameMetrics {
        brightness,
        contrast,
        sharpness: laplacian_variance(gray),
        sky_ratio: sky_ratio(gray),
    }
}

/// Variance of the 4-connected Laplacian over interior pixels.
/// Flat or smoothly varying frames score near zero.
fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = gray.get_pixel(x, y).0[0] as f64;
            let up = gray.get_pixel(x, y - 1).0[0] as f64;
            let down = gray.get_pixel(x, y + 1).0[0] as f64;
            let left = gray.get_pixel(x - 1, y).0[0] as f64;
            let right = gray.get_pixel(x + 1, y).0[0] as f64;

            let response = up + down + left + right - 4.0 * center;
            sum += response;
            sum_sq += response * response;
            count += 1;
        }
    }

    let n = count as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Fraction of bright pixels in the top third of the frame. Daylight sky is
/// reliably brighter than the threshold; a frame with no sky is pointed at a
/// wall or the ground.
fn sky_ratio(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    let top_rows = height / 3;
    if top_rows == 0 || width == 0 {
        return 0.0;
    }

    let mut sky_pixels = 0u64;
    for y in 0..top_rows {
        for x in 0..width {
            if gray.get_pixel(x, y).0[0] > SKY_LUMA_THRESHOLD {
                sky_pixels += 1;
            }
        }
    }

    sky_pixels as f64 / ((top_rows as u64 * width as u64) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn uniform(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    /// Checkerboard of 0/255: bright enough, high contrast, very sharp,
    /// half the top third bright.
    fn checkerboard(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 { Luma([255]) } else { Luma([0]) }
        })
    }

    #[test]
    fn dark_frame_is_rejected_as_too_dark() {
        let filter = FrameQualityFilter::default();
        let metrics = measure(&uniform(60, 60, 20));
        assert!(!filter.is_frame_useful(&metrics));
        assert!(matches!(
            filter.rejection_reason(&metrics),
            Some(RejectionReason::TooDark { .. })
        ));
    }

    #[test]
    fn overexposed_frame_is_rejected_as_too_bright() {
        let filter = FrameQualityFilter::default();
        let metrics = FrameMetrics {
            brightness: 253.0,
            contrast: 40.0,
            sharpness: 100.0,
            sky_ratio: 0.5,
        };
        assert!(matches!(
            filter.rejection_reason(&metrics),
            Some(RejectionReason::TooBright { .. })
        ));
    }

    #[test]
    fn flat_frame_is_rejected_for_low_contrast() {
        let filter = FrameQualityFilter::default();
        let metrics = measure(&uniform(60, 60, 128));
        assert!((metrics.brightness - 128.0).abs() < 1e-9);
        assert!(metrics.contrast < 1e-9);
        assert!(matches!(
            filter.rejection_reason(&metrics),
            Some(RejectionReason::LowContrast { .. })
        ));
    }

    #[test]
    fn smooth_gradient_is_rejected_as_blurry() {
        // A horizontal ramp has contrast but an (almost) zero Laplacian.
        let gray = GrayImage::from_fn(128, 64, |x, _| Luma([(x * 2) as u8]));
        let filter = FrameQualityFilter::default();
        let metrics = measure(&gray);
        assert!(metrics.brightness >= 50.0 && metrics.brightness <= 250.0);
        assert!(metrics.contrast >= 30.0);
        assert!(metrics.sharpness < 50.0);
        assert!(matches!(
            filter.rejection_reason(&metrics),
            Some(RejectionReason::Blurry { .. })
        ));
    }

    #[test]
    fn frame_without_sky_is_rejected() {
        // Dark top third, checkerboard below: passes brightness, contrast and
        // sharpness but has no sky pixels.
        let gray = GrayImage::from_fn(90, 90, |x, y| {
            if y < 30 {
                Luma([80])
            } else if (x + y) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        let filter = FrameQualityFilter::default();
        let metrics = measure(&gray);
        assert!(metrics.sky_ratio < 1e-9);
        assert!(matches!(
            filter.rejection_reason(&metrics),
            Some(RejectionReason::NotEnoughSky { .. })
        ));
    }

    #[test]
    fn sharp_frame_with_sky_is_useful() {
        let filter = FrameQualityFilter::default();
        let metrics = measure(&checkerboard(90, 90));
        assert!((metrics.sky_ratio - 0.5).abs() < 0.02);
        assert!(filter.is_frame_useful(&metrics));
        assert!(filter.rejection_reason(&metrics).is_none());
    }

    #[test]
    fn strict_filter_rejects_what_default_accepts() {
        // sky_ratio 0.35 passes the default threshold (0.3) but not the
        // strict one (0.4).
        let metrics = FrameMetrics {
            brightness: 120.0,
            contrast: 45.0,
            sharpness: 120.0,
            sky_ratio: 0.35,
        };
        assert!(FrameQualityFilter::default().is_frame_useful(&metrics));
        assert!(!FrameQualityFilter::strict().is_frame_useful(&metrics));
        assert!(FrameQualityFilter::lenient().is_frame_useful(&metrics));
    }

    #[test]
    fn degenerate_images_score_zero() {
        let metrics = measure(&uniform(2, 2, 200));
        assert!(metrics.sharpness < 1e-9);
        assert!(metrics.sky_ratio < 1e-9); // top third of 2 rows is empty

        let empty = GrayImage::new(0, 0);
        let metrics = measure(&empty);
        assert_eq!(metrics.brightness, 0.0);
    }
}

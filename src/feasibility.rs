//! Project feasibility assessment
//!
//! Turns the persisted sensor survey into a go/no-go judgement: how many
//! camera/sensor pairs are close enough to produce ground-truth labels, and
//! how large a dataset the capture schedule would yield.

use crate::core::config::Config;
use crate::geo;
use crate::models::SensorReport;
use anyhow::Result;
use serde::Serialize;
use tracing::info;

/// Daylight hours per day the cameras are worth capturing
const DAYLIGHT_HOURS_PER_DAY: f64 = 10.0;

/// Overall judgement, by count of usable camera/sensor pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// No usable pair; collection would produce unlabeled images
    NotFeasible,
    /// A single usable pair; workable but fragile
    SeverelyLimited,
    /// Two usable pairs
    FeasibleWithLimitations,
    /// Three or more usable pairs
    Feasible,
}

impl Verdict {
    pub fn from_usable_pairs(count: usize) -> Self {
        match count {
            0 => Verdict::NotFeasible,
            1 => Verdict::SeverelyLimited,
            2 => Verdict::FeasibleWithLimitations,
            _ => Verdict::Feasible,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Verdict::NotFeasible => "not feasible: no camera has a nearby PM2.5 sensor",
            Verdict::SeverelyLimited => {
                "severely limited: only one camera/sensor pair is usable"
            }
            Verdict::FeasibleWithLimitations => {
                "feasible with limitations: two usable camera/sensor pairs"
            }
            Verdict::Feasible => "feasible: three or more usable camera/sensor pairs",
        }
    }
}

/// Projected dataset size for one capture cadence
#[derive(Debug, Clone, Serialize)]
pub struct DatasetEstimate {
    pub days: u32,
    pub images_per_camera: u64,
    pub total_images: u64,
}

/// Images per camera over `days`, assuming hourly capture during daylight
pub fn estimate_dataset(days: u32, usable_cameras: usize) -> DatasetEstimate {
    let images_per_camera = (days as f64 * DAYLIGHT_HOURS_PER_DAY) as u64;
    DatasetEstimate {
        days,
        images_per_camera,
        total_images: images_per_camera * usable_cameras as u64,
    }
}

/// Feasibility summary derived from a sensor report
#[derive(Debug, Serialize)]
pub struct FeasibilityReport {
    pub usable_pairs: usize,
    pub total_cameras: usize,
    pub verdict: Verdict,
    pub estimates: Vec<DatasetEstimate>,
}

pub fn assess(report: &SensorReport) -> FeasibilityReport {
    let usable_pairs = report
        .recommendations
        .values()
        .filter(|r| r.usable)
        .count();

    // Milestones from the study plan: ~50, ~150 and ~300 daylight days
    let estimates = [50, 150, 300]
        .into_iter()
        .map(|days| estimate_dataset(days, usable_pairs))
        .collect();

    FeasibilityReport {
        usable_pairs,
        total_cameras: report.recommendations.len(),
        verdict: Verdict::from_usable_pairs(usable_pairs),
        estimates,
    }
}

/// `feasibility` command: load the sensor survey and print the judgement.
/// The only fatal path is a missing survey.
pub fn check_feasibility(config: &Config) -> Result<FeasibilityReport> {
    let report = geo::load_report(&config.sensor_report_path)?;
    let feasibility = assess(&report);

    info!(
        usable = feasibility.usable_pairs,
        total = feasibility.total_cameras,
        "camera/sensor pairs"
    );
    for (camera_id, rec) in &report.recommendations {
        info!(
            "  {camera_id}: {} at {:.2} km ({})",
            rec.sensor, rec.distance_km, rec.grade
        );
    }

    info!("verdict: {}", feasibility.verdict.describe());
    for estimate in &feasibility.estimates {
        info!(
            "  over {} days: ~{} images/camera, ~{} total",
            estimate.days, estimate.images_per_camera, estimate.total_images
        );
    }

    Ok(feasibility)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PairRecommendation, SensorReport};
    use chrono::Local;
    use std::collections::BTreeMap;

    fn report_with(usable: &[bool]) -> SensorReport {
        let mut recommendations = BTreeMap::new();
        for (i, &usable) in usable.iter().enumerate() {
            recommendations.insert(
                format!("cam_{i}"),
                PairRecommendation {
                    sensor: "Station".to_string(),
                    distance_km: if usable { 1.2 } else { 8.0 },
                    grade: if usable { "good" } else { "unusable" }.to_string(),
                    usable,
                },
            );
        }
        SensorReport {
            sensors: Vec::new(),
            distances: BTreeMap::new(),
            recommendations,
            generated_at: Local::now(),
        }
    }

    #[test]
    fn verdict_follows_usable_pair_count() {
        assert_eq!(Verdict::from_usable_pairs(0), Verdict::NotFeasible);
        assert_eq!(Verdict::from_usable_pairs(1), Verdict::SeverelyLimited);
        assert_eq!(
            Verdict::from_usable_pairs(2),
            Verdict::FeasibleWithLimitations
        );
        assert_eq!(Verdict::from_usable_pairs(3), Verdict::Feasible);
        assert_eq!(Verdict::from_usable_pairs(5), Verdict::Feasible);
    }

    #[test]
    fn assessment_counts_only_usable_pairs() {
        let feasibility = assess(&report_with(&[true, false, true, true]));
        assert_eq!(feasibility.usable_pairs, 3);
        assert_eq!(feasibility.total_cameras, 4);
        assert_eq!(feasibility.verdict, Verdict::Feasible);
    }

    #[test]
    fn dataset_estimates_scale_with_days_and_cameras() {
        let estimate = estimate_dataset(50, 3);
        assert_eq!(estimate.images_per_camera, 500);
        assert_eq!(estimate.total_images, 1500);

        let estimate = estimate_dataset(300, 1);
        assert_eq!(estimate.images_per_camera, 3000);
        assert_eq!(estimate.total_images, 3000);
    }

    #[test]
    fn no_usable_pairs_is_not_feasible() {
        let feasibility = assess(&report_with(&[false, false]));
        assert_eq!(feasibility.verdict, Verdict::NotFeasible);
        assert!(feasibility.estimates.iter().all(|e| e.total_images == 0));
    }
}

//! Weather-only PM2.5 baseline
//!
//! Ridge regression over meteorological and calendar features. The point is
//! not accuracy; it sets the floor an image model has to beat. Features are
//! standardized, the target is centered, and the coefficients come from the
//! regularized normal equations.

use crate::core::config::Config;
use crate::models::{CollectionRecord, RegressionMetrics};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Datelike, Local, Timelike};
use nalgebra::{Cholesky, DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::fs;
use tracing::{info, warn};

/// L2 penalty strength
const RIDGE_ALPHA: f64 = 1.0;

/// Fraction of samples held out for evaluation
const TEST_FRACTION: f64 = 0.2;

/// Shuffle seed, fixed so runs are comparable
const SPLIT_SEED: u64 = 42;

/// Minimum labeled samples worth fitting on
const MIN_SAMPLES: usize = 10;

pub const FEATURE_NAMES: [&str; 6] = [
    "temperature",
    "humidity",
    "wind_speed",
    "hour",
    "day_of_year",
    "is_winter",
];

/// Meteorological and calendar features for one record. Missing weather
/// fields fall back to neutral values rather than dropping the sample.
pub fn feature_vector(record: &CollectionRecord) -> [f64; 6] {
    let weather = record.weather.as_ref();
    let temperature = weather.and_then(|w| w.temperature).unwrap_or(0.0);
    let humidity = weather.and_then(|w| w.humidity).unwrap_or(50.0);
    let wind_speed = weather.and_then(|w| w.wind_speed).unwrap_or(0.0);

    [
        temperature,
        humidity,
        wind_speed,
        f64::from(record.timestamp.hour()),
        f64::from(record.timestamp.ordinal()),
        f64::from(u8::from(is_winter(&record.timestamp))),
    ]
}

fn is_winter(timestamp: &DateTime<Local>) -> bool {
    matches!(timestamp.month(), 12 | 1 | 2)
}

/// Per-column standardization fitted on the training split
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: DVector<f64>,
    stds: DVector<f64>,
}

impl StandardScaler {
    pub fn fit(x: &DMatrix<f64>) -> Self {
        let n = x.nrows() as f64;
        let means = DVector::from_iterator(x.ncols(), x.column_iter().map(|c| c.sum() / n));
        let stds = DVector::from_iterator(
            x.ncols(),
            x.column_iter().enumerate().map(|(j, c)| {
                let var = c.iter().map(|v| (v - means[j]).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                // constant columns pass through unscaled
                if std > 0.0 { std } else { 1.0 }
            }),
        );
        Self { means, stds }
    }

    pub fn transform(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let mut z = x.clone();
        for (j, mut column) in z.column_iter_mut().enumerate() {
            column.apply(|v| *v = (*v - self.means[j]) / self.stds[j]);
        }
        z
    }
}

/// Ridge regression fitted on standardized features and a centered target
#[derive(Debug)]
pub struct RidgeRegression {
    scaler: StandardScaler,
    weights: DVector<f64>,
    intercept: f64,
}

impl RidgeRegression {
    /// Fit with penalty `alpha`.
    ///
    /// # Errors
    ///
    /// Fails when the regularized normal equations are not positive
    /// definite, which does not happen for `alpha > 0`.
    pub fn fit(x: &DMatrix<f64>, y: &DVector<f64>, alpha: f64) -> Result<Self> {
        let scaler = StandardScaler::fit(x);
        let z = scaler.transform(x);

        let intercept = y.sum() / y.len() as f64;
        let y_centered = y.map(|v| v - intercept);

        let gram = z.transpose() * &z + DMatrix::identity(z.ncols(), z.ncols()) * alpha;
        let weights = Cholesky::new(gram)
            .context("Ridge system is not positive definite")?
            .solve(&(z.transpose() * y_centered));

        Ok(Self {
            scaler,
            weights,
            intercept,
        })
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> DVector<f64> {
        let z = self.scaler.transform(x);
        (z * &self.weights).add_scalar(self.intercept)
    }

    /// Standardized feature weights, for reporting relative importance
    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }
}

/// MAE, RMSE and R² of predictions against the held-out target
pub fn evaluate(predicted: &DVector<f64>, actual: &DVector<f64>) -> RegressionMetrics {
    let n = actual.len() as f64;
    let residuals = predicted - actual;

    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n;
    let ss_res = residuals.iter().map(|r| r * r).sum::<f64>();
    let rmse = (ss_res / n).sqrt();

    let mean = actual.sum() / n;
    let ss_tot = actual.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    RegressionMetrics {
        mae,
        rmse,
        r2,
        n_samples: actual.len(),
    }
}

/// Deterministic shuffled split; returns (train, test) row indices
pub fn train_test_split(n: usize) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    indices.shuffle(&mut rng);

    let test_len = ((n as f64 * TEST_FRACTION) as usize).max(1);
    let test = indices.split_off(n - test_len);
    (indices, test)
}

/// Read every per-tick metadata file and keep the records that carry a PM2.5
/// label. Unparseable files are skipped with a warning.
pub fn load_dataset(config: &Config) -> Result<Vec<CollectionRecord>> {
    let dir = config.metadata_dir();
    let entries = fs::read_dir(&dir)
        .with_context(|| format!("No collection metadata at {}; run `collect` first", dir.display()))?;

    let mut records = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match serde_json::from_str::<Vec<CollectionRecord>>(&content) {
            Ok(batch) => records.extend(batch.into_iter().filter(|r| r.pm25.is_some())),
            Err(e) => warn!(file = %path.display(), "skipping unparseable metadata: {e}"),
        }
    }

    info!(labeled = records.len(), "dataset loaded");
    Ok(records)
}

fn design_matrix(records: &[CollectionRecord]) -> (DMatrix<f64>, DVector<f64>) {
    let rows: Vec<[f64; 6]> = records.iter().map(feature_vector).collect();
    let x = DMatrix::from_fn(records.len(), FEATURE_NAMES.len(), |i, j| rows[i][j]);
    let y = DVector::from_iterator(
        records.len(),
        records.iter().map(|r| r.pm25.unwrap_or_default()),
    );
    (x, y)
}

/// `baseline` command: load the collected dataset, fit the ridge model on a
/// deterministic 80/20 split and report held-out metrics.
pub fn train_and_evaluate(config: &Config) -> Result<RegressionMetrics> {
    let records = load_dataset(config)?;
    if records.len() < MIN_SAMPLES {
        bail!(
            "Only {} labeled samples; need at least {MIN_SAMPLES} to fit the baseline",
            records.len()
        );
    }

    let (x, y) = design_matrix(&records);
    let (train_idx, test_idx) = train_test_split(records.len());

    let x_train = x.select_rows(train_idx.as_slice());
    let y_train = y.select_rows(train_idx.as_slice());
    let x_test = x.select_rows(test_idx.as_slice());
    let y_test = y.select_rows(test_idx.as_slice());

    info!(
        train = train_idx.len(),
        test = test_idx.len(),
        "fitting ridge baseline"
    );

    let model = RidgeRegression::fit(&x_train, &y_train, RIDGE_ALPHA)?;
    let metrics = evaluate(&model.predict(&x_test), &y_test);

    for (name, weight) in FEATURE_NAMES.iter().zip(model.weights().iter()) {
        info!("  {name}: {weight:+.2}");
    }
    info!(
        "baseline: MAE {:.2} µg/m³, RMSE {:.2} µg/m³, R² {:.3} ({} test samples)",
        metrics.mae, metrics.rmse, metrics.r2, metrics.n_samples
    );
    info!("{}", interpret_r2(metrics.r2));

    Ok(metrics)
}

/// What a given weather-only R² means for the image model
pub fn interpret_r2(r2: f64) -> &'static str {
    if r2 < 0.3 {
        "weather explains little variance; images have plenty of signal to add"
    } else if r2 < 0.5 {
        "weather explains some variance; an image model should still improve on it"
    } else if r2 < 0.7 {
        "weather alone is a strong predictor; the image model must beat this bar"
    } else {
        "weather alone explains most variance; reconsider whether images add value"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeatherReading;
    use chrono::TimeZone;

    fn record(hour: u32, temperature: f64, humidity: f64, pm25: f64) -> CollectionRecord {
        let timestamp = Local.with_ymd_and_hms(2025, 1, 15, hour, 0, 0).unwrap();
        CollectionRecord {
            timestamp,
            camera_id: "cam".to_string(),
            image_path: None,
            quality: None,
            pm25: Some(pm25),
            weather: Some(WeatherReading {
                source: "test".to_string(),
                temperature: Some(temperature),
                humidity: Some(humidity),
                pressure: None,
                wind_speed: Some(1.0),
                clouds: None,
                visibility: None,
                timestamp: None,
                fetched_at: timestamp,
            }),
        }
    }

    #[test]
    fn features_read_calendar_fields() {
        let r = record(9, -4.0, 81.0, 62.0);
        let f = feature_vector(&r);
        assert_eq!(f[0], -4.0);
        assert_eq!(f[1], 81.0);
        assert_eq!(f[3], 9.0); // hour
        assert_eq!(f[4], 15.0); // day of year, Jan 15
        assert_eq!(f[5], 1.0); // winter
    }

    #[test]
    fn missing_weather_uses_neutral_defaults() {
        let mut r = record(12, 0.0, 0.0, 30.0);
        r.weather = None;
        let f = feature_vector(&r);
        assert_eq!(f[0], 0.0);
        assert_eq!(f[1], 50.0);
        assert_eq!(f[2], 0.0);
    }

    #[test]
    fn scaler_standardizes_and_keeps_constant_columns_finite() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 7.0, 2.0, 7.0, 3.0, 7.0, 4.0, 7.0]);
        let scaler = StandardScaler::fit(&x);
        let z = scaler.transform(&x);

        let mean0: f64 = z.column(0).sum() / 4.0;
        assert!(mean0.abs() < 1e-12);
        assert!(z.column(1).iter().all(|v| v.is_finite() && *v == 0.0));
    }

    #[test]
    fn ridge_recovers_a_linear_relationship() {
        // y = 3*x0 - 2*x1 + 5, sampled without noise
        let n = 40;
        let x = DMatrix::from_fn(n, 2, |i, j| {
            if j == 0 { i as f64 } else { (i as f64 * 0.7).sin() * 10.0 }
        });
        let y = DVector::from_fn(n, |i, _| 3.0 * x[(i, 0)] - 2.0 * x[(i, 1)] + 5.0);

        let model = RidgeRegression::fit(&x, &y, 1e-6).unwrap();
        let metrics = evaluate(&model.predict(&x), &y);

        assert!(metrics.mae < 0.1, "MAE {}", metrics.mae);
        assert!(metrics.r2 > 0.999, "R² {}", metrics.r2);
    }

    #[test]
    fn split_is_deterministic_and_disjoint() {
        let (train1, test1) = train_test_split(50);
        let (train2, test2) = train_test_split(50);
        assert_eq!(train1, train2);
        assert_eq!(test1, test2);

        assert_eq!(train1.len(), 40);
        assert_eq!(test1.len(), 10);
        assert!(test1.iter().all(|i| !train1.contains(i)));
    }

    #[test]
    fn tiny_split_keeps_at_least_one_test_sample() {
        let (train, test) = train_test_split(3);
        assert_eq!(test.len(), 1);
        assert_eq!(train.len(), 2);
    }

    #[test]
    fn perfect_predictions_score_r2_of_one() {
        let actual = DVector::from_row_slice(&[10.0, 20.0, 30.0]);
        let metrics = evaluate(&actual.clone(), &actual);
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert!((metrics.r2 - 1.0).abs() < 1e-12);
    }
}

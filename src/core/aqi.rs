//! US EPA AQI to PM2.5 concentration conversion
//!
//! Some providers (IQAir in particular) report US AQI instead of a raw
//! concentration. The EPA scale is piecewise linear over fixed PM2.5
//! breakpoints, so the inverse mapping is a straight segment lookup.

/// Convert a US AQI value to an approximate PM2.5 concentration in µg/m³.
///
/// Valid for non-negative AQI values; monotonically non-decreasing within
/// each breakpoint segment.
pub fn aqi_to_ugm3(aqi: f64) -> f64 {
    if aqi <= 50.0 {
        aqi * 12.0 / 50.0
    } else if aqi <= 100.0 {
        12.1 + (aqi - 51.0) * 23.9 / 49.0
    } else if aqi <= 150.0 {
        35.5 + (aqi - 101.0) * 19.4 / 49.0
    } else if aqi <= 200.0 {
        55.5 + (aqi - 151.0) * 94.4 / 49.0
    } else if aqi <= 300.0 {
        150.5 + (aqi - 201.0) * 99.4 / 99.0
    } else {
        250.5 + (aqi - 301.0) * 99.9 / 99.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_anchor_points() {
        assert!((aqi_to_ugm3(0.0)).abs() < 1e-9);
        assert!((aqi_to_ugm3(50.0) - 12.0).abs() < 1e-9);
        assert!((aqi_to_ugm3(51.0) - 12.1).abs() < 1e-9);
        assert!((aqi_to_ugm3(101.0) - 35.5).abs() < 1e-9);
        assert!((aqi_to_ugm3(201.0) - 150.5).abs() < 1e-9);
        assert!((aqi_to_ugm3(301.0) - 250.5).abs() < 1e-9);
    }

    #[test]
    fn monotonic_within_each_segment() {
        let segments: [(f64, f64); 6] = [
            (0.0, 50.0),
            (51.0, 100.0),
            (101.0, 150.0),
            (151.0, 200.0),
            (201.0, 300.0),
            (301.0, 500.0),
        ];

        for (lo, hi) in segments {
            let mut prev = aqi_to_ugm3(lo);
            let steps = 20;
            for i in 1..=steps {
                let aqi = lo + (hi - lo) * (i as f64) / (steps as f64);
                let conc = aqi_to_ugm3(aqi);
                assert!(
                    conc >= prev,
                    "conversion not monotonic at AQI {aqi}: {conc} < {prev}"
                );
                prev = conc;
            }
        }
    }

    #[test]
    fn hazardous_range_stays_above_very_unhealthy() {
        assert!(aqi_to_ugm3(301.0) > aqi_to_ugm3(300.0));
    }
}

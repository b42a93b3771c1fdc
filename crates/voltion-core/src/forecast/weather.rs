// Copyright (c) 2026 SOLARE S.R.O.
//
// This file is part of VoltION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use chrono::{DateTime, Utc};
use voltion_types::WeatherPoint;

/// Nearest-neighbour temperature lookup. Weather providers report hourly or
/// denser; nearest neighbour is enough for load sensitivity.
pub fn temperature_at(points: &[WeatherPoint], instant: DateTime<Utc>) -> Option<f64> {
    points
        .iter()
        .min_by_key(|p| (p.time - instant).num_seconds().abs())
        .map(|p| p.temperature_c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_nearest_neighbour() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let points: Vec<_> = (0..4)
            .map(|h| WeatherPoint {
                time: t0 + Duration::hours(h),
                temperature_c: 10.0 + h as f64,
            })
            .collect();

        assert_eq!(temperature_at(&points, t0), Some(10.0));
        assert_eq!(
            temperature_at(&points, t0 + Duration::minutes(100)),
            Some(12.0)
        );
        assert_eq!(
            temperature_at(&points, t0 + Duration::hours(9)),
            Some(13.0)
        );
        assert_eq!(temperature_at(&[], t0), None);
    }
}

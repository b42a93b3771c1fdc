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

use chrono::{DateTime, Duration, Utc};
use voltion_types::{ForecastError, TariffInterval, SLOTS_PER_DAY, SLOT_MINUTES};

/// Expand a sequence of tariff intervals (5- or 30-minute, possibly mixed)
/// into a dense per-5-minute price series of `SLOTS_PER_DAY` values.
///
/// Each target slot picks the provider interval whose `[period_start,
/// period_end)` contains the slot midpoint. A 30-minute interval therefore
/// replicates its price across six slots. There is no interpolation: a slot
/// without a covering interval fails the whole tick with
/// [`ForecastError::TariffGap`].
pub fn align_rates(
    intervals: &[TariffInterval],
    align_start: DateTime<Utc>,
) -> Result<Vec<f64>, ForecastError> {
    align_rates_n(intervals, align_start, SLOTS_PER_DAY)
}

/// Same as [`align_rates`] for an arbitrary slot count (used by tests and
/// shorter diagnostic horizons).
pub fn align_rates_n(
    intervals: &[TariffInterval],
    align_start: DateTime<Utc>,
    slots: usize,
) -> Result<Vec<f64>, ForecastError> {
    let mut rates = Vec::with_capacity(slots);
    // Intervals arrive sorted by period_start; keep a moving lower bound so
    // the scan stays linear over the day.
    let mut search_from = 0usize;

    for slot in 0..slots {
        let slot_start = align_start + Duration::minutes(slot as i64 * SLOT_MINUTES);
        let midpoint = slot_start + Duration::seconds(SLOT_MINUTES * 30);

        while search_from < intervals.len() && intervals[search_from].period_end <= midpoint {
            search_from += 1;
        }

        match intervals.get(search_from) {
            Some(interval) if interval.period_start <= midpoint => {
                rates.push(interval.per_kwh);
            }
            _ => {
                return Err(ForecastError::TariffGap {
                    slot,
                    instant: midpoint,
                });
            }
        }
    }

    Ok(rates)
}

/// Price applicable at a given instant, for the scalar status surface.
pub fn price_at(intervals: &[TariffInterval], instant: DateTime<Utc>) -> Option<f64> {
    intervals
        .iter()
        .find(|r| r.period_start <= instant && instant < r.period_end)
        .map(|r| r.per_kwh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn interval(start: DateTime<Utc>, minutes: i64, price: f64) -> TariffInterval {
        TariffInterval {
            period_start: start,
            period_end: start + Duration::minutes(minutes),
            per_kwh: price,
            period_type: "FORECAST".to_string(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_thirty_minute_interval_replicates_six_times() {
        let intervals: Vec<_> = (0..48)
            .map(|i| interval(t0() + Duration::minutes(i * 30), 30, i as f64))
            .collect();

        let rates = align_rates(&intervals, t0()).unwrap();
        assert_eq!(rates.len(), SLOTS_PER_DAY);
        for (slot, rate) in rates.iter().enumerate() {
            assert_eq!(*rate, (slot / 6) as f64, "slot {}", slot);
        }
    }

    #[test]
    fn test_mixed_cadence_intervals() {
        // First hour in 5-minute intervals, the rest in 30-minute intervals.
        let mut intervals: Vec<_> = (0..12)
            .map(|i| interval(t0() + Duration::minutes(i * 5), 5, 10.0 + i as f64))
            .collect();
        intervals.extend(
            (2..48).map(|i| interval(t0() + Duration::minutes(i * 30), 30, 42.0)),
        );

        let rates = align_rates(&intervals, t0()).unwrap();
        assert_eq!(rates[0], 10.0);
        assert_eq!(rates[11], 21.0);
        assert!(rates[12..].iter().all(|&r| r == 42.0));
    }

    #[test]
    fn test_gap_fails_the_tick() {
        // Missing the 00:30-01:00 interval.
        let mut intervals = vec![interval(t0(), 30, 10.0)];
        intervals.extend((2..48).map(|i| interval(t0() + Duration::minutes(i * 30), 30, 10.0)));

        let err = align_rates(&intervals, t0()).unwrap_err();
        assert!(matches!(err, ForecastError::TariffGap { slot: 6, .. }));
    }

    #[test]
    fn test_no_interpolation_across_price_steps() {
        // 20c then 40c, the boundary slot must take one of the two prices,
        // never a blend.
        let intervals = vec![
            interval(t0(), 30, 20.0),
            interval(t0() + Duration::minutes(30), 30, 40.0),
        ];
        let rates = align_rates_n(&intervals, t0(), 12).unwrap();
        assert!(rates.iter().all(|&r| r == 20.0 || r == 40.0));
        assert_eq!(rates[5], 20.0);
        assert_eq!(rates[6], 40.0);
    }

    #[test]
    fn test_negative_export_prices_pass_through() {
        let intervals: Vec<_> = (0..48)
            .map(|i| interval(t0() + Duration::minutes(i * 30), 30, -50.0))
            .collect();
        let rates = align_rates(&intervals, t0()).unwrap();
        assert!(rates.iter().all(|&r| r == -50.0));
    }

    #[test]
    fn test_price_at() {
        let intervals = vec![
            interval(t0(), 30, 20.0),
            interval(t0() + Duration::minutes(30), 30, 40.0),
        ];
        assert_eq!(price_at(&intervals, t0()), Some(20.0));
        assert_eq!(
            price_at(&intervals, t0() + Duration::minutes(35)),
            Some(40.0)
        );
        assert_eq!(price_at(&intervals, t0() + Duration::hours(2)), None);
    }
}

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

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};
use voltion_types::{
    ForecastError, LoadHistorySample, LoadModelConfig, WeatherPoint, SLOTS_PER_DAY, SLOT_MINUTES,
};

use super::weather::temperature_at;

/// Seed for the midnight-reset repair when the very first delta is already
/// negative (matches the meter's idle draw).
const RESET_SEED_KWH: f64 = 0.05;

/// Minimum usable history before the bucketed profile is trusted.
const MIN_USABLE_HOURS: f64 = 24.0;

/// Flat fallback when no usable history exists at all.
const FALLBACK_LOAD_KW: f64 = 0.5;

/// A 24-hour per-5-minute household load forecast.
#[derive(Debug, Clone)]
pub struct LoadForecast {
    /// Forecast load per slot (kW)
    pub load_kw: Vec<f64>,
    /// True when the forecast fell back to a flat mean because fewer than
    /// 24 hours of usable history remained after filtering.
    pub degraded: bool,
}

/// Derive a 288-slot load forecast from cumulative energy meter history.
///
/// The meter increases monotonically and resets at midnight. The pipeline:
/// interpolate the cumulative series at 5-minute boundaries, take per-slot
/// deltas, repair resets by substituting the previous valid delta (zeroing
/// would carve artificial troughs that anchor the forecast low), convert to
/// kW, average into (weekday, time-of-day) buckets and read the forecast
/// out of the matching future buckets.
pub fn predict_load(
    samples: &[LoadHistorySample],
    align_start: DateTime<Utc>,
    temps: &[WeatherPoint],
    config: &LoadModelConfig,
) -> LoadForecast {
    let slot_kw = historical_slot_powers(samples, align_start);

    let usable_hours = slot_kw.len() as f64 * SLOT_MINUTES as f64 / 60.0;
    let degraded = usable_hours < MIN_USABLE_HOURS;

    let profile = if degraded {
        let err = ForecastError::InsufficientHistory { usable_hours };
        warn!("⚠️ {err}; falling back to flat mean");
        Profile::flat(flat_mean(&slot_kw))
    } else {
        Profile::bucketed(&slot_kw)
    };

    let mut load_kw = Vec::with_capacity(SLOTS_PER_DAY);
    for slot in 0..SLOTS_PER_DAY {
        let slot_start = align_start + Duration::minutes(slot as i64 * SLOT_MINUTES);
        let mut kw = profile.lookup(slot_start);

        // Optional temperature sensitivity: scale by 1 + k * (temp - baseline).
        if config.temp_coefficient != 0.0 {
            if let Some(temp) = temperature_at(temps, slot_start) {
                kw *= 1.0 + config.temp_coefficient * (temp - config.temp_baseline_c);
            }
        }

        load_kw.push(kw.clamp(0.0, config.max_load_kw));
    }

    debug!(
        "📊 Load forecast built from {:.1} h of history (degraded: {})",
        usable_hours, degraded
    );

    LoadForecast { load_kw, degraded }
}

/// One historical 5-minute slot with its derived average power.
#[derive(Debug, Clone, Copy)]
struct SlotPower {
    slot_start: DateTime<Utc>,
    kw: f64,
}

/// Interpolate the cumulative meter series onto the 5-minute lattice and
/// derive per-slot powers with midnight-reset repair.
fn historical_slot_powers(
    samples: &[LoadHistorySample],
    align_start: DateTime<Utc>,
) -> Vec<SlotPower> {
    let mut points: Vec<(i64, f64)> = samples
        .iter()
        .filter(|s| s.state_kwh.is_finite() && s.last_changed <= align_start)
        .map(|s| (s.last_changed.timestamp(), s.state_kwh))
        .collect();
    points.sort_by_key(|(t, _)| *t);
    points.dedup_by_key(|(t, _)| *t);

    if points.len() < 2 {
        return Vec::new();
    }

    let step = SLOT_MINUTES * 60;
    let first = points[0].0;
    let last = points[points.len() - 1].0.min(align_start.timestamp());

    // First lattice boundary at or after the first sample.
    let mut t = first + (step - first.rem_euclid(step)) % step;
    if last - t < step {
        return Vec::new();
    }

    let mut slots = Vec::with_capacity(((last - t) / step) as usize);
    let mut prev_value = interpolate(&points, t);
    let mut prev_usage_kwh = RESET_SEED_KWH;

    while t + step <= last {
        let next_value = interpolate(&points, t + step);
        let mut usage_kwh = next_value - prev_value;

        // A negative delta is a midnight reset, not real consumption.
        // Substitute the previous valid delta rather than zero.
        if usage_kwh < 0.0 {
            usage_kwh = prev_usage_kwh;
        } else {
            prev_usage_kwh = usage_kwh;
        }

        slots.push(SlotPower {
            slot_start: DateTime::from_timestamp(t, 0).unwrap_or(align_start),
            kw: usage_kwh * 60.0 / SLOT_MINUTES as f64,
        });

        t += step;
        prev_value = next_value;
    }

    slots
}

/// Linear interpolation of the cumulative series at `t` (unix seconds).
fn interpolate(points: &[(i64, f64)], t: i64) -> f64 {
    match points {
        [] => 0.0,
        [only] => only.1,
        _ => {
            if t <= points[0].0 {
                return points[0].1;
            }
            if t >= points[points.len() - 1].0 {
                return points[points.len() - 1].1;
            }
            let idx = points.partition_point(|(pt, _)| *pt <= t);
            let (t1, v1) = points[idx - 1];
            let (t2, v2) = points[idx];
            if t2 == t1 {
                v1
            } else {
                v1 + (t - t1) as f64 * (v2 - v1) / (t2 - t1) as f64
            }
        }
    }
}

fn flat_mean(slots: &[SlotPower]) -> f64 {
    if slots.is_empty() {
        return FALLBACK_LOAD_KW;
    }
    slots.iter().map(|s| s.kw).sum::<f64>() / slots.len() as f64
}

/// Bucket key: weekday plus time of day at 5-minute resolution.
type BucketKey = (u32, u32, u32);

fn bucket_key(t: DateTime<Utc>) -> BucketKey {
    (
        t.weekday().num_days_from_monday(),
        t.hour(),
        t.minute() / SLOT_MINUTES as u32 * SLOT_MINUTES as u32,
    )
}

/// Historical load profile: bucket means with progressively coarser
/// fallbacks.
enum Profile {
    Flat(f64),
    Bucketed {
        /// Mean per (weekday, hour, 5-minute) bucket
        by_weekday: HashMap<BucketKey, f64>,
        /// Mean per (hour, 5-minute), across all weekdays
        by_time: HashMap<(u32, u32), f64>,
        mean: f64,
    },
}

impl Profile {
    fn flat(kw: f64) -> Self {
        Self::Flat(kw)
    }

    fn bucketed(slots: &[SlotPower]) -> Self {
        let mut weekday_sums: HashMap<BucketKey, (f64, u32)> = HashMap::new();
        let mut time_sums: HashMap<(u32, u32), (f64, u32)> = HashMap::new();

        for slot in slots {
            let key = bucket_key(slot.slot_start);
            let entry = weekday_sums.entry(key).or_insert((0.0, 0));
            entry.0 += slot.kw;
            entry.1 += 1;

            let entry = time_sums.entry((key.1, key.2)).or_insert((0.0, 0));
            entry.0 += slot.kw;
            entry.1 += 1;
        }

        Self::Bucketed {
            by_weekday: weekday_sums
                .into_iter()
                .map(|(k, (sum, n))| (k, sum / n as f64))
                .collect(),
            by_time: time_sums
                .into_iter()
                .map(|(k, (sum, n))| (k, sum / n as f64))
                .collect(),
            mean: flat_mean(slots),
        }
    }

    fn lookup(&self, slot_start: DateTime<Utc>) -> f64 {
        match self {
            Self::Flat(kw) => *kw,
            Self::Bucketed {
                by_weekday,
                by_time,
                mean,
            } => {
                let key = bucket_key(slot_start);
                by_weekday
                    .get(&key)
                    .or_else(|| by_time.get(&(key.1, key.2)))
                    .copied()
                    .unwrap_or(*mean)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        // A Sunday midnight.
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    /// Build a cumulative meter series at `step_min` resolution over
    /// `days` days ending at t0, with constant `kw` draw and a reset to
    /// zero at each midnight.
    fn meter_series(days: i64, step_min: i64, kw: f64) -> Vec<LoadHistorySample> {
        let start = t0() - Duration::days(days);
        let mut samples = Vec::new();
        let mut t = start;
        while t <= t0() {
            let midnight = t.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
            let state = kw * (t - midnight).num_seconds() as f64 / 3600.0;
            samples.push(LoadHistorySample {
                entity_id: "sensor.house_energy_today".to_string(),
                state_kwh: state,
                last_changed: t,
            });
            t += Duration::minutes(step_min);
        }
        samples
    }

    #[test]
    fn test_constant_load_recovered() {
        let samples = meter_series(5, 5, 1.2);
        let forecast = predict_load(&samples, t0(), &[], &LoadModelConfig::default());

        assert_eq!(forecast.load_kw.len(), SLOTS_PER_DAY);
        assert!(!forecast.degraded);
        for (slot, kw) in forecast.load_kw.iter().enumerate() {
            assert!((kw - 1.2).abs() < 0.05, "slot {}: {}", slot, kw);
        }
    }

    #[test]
    fn test_midnight_reset_uses_previous_delta_not_zero() {
        // Around each reset the derived delta must equal the neighbouring
        // slots' delta, never zero.
        let samples = meter_series(3, 5, 2.0);
        let slots = historical_slot_powers(&samples, t0());

        // The reset lands in the slot spanning midnight (23:55 -> 00:00).
        let resets: Vec<_> = slots
            .iter()
            .filter(|s| s.slot_start.hour() == 23 && s.slot_start.minute() == 55)
            .collect();
        assert!(!resets.is_empty());
        for slot in resets {
            assert!(
                (slot.kw - 2.0).abs() < 1e-6,
                "reset slot at {} derived {} kW",
                slot.slot_start,
                slot.kw
            );
        }
    }

    #[test]
    fn test_sparse_samples_interpolated() {
        // 30-minute sampling still yields the right average power.
        let samples = meter_series(5, 30, 0.8);
        let forecast = predict_load(&samples, t0(), &[], &LoadModelConfig::default());
        assert!(!forecast.degraded);
        for kw in &forecast.load_kw {
            assert!((kw - 0.8).abs() < 0.05);
        }
    }

    #[test]
    fn test_insufficient_history_falls_back_flat() {
        let samples = meter_series(0, 5, 1.0); // far less than 24 h
        let forecast = predict_load(&samples, t0(), &[], &LoadModelConfig::default());
        assert!(forecast.degraded);
        let first = forecast.load_kw[0];
        assert!(forecast.load_kw.iter().all(|kw| (kw - first).abs() < 1e-9));
    }

    #[test]
    fn test_no_history_at_all() {
        let forecast = predict_load(&[], t0(), &[], &LoadModelConfig::default());
        assert!(forecast.degraded);
        assert!(forecast.load_kw.iter().all(|&kw| kw == FALLBACK_LOAD_KW));
    }

    #[test]
    fn test_non_finite_samples_rejected() {
        let mut samples = meter_series(5, 5, 1.0);
        samples.push(LoadHistorySample {
            entity_id: "sensor.house_energy_today".to_string(),
            state_kwh: f64::NAN,
            last_changed: t0() - Duration::hours(1),
        });
        let forecast = predict_load(&samples, t0(), &[], &LoadModelConfig::default());
        assert!(forecast.load_kw.iter().all(|kw| kw.is_finite()));
    }

    #[test]
    fn test_temperature_adjustment_scales() {
        let samples = meter_series(5, 5, 1.0);
        let temps = vec![WeatherPoint {
            time: t0() + Duration::hours(12),
            temperature_c: 28.0,
        }];
        let config = LoadModelConfig {
            temp_coefficient: 0.05,
            temp_baseline_c: 18.0,
            ..Default::default()
        };
        let forecast = predict_load(&samples, t0(), &temps, &config);

        // 10 degrees above baseline at 5 %/degree = +50 %.
        let mid = forecast.load_kw[SLOTS_PER_DAY / 2];
        assert!((mid - 1.5).abs() < 0.1, "midday slot {}", mid);
    }

    #[test]
    fn test_zero_coefficient_disables_adjustment() {
        let samples = meter_series(5, 5, 1.0);
        let temps = vec![WeatherPoint {
            time: t0(),
            temperature_c: 40.0,
        }];
        let config = LoadModelConfig::default();
        assert_eq!(config.temp_coefficient, 0.0);
        let forecast = predict_load(&samples, t0(), &temps, &config);
        assert!((forecast.load_kw[0] - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_safety_cap_applies() {
        let samples = meter_series(5, 5, 9.0);
        let config = LoadModelConfig::default();
        let forecast = predict_load(&samples, t0(), &[], &config);
        assert!(forecast.load_kw.iter().all(|&kw| kw <= config.max_load_kw));
    }
}

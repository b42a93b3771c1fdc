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
use voltion_types::{PvEstimate, SLOTS_PER_DAY, SLOT_MINUTES};

const WINDOW_MINUTES: i64 = 30;
const SLOTS_PER_WINDOW: i64 = WINDOW_MINUTES / SLOT_MINUTES;

/// Convert half-hour accumulated PV energy estimates into per-5-minute
/// power.
///
/// Solcast reports energy for the 30 minutes preceding each `period_end`,
/// so each window's `E` kWh is attributed uniformly: `E/6` kWh per slot,
/// i.e. `2·E` kW average. The input is accumulated energy, not
/// instantaneous power, so a linear ramp would invent information.
/// Slots with no covering estimate are 0 kW (night).
pub fn align_solar(estimates: &[PvEstimate], align_start: DateTime<Utc>) -> Vec<f64> {
    align_solar_n(estimates, align_start, SLOTS_PER_DAY)
}

pub fn align_solar_n(
    estimates: &[PvEstimate],
    align_start: DateTime<Utc>,
    slots: usize,
) -> Vec<f64> {
    let mut pv_kw = vec![0.0; slots];

    for estimate in estimates {
        let window_start = estimate.period_end - Duration::minutes(WINDOW_MINUTES);
        let offset_min = (window_start - align_start).num_minutes();

        // Snap the window onto the lattice; estimates keyed off-grid land in
        // the containing window.
        let first_slot = offset_min.div_euclid(SLOT_MINUTES);
        let kw = estimate.energy_kwh * 2.0;

        for i in 0..SLOTS_PER_WINDOW {
            let slot = first_slot + i;
            if slot >= 0 && (slot as usize) < slots {
                pv_kw[slot as usize] = kw;
            }
        }
    }

    pv_kw
}

/// Recompose a per-5-minute power series back into 30-minute energy sums.
/// Used by the aligner round-trip tests.
pub fn recompose_half_hours(pv_kw: &[f64]) -> Vec<f64> {
    pv_kw
        .chunks(SLOTS_PER_WINDOW as usize)
        .map(|window| window.iter().map(|kw| kw * SLOT_MINUTES as f64 / 60.0).sum())
        .collect()
}

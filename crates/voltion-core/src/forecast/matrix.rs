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
use voltion_types::{
    ForecastError, ForecastRow, PvEstimate, TariffInterval, WeatherPoint, SLOTS_PER_DAY,
    SLOT_MINUTES,
};

use super::load::LoadForecast;
use super::weather::temperature_at;
use super::{rates, solar};

/// The assembled 288-row forecast matrix. Pure assembly of the aligner
/// outputs; no numerical transformation happens here.
#[derive(Debug, Clone)]
pub struct ForecastMatrix {
    rows: Vec<ForecastRow>,
    pub align_start: DateTime<Utc>,
    /// Carried over from the load predictor for the diagnostics surface.
    pub degraded_load: bool,
}

impl ForecastMatrix {
    /// Zip the aligned import/export rates, PV power, load forecast and
    /// temperature series into the matrix.
    pub fn build(
        align_start: DateTime<Utc>,
        import_intervals: &[TariffInterval],
        export_intervals: &[TariffInterval],
        pv_estimates: &[PvEstimate],
        load: &LoadForecast,
        weather: &[WeatherPoint],
    ) -> Result<Self, ForecastError> {
        let import = rates::align_rates(import_intervals, align_start)?;
        let export = rates::align_rates(export_intervals, align_start)?;
        let pv_kw = solar::align_solar(pv_estimates, align_start);

        let mut rows = Vec::with_capacity(SLOTS_PER_DAY);
        for slot in 0..SLOTS_PER_DAY {
            let period_start = align_start + Duration::minutes(slot as i64 * SLOT_MINUTES);
            let period_end = period_start + Duration::minutes(SLOT_MINUTES);
            let midpoint = period_start + Duration::seconds(SLOT_MINUTES * 30);

            rows.push(ForecastRow {
                slot_index: slot,
                period_start,
                period_end,
                import_rate_c: import[slot],
                export_rate_c: export[slot],
                pv_kw: pv_kw[slot],
                load_kw: load.load_kw.get(slot).copied().unwrap_or(0.0),
                temp_c: temperature_at(weather, midpoint),
            });
        }

        Ok(Self {
            rows,
            align_start,
            degraded_load: load.degraded,
        })
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

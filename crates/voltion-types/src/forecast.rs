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
use serde::{Deserialize, Serialize};

/// Number of 5-minute slots in the 24-hour planning horizon.
pub const SLOTS_PER_DAY: usize = 288;

/// Length of one planning slot in minutes.
pub const SLOT_MINUTES: i64 = 5;

// ============= Provider payloads =============

/// A single tariff interval as reported by the price provider.
///
/// Intervals may be 5 or 30 minutes long; the aligner expands them onto the
/// uniform 5-minute lattice. `per_kwh` is in cents and may be negative on the
/// export feed (a penalty for exporting).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffInterval {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Price in cents per kWh
    pub per_kwh: f64,
    /// Interval kind as reported by the provider (ACTUAL / FORECAST)
    #[serde(default)]
    pub period_type: String,
}

/// A half-hour PV energy estimate keyed by the end of its window.
///
/// Solcast reports accumulated energy for the preceding 30 minutes, not
/// instantaneous power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvEstimate {
    /// End of the 30-minute window this estimate covers
    pub period_end: DateTime<Utc>,
    /// Estimated energy over the window (kWh)
    pub energy_kwh: f64,
}

/// A temperature forecast point from the weather provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherPoint {
    pub time: DateTime<Utc>,
    pub temperature_c: f64,
}

/// One raw sample from the cumulative energy meter history.
///
/// `state_kwh` increases monotonically except across midnight resets. The
/// load predictor repairs those discontinuities itself, so the sample is kept
/// raw here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadHistorySample {
    pub entity_id: String,
    pub state_kwh: f64,
    pub last_changed: DateTime<Utc>,
}

/// Instantaneous telemetry read from the plant at the start of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Battery state of charge (0-100 %)
    pub soc_pct: f64,
    /// Battery power (kW, positive = charging)
    pub battery_kw: f64,
    /// PV production (kW)
    pub solar_kw: f64,
    /// Grid power (kW, positive = import)
    pub grid_kw: f64,
    /// Derived house load (kW, never negative)
    pub load_kw: f64,
}

// ============= Aligned forecast matrix =============

/// One row of the 288-row forecast matrix (one 5-minute slot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub slot_index: usize,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Import price (cents per kWh)
    pub import_rate_c: f64,
    /// Export price (cents per kWh, may be negative)
    pub export_rate_c: f64,
    /// Expected PV generation over the slot (kW)
    pub pv_kw: f64,
    /// Expected household load over the slot (kW)
    pub load_kw: f64,
    /// Forecast outdoor temperature at the slot midpoint
    pub temp_c: Option<f64>,
}

impl ForecastRow {
    /// Slot duration in hours (5 minutes).
    pub fn duration_h(&self) -> f64 {
        SLOT_MINUTES as f64 / 60.0
    }

    /// Net household balance over the slot (kWh). Positive means the house
    /// draws net energy, negative means excess generation.
    pub fn balance_kwh(&self) -> f64 {
        (self.load_kw - self.pv_kw) * self.duration_h()
    }

}

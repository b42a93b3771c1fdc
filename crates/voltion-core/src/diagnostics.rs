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

//! The diagnostic surface the core exposes: the simulated plan table, the
//! raw policy vector and the scalar status. Rendering (HTML, JSON endpoint)
//! happens outside the core.

use bevy_ecs::prelude::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use voltion_types::{BatteryParameters, BatteryState, TelemetrySample};

use crate::forecast::ForecastMatrix;
use crate::solver::{Block, Solution};

/// Power below which a simulated slot counts as idle.
const PLAN_EPS_KW: f64 = 0.05;

/// One row of the diagnostic plan table. Values are pre-formatted strings,
/// matching the rendering the dashboards expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRow {
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Local Time")]
    pub local_time: String,
    #[serde(rename = "Import Rate")]
    pub import_rate: String,
    #[serde(rename = "Export Rate")]
    pub export_rate: String,
    #[serde(rename = "FSM State")]
    pub fsm_state: String,
    #[serde(rename = "Inverter Limit")]
    pub inverter_limit: String,
    #[serde(rename = "PV Forecast")]
    pub pv_forecast: String,
    #[serde(rename = "Load Forecast")]
    pub load_forecast: String,
    #[serde(rename = "Air Temp Forecast")]
    pub air_temp_forecast: String,
    #[serde(rename = "SoC Forecast")]
    pub soc_forecast: String,
    #[serde(rename = "Interval Cost")]
    pub interval_cost: String,
    #[serde(rename = "Cumulative Total")]
    pub cumulative_total: String,
}

/// Serializable snapshot of the whole control state, refreshed after every
/// accepted solve.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: BatteryState,
    pub reason: String,
    /// Live import price (cents per kWh)
    pub current_price: Option<f64>,
    pub soc: f64,
    pub solar_power: f64,
    pub load_power: f64,
    pub grid_power: f64,
    pub battery_power: f64,
    /// True when the load forecast fell back to a flat mean
    pub degraded_forecast: bool,
    /// Raw target-SoC vector from the solver (length B + 1)
    pub policy: Vec<f64>,
    /// Expected total cost of the active policy (cents)
    pub expected_cost_c: Option<f64>,
    pub plan: Vec<PlanRow>,
    pub last_update: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn update_telemetry(&mut self, telemetry: &TelemetrySample) {
        self.soc = telemetry.soc_pct;
        self.solar_power = telemetry.solar_kw;
        self.load_power = telemetry.load_kw;
        self.grid_power = telemetry.grid_kw;
        self.battery_power = telemetry.battery_kw;
    }
}

/// Simulate the policy over the matrix rows and render the plan table.
///
/// Each block's SoC delta is spread uniformly over its slots (the solver
/// plans energy per block, not a within-block shape), costs follow the same
/// signed convention as the solver's step cost, and the per-slot state is
/// the one the action mapper would emit for that battery flow.
pub fn build_plan(
    matrix: &ForecastMatrix,
    blocks: &[Block],
    solution: &Solution,
    params: &BatteryParameters,
    timezone: Option<chrono_tz::Tz>,
) -> Vec<PlanRow> {
    let mut rows = Vec::with_capacity(matrix.len());
    let mut cumulative_dollars = 0.0;
    let mut soc = *solution.policy.first().unwrap_or(&0.0);

    for block in blocks {
        let target = solution
            .policy
            .get(block.block_index + 1)
            .copied()
            .unwrap_or(soc);
        let battery_kw = params.soc_delta_to_kwh(target - soc) / block.duration_h();
        let soc_step = (target - soc) / block.slot_count() as f64;

        for slot in block.start_slot..block.end_slot_exclusive {
            let row = &matrix.rows()[slot];
            let duration_h = row.duration_h();

            let state = if battery_kw > PLAN_EPS_KW {
                if row.pv_kw - row.load_kw >= battery_kw {
                    BatteryState::ChargeSolar
                } else {
                    BatteryState::ChargeGrid
                }
            } else if battery_kw < -PLAN_EPS_KW {
                BatteryState::DischargeHome
            } else {
                BatteryState::Idle
            };

            let limit_pct = if params.inverter_limit_kw > 0.0 {
                (battery_kw.abs() / params.inverter_limit_kw * 100.0).min(100.0)
            } else {
                0.0
            };

            let grid_kwh = (row.load_kw - row.pv_kw + battery_kw) * duration_h;
            let rate = if grid_kwh < 0.0 {
                row.export_rate_c
            } else {
                row.import_rate_c
            };
            let interval_dollars = grid_kwh * rate / 100.0;
            cumulative_dollars += interval_dollars;

            let local_time = match timezone {
                Some(tz) => row.period_start.with_timezone(&tz).format("%H:%M").to_string(),
                None => row.period_start.format("%H:%M").to_string(),
            };

            rows.push(PlanRow {
                time: row.period_start.format("%H:%M").to_string(),
                local_time,
                import_rate: format!("{:.2}", row.import_rate_c),
                export_rate: format!("{:.2}", row.export_rate_c),
                fsm_state: state.to_string(),
                inverter_limit: format!("{:.0}%", limit_pct),
                pv_forecast: format!("{:.2}", row.pv_kw * duration_h),
                load_forecast: format!("{:.2}", row.load_kw),
                air_temp_forecast: row
                    .temp_c
                    .map(|t| format!("{:.1}°C", t))
                    .unwrap_or_else(|| "—".to_string()),
                soc_forecast: format!("{:.1}%", soc),
                interval_cost: format!("${:.4}", interval_dollars),
                cumulative_total: format!("${:.2}", cumulative_dollars),
            });

            soc += soc_step;
        }

        soc = target;
    }

    rows
}

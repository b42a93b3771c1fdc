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

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main application configuration, loaded from `voltion.toml`.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Battery and inverter calibration
    pub battery: BatteryParameters,

    /// Home Assistant entity ids
    pub entities: EntitiesConfig,

    /// Load predictor calibration
    #[serde(default)]
    pub load_model: LoadModelConfig,

    /// System settings
    #[serde(default)]
    pub system: SystemSettings,
}

impl AppConfig {
    /// Validate the whole configuration. Any error here is fatal: the core
    /// refuses to run until reconfigured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.battery.validate()?;
        self.system.validate()?;
        self.entities.validate()?;
        Ok(())
    }
}

/// Process-wide battery calibration, read by each solve as an immutable
/// snapshot. Updates apply between ticks only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryParameters {
    /// Usable battery capacity (kWh)
    #[serde(default = "default_capacity_kwh")]
    pub capacity_kwh: f64,

    /// Maximum battery charge power (kW)
    #[serde(default = "default_battery_rate_kw")]
    pub max_charge_kw: f64,

    /// Maximum battery discharge power (kW)
    #[serde(default = "default_battery_rate_kw")]
    pub max_discharge_kw: f64,

    /// Inverter cap on net grid flow (kW). Clamps the action mapper's power
    /// limit, not the solver's internal battery delta.
    #[serde(default = "default_inverter_limit_kw")]
    pub inverter_limit_kw: f64,

    /// Lowest SoC the planner may target (%)
    #[serde(default = "default_soc_min_pct")]
    pub soc_min_pct: f64,

    /// Highest SoC the planner may target (%)
    #[serde(default = "default_soc_max_pct")]
    pub soc_max_pct: f64,

    /// Discretization step of candidate end-of-block SoCs (%)
    #[serde(default = "default_soc_grid_pct")]
    pub soc_grid_pct: f64,
}

fn default_capacity_kwh() -> f64 {
    27.0
}
fn default_battery_rate_kw() -> f64 {
    6.3
}
fn default_inverter_limit_kw() -> f64 {
    10.0
}
fn default_soc_min_pct() -> f64 {
    0.0
}
fn default_soc_max_pct() -> f64 {
    100.0
}
fn default_soc_grid_pct() -> f64 {
    5.0
}

impl Default for BatteryParameters {
    fn default() -> Self {
        Self {
            capacity_kwh: default_capacity_kwh(),
            max_charge_kw: default_battery_rate_kw(),
            max_discharge_kw: default_battery_rate_kw(),
            inverter_limit_kw: default_inverter_limit_kw(),
            soc_min_pct: default_soc_min_pct(),
            soc_max_pct: default_soc_max_pct(),
            soc_grid_pct: default_soc_grid_pct(),
        }
    }
}

impl BatteryParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_kwh <= 0.0 {
            return Err(ConfigError::NonPositiveCapacity(self.capacity_kwh));
        }
        for (name, value) in [
            ("max_charge_kw", self.max_charge_kw),
            ("max_discharge_kw", self.max_discharge_kw),
            ("inverter_limit_kw", self.inverter_limit_kw),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::NonPositivePowerLimit { name, value });
            }
        }
        if ![1.0, 5.0, 10.0, 25.0].contains(&self.soc_grid_pct) {
            return Err(ConfigError::InvalidSocGrid(self.soc_grid_pct));
        }
        if self.soc_min_pct < 0.0
            || self.soc_max_pct > 100.0
            || self.soc_min_pct >= self.soc_max_pct
        {
            return Err(ConfigError::InvalidSocRange {
                min: self.soc_min_pct,
                max: self.soc_max_pct,
            });
        }
        Ok(())
    }

    /// Energy corresponding to a SoC percentage delta (kWh).
    pub fn soc_delta_to_kwh(&self, delta_pct: f64) -> f64 {
        delta_pct / 100.0 * self.capacity_kwh
    }
}

/// Home Assistant entity ids for telemetry, forecasts and command hooks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitiesConfig {
    /// Battery state of charge sensor (%)
    pub battery_soc: String,

    /// Battery power sensor (kW)
    pub battery_power: String,

    /// Invert the battery power sign (some meters report discharge positive)
    #[serde(default)]
    pub battery_power_invert: bool,

    /// PV production sensor (kW)
    pub solar_power: String,

    /// Grid power sensor (kW)
    pub grid_power: String,

    /// Invert the grid power sign
    #[serde(default)]
    pub grid_power_invert: bool,

    /// Cumulative house energy meter (kWh, resets at midnight)
    pub load_today: String,

    /// Amber-style import tariff sensor
    pub import_price: String,

    /// Amber-style export tariff sensor
    pub export_price: String,

    /// Weather entity with an hourly temperature forecast
    pub weather: String,

    /// Solcast forecast entities
    #[serde(default = "default_solcast_today")]
    pub solcast_today: String,
    #[serde(default = "default_solcast_tomorrow")]
    pub solcast_tomorrow: String,

    // The four optional command hooks. Unconfigured hooks put the system in
    // observation-only mode for that transition.
    #[serde(default)]
    pub script_charge_start: Option<String>,
    #[serde(default)]
    pub script_charge_stop: Option<String>,
    #[serde(default)]
    pub script_discharge_start: Option<String>,
    #[serde(default)]
    pub script_discharge_stop: Option<String>,
}

fn default_solcast_today() -> String {
    "sensor.solcast_pv_forecast_today".to_string()
}
fn default_solcast_tomorrow() -> String {
    "sensor.solcast_pv_forecast_tomorrow".to_string()
}

impl EntitiesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("entities.battery_soc", &self.battery_soc),
            ("entities.import_price", &self.import_price),
            ("entities.export_price", &self.export_price),
            ("entities.load_today", &self.load_today),
        ] {
            if value.is_empty() {
                return Err(ConfigError::MissingEntity(name));
            }
        }
        Ok(())
    }

    /// All configured command hooks, for diagnostics.
    pub fn hook_count(&self) -> usize {
        [
            &self.script_charge_start,
            &self.script_charge_stop,
            &self.script_discharge_start,
            &self.script_discharge_stop,
        ]
        .iter()
        .filter(|h| h.is_some())
        .count()
    }
}

/// Load predictor calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadModelConfig {
    /// Multiplicative temperature coefficient per degree away from the
    /// baseline. Zero disables the adjustment.
    #[serde(default)]
    pub temp_coefficient: f64,

    /// Baseline outdoor temperature (°C) at which no adjustment applies
    #[serde(default = "default_temp_baseline")]
    pub temp_baseline_c: f64,

    /// Safety cap on any forecast slot (kW)
    #[serde(default = "default_max_load_kw")]
    pub max_load_kw: f64,

    /// Days of meter history to request
    #[serde(default = "default_history_days")]
    pub history_days: u32,
}

fn default_temp_baseline() -> f64 {
    18.0
}
fn default_max_load_kw() -> f64 {
    4.0
}
fn default_history_days() -> u32 {
    5
}

impl Default for LoadModelConfig {
    fn default() -> Self {
        Self {
            temp_coefficient: 0.0,
            temp_baseline_c: default_temp_baseline(),
            max_load_kw: default_max_load_kw(),
            history_days: default_history_days(),
        }
    }
}

/// System-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Control tick cadence (seconds)
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    /// Solve deadline (seconds)
    #[serde(default = "default_solve_timeout")]
    pub solve_timeout_secs: u64,

    /// Home Assistant base URL (falls back to HA_BASE_URL)
    #[serde(default)]
    pub ha_base_url: Option<String>,

    /// Home Assistant long-lived token (falls back to HA_TOKEN)
    #[serde(default)]
    pub ha_token: Option<String>,
}

fn default_update_interval() -> u64 {
    300
}
fn default_solve_timeout() -> u64 {
    30
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            solve_timeout_secs: default_solve_timeout(),
            ha_base_url: None,
            ha_token: None,
        }
    }
}

impl SystemSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval_secs == 0 {
            return Err(ConfigError::InvalidUpdateInterval);
        }
        Ok(())
    }
}

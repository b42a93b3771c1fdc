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

//! Adapter implementations of the core provider traits on top of the Home
//! Assistant REST API: Amber-style tariff sensors, Solcast forecast
//! entities, the weather entity, recorder history and the script hooks.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use voltion_core::traits::{
    CommandHook, CommandSink, LoadHistoryDataSource, SolarForecastDataSource, TariffDataSource,
    TelemetryDataSource, WeatherDataSource,
};
use voltion_types::{
    EntitiesConfig, LoadHistorySample, PvEstimate, TariffInterval, TelemetrySample, WeatherPoint,
};

use crate::client::HomeAssistantClient;
use crate::errors::{EntityRole, HaError};

// ============= Tariffs (Amber-style sensor) =============

/// Reads import and export tariff forecasts from Amber Electric style
/// sensors, which expose the upcoming intervals in a `future_prices` (or
/// `variable_intervals`) attribute.
pub struct AmberTariffAdapter {
    client: Arc<HomeAssistantClient>,
    import_entity: String,
    export_entity: String,
}

impl AmberTariffAdapter {
    pub fn new(
        client: Arc<HomeAssistantClient>,
        import_entity: impl Into<String>,
        export_entity: impl Into<String>,
    ) -> Self {
        Self {
            client,
            import_entity: import_entity.into(),
            export_entity: export_entity.into(),
        }
    }

    async fn read_entity(
        &self,
        role: EntityRole,
        entity_id: &str,
    ) -> Result<Vec<TariffInterval>> {
        let state = self.client.get_state(role, entity_id).await?;
        let raw = state
            .attributes
            .get("future_prices")
            .or_else(|| state.attributes.get("variable_intervals"))
            .ok_or_else(|| HaError::MalformedPayload {
                role,
                detail: format!("no future_prices attribute on {}", entity_id),
            })?;

        let intervals = parse_tariff_attribute(raw);
        debug!("💰 Loaded {} {} intervals from {}", intervals.len(), role, entity_id);
        Ok(intervals)
    }
}

#[async_trait]
impl TariffDataSource for AmberTariffAdapter {
    async fn read_import_intervals(&self) -> Result<Vec<TariffInterval>> {
        self.read_entity(EntityRole::ImportTariff, &self.import_entity)
            .await
    }

    async fn read_export_intervals(&self) -> Result<Vec<TariffInterval>> {
        self.read_entity(EntityRole::ExportTariff, &self.export_entity)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.client.reachable().await)
    }

    fn name(&self) -> &str {
        "ha-amber-tariffs"
    }
}

/// Parse an Amber-style interval list: `periodStart` / `periodEnd` ISO
/// timestamps and `perKwh` in cents. Malformed entries are skipped.
pub fn parse_tariff_attribute(raw: &Value) -> Vec<TariffInterval> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    let mut intervals: Vec<TariffInterval> = items
        .iter()
        .filter_map(|item| {
            let start = parse_instant(item.get("periodStart")?)?;
            let end = parse_instant(item.get("periodEnd")?)?;
            let per_kwh = item.get("perKwh")?.as_f64()?;
            Some(TariffInterval {
                period_start: start,
                period_end: end,
                per_kwh,
                period_type: item
                    .get("periodType")
                    .and_then(|t| t.as_str())
                    .unwrap_or("UNKNOWN")
                    .to_string(),
            })
        })
        .collect();

    intervals.sort_by_key(|i| i.period_start);
    intervals
}

// ============= Solar (Solcast HA integration) =============

/// Reads the half-hour PV forecast from the Solcast HA integration's today
/// and tomorrow entities (`detailedForecast` attribute).
pub struct SolcastForecastAdapter {
    client: Arc<HomeAssistantClient>,
    today_entity: String,
    tomorrow_entity: String,
}

impl SolcastForecastAdapter {
    pub fn new(
        client: Arc<HomeAssistantClient>,
        today_entity: impl Into<String>,
        tomorrow_entity: impl Into<String>,
    ) -> Self {
        Self {
            client,
            today_entity: today_entity.into(),
            tomorrow_entity: tomorrow_entity.into(),
        }
    }
}

#[async_trait]
impl SolarForecastDataSource for SolcastForecastAdapter {
    async fn read_estimates(&self) -> Result<Vec<PvEstimate>> {
        let mut estimates = Vec::new();

        for entity_id in [&self.today_entity, &self.tomorrow_entity] {
            let state = match self
                .client
                .get_state(EntityRole::SolarForecast, entity_id)
                .await
            {
                Ok(state) => state,
                Err(e) => {
                    warn!("⚠️ {}", e);
                    continue;
                }
            };

            let Some(detailed) = state
                .attributes
                .get("detailedForecast")
                .or_else(|| state.attributes.get("detailed_forecast"))
                .or_else(|| state.attributes.get("forecasts"))
            else {
                debug!("No detailed forecast attribute in {}", entity_id);
                continue;
            };

            estimates.extend(parse_solcast_attribute(detailed));
        }

        estimates.sort_by_key(|e| e.period_end);
        debug!("☀️ Loaded {} Solcast estimates", estimates.len());
        Ok(estimates)
    }

    fn name(&self) -> &str {
        "ha-solcast"
    }
}

/// Parse Solcast detailed forecast items. `pv_estimate` is the mean power
/// (kW) over the period (default PT30M), converted here into the window's
/// energy keyed by its end.
pub fn parse_solcast_attribute(raw: &Value) -> Vec<PvEstimate> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let start = item
                .get("period_start")
                .and_then(parse_instant)
                .or_else(|| {
                    item.get("period_end")
                        .and_then(parse_instant)
                        .map(|end| end - Duration::minutes(30))
                })?;
            let minutes = item
                .get("period")
                .and_then(|p| p.as_str())
                .and_then(parse_iso_minutes)
                .unwrap_or(30);
            let pv_kw = item.get("pv_estimate")?.as_f64()?;

            Some(PvEstimate {
                period_end: start + Duration::minutes(minutes),
                energy_kwh: pv_kw * minutes as f64 / 60.0,
            })
        })
        .collect()
}

/// Parse the "PT30M" style period designator into minutes.
fn parse_iso_minutes(period: &str) -> Option<i64> {
    period
        .strip_prefix("PT")?
        .strip_suffix('M')?
        .parse::<i64>()
        .ok()
}

// ============= Weather =============

/// Reads the hourly temperature forecast from a weather entity's
/// `forecast` attribute.
pub struct HaWeatherAdapter {
    client: Arc<HomeAssistantClient>,
    entity_id: String,
}

impl HaWeatherAdapter {
    pub fn new(client: Arc<HomeAssistantClient>, entity_id: impl Into<String>) -> Self {
        Self {
            client,
            entity_id: entity_id.into(),
        }
    }
}

#[async_trait]
impl WeatherDataSource for HaWeatherAdapter {
    async fn read_forecast(&self) -> Result<Vec<WeatherPoint>> {
        let state = self
            .client
            .get_state(EntityRole::Weather, &self.entity_id)
            .await?;
        let Some(raw) = state.attributes.get("forecast") else {
            return Ok(Vec::new());
        };
        Ok(parse_weather_attribute(raw))
    }

    fn name(&self) -> &str {
        "ha-weather"
    }
}

pub fn parse_weather_attribute(raw: &Value) -> Vec<WeatherPoint> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    let mut points: Vec<WeatherPoint> = items
        .iter()
        .filter_map(|item| {
            Some(WeatherPoint {
                time: parse_instant(item.get("datetime")?)?,
                temperature_c: item.get("temperature")?.as_f64()?,
            })
        })
        .collect();

    points.sort_by_key(|p| p.time);
    points
}

// ============= Load history =============

/// Fetches the cumulative energy meter history through the recorder API.
pub struct HaLoadHistoryAdapter {
    client: Arc<HomeAssistantClient>,
}

impl HaLoadHistoryAdapter {
    pub fn new(client: Arc<HomeAssistantClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LoadHistoryDataSource for HaLoadHistoryAdapter {
    async fn read_history(
        &self,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LoadHistorySample>> {
        let raw = self.client.get_history(entity_id, start, end).await?;

        // Non-numeric states (unavailable, unknown) are dropped here; the
        // predictor handles the midnight resets in what remains.
        let samples: Vec<LoadHistorySample> = raw
            .iter()
            .filter_map(|s| {
                let state_kwh: f64 = s.state.parse().ok()?;
                let last_changed = DateTime::parse_from_rfc3339(&s.last_changed)
                    .ok()?
                    .with_timezone(&Utc);
                Some(LoadHistorySample {
                    entity_id: entity_id.to_string(),
                    state_kwh,
                    last_changed,
                })
            })
            .collect();

        debug!(
            "📊 Load history: {} usable of {} raw samples",
            samples.len(),
            raw.len()
        );
        Ok(samples)
    }

    fn name(&self) -> &str {
        "ha-recorder-history"
    }
}

// ============= Telemetry =============

/// Reads live plant telemetry from the configured sensors, applying the
/// inversion flags and deriving the house load.
pub struct HaTelemetryAdapter {
    client: Arc<HomeAssistantClient>,
    entities: EntitiesConfig,
}

impl HaTelemetryAdapter {
    pub fn new(client: Arc<HomeAssistantClient>, entities: EntitiesConfig) -> Self {
        Self { client, entities }
    }

    async fn numeric(&self, entity_id: &str) -> f64 {
        match self.client.get_state(EntityRole::Telemetry, entity_id).await {
            Ok(state) => state.numeric_state().unwrap_or(0.0),
            Err(e) => {
                debug!("{}", e);
                0.0
            }
        }
    }
}

#[async_trait]
impl TelemetryDataSource for HaTelemetryAdapter {
    async fn read_telemetry(&self) -> Result<TelemetrySample> {
        let soc_pct = self.numeric(&self.entities.battery_soc).await;
        let solar_kw = self.numeric(&self.entities.solar_power).await;

        let mut battery_kw = self.numeric(&self.entities.battery_power).await;
        if self.entities.battery_power_invert {
            battery_kw = -battery_kw;
        }

        let mut grid_kw = self.numeric(&self.entities.grid_power).await;
        if self.entities.grid_power_invert {
            grid_kw = -grid_kw;
        }

        Ok(TelemetrySample {
            soc_pct,
            battery_kw,
            solar_kw,
            grid_kw,
            load_kw: derive_load_kw(solar_kw, grid_kw, battery_kw),
        })
    }

    fn name(&self) -> &str {
        "ha-telemetry"
    }
}

/// House load derived from the power balance: solar plus import minus
/// battery charge, floored at zero (grid positive = import, battery
/// positive = charge).
pub fn derive_load_kw(solar_kw: f64, grid_kw: f64, battery_kw: f64) -> f64 {
    (solar_kw + grid_kw - battery_kw).max(0.0)
}

// ============= Command hooks =============

/// Maps the four command hooks onto the configured Home Assistant scripts.
pub struct HaScriptSink {
    client: Arc<HomeAssistantClient>,
    entities: EntitiesConfig,
}

impl HaScriptSink {
    pub fn new(client: Arc<HomeAssistantClient>, entities: EntitiesConfig) -> Self {
        Self { client, entities }
    }

    fn script_for(&self, hook: CommandHook) -> Option<&String> {
        match hook {
            CommandHook::ChargeStart => self.entities.script_charge_start.as_ref(),
            CommandHook::ChargeStop => self.entities.script_charge_stop.as_ref(),
            CommandHook::DischargeStart => self.entities.script_discharge_start.as_ref(),
            CommandHook::DischargeStop => self.entities.script_discharge_stop.as_ref(),
        }
    }
}

#[async_trait]
impl CommandSink for HaScriptSink {
    async fn trigger(&self, hook: CommandHook) -> Result<bool> {
        let Some(script) = self.script_for(hook) else {
            return Ok(false);
        };
        self.client.turn_on_script(script).await?;
        Ok(true)
    }

    fn name(&self) -> &str {
        "ha-scripts"
    }
}

// ============= Parsing helpers =============

fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

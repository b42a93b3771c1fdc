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

//! Data source traits. The core never knows about Home Assistant, REST or
//! sensor attributes; adapters implement these seams.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use voltion_types::{LoadHistorySample, PvEstimate, TariffInterval, TelemetrySample, WeatherPoint};

/// Source of import and export tariff forecasts. The two series are
/// independent feeds and must stay separable.
#[async_trait]
pub trait TariffDataSource: Send + Sync {
    /// Read the import tariff intervals, sorted by period start.
    async fn read_import_intervals(&self) -> Result<Vec<TariffInterval>>;

    /// Read the export tariff intervals, sorted by period start.
    async fn read_export_intervals(&self) -> Result<Vec<TariffInterval>>;

    /// Check if the source is reachable.
    async fn health_check(&self) -> Result<bool>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Source of half-hour PV energy estimates.
#[async_trait]
pub trait SolarForecastDataSource: Send + Sync {
    async fn read_estimates(&self) -> Result<Vec<PvEstimate>>;

    fn name(&self) -> &str;
}

/// Source of the temperature forecast.
#[async_trait]
pub trait WeatherDataSource: Send + Sync {
    async fn read_forecast(&self) -> Result<Vec<WeatherPoint>>;

    fn name(&self) -> &str;
}

/// Source of cumulative energy meter history for the load predictor.
#[async_trait]
pub trait LoadHistoryDataSource: Send + Sync {
    /// Fetch raw cumulative samples for `entity_id` over `[start, end]`,
    /// sorted ascending. Samples are raw: midnight resets are preserved for
    /// the predictor to repair.
    async fn read_history(
        &self,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LoadHistorySample>>;

    fn name(&self) -> &str;
}

/// Source of live plant telemetry.
#[async_trait]
pub trait TelemetryDataSource: Send + Sync {
    async fn read_telemetry(&self) -> Result<TelemetrySample>;

    fn name(&self) -> &str;
}

/// One of the four external command hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandHook {
    ChargeStart,
    ChargeStop,
    DischargeStart,
    DischargeStop,
}

impl CommandHook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChargeStart => "charge-start",
            Self::ChargeStop => "charge-stop",
            Self::DischargeStart => "discharge-start",
            Self::DischargeStop => "discharge-stop",
        }
    }
}

/// Sink for the command hooks. Returns `false` when the hook is not
/// configured, which leaves the system in observation-only mode for that
/// transition.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn trigger(&self, hook: CommandHook) -> Result<bool>;

    fn name(&self) -> &str;
}

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

//! Background fetch workers: tokio loops that poll the Home Assistant
//! providers and push updates into the ECS world through the forecast
//! channel. The scheduling thread itself never performs I/O.

use bevy_app::prelude::*;
use bevy_ecs::prelude::*;
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tracing::{info, warn};
use voltion_core::resources::{
    ForecastUpdate, ForecastUpdateSender, HistorySourceResource, SolarSourceResource,
    TariffSourceResource, TelemetrySourceResource, WeatherSourceResource,
};
use voltion_types::AppConfig;

const TELEMETRY_INTERVAL: Duration = Duration::from_secs(60);
const TARIFF_INTERVAL: Duration = Duration::from_secs(300);
const SOLAR_INTERVAL: Duration = Duration::from_secs(300);
const WEATHER_INTERVAL: Duration = Duration::from_secs(900);
const HISTORY_INTERVAL: Duration = Duration::from_secs(900);

/// Home Assistant plugin: spawns one fetch loop per provider at startup.
pub struct HaPlugin;

impl Plugin for HaPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_fetch_workers);
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_fetch_workers(
    sender: Res<ForecastUpdateSender>,
    tariffs: Res<TariffSourceResource>,
    solar: Res<SolarSourceResource>,
    weather: Res<WeatherSourceResource>,
    history: Res<HistorySourceResource>,
    telemetry: Res<TelemetrySourceResource>,
    config: Res<AppConfig>,
) {
    info!("🏠 Spawning Home Assistant fetch workers");

    // Tariffs: both feeds in one update so the matrix never mixes versions.
    {
        let source = tariffs.0.clone();
        let tx = sender.0.clone();
        tokio::spawn(async move {
            loop {
                match (
                    source.read_import_intervals().await,
                    source.read_export_intervals().await,
                ) {
                    (Ok(import), Ok(export)) => {
                        let _ = tx.send(ForecastUpdate::Tariffs { import, export });
                    }
                    (Err(e), _) | (_, Err(e)) => {
                        warn!("⚠️ Tariff fetch failed ({}): {}", source.name(), e);
                    }
                }
                tokio::time::sleep(TARIFF_INTERVAL).await;
            }
        });
    }

    {
        let source = solar.0.clone();
        let tx = sender.0.clone();
        tokio::spawn(async move {
            loop {
                match source.read_estimates().await {
                    Ok(estimates) => {
                        let _ = tx.send(ForecastUpdate::Solar(estimates));
                    }
                    Err(e) => warn!("⚠️ Solar forecast fetch failed ({}): {}", source.name(), e),
                }
                tokio::time::sleep(SOLAR_INTERVAL).await;
            }
        });
    }

    {
        let source = weather.0.clone();
        let tx = sender.0.clone();
        tokio::spawn(async move {
            loop {
                match source.read_forecast().await {
                    Ok(points) => {
                        let _ = tx.send(ForecastUpdate::Weather(points));
                    }
                    Err(e) => warn!("⚠️ Weather fetch failed ({}): {}", source.name(), e),
                }
                tokio::time::sleep(WEATHER_INTERVAL).await;
            }
        });
    }

    {
        let source = history.0.clone();
        let tx = sender.0.clone();
        let entity_id = config.entities.load_today.clone();
        let days = config.load_model.history_days as i64;
        tokio::spawn(async move {
            loop {
                let end = Utc::now();
                let start = end - ChronoDuration::days(days);
                match source.read_history(&entity_id, start, end).await {
                    Ok(samples) => {
                        let _ = tx.send(ForecastUpdate::LoadHistory(samples));
                    }
                    Err(e) => warn!("⚠️ Load history fetch failed ({}): {}", source.name(), e),
                }
                tokio::time::sleep(HISTORY_INTERVAL).await;
            }
        });
    }

    {
        let source = telemetry.0.clone();
        let tx = sender.0.clone();
        tokio::spawn(async move {
            loop {
                match source.read_telemetry().await {
                    Ok(sample) => {
                        let _ = tx.send(ForecastUpdate::Telemetry(sample));
                    }
                    Err(e) => warn!("⚠️ Telemetry read failed ({}): {}", source.name(), e),
                }
                tokio::time::sleep(TELEMETRY_INTERVAL).await;
            }
        });
    }
}

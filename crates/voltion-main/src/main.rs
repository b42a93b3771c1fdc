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

mod config;
mod version;

use anyhow::Result;
use bevy_app::{prelude::*, ScheduleRunnerPlugin, TaskPoolPlugin};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use voltion_core::{
    forecast_channel, CalibrationResource, CommandSinkResource, HistorySourceResource,
    SolarSourceResource, SolveDispatcher, SolveDispatcherResource, TariffSourceResource,
    TelemetrySourceResource, TickState, TimezoneConfig, VoltionCorePlugin, WeatherSourceResource,
};
use voltion_ha::{
    AmberTariffAdapter, HaLoadHistoryAdapter, HaPlugin, HaScriptSink, HaTelemetryAdapter,
    HaWeatherAdapter, HomeAssistantClient, SolcastForecastAdapter,
};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" => {
                println!("VoltION - Home Battery Tariff Automation");
                println!("Version: {}", version::VERSION);
                println!();
                println!("Usage: voltion [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help    Print this help message");
                println!("  -v, --version Print version");
                return Ok(());
            }
            "--version" | "-v" => {
                println!("{}", version::VERSION);
                return Ok(());
            }
            _ => {}
        }
    }

    // Create tokio runtime for async HTTP operations; the bevy loop runs in
    // a blocking task so tokio keeps driving the fetch workers.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    runtime.block_on(async {
        tokio::task::spawn_blocking(initialize_and_run)
            .await
            .expect("Bevy task panicked")
    })
}

fn initialize_and_run() -> Result<()> {
    // Initialize tracing with env filter support (RUST_LOG)
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = config::load_config()?;
    info!("🚀 Starting VoltION - Home Battery Tariff Automation");
    config::log_summary(&config);

    let ha_client = Arc::new(HomeAssistantClient::from_config(
        config.system.ha_base_url.clone(),
        config.system.ha_token.clone(),
    )?);

    // Local timezone for the plan table rendering.
    let timezone = std::env::var("TZ")
        .ok()
        .and_then(|tz| tz.parse::<chrono_tz::Tz>().ok());
    if let Some(tz) = timezone {
        info!("🌍 Rendering local times in {}", tz);
    } else {
        warn!("⚠️ No TZ configured, plan table local times fall back to UTC");
    }

    // Data sources
    let tariff_source = Arc::new(AmberTariffAdapter::new(
        ha_client.clone(),
        config.entities.import_price.clone(),
        config.entities.export_price.clone(),
    ));
    let solar_source = Arc::new(SolcastForecastAdapter::new(
        ha_client.clone(),
        config.entities.solcast_today.clone(),
        config.entities.solcast_tomorrow.clone(),
    ));
    let weather_source = Arc::new(HaWeatherAdapter::new(
        ha_client.clone(),
        config.entities.weather.clone(),
    ));
    let history_source = Arc::new(HaLoadHistoryAdapter::new(ha_client.clone()));
    let telemetry_source = Arc::new(HaTelemetryAdapter::new(
        ha_client.clone(),
        config.entities.clone(),
    ));
    let command_sink = Arc::new(HaScriptSink::new(ha_client.clone(), config.entities.clone()));

    let (update_sender, update_channel) = forecast_channel();

    info!("🎮 Starting ECS application...");

    let mut app = App::new();
    app.add_plugins(TaskPoolPlugin::default())
        .add_plugins(ScheduleRunnerPlugin::run_loop(Duration::from_millis(100)))
        .add_plugins((VoltionCorePlugin, HaPlugin))
        .insert_resource(CalibrationResource::new(config.battery.clone()))
        .insert_resource(TickState::new(Duration::from_secs(
            config.system.update_interval_secs,
        )))
        .insert_resource(SolveDispatcherResource(SolveDispatcher::new()))
        .insert_resource(TimezoneConfig(timezone))
        .insert_resource(update_sender)
        .insert_resource(update_channel)
        .insert_resource(TariffSourceResource(tariff_source))
        .insert_resource(SolarSourceResource(solar_source))
        .insert_resource(WeatherSourceResource(weather_source))
        .insert_resource(HistorySourceResource(history_source))
        .insert_resource(TelemetrySourceResource(telemetry_source))
        .insert_resource(CommandSinkResource(command_sink))
        .insert_resource(config);

    info!("✅ Starting main loop...");
    app.run();

    Ok(())
}

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

//! ECS round-trip: feed provider updates through the forecast channel, let
//! the tick and result systems run, and observe the diagnostics snapshot.
//! No command sink is installed, so the loop runs observation-only.

use bevy_app::App;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::time::{Duration, Instant};
use voltion_core::{
    forecast_channel, CalibrationResource, ForecastUpdate, SolveDispatcher,
    SolveDispatcherResource, StatusSnapshot, TickState, TimezoneConfig, VoltionCorePlugin,
};
use voltion_types::{
    AppConfig, BatteryParameters, EntitiesConfig, LoadModelConfig, SystemSettings, TariffInterval,
    TelemetrySample,
};

fn test_config() -> AppConfig {
    AppConfig {
        battery: BatteryParameters::default(),
        entities: EntitiesConfig {
            battery_soc: "sensor.powerwall_soc".to_string(),
            battery_power: "sensor.powerwall_power".to_string(),
            solar_power: "sensor.pv_power".to_string(),
            grid_power: "sensor.grid_power".to_string(),
            load_today: "sensor.house_energy_today".to_string(),
            import_price: "sensor.amber_general_price".to_string(),
            export_price: "sensor.amber_feed_in_price".to_string(),
            weather: "weather.home".to_string(),
            ..Default::default()
        },
        load_model: LoadModelConfig::default(),
        system: SystemSettings::default(),
    }
}

/// Contiguous 30-minute intervals spanning two hours before now to 26 hours
/// after, so any 24-hour lattice anchored near now is covered.
fn surrounding_tariff(price: f64) -> Vec<TariffInterval> {
    let now = Utc::now().timestamp();
    let anchor = Utc
        .timestamp_opt(now - now.rem_euclid(1800) - 7200, 0)
        .single()
        .unwrap();

    (0..56)
        .map(|i| TariffInterval {
            period_start: anchor + ChronoDuration::minutes(i * 30),
            period_end: anchor + ChronoDuration::minutes((i + 1) * 30),
            per_kwh: price,
            period_type: "FORECAST".to_string(),
        })
        .collect()
}

#[test]
fn supervisor_emits_snapshot_without_command_sink() {
    let mut app = App::new();
    let (sender, channel) = forecast_channel();

    app.add_plugins(VoltionCorePlugin)
        .insert_resource(test_config())
        .insert_resource(CalibrationResource::new(BatteryParameters::default()))
        .insert_resource(TickState::new(Duration::from_secs(300)))
        .insert_resource(SolveDispatcherResource(SolveDispatcher::new()))
        .insert_resource(TimezoneConfig(None))
        .insert_resource(channel);

    sender
        .0
        .send(ForecastUpdate::Tariffs {
            import: surrounding_tariff(20.0),
            export: surrounding_tariff(5.0),
        })
        .unwrap();
    sender
        .0
        .send(ForecastUpdate::Telemetry(TelemetrySample {
            soc_pct: 50.0,
            battery_kw: 0.0,
            solar_kw: 0.0,
            grid_kw: 1.0,
            load_kw: 1.0,
        }))
        .unwrap();

    // First update drains the channel and submits the solve; keep stepping
    // until the result system publishes the snapshot.
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        app.update();
        let snapshot = app.world().resource::<StatusSnapshot>();
        if snapshot.last_update.is_some() {
            break;
        }
        assert!(Instant::now() < deadline, "no snapshot within 10 s");
        std::thread::sleep(Duration::from_millis(10));
    }

    let snapshot = app.world().resource::<StatusSnapshot>();
    assert_eq!(snapshot.soc, 50.0);
    assert!(!snapshot.policy.is_empty());
    assert_eq!(snapshot.policy[0], 50.0);
    assert_eq!(snapshot.plan.len(), 288);
    assert_eq!(snapshot.current_price, Some(20.0));
    // No meter history was provided, so the load forecast is degraded.
    assert!(snapshot.degraded_forecast);
    assert!(snapshot.expected_cost_c.is_some());
}

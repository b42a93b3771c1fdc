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

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use voltion_types::AppConfig;

const DEFAULT_CONFIG_PATH: &str = "voltion.toml";

/// Load and validate the configuration. Validation failures are fatal: the
/// daemon refuses to run until reconfigured.
pub fn load_config() -> Result<AppConfig> {
    let path = std::env::var("VOLTION_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(Path::new(&path))
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let config: AppConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;

    info!("📋 Loaded configuration from {}", path.display());
    Ok(config)
}

/// Log a short configuration summary at startup.
pub fn log_summary(config: &AppConfig) {
    info!("📋 Configuration Summary:");
    info!(
        "   Battery: {:.1} kWh, charge {:.1} kW, discharge {:.1} kW, inverter {:.1} kW",
        config.battery.capacity_kwh,
        config.battery.max_charge_kw,
        config.battery.max_discharge_kw,
        config.battery.inverter_limit_kw
    );
    info!(
        "   SoC band: {:.0}%-{:.0}% in {:.0}% steps",
        config.battery.soc_min_pct, config.battery.soc_max_pct, config.battery.soc_grid_pct
    );
    info!(
        "   Tariffs: import {}, export {}",
        config.entities.import_price, config.entities.export_price
    );
    info!(
        "   Tick: every {} s, solve deadline {} s",
        config.system.update_interval_secs, config.system.solve_timeout_secs
    );
    info!(
        "   Command hooks configured: {}/4{}",
        config.entities.hook_count(),
        if config.entities.hook_count() == 0 {
            " (observation-only)"
        } else {
            ""
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("voltion-{}-{}.toml", name, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let path = write_temp(
            "valid-config",
            r#"
            [battery]
            capacity_kwh = 27.0
            max_charge_kw = 6.3
            max_discharge_kw = 6.3

            [entities]
            battery_soc = "sensor.powerwall_soc"
            battery_power = "sensor.powerwall_power"
            solar_power = "sensor.pv_power"
            grid_power = "sensor.grid_power"
            load_today = "sensor.house_energy_today"
            import_price = "sensor.amber_general_price"
            export_price = "sensor.amber_feed_in_price"
            weather = "weather.home"
            script_charge_start = "script.battery_charge_start"

            [system]
            update_interval_secs = 300
            "#,
        );

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.battery.capacity_kwh, 27.0);
        assert_eq!(config.entities.hook_count(), 1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let path = write_temp(
            "invalid-config",
            r#"
            [battery]
            capacity_kwh = -5.0

            [entities]
            battery_soc = "sensor.soc"
            battery_power = "sensor.p"
            solar_power = "sensor.s"
            grid_power = "sensor.g"
            load_today = "sensor.l"
            import_price = "sensor.i"
            export_price = "sensor.e"
            weather = "weather.home"
            "#,
        );

        assert!(load_config_from(&path).is_err());
        std::fs::remove_file(path).ok();
    }
}

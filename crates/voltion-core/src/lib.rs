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

pub mod diagnostics;
pub mod dispatcher;
pub mod executor;
pub mod forecast;
pub mod resources;
pub mod solver;
pub mod supervisor;
pub mod traits;

use bevy_app::prelude::*;
use bevy_ecs::schedule::IntoScheduleConfigs;

pub use diagnostics::{build_plan, PlanRow, StatusSnapshot};
pub use dispatcher::{SolveDispatcher, SolveOutcome, SolveRequest};
pub use executor::HookExecutor;
pub use forecast::{predict_load, ForecastMatrix, LoadForecast};
pub use resources::*;
pub use solver::{compress, map_action, Block, PeriodOptimizer, Solution, SolveControl};
pub use traits::{
    CommandHook, CommandSink, LoadHistoryDataSource, SolarForecastDataSource, TariffDataSource,
    TelemetryDataSource, WeatherDataSource,
};

/// Core plugin: registers the supervisor resources and the tick / result
/// systems. The dispatcher, tick cadence, calibration and provider handles
/// are inserted by the binary once configuration is loaded.
pub struct VoltionCorePlugin;

impl Plugin for VoltionCorePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ForecastCache>()
            .init_resource::<PendingSolve>()
            .init_resource::<HookExecutorResource>()
            .init_resource::<LastAction>()
            .init_resource::<StatusSnapshot>()
            .init_resource::<TimezoneConfig>()
            .init_resource::<AsyncRuntime>()
            .add_systems(
                Update,
                (
                    supervisor::drain_forecast_updates_system,
                    supervisor::tick_system,
                    supervisor::solve_result_system,
                )
                    .chain(),
            );
    }
}

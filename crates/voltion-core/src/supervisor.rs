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

//! The supervisor: a 5-minute tick that assembles the forecast matrix,
//! hands the solve to the worker and applies the resulting action. The
//! scheduling thread never blocks on a solve and never performs I/O; all
//! provider data arrives through the forecast cache.
//!
//! Failure policy per tick: any non-fatal error (tariff gap, degraded
//! history, solve timeout, superseded solve) holds the previous action and
//! surfaces through the diagnostics snapshot only.

use bevy_ecs::prelude::*;
use chrono::{TimeZone, Utc};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use voltion_types::{AppConfig, ForecastError};

use crate::diagnostics::{build_plan, StatusSnapshot};
use crate::dispatcher::SolveRequest;
use crate::executor::run_hooks;
use crate::forecast::{predict_load, price_at, ForecastMatrix};
use crate::resources::{
    AsyncRuntime, CalibrationResource, CommandSinkResource, ForecastCache, ForecastUpdateChannel,
    HookExecutorResource, LastAction, PendingSolve, SolveDispatcherResource, TickState,
    TimezoneConfig,
};
use crate::solver::{compress, map_action};

/// Drain provider updates pushed by the background fetch workers.
pub fn drain_forecast_updates_system(
    channel: Res<ForecastUpdateChannel>,
    mut cache: ResMut<ForecastCache>,
) {
    while let Ok(update) = channel.0.try_recv() {
        cache.apply(update);
    }
}

/// The 5-minute control tick: build the matrix, compress, submit the solve.
pub fn tick_system(
    mut tick: ResMut<TickState>,
    cache: Res<ForecastCache>,
    calibration: Res<CalibrationResource>,
    config: Res<AppConfig>,
    mut dispatcher: ResMut<SolveDispatcherResource>,
    mut pending: ResMut<PendingSolve>,
    mut snapshot: ResMut<StatusSnapshot>,
) {
    if !cache.ready() {
        debug!("⏳ Waiting for tariff and telemetry data before first tick");
        return;
    }
    if !tick.try_tick(Instant::now()) {
        return;
    }

    let now = Utc::now();
    // Align the horizon to the 5-minute lattice.
    let align_start = Utc
        .timestamp_opt(now.timestamp() - now.timestamp().rem_euclid(300), 0)
        .single()
        .unwrap_or(now);

    let load = predict_load(
        &cache.load_history,
        align_start,
        &cache.weather,
        &config.load_model,
    );

    let matrix = match ForecastMatrix::build(
        align_start,
        &cache.import_intervals,
        &cache.export_intervals,
        &cache.pv_estimates,
        &load,
        &cache.weather,
    ) {
        Ok(matrix) => matrix,
        Err(e @ ForecastError::TariffGap { .. }) => {
            warn!("❌ {e}; holding previous action for this tick");
            snapshot.reason = e.to_string();
            snapshot.last_update = Some(now);
            return;
        }
        Err(e) => {
            warn!("❌ Forecast assembly failed: {e}");
            snapshot.reason = e.to_string();
            return;
        }
    };

    let blocks = compress(matrix.rows());
    debug!(
        "📊 Tick {}: {} slots compressed into {} blocks (SoC {:.1}%)",
        now,
        matrix.len(),
        blocks.len(),
        cache.telemetry.soc_pct
    );

    dispatcher.0.submit(SolveRequest {
        tick: now,
        initial_soc_pct: cache.telemetry.soc_pct,
        blocks: blocks.clone(),
        params: calibration.snapshot(),
        timeout: Duration::from_secs(config.system.solve_timeout_secs),
    });

    pending.tick = Some(now);
    pending.matrix = Some(matrix);
    pending.blocks = blocks;
    pending.degraded_forecast = load.degraded;
}

/// Collect solve outcomes, apply the first-tick action and refresh the
/// diagnostics snapshot.
#[allow(clippy::too_many_arguments)]
pub fn solve_result_system(
    mut dispatcher: ResMut<SolveDispatcherResource>,
    pending: Res<PendingSolve>,
    calibration: Res<CalibrationResource>,
    cache: Res<ForecastCache>,
    timezone: Res<TimezoneConfig>,
    runtime: Res<AsyncRuntime>,
    sink: Option<Res<CommandSinkResource>>,
    mut executor: ResMut<HookExecutorResource>,
    mut last_action: ResMut<LastAction>,
    mut snapshot: ResMut<StatusSnapshot>,
) {
    while let Some(outcome) = dispatcher.0.poll() {
        if pending.tick != Some(outcome.tick) {
            debug!("🗑️ Outcome for superseded tick {}, ignoring", outcome.tick);
            continue;
        }

        let solution = match outcome.result {
            Ok(solution) => solution,
            Err(e) => {
                warn!("⏱️ Solve failed ({e}); holding previous action");
                snapshot.reason = format!("{e}; holding previous action");
                snapshot.last_update = Some(Utc::now());
                continue;
            }
        };

        let Some(matrix) = pending.matrix.as_ref() else {
            continue;
        };
        let params = calibration.snapshot();

        let action = map_action(&solution, &pending.blocks, matrix.rows(), &params);
        info!(
            "✅ Solve for tick {} done in {:?}: {} ({:.1} kW), expected cost {:.1} c",
            outcome.tick, outcome.elapsed, action.state, action.limit_kw, solution.expected_cost_c
        );

        if let Some(hooks) = executor.0.plan(&action) {
            match &sink {
                Some(sink) => {
                    runtime.spawn(run_hooks(sink.0.clone(), hooks));
                }
                None => info!("👀 Observation-only mode, no command sink configured"),
            }
        }

        snapshot.state = action.state;
        snapshot.reason = action.reason.clone();
        snapshot.current_price = price_at(&cache.import_intervals, outcome.tick);
        snapshot.update_telemetry(&cache.telemetry);
        snapshot.degraded_forecast = pending.degraded_forecast;
        snapshot.policy = solution.policy.clone();
        snapshot.expected_cost_c = Some(solution.expected_cost_c);
        snapshot.plan = build_plan(matrix, &pending.blocks, &solution, &params, timezone.0);
        snapshot.last_update = Some(Utc::now());

        last_action.0 = action;
    }
}

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

//! ECS resources shared between the supervisor systems and the adapter
//! plugins.

use bevy_ecs::prelude::Resource;
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use voltion_types::{
    BatteryAction, BatteryParameters, LoadHistorySample, PvEstimate, TariffInterval,
    TelemetrySample, WeatherPoint,
};

use crate::dispatcher::SolveDispatcher;
use crate::executor::HookExecutor;
use crate::forecast::ForecastMatrix;
use crate::solver::Block;
use crate::traits::{CommandSink, LoadHistoryDataSource, SolarForecastDataSource, TariffDataSource,
    TelemetryDataSource, WeatherDataSource};

// ============= Async runtime =============

/// Access to async task spawning. The tokio runtime is shared with the
/// HTTP adapters, so hook invocations ride the same executor.
#[derive(Resource, Clone, Default)]
pub struct AsyncRuntime;

impl AsyncRuntime {
    pub fn new() -> Self {
        Self
    }

    pub fn spawn<T>(
        &self,
        future: impl Future<Output = T> + Send + 'static,
    ) -> tokio::task::JoinHandle<T>
    where
        T: Send + 'static,
    {
        tokio::spawn(future)
    }
}

// ============= Calibration =============

/// Immutable calibration snapshot. Each solve clones the `Arc`; swapping in
/// a new snapshot between ticks never mutates a running solve.
#[derive(Resource, Debug, Clone)]
pub struct CalibrationResource {
    current: Arc<BatteryParameters>,
}

impl CalibrationResource {
    pub fn new(params: BatteryParameters) -> Self {
        Self {
            current: Arc::new(params),
        }
    }

    pub fn snapshot(&self) -> Arc<BatteryParameters> {
        self.current.clone()
    }

    /// Swap in updated calibration; applies from the next tick.
    pub fn replace(&mut self, params: BatteryParameters) {
        self.current = Arc::new(params);
    }
}

// ============= Provider handles =============

#[derive(Resource, Clone)]
pub struct TariffSourceResource(pub Arc<dyn TariffDataSource>);

#[derive(Resource, Clone)]
pub struct SolarSourceResource(pub Arc<dyn SolarForecastDataSource>);

#[derive(Resource, Clone)]
pub struct WeatherSourceResource(pub Arc<dyn WeatherDataSource>);

#[derive(Resource, Clone)]
pub struct HistorySourceResource(pub Arc<dyn LoadHistoryDataSource>);

#[derive(Resource, Clone)]
pub struct TelemetrySourceResource(pub Arc<dyn TelemetryDataSource>);

#[derive(Resource, Clone)]
pub struct CommandSinkResource(pub Arc<dyn CommandSink>);

// ============= Forecast cache =============

/// One update pushed from a background fetch worker into the ECS world.
#[derive(Debug, Clone)]
pub enum ForecastUpdate {
    Tariffs {
        import: Vec<TariffInterval>,
        export: Vec<TariffInterval>,
    },
    Solar(Vec<PvEstimate>),
    Weather(Vec<WeatherPoint>),
    LoadHistory(Vec<LoadHistorySample>),
    Telemetry(TelemetrySample),
}

/// Sender handed to the fetch workers.
#[derive(Resource, Clone)]
pub struct ForecastUpdateSender(pub Sender<ForecastUpdate>);

/// Receiver drained by the supervisor each frame.
#[derive(Resource)]
pub struct ForecastUpdateChannel(pub Receiver<ForecastUpdate>);

pub fn forecast_channel() -> (ForecastUpdateSender, ForecastUpdateChannel) {
    let (tx, rx) = unbounded();
    (ForecastUpdateSender(tx), ForecastUpdateChannel(rx))
}

/// Latest provider data, refreshed by the fetch workers. The tick system
/// reads it synchronously; no fetch happens on the scheduling thread.
#[derive(Resource, Debug, Clone, Default)]
pub struct ForecastCache {
    pub import_intervals: Vec<TariffInterval>,
    pub export_intervals: Vec<TariffInterval>,
    pub pv_estimates: Vec<PvEstimate>,
    pub weather: Vec<WeatherPoint>,
    pub load_history: Vec<LoadHistorySample>,
    pub telemetry: TelemetrySample,
    pub telemetry_seen: bool,
    pub tariffs_seen: bool,
}

impl ForecastCache {
    pub fn apply(&mut self, update: ForecastUpdate) {
        match update {
            ForecastUpdate::Tariffs { import, export } => {
                self.import_intervals = import;
                self.export_intervals = export;
                self.tariffs_seen = true;
            }
            ForecastUpdate::Solar(estimates) => self.pv_estimates = estimates,
            ForecastUpdate::Weather(points) => self.weather = points,
            ForecastUpdate::LoadHistory(samples) => self.load_history = samples,
            ForecastUpdate::Telemetry(sample) => {
                self.telemetry = sample;
                self.telemetry_seen = true;
            }
        }
    }

    /// Can a tick be attempted at all?
    pub fn ready(&self) -> bool {
        self.tariffs_seen && self.telemetry_seen
    }
}

/// Local timezone for rendering the plan table. `None` renders UTC.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct TimezoneConfig(pub Option<chrono_tz::Tz>);

// ============= Supervisor state =============

/// Tick cadence bookkeeping.
#[derive(Resource, Debug)]
pub struct TickState {
    interval: Duration,
    last_tick: Option<Instant>,
}

impl TickState {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_tick: None,
        }
    }

    /// True when a new tick is due; records the tick time when it is.
    pub fn try_tick(&mut self, now: Instant) -> bool {
        let due = self
            .last_tick
            .map(|last| now.duration_since(last) >= self.interval)
            .unwrap_or(true);
        if due {
            self.last_tick = Some(now);
        }
        due
    }
}

/// The matrix and blocks belonging to the in-flight solve, kept so the
/// result system can map the action and build the plan table when the
/// matching outcome arrives.
#[derive(Resource, Debug, Default)]
pub struct PendingSolve {
    pub tick: Option<DateTime<Utc>>,
    pub matrix: Option<ForecastMatrix>,
    pub blocks: Vec<Block>,
    pub degraded_forecast: bool,
}

/// Dispatcher handle.
#[derive(Resource)]
pub struct SolveDispatcherResource(pub SolveDispatcher);

/// Deduplicating hook executor state.
#[derive(Resource, Debug, Default)]
pub struct HookExecutorResource(pub HookExecutor);

/// The last action emitted to the hardware layer. Held unchanged when a
/// tick fails (tariff gap, timeout, cancelled solve).
#[derive(Resource, Debug, Clone, Default)]
pub struct LastAction(pub BatteryAction);

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

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised while aligning provider data into the forecast matrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// A 5-minute slot has no covering tariff interval. Prices are policy,
    /// not physics, so interpolating across the gap would be nonsense; the
    /// whole tick fails and the previous action is held.
    #[error("no tariff interval covers slot {slot} at {instant}")]
    TariffGap {
        slot: usize,
        instant: DateTime<Utc>,
    },

    /// Fewer than 24 hours of usable meter history remain after filtering.
    /// Recoverable: the predictor falls back to a flat mean and the tick is
    /// marked degraded.
    #[error("only {usable_hours:.1} h of usable load history (24 h required)")]
    InsufficientHistory { usable_hours: f64 },
}

/// Errors raised by the period optimizer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    /// A newer tick superseded this solve; its result is discarded.
    #[error("solve cancelled by a newer tick")]
    Cancelled,

    /// The solve exceeded its deadline (30 s by default).
    #[error("solve exceeded its deadline")]
    Timeout,

    /// The compressed period contains no blocks.
    #[error("empty planning period")]
    EmptyPeriod,
}

/// Fatal configuration errors. The daemon refuses to start until fixed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("battery capacity must be positive, got {0} kWh")]
    NonPositiveCapacity(f64),

    #[error("{name} must be positive, got {value} kW")]
    NonPositivePowerLimit { name: &'static str, value: f64 },

    #[error("soc_grid_pct must be one of 1, 5, 10 or 25, got {0}")]
    InvalidSocGrid(f64),

    #[error("soc_min_pct ({min}) must be below soc_max_pct ({max}) within 0-100")]
    InvalidSocRange { min: f64, max: f64 },

    #[error("update_interval_secs must be positive")]
    InvalidUpdateInterval,

    #[error("missing required entity id: {0}")]
    MissingEntity(&'static str),
}

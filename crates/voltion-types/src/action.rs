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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical battery state emitted towards the hardware layer.
///
/// The state is advisory: the executor maps it onto the four configured
/// command hooks. Forced grid export has no state of its own because the
/// solver expresses it through a lower target SoC, which surfaces here as
/// `DischargeHome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryState {
    /// No forced charge or discharge
    #[default]
    Idle,
    /// Charge from the grid up to the power limit
    ChargeGrid,
    /// Charge from PV surplus only
    ChargeSolar,
    /// Discharge to serve the house load
    DischargeHome,
    /// Hold charge for an upcoming target
    Preserve,
}

impl BatteryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::ChargeGrid => "CHARGE_GRID",
            Self::ChargeSolar => "CHARGE_SOLAR",
            Self::DischargeHome => "DISCHARGE_HOME",
            Self::Preserve => "PRESERVE",
        }
    }

}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The action emitted to the hardware layer at each tick: a logical state,
/// a power limit and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryAction {
    pub state: BatteryState,
    /// Power limit for the state (kW, always non-negative)
    pub limit_kw: f64,
    pub reason: String,
    /// Target SoC at the end of the first block (%)
    pub target_soc_pct: Option<f64>,
}

impl Default for BatteryAction {
    fn default() -> Self {
        Self {
            state: BatteryState::Idle,
            limit_kw: 0.0,
            reason: "Initial state".to_string(),
            target_soc_pct: None,
        }
    }
}

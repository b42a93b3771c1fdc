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
use serde_json::Value;

/// State of one Home Assistant entity as returned by `/api/states/...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaEntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub last_changed: String,
    #[serde(default)]
    pub last_updated: String,
}

impl HaEntityState {
    /// Parse the state as a float, treating HA's "unavailable"/"unknown"
    /// markers as absent.
    pub fn numeric_state(&self) -> Option<f64> {
        match self.state.as_str() {
            "unavailable" | "unknown" | "" => None,
            s => s.parse().ok(),
        }
    }
}

/// One raw sample from the `/api/history/period` endpoint. The payload is a
/// list of lists: one outer element per requested entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaHistoryState {
    #[serde(default)]
    pub entity_id: String,
    pub state: String,
    pub last_changed: String,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub attributes: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_state() {
        let mut state = HaEntityState {
            entity_id: "sensor.soc".to_string(),
            state: "82.5".to_string(),
            attributes: json!({}),
            last_changed: String::new(),
            last_updated: String::new(),
        };
        assert_eq!(state.numeric_state(), Some(82.5));

        state.state = "unavailable".to_string();
        assert_eq!(state.numeric_state(), None);

        state.state = "on".to_string();
        assert_eq!(state.numeric_state(), None);
    }
}

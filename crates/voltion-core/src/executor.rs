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

//! Translates logical battery states into command hook invocations.
//!
//! Only state transitions cause hook calls: re-emitting the same (state,
//! limit) pair is a no-op. Unconfigured hooks leave the system running
//! observation-only.

use std::sync::Arc;
use tracing::{debug, info, warn};
use voltion_types::{BatteryAction, BatteryState};

use crate::traits::{CommandHook, CommandSink};

/// Deduplicating executor in front of the command sink.
#[derive(Debug, Default)]
pub struct HookExecutor {
    last_state: Option<BatteryState>,
    last_limit_kw: f64,
    apply_count: u64,
}

impl HookExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many state changes have been applied.
    pub fn apply_count(&self) -> u64 {
        self.apply_count
    }

    pub fn last_state(&self) -> Option<BatteryState> {
        self.last_state
    }

    /// Decide which hooks a new action requires. Returns `None` when the
    /// action equals the last applied one (deduplication).
    pub fn plan(&mut self, action: &BatteryAction) -> Option<Vec<CommandHook>> {
        if self.last_state == Some(action.state) && self.last_limit_kw == action.limit_kw {
            debug!("State unchanged ({}), skipping apply", action.state);
            return None;
        }

        self.last_state = Some(action.state);
        self.last_limit_kw = action.limit_kw;
        self.apply_count += 1;

        info!(
            "🔋 Applying state: {} (limit: {:.1} kW): {}",
            action.state, action.limit_kw, action.reason
        );

        Some(hooks_for(action.state))
    }
}

/// Which hooks realise a logical state.
fn hooks_for(state: BatteryState) -> Vec<CommandHook> {
    match state {
        BatteryState::ChargeGrid => vec![CommandHook::ChargeStart],
        BatteryState::DischargeHome => vec![CommandHook::DischargeStart],
        // Solar-only charging means no forced grid charge; the plant's
        // native self-consumption absorbs the surplus.
        BatteryState::ChargeSolar => vec![CommandHook::ChargeStop],
        BatteryState::Preserve => vec![CommandHook::DischargeStop],
        BatteryState::Idle => vec![CommandHook::ChargeStop, CommandHook::DischargeStop],
    }
}

/// Fire the planned hooks against the sink, logging unconfigured ones.
pub async fn run_hooks(sink: Arc<dyn CommandSink>, hooks: Vec<CommandHook>) {
    for hook in hooks {
        match sink.trigger(hook).await {
            Ok(true) => info!("CMD: {} ({})", hook.as_str(), sink.name()),
            Ok(false) => info!("CMD: {} (skipped: no script configured)", hook.as_str()),
            Err(e) => warn!("⚠️ Hook {} failed: {}", hook.as_str(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(state: BatteryState, limit_kw: f64) -> BatteryAction {
        BatteryAction {
            state,
            limit_kw,
            reason: "test".to_string(),
            target_soc_pct: None,
        }
    }

    #[test]
    fn test_dedup_on_identical_action() {
        let mut executor = HookExecutor::new();
        assert!(executor.plan(&action(BatteryState::ChargeGrid, 3.0)).is_some());
        assert!(executor.plan(&action(BatteryState::ChargeGrid, 3.0)).is_none());
        assert_eq!(executor.apply_count(), 1);
    }

    #[test]
    fn test_limit_change_reapplies() {
        let mut executor = HookExecutor::new();
        executor.plan(&action(BatteryState::ChargeGrid, 3.0));
        let hooks = executor.plan(&action(BatteryState::ChargeGrid, 5.0));
        assert_eq!(hooks, Some(vec![CommandHook::ChargeStart]));
        assert_eq!(executor.apply_count(), 2);
    }

    #[test]
    fn test_state_hook_mapping() {
        assert_eq!(
            hooks_for(BatteryState::ChargeGrid),
            vec![CommandHook::ChargeStart]
        );
        assert_eq!(
            hooks_for(BatteryState::DischargeHome),
            vec![CommandHook::DischargeStart]
        );
        assert_eq!(
            hooks_for(BatteryState::ChargeSolar),
            vec![CommandHook::ChargeStop]
        );
        assert_eq!(
            hooks_for(BatteryState::Preserve),
            vec![CommandHook::DischargeStop]
        );
        assert_eq!(
            hooks_for(BatteryState::Idle),
            vec![CommandHook::ChargeStop, CommandHook::DischargeStop]
        );
    }

    #[test]
    fn test_transition_sequence() {
        let mut executor = HookExecutor::new();
        executor.plan(&action(BatteryState::Idle, 0.0));
        executor.plan(&action(BatteryState::ChargeGrid, 6.3));
        executor.plan(&action(BatteryState::ChargeGrid, 6.3));
        executor.plan(&action(BatteryState::DischargeHome, 2.0));
        assert_eq!(executor.apply_count(), 3);
        assert_eq!(executor.last_state(), Some(BatteryState::DischargeHome));
    }
}

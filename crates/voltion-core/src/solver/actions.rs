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

use voltion_types::{BatteryAction, BatteryParameters, BatteryState, ForecastRow, SLOT_MINUTES};

use super::blocks::Block;
use super::dp::Solution;

/// Power threshold below which a battery move is treated as no move.
/// Suppresses chatter from quantization residue.
const EPS_KW: f64 = 0.05;

/// Lookahead window for the PRESERVE state (blocks starting within it that
/// target a higher SoC keep the battery held).
const PRESERVE_LOOKAHEAD_H: f64 = 1.0;

/// SoC margin an upcoming target must clear before PRESERVE kicks in.
const PRESERVE_MARGIN_PCT: f64 = 0.5;

/// Map the first step of the policy onto a logical battery state and power
/// limit for the hardware layer.
///
/// The state is purely advisory; the executor decides which of the four
/// command hooks to pull. The inverter limit clamps only the commanded
/// power here, never the solver's internal battery delta.
pub fn map_action(
    solution: &Solution,
    blocks: &[Block],
    rows: &[ForecastRow],
    params: &BatteryParameters,
) -> BatteryAction {
    let (Some(&current), Some(target)) = (solution.policy.first(), solution.first_target())
    else {
        // Failsafe: a policy too short to act on.
        return BatteryAction {
            state: BatteryState::Idle,
            limit_kw: 0.0,
            reason: "Policy too short, holding idle".to_string(),
            target_soc_pct: None,
        };
    };
    let Some(first_block) = blocks.first() else {
        return BatteryAction::default();
    };

    let battery_kw_target =
        params.soc_delta_to_kwh(target - current) / first_block.duration_h();

    if battery_kw_target > EPS_KW {
        // Charging: decide the source from the first row's balance. PV that
        // already covers the commanded charge power means no grid draw.
        let surplus_kw = rows
            .first()
            .map(|r| r.pv_kw - r.load_kw)
            .unwrap_or(0.0);
        let limit_kw = battery_kw_target
            .min(params.max_charge_kw)
            .min(params.inverter_limit_kw);

        if surplus_kw >= battery_kw_target {
            BatteryAction {
                state: BatteryState::ChargeSolar,
                limit_kw,
                reason: format!(
                    "Charging {:.1} kW from solar surplus toward {:.0}% target",
                    limit_kw, target
                ),
                target_soc_pct: Some(target),
            }
        } else {
            BatteryAction {
                state: BatteryState::ChargeGrid,
                limit_kw,
                reason: format!(
                    "Charging {:.1} kW from grid at {:.1} c/kWh toward {:.0}% target",
                    limit_kw, first_block.import_rate_c, target
                ),
                target_soc_pct: Some(target),
            }
        }
    } else if battery_kw_target < -EPS_KW {
        let limit_kw = (-battery_kw_target).min(params.max_discharge_kw);
        BatteryAction {
            state: BatteryState::DischargeHome,
            limit_kw,
            reason: format!(
                "Discharging {:.1} kW toward {:.0}% target",
                limit_kw, target
            ),
            target_soc_pct: Some(target),
        }
    } else if let Some(upcoming) = upcoming_higher_target(solution, blocks, current) {
        BatteryAction {
            state: BatteryState::Preserve,
            limit_kw: 0.0,
            reason: format!(
                "Holding charge for upcoming {:.0}% target within the hour",
                upcoming
            ),
            target_soc_pct: Some(target),
        }
    } else {
        BatteryAction {
            state: BatteryState::Idle,
            limit_kw: 0.0,
            reason: format!("No profitable battery move, holding {:.0}%", current),
            target_soc_pct: Some(target),
        }
    }
}

/// The target of the first block starting within the lookahead window that
/// sits above the current SoC, if any.
fn upcoming_higher_target(solution: &Solution, blocks: &[Block], current: f64) -> Option<f64> {
    let horizon_slot = blocks.first().map(|b| b.start_slot).unwrap_or(0)
        + (PRESERVE_LOOKAHEAD_H * 60.0 / SLOT_MINUTES as f64) as usize;

    blocks
        .iter()
        .skip(1)
        .take_while(|b| b.start_slot < horizon_slot)
        .filter_map(|b| solution.policy.get(b.block_index + 1).copied())
        .find(|&target| target > current + PRESERVE_MARGIN_PCT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::blocks::BalanceSign;
    use chrono::{Duration, TimeZone, Utc};

    fn params() -> BatteryParameters {
        BatteryParameters::default()
    }

    fn block(idx: usize, start_slot: usize, slots: usize, import: f64, export: f64) -> Block {
        Block {
            block_index: idx,
            start_slot,
            end_slot_exclusive: start_slot + slots,
            import_rate_c: import,
            export_rate_c: export,
            balance_kwh: 0.0,
            balance_sign: BalanceSign::Zero,
        }
    }

    fn row(pv_kw: f64, load_kw: f64) -> ForecastRow {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        ForecastRow {
            slot_index: 0,
            period_start: t0,
            period_end: t0 + Duration::minutes(SLOT_MINUTES),
            import_rate_c: 10.0,
            export_rate_c: 5.0,
            pv_kw,
            load_kw,
            temp_c: None,
        }
    }

    fn solution(policy: Vec<f64>) -> Solution {
        Solution {
            policy,
            expected_cost_c: 0.0,
        }
    }

    #[test]
    fn test_charge_from_grid_when_pv_insufficient() {
        // 20 % -> 100 % over one hour wants 21.6 kW, clamped to the battery
        // limit and then the inverter limit.
        let blocks = vec![block(0, 0, 12, 5.0, 2.0)];
        let action = map_action(
            &solution(vec![20.0, 100.0]),
            &blocks,
            &[row(0.0, 1.0)],
            &params(),
        );

        assert_eq!(action.state, BatteryState::ChargeGrid);
        assert!((action.limit_kw - 6.3).abs() < 1e-9);
        assert_eq!(action.target_soc_pct, Some(100.0));
    }

    #[test]
    fn test_inverter_limit_clamps_charge() {
        let p = BatteryParameters {
            max_charge_kw: 12.0,
            inverter_limit_kw: 10.0,
            ..params()
        };
        let blocks = vec![block(0, 0, 12, 5.0, 2.0)];
        let action = map_action(&solution(vec![20.0, 70.0]), &blocks, &[row(0.0, 1.0)], &p);

        // 13.5 kW wanted, battery allows 12, inverter caps at 10.
        assert_eq!(action.state, BatteryState::ChargeGrid);
        assert!((action.limit_kw - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_charge_from_solar_when_surplus_covers() {
        // 80 % -> 100 % over 6 h = 0.9 kW, PV surplus is 4 kW.
        let blocks = vec![block(0, 0, 72, 30.0, 15.0)];
        let action = map_action(
            &solution(vec![80.0, 100.0]),
            &blocks,
            &[row(5.0, 1.0)],
            &params(),
        );

        assert_eq!(action.state, BatteryState::ChargeSolar);
        assert!((action.limit_kw - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_discharge_home() {
        // 50 % -> 0 % over 24 h = 0.5625 kW.
        let blocks = vec![block(0, 0, 288, 10.0, 5.0)];
        let action = map_action(
            &solution(vec![50.0, 0.0]),
            &blocks,
            &[row(0.0, 1.0)],
            &params(),
        );

        assert_eq!(action.state, BatteryState::DischargeHome);
        assert!((action.limit_kw - 0.5625).abs() < 1e-6);
    }

    #[test]
    fn test_discharge_limit_is_battery_limit() {
        // 100 % -> 0 % over one hour wants 27 kW; the discharge limit wins.
        let blocks = vec![block(0, 0, 12, 10.0, 5.0)];
        let action = map_action(
            &solution(vec![100.0, 0.0]),
            &blocks,
            &[row(0.0, 1.0)],
            &params(),
        );
        assert_eq!(action.state, BatteryState::DischargeHome);
        assert!((action.limit_kw - 6.3).abs() < 1e-9);
    }

    #[test]
    fn test_preserve_when_near_target_ahead() {
        // Idle now, but the block starting in 30 minutes targets 90 %.
        let blocks = vec![block(0, 0, 6, 12.0, 5.0), block(1, 6, 24, 60.0, 5.0)];
        let action = map_action(
            &solution(vec![70.0, 70.0, 90.0]),
            &blocks,
            &[row(0.0, 1.0)],
            &params(),
        );

        assert_eq!(action.state, BatteryState::Preserve);
        assert_eq!(action.limit_kw, 0.0);
    }

    #[test]
    fn test_idle_when_nothing_ahead() {
        let blocks = vec![block(0, 0, 288, 12.0, 5.0)];
        let action = map_action(
            &solution(vec![70.0, 70.0]),
            &blocks,
            &[row(0.0, 1.0)],
            &params(),
        );

        assert_eq!(action.state, BatteryState::Idle);
        assert_eq!(action.limit_kw, 0.0);
    }

    #[test]
    fn test_tiny_delta_suppressed() {
        // 0.02 kW of quantization residue must not flap the hardware.
        let blocks = vec![block(0, 0, 288, 12.0, 5.0)];
        let action = map_action(
            &solution(vec![50.0, 51.7]),
            &blocks,
            &[row(0.0, 1.0)],
            &params(),
        );
        assert_eq!(action.state, BatteryState::Idle);
    }

    #[test]
    fn test_failsafe_on_short_policy() {
        let blocks = vec![block(0, 0, 288, 12.0, 5.0)];
        let action = map_action(&solution(vec![50.0]), &blocks, &[row(0.0, 1.0)], &params());
        assert_eq!(action.state, BatteryState::Idle);
    }
}

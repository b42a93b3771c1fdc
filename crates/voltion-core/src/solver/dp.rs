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

//! The dynamic-programming period optimizer.
//!
//! State space: `(block_index, soc)` with SoC quantized to multiples of
//! `soc_grid_pct` inside `[soc_min_pct, soc_max_pct]`. The recursion
//! minimizes the total signed grid cost over the horizon:
//!
//! ```text
//! cost(b, soc) = 0                                       if b == B
//!              = min over feasible soc' of
//!                step_cost(b, soc, soc') + cost(b+1, soc')
//! ```
//!
//! The step cost is the whole trick: the grid energy of a block is the
//! household balance plus the battery delta, priced against the import rate
//! when positive and the export rate when negative. The multiplication
//! preserves sign, so a negative export rate turns exports into a penalty
//! and the solver learns to absorb surplus instead of shipping it out (the
//! negative export trap). No special casing beyond the branch on the sign
//! of the grid energy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use voltion_types::{BatteryParameters, SolveError};

use super::blocks::Block;

/// Tolerance for power-limit feasibility, absorbs float noise only.
const FEASIBILITY_EPS_KWH: f64 = 1e-9;

/// Cooperative cancellation and deadline for one solve. The solver checks
/// both at block boundaries only; finer-grained checks would add branch
/// overhead without meaningful latency benefit at this state count.
#[derive(Debug, Clone, Default)]
pub struct SolveControl {
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl SolveControl {
    /// A control that never cancels and never expires.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_cancel(cancel: Arc<AtomicBool>) -> Self {
        Self {
            cancel: Some(cancel),
            deadline: None,
        }
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn check(&self) -> Result<(), SolveError> {
        if let Some(cancel) = &self.cancel {
            if cancel.load(Ordering::Relaxed) {
                return Err(SolveError::Cancelled);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline {
                return Err(SolveError::Timeout);
            }
        }
        Ok(())
    }
}

/// Result of one solve: the policy of target SoCs at block boundaries and
/// the expected total cost over the horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// `policy[0]` is the (clamped) measured SoC; `policy[b]` is the target
    /// SoC at the end of block `b - 1`. Length `B + 1`.
    pub policy: Vec<f64>,
    /// Expected total cost in cents (negative = net credit)
    pub expected_cost_c: f64,
}

impl Solution {
    /// Target SoC at the end of the first block.
    pub fn first_target(&self) -> Option<f64> {
        self.policy.get(1).copied()
    }
}

/// The quantized SoC lattice.
#[derive(Debug, Clone)]
struct SocGrid {
    values: Vec<f64>,
}

impl SocGrid {
    fn new(params: &BatteryParameters) -> Self {
        let mut values = Vec::new();
        let mut soc = params.soc_min_pct;
        while soc < params.soc_max_pct - 1e-9 {
            values.push(soc);
            soc += params.soc_grid_pct;
        }
        values.push(params.soc_max_pct);
        Self { values }
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn value(&self, idx: usize) -> f64 {
        self.values[idx]
    }

    /// Index of the grid value nearest to `soc`; the lower value wins ties.
    fn nearest(&self, soc: f64) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (idx, value) in self.values.iter().enumerate() {
            let dist = (value - soc).abs();
            if dist < best_dist {
                best_dist = dist;
                best = idx;
            }
        }
        best
    }
}

/// Memoized recursive search over end-of-block SoC candidates.
///
/// The memo is a flat array indexed `block_index * S + soc_index`: dense,
/// small and cache-friendly, with a fixed recursion order so identical
/// inputs always produce identical policies.
pub struct PeriodOptimizer<'a> {
    blocks: &'a [Block],
    params: &'a BatteryParameters,
    grid: SocGrid,
    /// `(cost_to_go, argmin successor index)` per `(block, soc)` state
    memo: Vec<Option<(f64, usize)>>,
    control: SolveControl,
}

impl<'a> PeriodOptimizer<'a> {
    pub fn new(blocks: &'a [Block], params: &'a BatteryParameters) -> Self {
        let grid = SocGrid::new(params);
        let memo = vec![None; blocks.len() * grid.len()];
        Self {
            blocks,
            params,
            grid,
            memo,
            control: SolveControl::unbounded(),
        }
    }

    pub fn with_control(mut self, control: SolveControl) -> Self {
        self.control = control;
        self
    }

    /// Run the search from the measured SoC.
    ///
    /// A measured SoC outside the configured band is clamped with a warning
    /// (the tick proceeds). The clamped value is then snapped to the nearest
    /// grid point for the search; the snap never exceeds half a grid step.
    pub fn solve(&mut self, initial_soc_pct: f64) -> Result<Solution, SolveError> {
        if self.blocks.is_empty() {
            return Err(SolveError::EmptyPeriod);
        }

        let clamped = initial_soc_pct.clamp(self.params.soc_min_pct, self.params.soc_max_pct);
        if clamped != initial_soc_pct {
            warn!(
                "⚠️ Measured SoC {:.1}% outside [{:.0}%, {:.0}%], clamped to {:.1}%",
                initial_soc_pct, self.params.soc_min_pct, self.params.soc_max_pct, clamped
            );
        }

        let start_idx = self.grid.nearest(clamped);
        let (expected_cost_c, _) = self.cost_to_go(0, start_idx)?;

        // Recover the policy by walking the recorded argmin successors.
        let mut policy = Vec::with_capacity(self.blocks.len() + 1);
        policy.push(clamped);
        let mut idx = start_idx;
        for b in 0..self.blocks.len() {
            let (_, next) = self.memo[b * self.grid.len() + idx]
                .expect("memo filled along the optimal path");
            idx = next;
            policy.push(self.grid.value(idx));
        }

        Ok(Solution {
            policy,
            expected_cost_c,
        })
    }

    /// `cost(b, soc)` with memoization. Returns the cost to go and the
    /// argmin successor state index.
    fn cost_to_go(&mut self, b: usize, soc_idx: usize) -> Result<(f64, usize), SolveError> {
        if b == self.blocks.len() {
            return Ok((0.0, usize::MAX));
        }

        let key = b * self.grid.len() + soc_idx;
        if let Some(cached) = self.memo[key] {
            return Ok(cached);
        }

        // Block boundary: the only cancellation / deadline checkpoint.
        self.control.check()?;

        let block = self.blocks[b].clone();
        let soc = self.grid.value(soc_idx);
        let max_charge_kwh = self.params.max_charge_kw * block.duration_h();
        let max_discharge_kwh = self.params.max_discharge_kw * block.duration_h();

        let mut best: Option<(f64, usize, f64)> = None; // (cost, successor, |delta|)

        for cand in 0..self.grid.len() {
            let delta_kwh = self.params.soc_delta_to_kwh(self.grid.value(cand) - soc);

            // Idle (cand == soc_idx) is always a candidate: delta is zero,
            // which trivially satisfies both limits. Everything else must
            // fit the battery's power limits over the block.
            let feasible = if delta_kwh >= 0.0 {
                delta_kwh <= max_charge_kwh + FEASIBILITY_EPS_KWH
            } else {
                -delta_kwh <= max_discharge_kwh + FEASIBILITY_EPS_KWH
            };
            if !feasible {
                continue;
            }

            let step = step_cost(&block, delta_kwh);
            let (rest, _) = self.cost_to_go(b + 1, cand)?;
            let total = step + rest;

            // Tie-breaking between equal-cost successors: least battery
            // cycling first, then the lower SoC (headroom for future solar
            // absorption). Candidates iterate in ascending order, so the
            // lower SoC wins full ties by staying first.
            let better = match &best {
                None => true,
                Some((best_cost, _, best_abs)) => {
                    total < *best_cost || (total == *best_cost && delta_kwh.abs() < *best_abs)
                }
            };
            if better {
                best = Some((total, cand, delta_kwh.abs()));
            }
        }

        let (cost, successor, _) = best.expect("idle candidate is always feasible");
        self.memo[key] = Some((cost, successor));
        Ok((cost, successor))
    }
}

/// The signed step cost of moving the battery by `delta_kwh` over a block.
///
/// `grid_kwh = balance + delta`; positive grid energy is bought at the
/// import rate, negative grid energy is settled at the export rate. A
/// negative export rate therefore turns exports into a positive cost.
pub fn step_cost(block: &Block, battery_delta_kwh: f64) -> f64 {
    let grid_kwh = block.balance_kwh + battery_delta_kwh;
    if grid_kwh >= 0.0 {
        grid_kwh * block.import_rate_c
    } else {
        grid_kwh * block.export_rate_c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::blocks::BalanceSign;

    fn params() -> BatteryParameters {
        BatteryParameters::default()
    }

    /// A block of `hours` with the given prices and net balance.
    fn block(idx: usize, hours: f64, import: f64, export: f64, balance_kwh: f64) -> Block {
        let slots = (hours * 12.0).round() as usize;
        let start = idx * 100; // slot indices don't matter to the solver
        Block {
            block_index: idx,
            start_slot: start,
            end_slot_exclusive: start + slots,
            import_rate_c: import,
            export_rate_c: export,
            balance_kwh,
            balance_sign: BalanceSign::of(balance_kwh),
        }
    }

    fn solve(blocks: &[Block], soc: f64) -> Solution {
        PeriodOptimizer::new(blocks, &params()).solve(soc).unwrap()
    }

    #[test]
    fn test_empty_period_rejected() {
        let p = params();
        let err = PeriodOptimizer::new(&[], &p).solve(50.0).unwrap_err();
        assert_eq!(err, SolveError::EmptyPeriod);
    }

    #[test]
    fn test_policy_well_formed() {
        let blocks = vec![
            block(0, 6.0, 5.0, 2.0, 6.0),
            block(1, 12.0, 40.0, 10.0, 12.0),
            block(2, 6.0, 20.0, 5.0, 6.0),
        ];
        let solution = solve(&blocks, 20.0);

        assert_eq!(solution.policy.len(), blocks.len() + 1);
        for &soc in &solution.policy {
            assert!((0.0..=100.0).contains(&soc));
        }
    }

    #[test]
    fn test_feasibility_respected() {
        // Short blocks constrain the per-block delta hard.
        let blocks: Vec<_> = (0..24)
            .map(|i| {
                let import = if i % 2 == 0 { 5.0 } else { 60.0 };
                block(i, 0.25, import, 1.0, 0.25)
            })
            .collect();
        let solution = solve(&blocks, 50.0);
        let p = params();

        for (b, pair) in solution.policy.windows(2).enumerate() {
            let delta_kwh = (pair[1] - pair[0]).abs() / 100.0 * p.capacity_kwh;
            let limit = p.max_charge_kw.max(p.max_discharge_kw) * blocks[b].duration_h();
            assert!(
                delta_kwh <= limit + 1e-6,
                "block {}: {} kWh exceeds {} kWh",
                b,
                delta_kwh,
                limit
            );
        }
    }

    #[test]
    fn test_cheap_then_expensive_charges_ahead() {
        // 6 h at 5 c, then 18 h at 40 c. The battery fills during the cheap
        // window and burns down through the expensive one.
        let blocks = vec![
            block(0, 6.0, 5.0, 10.0, 6.0),
            block(1, 18.0, 40.0, 10.0, 18.0),
        ];
        let solution = solve(&blocks, 20.0);

        assert_eq!(solution.policy[1], 100.0);
        assert!(solution.policy[2] < 20.0 + 1e-9);
    }

    #[test]
    fn test_idle_is_considered_and_wins_ties() {
        // Zero balance, zero export value: every discharge candidate costs
        // exactly zero, as does idling. The least-cycling tie-break must
        // pick the idle transition.
        let blocks = vec![block(0, 4.0, 20.0, 0.0, 0.0), block(1, 20.0, 20.0, 0.0, 0.0)];
        let solution = solve(&blocks, 60.0);

        assert_eq!(solution.policy, vec![60.0, 60.0, 60.0]);
        assert_eq!(solution.expected_cost_c, 0.0);
    }

    #[test]
    fn test_negative_export_absorbed_not_exported() {
        // Solar surplus under a negative export rate: idling would pay the
        // penalty, absorbing is free.
        let blocks = vec![
            block(0, 3.0, 20.0, -50.0, -10.5),
            block(1, 21.0, 20.0, 5.0, 10.5),
        ];
        let solution = solve(&blocks, 40.0);

        // 10.5 kWh of surplus is 38.9 % of capacity; the solver must climb.
        assert!(
            solution.policy[1] >= 75.0,
            "policy did not absorb surplus: {:?}",
            solution.policy
        );
    }

    #[test]
    fn test_negative_export_with_full_battery_prefers_idle_over_export() {
        // No headroom at all: the cheapest feasible move is to export as
        // little as possible, i.e. stay put rather than discharge into the
        // penalty window.
        let blocks = vec![block(0, 1.0, 20.0, -10.0, -1.5)];
        let solution = solve(&blocks, 100.0);
        assert_eq!(solution.policy[1], 100.0);
    }

    #[test]
    fn test_determinism() {
        let blocks = vec![
            block(0, 6.0, 12.0, 3.0, 5.0),
            block(1, 3.0, 60.0, 3.0, 3.0),
            block(2, 15.0, 12.0, 3.0, 15.0),
        ];
        let a = solve(&blocks, 70.0);
        let b = solve(&blocks, 70.0);
        assert_eq!(a.policy, b.policy);
        assert_eq!(a.expected_cost_c, b.expected_cost_c);
    }

    #[test]
    fn test_matches_exhaustive_enumeration() {
        // Brute-force every grid policy on a small instance and verify the
        // DP finds the same minimum cost.
        let p = BatteryParameters {
            soc_grid_pct: 25.0,
            ..params()
        };
        let blocks = vec![
            block(0, 4.0, 5.0, 2.0, 2.0),
            block(1, 4.0, 45.0, 8.0, 4.0),
            block(2, 16.0, 15.0, -20.0, -6.0),
        ];

        let solution = PeriodOptimizer::new(&blocks, &p).solve(50.0).unwrap();

        let grid: Vec<f64> = vec![0.0, 25.0, 50.0, 75.0, 100.0];
        let mut best = f64::INFINITY;
        for &a in &grid {
            for &b in &grid {
                for &c in &grid {
                    let path = [50.0, a, b, c];
                    let mut cost = 0.0;
                    let mut feasible = true;
                    for (i, w) in path.windows(2).enumerate() {
                        let delta = (w[1] - w[0]) / 100.0 * p.capacity_kwh;
                        let limit = if delta >= 0.0 {
                            p.max_charge_kw
                        } else {
                            p.max_discharge_kw
                        } * blocks[i].duration_h();
                        if delta.abs() > limit + 1e-9 {
                            feasible = false;
                            break;
                        }
                        cost += step_cost(&blocks[i], delta);
                    }
                    if feasible && cost < best {
                        best = cost;
                    }
                }
            }
        }

        assert!(
            (solution.expected_cost_c - best).abs() < 1e-9,
            "dp {} vs exhaustive {}",
            solution.expected_cost_c,
            best
        );
    }

    #[test]
    fn test_out_of_band_soc_clamped() {
        let p = BatteryParameters {
            soc_min_pct: 10.0,
            soc_max_pct: 90.0,
            ..params()
        };
        let blocks = vec![block(0, 24.0, 10.0, 0.0, 10.0)];
        let solution = PeriodOptimizer::new(&blocks, &p).solve(103.0).unwrap();
        assert_eq!(solution.policy[0], 90.0);
    }

    #[test]
    fn test_cancellation() {
        let blocks: Vec<_> = (0..80).map(|i| block(i, 0.3, 10.0, 5.0, 0.3)).collect();
        let cancel = Arc::new(AtomicBool::new(true));
        let control = SolveControl::with_cancel(cancel);
        let err = PeriodOptimizer::new(&blocks, &params())
            .with_control(control)
            .solve(50.0)
            .unwrap_err();
        assert_eq!(err, SolveError::Cancelled);
    }

    #[test]
    fn test_deadline() {
        let blocks: Vec<_> = (0..80).map(|i| block(i, 0.3, 10.0, 5.0, 0.3)).collect();
        let control = SolveControl::unbounded()
            .deadline(Instant::now() - std::time::Duration::from_secs(1));
        let err = PeriodOptimizer::new(&blocks, &params())
            .with_control(control)
            .solve(50.0)
            .unwrap_err();
        assert_eq!(err, SolveError::Timeout);
    }

    #[test]
    fn test_step_cost_sign_convention() {
        let b = block(0, 1.0, 30.0, -10.0, -2.0);
        // Exporting 2 kWh at -10 c/kWh is a 20 c penalty.
        assert_eq!(step_cost(&b, 0.0), 20.0);
        // Absorbing the surplus zeroes the grid flow.
        assert_eq!(step_cost(&b, 2.0), 0.0);
        // Importing on top of it pays the import rate.
        assert_eq!(step_cost(&b, 3.0), 30.0);

        let b = block(0, 1.0, 30.0, 10.0, -2.0);
        // Positive export rate yields a credit.
        assert_eq!(step_cost(&b, 0.0), -20.0);
    }
}

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
use voltion_types::{ForecastRow, SLOT_MINUTES};

/// Sign class of a slot's (or block's) net balance. A slot whose net is
/// exactly zero is its own class: it is neither charging nor discharging
/// territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceSign {
    Negative,
    Zero,
    Positive,
}

impl BalanceSign {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Self::Positive
        } else if value < 0.0 {
            Self::Negative
        } else {
            Self::Zero
        }
    }
}

/// A maximal run of contiguous 5-minute slots sharing identical import
/// price, identical export price and the same balance sign. Blocks are what
/// make the DP tractable: a day compresses to typically 20-80 of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_index: usize,
    pub start_slot: usize,
    pub end_slot_exclusive: usize,
    /// Import price, constant across the block (cents per kWh)
    pub import_rate_c: f64,
    /// Export price, constant across the block (cents per kWh)
    pub export_rate_c: f64,
    /// Net energy over the block (kWh); positive = the house needs energy
    pub balance_kwh: f64,
    pub balance_sign: BalanceSign,
}

impl Block {
    pub fn slot_count(&self) -> usize {
        self.end_slot_exclusive - self.start_slot
    }

    pub fn duration_h(&self) -> f64 {
        self.slot_count() as f64 * SLOT_MINUTES as f64 / 60.0
    }
}

/// Collapse the forecast matrix rows into blocks.
///
/// Guarantees: every slot belongs to exactly one block; the balance sign is
/// constant within a block; block boundaries include every price-change
/// instant of either tariff and every sign flip of the net balance.
pub fn compress(rows: &[ForecastRow]) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();

    for row in rows {
        let sign = BalanceSign::of(row.load_kw - row.pv_kw);

        let joins = blocks.last().is_some_and(|b| {
            b.import_rate_c == row.import_rate_c
                && b.export_rate_c == row.export_rate_c
                && b.balance_sign == sign
        });

        if joins {
            let block = blocks.last_mut().expect("joins implies a current block");
            block.end_slot_exclusive = row.slot_index + 1;
            block.balance_kwh += row.balance_kwh();
        } else {
            blocks.push(Block {
                block_index: blocks.len(),
                start_slot: row.slot_index,
                end_slot_exclusive: row.slot_index + 1,
                import_rate_c: row.import_rate_c,
                export_rate_c: row.export_rate_c,
                balance_kwh: row.balance_kwh(),
                balance_sign: sign,
            });
        }
    }

    blocks
}

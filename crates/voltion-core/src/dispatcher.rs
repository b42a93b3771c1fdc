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

//! Offloads the CPU-heavy solve from the supervisor's scheduling thread.
//!
//! One worker is enough: a solve is short. The contract is single-flight
//! per tick: submitting a new request flips the previous request's cancel
//! flag, and results are labelled with the tick that produced them so the
//! supervisor can discard late arrivals.

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use voltion_types::{BatteryParameters, SolveError};

use crate::solver::{Block, PeriodOptimizer, Solution, SolveControl};

/// One solve job, stamped with the tick that requested it.
#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub tick: DateTime<Utc>,
    pub initial_soc_pct: f64,
    pub blocks: Vec<Block>,
    /// Immutable calibration snapshot for this solve
    pub params: Arc<BatteryParameters>,
    pub timeout: Duration,
}

/// Result delivered back to the supervisor.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub tick: DateTime<Utc>,
    pub result: Result<Solution, SolveError>,
    pub elapsed: Duration,
}

struct Job {
    request: SolveRequest,
    cancel: Arc<AtomicBool>,
}

/// Dispatcher owning the worker thread and the in-flight bookkeeping.
pub struct SolveDispatcher {
    job_tx: Sender<Job>,
    outcome_rx: Receiver<SolveOutcome>,
    inflight_cancel: Option<Arc<AtomicBool>>,
    latest_tick: Option<DateTime<Utc>>,
}

impl SolveDispatcher {
    pub fn new() -> Self {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (outcome_tx, outcome_rx) = unbounded::<SolveOutcome>();

        std::thread::Builder::new()
            .name("voltion-solver".to_string())
            .spawn(move || worker_loop(job_rx, outcome_tx))
            .expect("failed to spawn solver worker");

        info!("🧮 Solve dispatcher started (single worker)");

        Self {
            job_tx,
            outcome_rx,
            inflight_cancel: None,
            latest_tick: None,
        }
    }

    /// Submit a solve, cancelling any still-running predecessor.
    pub fn submit(&mut self, request: SolveRequest) {
        if let Some(previous) = self.inflight_cancel.take() {
            previous.store(true, std::sync::atomic::Ordering::Relaxed);
        }

        let cancel = Arc::new(AtomicBool::new(false));
        self.inflight_cancel = Some(cancel.clone());
        self.latest_tick = Some(request.tick);

        debug!(
            "🧮 Submitting solve for tick {} ({} blocks)",
            request.tick,
            request.blocks.len()
        );
        let _ = self.job_tx.send(Job { request, cancel });
    }

    /// Poll for the outcome of the latest submitted tick. Outcomes from
    /// superseded ticks are drained and discarded.
    pub fn poll(&mut self) -> Option<SolveOutcome> {
        loop {
            match self.outcome_rx.try_recv() {
                Ok(outcome) => {
                    if Some(outcome.tick) == self.latest_tick {
                        self.inflight_cancel = None;
                        return Some(outcome);
                    }
                    debug!(
                        "🗑️ Discarding stale solve result for tick {}",
                        outcome.tick
                    );
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }
}

impl Default for SolveDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn worker_loop(job_rx: Receiver<Job>, outcome_tx: Sender<SolveOutcome>) {
    while let Ok(Job { request, cancel }) = job_rx.recv() {
        let started = Instant::now();
        let control =
            SolveControl::with_cancel(cancel).deadline(started + request.timeout);

        let result = PeriodOptimizer::new(&request.blocks, &request.params)
            .with_control(control)
            .solve(request.initial_soc_pct);

        let outcome = SolveOutcome {
            tick: request.tick,
            result,
            elapsed: started.elapsed(),
        };
        if outcome_tx.send(outcome).is_err() {
            break; // dispatcher dropped
        }
    }
}

//! Drivers that feed enrollment batches into a scheme.
//!
//! `run_rounds` advances synchronously (CLI, batch runs, tests). `Autopilot`
//! is the timer-driven variant: a background thread that enrolls one
//! randomly sized batch per interval, stops by itself when the scheme
//! collapses, and is cancelled on `stop()` or drop.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::dice::Dice;
use crate::error::SchemeError;
use crate::scheme::{advance_round, ParticipantScheme, RoundReport, SchemeKind};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutoAdvanceConfig {
    /// Delay between ticks, in milliseconds
    pub interval_ms: u64,
    /// Investment or membership fee paid by every newcomer
    pub amount: f64,
    /// Stop after this many rounds even if the scheme is still standing
    pub max_rounds: Option<u32>,
}

impl AutoAdvanceConfig {
    pub fn for_kind(kind: SchemeKind) -> Self {
        let interval_ms = match kind {
            SchemeKind::Ponzi => 2_000,
            SchemeKind::Pyramid => 2_500,
        };
        Self {
            interval_ms,
            amount: 500.0,
            max_rounds: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Advance until the scheme collapses or `max_rounds` rounds have been
/// played, sizing each batch with the scheme's recruitment policy.
pub fn run_rounds<S, D>(
    scheme: &mut S,
    dice: &mut D,
    amount: f64,
    max_rounds: u32,
) -> Result<Vec<RoundReport>, SchemeError>
where
    S: ParticipantScheme,
    D: Dice + ?Sized,
{
    let mut reports = Vec::new();
    while !scheme.current_state().is_collapsed() && reports.len() < max_rounds as usize {
        let count = scheme.next_batch_size(dice);
        let report = advance_round(scheme, count, amount, dice)?;
        reports.push(report);
    }
    Ok(reports)
}

/// Handle to a running auto-advance loop.
pub struct Autopilot {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<u32>>,
}

impl Autopilot {
    /// Spawn the loop. The caller keeps its own clone of `scheme` to read
    /// snapshots while the loop runs.
    pub fn start<S, D>(scheme: Arc<Mutex<S>>, mut dice: D, config: AutoAdvanceConfig) -> Self
    where
        S: ParticipantScheme + Send + 'static,
        D: Dice + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(config.interval());
        let handle = std::thread::spawn(move || {
            let mut ticks = 0u32;
            loop {
                select! {
                    // stop requested, or the handle was dropped
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {}
                }

                let Ok(mut guard) = scheme.lock() else {
                    error!("autopilot stopping: scheme lock poisoned");
                    break;
                };
                let count = guard.next_batch_size(&mut dice);
                match advance_round(&mut *guard, count, config.amount, &mut dice) {
                    Ok(report) => {
                        ticks += 1;
                        debug!(round = report.round, joined = report.joined, "autopilot tick");
                        if report.collapsed || report.skipped {
                            info!(round = report.round, "autopilot stopping: scheme collapsed");
                            break;
                        }
                        if config.max_rounds.is_some_and(|cap| report.round >= cap) {
                            info!(round = report.round, "autopilot stopping: round cap reached");
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "autopilot stopping: enrollment rejected");
                        break;
                    }
                }
            }
            ticks
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the loop and wait for it. Returns the number of rounds it played;
    /// a second call returns 0.
    pub fn stop(&mut self) -> u32 {
        self.shutdown()
    }

    /// Wait for the loop to end on its own (collapse or round cap).
    pub fn join(mut self) -> u32 {
        let ticks = self.handle.take().map_or(0, |h| h.join().unwrap_or(0));
        self.stop_tx = None;
        ticks
    }

    fn shutdown(&mut self) -> u32 {
        if let Some(tx) = self.stop_tx.take() {
            // the loop may already have exited; a closed channel is fine
            let _ = tx.try_send(());
        }
        self.handle.take().map_or(0, |h| h.join().unwrap_or(0))
    }
}

impl Drop for Autopilot {
    fn drop(&mut self) {
        self.shutdown();
    }
}

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::driver::run_rounds;
use crate::error::SchemeError;
use crate::scheme::{ParticipantScheme, SchemeKind};
use crate::stats::Summary;
use crate::types::{FlatParams, ReferralParams};
use crate::{flat, referral};

// ─── Single run ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize)]
pub struct RunResult {
    pub seed: u64,
    /// Round the scheme collapsed in, or `None` if it survived the cap.
    pub collapse_round: Option<u32>,
    pub summary: Summary,
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchConfig {
    pub kind: SchemeKind,
    pub amount: f64,
    pub max_rounds: u32,
    pub flat: FlatParams,
    pub referral: ReferralParams,
}

impl BatchConfig {
    pub fn new(kind: SchemeKind) -> Self {
        Self {
            kind,
            amount: 500.0,
            max_rounds: 100,
            flat: FlatParams::default(),
            referral: ReferralParams::default(),
        }
    }
}

/// Play one seeded simulation to collapse (or the round cap).
pub fn run_single(config: &BatchConfig, seed: u64) -> Result<RunResult, SchemeError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    match config.kind {
        SchemeKind::Ponzi => {
            let mut state = flat::initial_state(config.flat.clone())?;
            play(&mut state, &mut rng, config, seed)
        }
        SchemeKind::Pyramid => {
            let mut state = referral::initial_state(config.referral.clone())?;
            play(&mut state, &mut rng, config, seed)
        }
    }
}

fn play<S: ParticipantScheme>(
    scheme: &mut S,
    rng: &mut ChaCha8Rng,
    config: &BatchConfig,
    seed: u64,
) -> Result<RunResult, SchemeError> {
    run_rounds(scheme, rng, config.amount, config.max_rounds)?;
    let summary = scheme.summary();
    Ok(RunResult {
        seed,
        collapse_round: summary.collapsed.then_some(summary.round),
        summary,
    })
}

// ─── Parallel multi-run ───────────────────────────────────────────────────────

/// Run `n_sims` simulations in parallel with seeds `seed_start..seed_start + n_sims`.
pub fn run_parallel(
    config: &BatchConfig,
    n_sims: usize,
    seed_start: u64,
) -> Result<AggregatedResult, SchemeError> {
    let results: Vec<RunResult> = (0..n_sims)
        .into_par_iter()
        .map(|i| run_single(config, seed_start + i as u64))
        .collect::<Result<_, _>>()?;

    Ok(aggregate_results(config.kind, &results))
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AggregatedResult {
    pub kind: Option<SchemeKind>,
    pub runs: usize,
    /// Fraction of runs that collapsed before the round cap
    pub collapse_frequency: f64,
    pub mean_collapse_round: f64,
    pub max_collapse_round: u32,
    pub mean_participants: f64,
    pub mean_deficit: f64,
    pub mean_loss_share: f64,
}

pub fn aggregate_results(kind: SchemeKind, results: &[RunResult]) -> AggregatedResult {
    if results.is_empty() {
        return AggregatedResult {
            kind: Some(kind),
            ..Default::default()
        };
    }
    let n = results.len() as f64;
    let collapse_rounds: Vec<u32> = results.iter().filter_map(|r| r.collapse_round).collect();
    let mean_collapse_round = if collapse_rounds.is_empty() {
        0.0
    } else {
        collapse_rounds.iter().map(|&r| r as f64).sum::<f64>() / collapse_rounds.len() as f64
    };

    AggregatedResult {
        kind: Some(kind),
        runs: results.len(),
        collapse_frequency: collapse_rounds.len() as f64 / n,
        mean_collapse_round,
        max_collapse_round: collapse_rounds.iter().copied().max().unwrap_or(0),
        mean_participants: results.iter().map(|r| r.summary.participants as f64).sum::<f64>() / n,
        mean_deficit: results.iter().map(|r| r.summary.deficit).sum::<f64>() / n,
        mean_loss_share: results.iter().map(|r| r.summary.loss_share()).sum::<f64>() / n,
    }
}

impl AggregatedResult {
    pub fn print(&self) {
        println!("  Runs:                    {}", self.runs);
        println!("  Collapse frequency:      {:.1}%", self.collapse_frequency * 100.0);
        println!("  Avg collapse round:      {:.1}", self.mean_collapse_round);
        println!("  Max collapse round:      {}", self.max_collapse_round);
        println!("  Avg participants:        {:.1}", self.mean_participants);
        println!("  Avg deficit:             ${:.0}", self.mean_deficit);
        println!("  Avg share in loss:       {:.1}%", self.mean_loss_share * 100.0);
    }
}

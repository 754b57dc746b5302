//! Injectable random source.
//!
//! The engines only ever need two kinds of draw: a uniform fraction (collapse
//! shocks) and a uniform index (recruiter selection, batch sizes). Any
//! `rand` generator provides both; `ScriptedDice` replays fixed draws so a
//! test can pin an outcome exactly.

use std::collections::VecDeque;

use rand::{Rng, RngCore};

pub trait Dice {
    /// Uniform draw in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform index in `[0, n)`. `n` must be non-zero.
    fn pick(&mut self, n: usize) -> usize;
}

impl<R: RngCore> Dice for R {
    #[inline]
    fn unit(&mut self) -> f64 {
        self.gen::<f64>()
    }

    #[inline]
    fn pick(&mut self, n: usize) -> usize {
        self.gen_range(0..n)
    }
}

/// Replays queued draws in order. When a queue runs dry the fallback value is
/// used: `unit` falls back to `idle_unit`, `pick` to the last index.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDice {
    units: VecDeque<f64>,
    picks: VecDeque<usize>,
    idle_unit: f64,
}

impl ScriptedDice {
    /// Dice whose every `unit()` returns `value`.
    pub fn constant(value: f64) -> Self {
        Self {
            idle_unit: value,
            ..Default::default()
        }
    }

    pub fn with_units(mut self, units: impl IntoIterator<Item = f64>) -> Self {
        self.units.extend(units);
        self
    }

    pub fn with_picks(mut self, picks: impl IntoIterator<Item = usize>) -> Self {
        self.picks.extend(picks);
        self
    }

    pub fn remaining_units(&self) -> usize {
        self.units.len()
    }
}

impl Dice for ScriptedDice {
    fn unit(&mut self) -> f64 {
        self.units.pop_front().unwrap_or(self.idle_unit)
    }

    fn pick(&mut self, n: usize) -> usize {
        let last = n.saturating_sub(1);
        self.picks.pop_front().map_or(last, |i| i.min(last))
    }
}

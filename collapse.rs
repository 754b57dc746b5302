//! Collapse detector shared by both models.
//!
//! A cheap stochastic heuristic: once warm-up is over, a scheme collapses
//! when recruitment stalls or, with a fixed per-round probability, for no
//! structural reason at all. Collapse is terminal.

use serde::{Deserialize, Serialize};

use crate::dice::Dice;
use crate::types::{Participant, SimState, Status, COLLAPSE_WARMUP_ROUND};

/// Inputs the rules look at, taken from a state snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CollapseSignals {
    pub round: u32,
    pub total: usize,
    /// Joined within the trailing three-round window.
    pub recent: usize,
    pub in_profit: usize,
}

impl CollapseSignals {
    pub fn of<P: Participant, C>(state: &SimState<P, C>) -> Self {
        Self {
            round: state.current_round(),
            total: state.participants().len(),
            recent: state.recent_joiners(),
            in_profit: state.count_with_status(Status::Profit),
        }
    }

    /// Recent joiners relative to 30% of the roster.
    pub fn growth_rate(&self) -> f64 {
        self.recent as f64 / f64::max(1.0, self.total as f64 * 0.3)
    }

    /// Share of participants currently in profit.
    pub fn saturation(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.in_profit as f64 / self.total as f64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CollapseRule {
    /// Flat model: growth stalls, or a random shock.
    GrowthStall {
        min_round: u32,
        growth_floor: f64,
        shock_probability: f64,
    },
    /// Referral model: too few recruits, too few winners, or a random shock.
    Saturation {
        min_round: u32,
        recent_floor: usize,
        saturation_floor: f64,
        shock_probability: f64,
    },
}

impl CollapseRule {
    pub const FLAT: Self = CollapseRule::GrowthStall {
        min_round: 5,
        growth_floor: 0.1,
        shock_probability: 0.15,
    };

    pub const REFERRAL: Self = CollapseRule::Saturation {
        min_round: 4,
        recent_floor: 2,
        saturation_floor: 0.1,
        shock_probability: 0.12,
    };

    /// Decide whether `signals` trigger collapse. The dice are only rolled
    /// when no structural condition has already fired.
    pub fn triggers<D: Dice + ?Sized>(&self, signals: &CollapseSignals, dice: &mut D) -> bool {
        match *self {
            CollapseRule::GrowthStall { min_round, growth_floor, shock_probability } => {
                signals.round > min_round
                    && (signals.growth_rate() < growth_floor || dice.unit() < shock_probability)
            }
            CollapseRule::Saturation {
                min_round,
                recent_floor,
                saturation_floor,
                shock_probability,
            } => {
                signals.round > min_round
                    && (signals.recent < recent_floor
                        || signals.saturation() < saturation_floor
                        || dice.unit() < shock_probability)
            }
        }
    }
}

/// Run the detector against `state`. Returns true only on the round the
/// scheme transitions to collapsed.
pub fn detect<P: Participant, C, D: Dice + ?Sized>(
    state: &SimState<P, C>,
    rule: &CollapseRule,
    dice: &mut D,
) -> bool {
    if state.is_collapsed() || state.current_round() <= COLLAPSE_WARMUP_ROUND {
        return false;
    }
    rule.triggers(&CollapseSignals::of(state), dice)
}

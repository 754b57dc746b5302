use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::scheme::SchemeKind;
use crate::types::{Participant, ReferralState, SimState, Status};

/// Read-only figures a presentation layer shows during and after a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub round: u32,
    pub collapsed: bool,
    pub participants: usize,
    pub in_profit: usize,
    pub in_loss: usize,
    pub break_even: usize,
    pub total_invested: f64,
    pub total_paid_out: f64,
    /// Money taken in and never paid back.
    pub deficit: f64,
}

impl Summary {
    pub fn of<P: Participant, C>(state: &SimState<P, C>) -> Self {
        let mut in_profit = 0;
        let mut in_loss = 0;
        let mut break_even = 0;
        for p in state.participants() {
            match p.status() {
                Status::Profit => in_profit += 1,
                Status::Loss => in_loss += 1,
                Status::BreakEven => break_even += 1,
            }
        }
        Self {
            round: state.current_round(),
            collapsed: state.is_collapsed(),
            participants: state.participants().len(),
            in_profit,
            in_loss,
            break_even,
            total_invested: state.total_invested(),
            total_paid_out: state.total_paid_out(),
            deficit: state.deficit(),
        }
    }

    /// Share of participants who are down money.
    pub fn loss_share(&self) -> f64 {
        if self.participants == 0 {
            return 0.0;
        }
        self.in_loss as f64 / self.participants as f64
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Round:                 {}", self.round)?;
        writeln!(f, "  Status:                {}", if self.collapsed { "COLLAPSED" } else { "running" })?;
        writeln!(f, "  Participants:          {}", self.participants)?;
        writeln!(f, "  In profit:             {}", self.in_profit)?;
        writeln!(f, "  In loss:               {}", self.in_loss)?;
        writeln!(f, "  Break-even:            {}", self.break_even)?;
        writeln!(f, "  Total invested:        ${:.2}", self.total_invested)?;
        writeln!(f, "  Total paid out:        ${:.2}", self.total_paid_out)?;
        write!(f, "  Deficit:               ${:.2}", self.deficit)
    }
}

/// Members per pyramid level, top (founder, level 0) first.
pub fn level_counts(state: &ReferralState) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for m in state.participants() {
        *counts.entry(m.level).or_insert(0) += 1;
    }
    counts
}

/// Participants grouped by the round they joined in (round 0 = the founder).
pub fn by_joined_round<P: Participant, C>(state: &SimState<P, C>) -> BTreeMap<u32, Vec<&P>> {
    let mut rounds: BTreeMap<u32, Vec<&P>> = BTreeMap::new();
    for p in state.participants() {
        rounds.entry(p.joined_round()).or_default().push(p);
    }
    rounds
}

/// One-line notice shown when a scheme collapses.
pub fn collapse_notice(kind: SchemeKind, summary: &Summary) -> String {
    match kind {
        SchemeKind::Ponzi => format!(
            "SCHEME COLLAPSED! The Ponzi scheme has collapsed! {} people lost their money.",
            summary.in_loss
        ),
        SchemeKind::Pyramid => format!(
            "PYRAMID COLLAPSED! The pyramid scheme has collapsed! {} people lost their money. \
             Only those at the top made profits.",
            summary.in_loss
        ),
    }
}

//! The capability both models share, and the round-advance loop built on it.
//!
//! A round is: enroll a batch, then consult the collapse detector once. The
//! driver owns the state and sequences calls; nothing here locks.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collapse::{detect, CollapseRule};
use crate::dice::Dice;
use crate::error::SchemeError;
use crate::stats::Summary;
use crate::types::{
    FlatParams, FlatState, Participant, ReferralParams, ReferralState, SimState, Status,
};
use crate::{flat, referral};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    Ponzi,
    Pyramid,
}

impl SchemeKind {
    pub fn all() -> Vec<Self> {
        vec![Self::Ponzi, Self::Pyramid]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ponzi => "Ponzi (flat payout)",
            Self::Pyramid => "Pyramid (referral commission)",
        }
    }

    pub fn collapse_rule(&self) -> CollapseRule {
        match self {
            Self::Ponzi => CollapseRule::FLAT,
            Self::Pyramid => CollapseRule::REFERRAL,
        }
    }
}

/// What one call to `enroll` / `advance_round` did.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RoundReport {
    /// Round counter after the call.
    pub round: u32,
    pub joined: usize,
    pub new_money: f64,
    pub paid_out: f64,
    /// The call was a guarded no-op and the state is unchanged.
    pub skipped: bool,
    /// The collapse detector fired at the end of this round.
    pub collapsed: bool,
}

impl RoundReport {
    pub(crate) fn skipped(round: u32) -> Self {
        Self {
            round,
            skipped: true,
            ..Default::default()
        }
    }
}

pub trait ParticipantScheme {
    type Member: Participant;
    type Params: Clone;

    const KIND: SchemeKind;

    fn current_state(&self) -> &SimState<Self::Member, Self::Params>;

    /// Add `count` participants paying `amount` each. Guarded no-op when the
    /// scheme has collapsed.
    fn enroll<D: Dice + ?Sized>(
        &mut self,
        count: usize,
        amount: f64,
        dice: &mut D,
    ) -> Result<RoundReport, SchemeError>;

    /// Consult the detector once. Returns true if this call collapsed the scheme.
    fn check_collapse<D: Dice + ?Sized>(&mut self, dice: &mut D) -> bool;

    /// Back to the single-founder state with the same parameters.
    fn reset(&mut self);

    /// Batch size the auto-advance driver should enroll next.
    fn next_batch_size<D: Dice + ?Sized>(&self, dice: &mut D) -> usize;

    fn summary(&self) -> Summary {
        Summary::of(self.current_state())
    }
}

/// Enroll a batch, then run the collapse detector once.
pub fn advance_round<S, D>(
    scheme: &mut S,
    count: usize,
    amount: f64,
    dice: &mut D,
) -> Result<RoundReport, SchemeError>
where
    S: ParticipantScheme,
    D: Dice + ?Sized,
{
    let mut report = scheme.enroll(count, amount, dice)?;
    if !report.skipped {
        report.collapsed = scheme.check_collapse(dice);
    }
    Ok(report)
}

fn collapse_if_triggered<P: Participant, C, D: Dice + ?Sized>(
    state: &mut SimState<P, C>,
    kind: SchemeKind,
    dice: &mut D,
) -> bool {
    if !detect(state, &kind.collapse_rule(), dice) {
        return false;
    }
    state.collapsed = true;
    info!(
        scheme = kind.name(),
        round = state.current_round,
        losers = state.count_with_status(Status::Loss),
        deficit = state.deficit(),
        "scheme collapsed"
    );
    true
}

impl ParticipantScheme for FlatState {
    type Member = crate::types::Investor;
    type Params = FlatParams;

    const KIND: SchemeKind = SchemeKind::Ponzi;

    fn current_state(&self) -> &FlatState {
        self
    }

    fn enroll<D: Dice + ?Sized>(
        &mut self,
        count: usize,
        amount: f64,
        _dice: &mut D,
    ) -> Result<RoundReport, SchemeError> {
        flat::enroll_in_place(self, count, amount)
    }

    fn check_collapse<D: Dice + ?Sized>(&mut self, dice: &mut D) -> bool {
        collapse_if_triggered(self, Self::KIND, dice)
    }

    fn reset(&mut self) {
        *self = flat::founder_state(self.params.clone());
    }

    fn next_batch_size<D: Dice + ?Sized>(&self, dice: &mut D) -> usize {
        dice.pick(self.params.new_investors_per_round.max(1)) + 1
    }
}

impl ParticipantScheme for ReferralState {
    type Member = crate::types::Member;
    type Params = ReferralParams;

    const KIND: SchemeKind = SchemeKind::Pyramid;

    fn current_state(&self) -> &ReferralState {
        self
    }

    fn enroll<D: Dice + ?Sized>(
        &mut self,
        count: usize,
        amount: f64,
        dice: &mut D,
    ) -> Result<RoundReport, SchemeError> {
        referral::enroll_in_place(self, count, amount, dice)
    }

    fn check_collapse<D: Dice + ?Sized>(&mut self, dice: &mut D) -> bool {
        collapse_if_triggered(self, Self::KIND, dice)
    }

    fn reset(&mut self) {
        *self = referral::founder_state(self.params.clone());
    }

    /// Recruitment dries up over time: up to `5 - round / 2` recruits, never
    /// fewer than one.
    fn next_batch_size<D: Dice + ?Sized>(&self, dice: &mut D) -> usize {
        let ceiling = 5usize.saturating_sub(self.current_round as usize / 2).max(1);
        dice.pick(ceiling) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;

    #[test]
    fn advance_round_runs_detector_after_enroll() {
        let mut s = flat::initial_state(FlatParams::default()).unwrap();
        // shock always fires once the flat rule is armed (round > 5)
        let mut dice = ScriptedDice::constant(0.0);
        for round in 1..=5 {
            let r = advance_round(&mut s, 2, 500.0, &mut dice).unwrap();
            assert_eq!(r.round, round);
            assert!(!r.collapsed);
        }
        let r = advance_round(&mut s, 2, 500.0, &mut dice).unwrap();
        assert!(r.collapsed);
        assert!(s.is_collapsed());
        assert_eq!(s.current_round(), 6);

        let frozen = s.clone();
        let r = advance_round(&mut s, 3, 500.0, &mut dice).unwrap();
        assert!(r.skipped);
        assert_eq!(s, frozen);
    }

    #[test]
    fn reset_restores_initial_state() {
        let params = ReferralParams { founder_fee: 750.0, ..Default::default() };
        let initial = referral::initial_state(params).unwrap();
        let mut s = initial.clone();
        let mut dice = ScriptedDice::default();
        s.enroll(4, 750.0, &mut dice).unwrap();
        s.collapsed = true;
        s.reset();
        assert_eq!(s, initial);
    }

    #[test]
    fn referral_batch_ceiling_decays() {
        let mut s = referral::initial_state(ReferralParams::default()).unwrap();
        // pick() falls back to the top index, i.e. the ceiling itself
        let mut max_dice = ScriptedDice::default();
        assert_eq!(s.next_batch_size(&mut max_dice), 5);
        s.current_round = 4;
        assert_eq!(s.next_batch_size(&mut max_dice), 3);
        s.current_round = 20;
        assert_eq!(s.next_batch_size(&mut max_dice), 1);
    }

    #[test]
    fn flat_batch_size_within_configured_bound() {
        let s = flat::initial_state(FlatParams::default()).unwrap();
        let mut low = ScriptedDice::default().with_picks([0]);
        assert_eq!(s.next_batch_size(&mut low), 1);
        let mut high = ScriptedDice::default();
        assert_eq!(s.next_batch_size(&mut high), 2);
    }
}

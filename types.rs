use serde::{Deserialize, Serialize};

use crate::error::SchemeError;

/// Participant identifiers start at 1 (the founder) and are never reused.
pub type ParticipantId = u32;

pub const FOUNDER_ID: ParticipantId = 1;
pub const FOUNDER_LABEL: &str = "Founder (You)";

// ─── Model constants ──────────────────────────────────────────────────────────

/// Share of each round's new money released to existing investors.
/// The remaining 20% is kept by the organizer.
pub const PAYOUT_POOL_SHARE: f64 = 0.8;

/// The collapse detector is not consulted until the round counter passes this.
pub const COLLAPSE_WARMUP_ROUND: u32 = 3;

/// Trailing window (in rounds, inclusive of the current one) for "recent" joiners.
pub const RECENT_WINDOW_ROUNDS: u32 = 3;

// ─── Derived status ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Profit,
    Loss,
    BreakEven,
}

impl Status {
    #[inline]
    pub fn from_net_profit(net_profit: f64) -> Self {
        if net_profit > 0.0 {
            Status::Profit
        } else if net_profit < 0.0 {
            Status::Loss
        } else {
            Status::BreakEven
        }
    }
}

// ─── Participant records ──────────────────────────────────────────────────────

/// Read view shared by both participant kinds, so summaries and the collapse
/// detector are written once.
pub trait Participant {
    fn id(&self) -> ParticipantId;
    fn investment(&self) -> f64;
    fn total_earned(&self) -> f64;
    fn net_profit(&self) -> f64;
    fn joined_round(&self) -> u32;

    fn status(&self) -> Status {
        Status::from_net_profit(self.net_profit())
    }
}

/// A participant of the flat-payout ("Ponzi") model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Investor {
    pub id: ParticipantId,
    pub label: String,
    pub investment: f64,
    /// Never populated in the flat model; kept so both record shapes line up.
    pub recruits: Vec<ParticipantId>,
    pub total_earned: f64,
    pub net_profit: f64,
    pub joined_round: u32,
    /// Display-only depth hint, not used by payout math.
    pub level: u32,
}

impl Investor {
    pub fn founder(investment: f64) -> Self {
        Self {
            id: FOUNDER_ID,
            label: FOUNDER_LABEL.to_string(),
            investment,
            recruits: Vec::new(),
            total_earned: 0.0,
            net_profit: -investment,
            joined_round: 0,
            level: 0,
        }
    }

    pub fn new(id: ParticipantId, investment: f64, joined_round: u32, level: u32) -> Self {
        Self {
            id,
            label: format!("Investor {id}"),
            investment,
            recruits: Vec::new(),
            total_earned: 0.0,
            net_profit: -investment,
            joined_round,
            level,
        }
    }

    /// Credit a payout. Net profit is maintained incrementally.
    #[inline]
    pub fn credit(&mut self, amount: f64) {
        self.total_earned += amount;
        self.net_profit += amount;
    }
}

impl Participant for Investor {
    fn id(&self) -> ParticipantId { self.id }
    fn investment(&self) -> f64 { self.investment }
    fn total_earned(&self) -> f64 { self.total_earned }
    fn net_profit(&self) -> f64 { self.net_profit }
    fn joined_round(&self) -> u32 { self.joined_round }
}

/// A participant of the referral-commission ("pyramid") model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: ParticipantId,
    pub label: String,
    /// Founder = 0; a recruit sits one level below its recruiter.
    pub level: u32,
    pub recruiter: Option<ParticipantId>,
    pub recruits: Vec<ParticipantId>,
    pub investment: f64,
    pub total_earned: f64,
    pub net_profit: f64,
    pub joined_round: u32,
    /// Gates commission eligibility. Nothing deactivates members yet.
    pub active: bool,
}

impl Member {
    pub fn founder(fee: f64) -> Self {
        Self {
            id: FOUNDER_ID,
            label: FOUNDER_LABEL.to_string(),
            level: 0,
            recruiter: None,
            recruits: Vec::new(),
            investment: fee,
            total_earned: 0.0,
            net_profit: -fee,
            joined_round: 0,
            active: true,
        }
    }

    pub fn recruited_by(recruiter: &Member, id: ParticipantId, fee: f64, joined_round: u32) -> Self {
        Self {
            id,
            label: format!("Member {id}"),
            level: recruiter.level + 1,
            recruiter: Some(recruiter.id),
            recruits: Vec::new(),
            investment: fee,
            total_earned: 0.0,
            net_profit: -fee,
            joined_round,
            active: true,
        }
    }

    #[inline]
    pub fn credit(&mut self, amount: f64) {
        self.total_earned += amount;
        self.net_profit += amount;
    }
}

impl Participant for Member {
    fn id(&self) -> ParticipantId { self.id }
    fn investment(&self) -> f64 { self.investment }
    fn total_earned(&self) -> f64 { self.total_earned }
    fn net_profit(&self) -> f64 { self.net_profit }
    fn joined_round(&self) -> u32 { self.joined_round }
}

// ─── Parameters ───────────────────────────────────────────────────────────────

/// Configuration of the flat-payout model, fixed at initialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatParams {
    pub founder_investment: f64,
    /// Fraction of an investor's own stake paid back per round.
    pub payout_rate: f64,
    /// Upper bound of the auto-advance batch size.
    pub new_investors_per_round: usize,
}

impl Default for FlatParams {
    fn default() -> Self {
        Self {
            founder_investment: 1000.0,
            payout_rate: 0.2,
            new_investors_per_round: 2,
        }
    }
}

impl FlatParams {
    pub fn validate(&self) -> Result<(), SchemeError> {
        check_amount(self.founder_investment)?;
        check_fraction("payout_rate", self.payout_rate)?;
        if self.new_investors_per_round == 0 {
            return Err(SchemeError::InvalidParams(
                "new_investors_per_round must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration of the referral-commission model, fixed at initialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferralParams {
    pub founder_fee: f64,
    pub commission_rate: f64,
    /// How many ancestor levels a commission climbs.
    pub max_depth: u32,
}

impl Default for ReferralParams {
    fn default() -> Self {
        Self {
            founder_fee: 500.0,
            commission_rate: 0.3,
            max_depth: 3,
        }
    }
}

impl ReferralParams {
    pub fn validate(&self) -> Result<(), SchemeError> {
        check_amount(self.founder_fee)?;
        check_fraction("commission_rate", self.commission_rate)?;
        if self.max_depth == 0 {
            return Err(SchemeError::InvalidParams("max_depth must be at least 1".into()));
        }
        Ok(())
    }
}

/// Rejects non-positive, NaN and infinite currency amounts.
pub fn check_amount(amount: f64) -> Result<(), SchemeError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(SchemeError::InvalidAmount(amount))
    }
}

pub fn check_count(count: usize) -> Result<(), SchemeError> {
    if count == 0 {
        Err(SchemeError::InvalidCount(count))
    } else {
        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<(), SchemeError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SchemeError::InvalidParams(format!("{name} must be within [0, 1], got {value}")))
    }
}

// ─── Simulation state ─────────────────────────────────────────────────────────

/// Snapshot of one simulation. Participants are kept in join order, which is
/// also identifier order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimState<P, C> {
    pub(crate) participants: Vec<P>,
    pub(crate) total_invested: f64,
    pub(crate) total_paid_out: f64,
    pub(crate) current_round: u32,
    pub(crate) collapsed: bool,
    pub(crate) params: C,
}

pub type FlatState = SimState<Investor, FlatParams>;
pub type ReferralState = SimState<Member, ReferralParams>;

impl<P: Participant, C> SimState<P, C> {
    pub fn participants(&self) -> &[P] { &self.participants }
    pub fn total_invested(&self) -> f64 { self.total_invested }
    pub fn total_paid_out(&self) -> f64 { self.total_paid_out }
    pub fn current_round(&self) -> u32 { self.current_round }
    pub fn is_collapsed(&self) -> bool { self.collapsed }
    pub fn params(&self) -> &C { &self.params }

    /// Money taken in and never returned.
    pub fn deficit(&self) -> f64 {
        self.total_invested - self.total_paid_out
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&P> {
        // ids are contiguous from 1, so the index is id - 1
        let idx = (id as usize).checked_sub(1)?;
        self.participants.get(idx).filter(|p| p.id() == id)
    }

    pub(crate) fn next_id(&self) -> ParticipantId {
        self.participants.len() as ParticipantId + 1
    }

    /// Participants whose join round falls in the trailing window ending at
    /// the current round.
    pub fn recent_joiners(&self) -> usize {
        let since = self.current_round.saturating_sub(RECENT_WINDOW_ROUNDS - 1);
        self.participants
            .iter()
            .filter(|p| p.joined_round() >= since)
            .count()
    }

    pub fn count_with_status(&self, status: Status) -> usize {
        self.participants.iter().filter(|p| p.status() == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_net_profit_sign() {
        assert_eq!(Status::from_net_profit(12.5), Status::Profit);
        assert_eq!(Status::from_net_profit(-0.01), Status::Loss);
        assert_eq!(Status::from_net_profit(0.0), Status::BreakEven);
    }

    #[test]
    fn credit_keeps_net_profit_in_step() {
        let mut inv = Investor::new(4, 500.0, 2, 3);
        inv.credit(100.0);
        inv.credit(450.0);
        assert_eq!(inv.total_earned, 550.0);
        assert_eq!(inv.net_profit, 50.0);
        assert_eq!(inv.status(), Status::Profit);
    }

    #[test]
    fn recruit_sits_one_level_below_recruiter() {
        let founder = Member::founder(500.0);
        let m = Member::recruited_by(&founder, 2, 500.0, 1);
        assert_eq!(m.level, 1);
        assert_eq!(m.recruiter, Some(FOUNDER_ID));
        assert_eq!(m.label, "Member 2");
        assert!(m.active);
    }

    #[test]
    fn amount_checks_reject_garbage() {
        assert!(check_amount(1.0).is_ok());
        assert_eq!(check_amount(0.0), Err(SchemeError::InvalidAmount(0.0)));
        assert!(check_amount(-5.0).is_err());
        assert!(check_amount(f64::NAN).is_err());
        assert!(check_amount(f64::INFINITY).is_err());
        assert_eq!(check_count(0), Err(SchemeError::InvalidCount(0)));
    }

    #[test]
    fn default_params_validate() {
        assert!(FlatParams::default().validate().is_ok());
        assert!(ReferralParams::default().validate().is_ok());
        let bad = ReferralParams { commission_rate: 1.5, ..Default::default() };
        assert!(matches!(bad.validate(), Err(SchemeError::InvalidParams(_))));
    }
}

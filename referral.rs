//! Referral commission engine ("pyramid" / MLM model).
//!
//! Members hang off a recruiter tree. Every new member pays a fee, and a
//! commission of `fee * rate / d` flows to the ancestor `d` levels above,
//! for `d = 1..=max_depth`.

use tracing::{debug, trace, warn};

use crate::dice::Dice;
use crate::error::SchemeError;
use crate::scheme::RoundReport;
use crate::types::{
    check_amount, check_count, Member, ParticipantId, ReferralParams, ReferralState,
};

pub fn initial_state(params: ReferralParams) -> Result<ReferralState, SchemeError> {
    params.validate()?;
    Ok(founder_state(params))
}

/// Throw away `state` and start over with the same parameters.
///
/// Starting from parameters alone is `initial_state(params)`; this form keeps
/// the parameters a running scheme was validated with.
pub fn reset(state: &ReferralState) -> ReferralState {
    founder_state(state.params.clone())
}

pub(crate) fn founder_state(params: ReferralParams) -> ReferralState {
    let founder = Member::founder(params.founder_fee);
    ReferralState {
        total_invested: founder.investment,
        participants: vec![founder],
        total_paid_out: 0.0,
        current_round: 0,
        collapsed: false,
        params,
    }
}

/// Enroll `count` members paying `fee` each and return the next state.
///
/// Recruiters are drawn from `dice`. A collapsed state, or one without any
/// active member, comes back unchanged.
pub fn enroll<D: Dice + ?Sized>(
    state: &ReferralState,
    count: usize,
    fee: f64,
    dice: &mut D,
) -> Result<ReferralState, SchemeError> {
    let mut next = state.clone();
    enroll_in_place(&mut next, count, fee, dice)?;
    Ok(next)
}

pub(crate) fn enroll_in_place<D: Dice + ?Sized>(
    state: &mut ReferralState,
    count: usize,
    fee: f64,
    dice: &mut D,
) -> Result<RoundReport, SchemeError> {
    check_count(count)?;
    check_amount(fee)?;

    if state.collapsed {
        warn!(round = state.current_round, "enrollment ignored: pyramid has collapsed");
        return Ok(RoundReport::skipped(state.current_round));
    }

    // Indices into `participants` of members eligible to recruit.
    let mut active: Vec<usize> = state
        .participants
        .iter()
        .enumerate()
        .filter(|(_, m)| m.active)
        .map(|(i, _)| i)
        .collect();
    if active.is_empty() {
        warn!(round = state.current_round, "enrollment ignored: no active recruiter");
        return Ok(RoundReport::skipped(state.current_round));
    }

    let joined_round = state.current_round + 1;
    let mut commissions_paid = 0.0;

    for _ in 0..count {
        let recruiter_idx = active[dice.pick(active.len())];
        let id = state.next_id();
        let member = Member::recruited_by(&state.participants[recruiter_idx], id, fee, joined_round);
        let recruiter_id = state.participants[recruiter_idx].id;

        state.participants[recruiter_idx].recruits.push(id);
        state.participants.push(member);
        active.push(state.participants.len() - 1);

        commissions_paid += pay_commission_cascade(
            &mut state.participants,
            recruiter_id,
            fee,
            state.params.commission_rate,
            state.params.max_depth,
        );
    }

    let new_money = count as f64 * fee;
    state.total_invested += new_money;
    state.total_paid_out += commissions_paid;
    state.current_round = joined_round;

    debug!(
        round = state.current_round,
        joined = count,
        new_money,
        commissions_paid,
        "referral round advanced"
    );

    Ok(RoundReport {
        round: state.current_round,
        joined: count,
        new_money,
        paid_out: commissions_paid,
        skipped: false,
        collapsed: false,
    })
}

/// Walk up from `start` (the direct recruiter), paying `fee * rate / depth`
/// to each active ancestor. The walk halts at the first inactive ancestor, at
/// the founder, or past `max_depth`. Returns the total paid.
fn pay_commission_cascade(
    members: &mut [Member],
    start: ParticipantId,
    fee: f64,
    rate: f64,
    max_depth: u32,
) -> f64 {
    let mut paid = 0.0;
    let mut cursor = Some(start);
    let mut depth = 1u32;

    while let Some(id) = cursor {
        if depth > max_depth {
            break;
        }
        // ids are contiguous from 1
        let Some(ancestor) = members.get_mut(id as usize - 1) else {
            break;
        };
        if !ancestor.active {
            break;
        }
        let commission = fee * rate / depth as f64;
        ancestor.credit(commission);
        paid += commission;
        trace!(ancestor = id, depth, commission, "commission paid");

        cursor = ancestor.recruiter;
        depth += 1;
    }
    paid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn direct_recruit_pays_founder_full_rate() {
        let s = initial_state(ReferralParams::default()).unwrap();
        let mut dice = ScriptedDice::default().with_picks([0]);
        let s = enroll(&s, 1, 500.0, &mut dice).unwrap();

        let founder = &s.participants()[0];
        let recruit = &s.participants()[1];
        assert_eq!(recruit.level, 1);
        assert_eq!(recruit.recruiter, Some(1));
        assert_eq!(founder.recruits, vec![2]);
        assert!(approx(founder.total_earned, 150.0));
        assert!(approx(founder.net_profit, -350.0));
        assert!(approx(s.total_paid_out(), 150.0));
    }

    #[test]
    fn cascade_decays_harmonically_and_stops_at_max_depth() {
        // Build a chain 1 <- 2 <- 3 <- 4 <- 5 by always picking the newest member.
        let s = initial_state(ReferralParams::default()).unwrap();
        let mut dice = ScriptedDice::default().with_picks([0, 1, 2, 3]);
        let s = enroll(&s, 4, 100.0, &mut dice).unwrap();
        let levels: Vec<u32> = s.participants().iter().map(|m| m.level).collect();
        assert_eq!(levels, vec![0, 1, 2, 3, 4]);

        // Member 5 joined last: 4 earns 30, 3 earns 15, 2 earns 10, founder is depth 4.
        // Totals across the batch:
        //   m2 recruit -> 1:30
        //   m3 recruit -> 2:30, 1:15
        //   m4 recruit -> 3:30, 2:15, 1:10
        //   m5 recruit -> 4:30, 3:15, 2:10  (1 is beyond max_depth)
        let earned: Vec<f64> = s.participants().iter().map(|m| m.total_earned).collect();
        assert!(approx(earned[0], 55.0));
        assert!(approx(earned[1], 55.0));
        assert!(approx(earned[2], 45.0));
        assert!(approx(earned[3], 30.0));
        assert!(approx(earned[4], 0.0));
        assert!(approx(s.total_paid_out(), 185.0));
    }

    #[test]
    fn cascade_halts_at_inactive_ancestor() {
        let mut members = vec![Member::founder(500.0)];
        let m2 = Member::recruited_by(&members[0], 2, 500.0, 1);
        members.push(m2);
        let mut m3 = Member::recruited_by(&members[1], 3, 500.0, 1);
        m3.active = false;
        members.push(m3);

        // new member recruited by 3: 3 is inactive, nobody above it is paid
        let paid = pay_commission_cascade(&mut members, 3, 500.0, 0.3, 3);
        assert_eq!(paid, 0.0);
        assert_eq!(members[1].total_earned, 0.0);
        assert_eq!(members[0].total_earned, 0.0);

        // recruited by 2: 2 and founder are paid
        let paid = pay_commission_cascade(&mut members, 2, 500.0, 0.3, 3);
        assert!(approx(paid, 150.0 + 75.0));
    }

    #[test]
    fn bad_input_leaves_state_untouched() {
        let s = initial_state(ReferralParams::default()).unwrap();
        let mut dice = ScriptedDice::default();
        assert_eq!(enroll(&s, 0, 500.0, &mut dice), Err(SchemeError::InvalidCount(0)));
        assert_eq!(enroll(&s, 2, 0.0, &mut dice), Err(SchemeError::InvalidAmount(0.0)));
        assert!(enroll(&s, 1, f64::INFINITY, &mut dice).is_err());

        // rejected even when no recruiter is left to take the request
        let mut stuck = s.clone();
        stuck.participants[0].active = false;
        assert_eq!(enroll(&stuck, 1, -5.0, &mut dice), Err(SchemeError::InvalidAmount(-5.0)));

        let mut live = s.clone();
        assert!(enroll_in_place(&mut live, 0, 500.0, &mut dice).is_err());
        assert_eq!(live, s);
        assert_eq!(live.current_round(), 0);
        assert_eq!(live.participants().len(), 1);
    }

    #[test]
    fn no_active_recruiter_is_a_no_op() {
        let mut s = initial_state(ReferralParams::default()).unwrap();
        s.participants[0].active = false;
        let mut dice = ScriptedDice::default();
        let next = enroll(&s, 2, 500.0, &mut dice).unwrap();
        assert_eq!(next, s);
    }

    #[test]
    fn later_joiners_in_a_batch_can_recruit() {
        let s = initial_state(ReferralParams::default()).unwrap();
        // second pick chooses index 1 of the active list, i.e. member 2
        let mut dice = ScriptedDice::default().with_picks([0, 1]);
        let s = enroll(&s, 2, 500.0, &mut dice).unwrap();
        assert_eq!(s.participants()[2].recruiter, Some(2));
        assert_eq!(s.participants()[1].recruits, vec![3]);
        assert_eq!(s.current_round(), 1);
    }
}

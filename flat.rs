//! Flat payout engine ("Ponzi" model).
//!
//! Each round, 80% of the new money is paid out to earlier investors in strict
//! join order. Every investor is owed `investment * payout_rate`; whoever is
//! first in line gets paid in full until the pool runs dry, and later
//! investors get nothing.

use tracing::{debug, warn};

use crate::error::SchemeError;
use crate::scheme::RoundReport;
use crate::types::{
    check_amount, check_count, FlatParams, FlatState, Investor, ParticipantId, PAYOUT_POOL_SHARE,
};

/// Fresh state holding only the founder.
pub fn initial_state(params: FlatParams) -> Result<FlatState, SchemeError> {
    params.validate()?;
    Ok(founder_state(params))
}

/// Throw away `state` and start over with the same parameters.
///
/// Starting from parameters alone is `initial_state(params)`; this form keeps
/// the parameters a running scheme was validated with.
pub fn reset(state: &FlatState) -> FlatState {
    founder_state(state.params.clone())
}

pub(crate) fn founder_state(params: FlatParams) -> FlatState {
    let founder = Investor::founder(params.founder_investment);
    FlatState {
        total_invested: founder.investment,
        participants: vec![founder],
        total_paid_out: 0.0,
        current_round: 0,
        collapsed: false,
        params,
    }
}

/// Enroll `count` investors of `amount` each and return the next state.
///
/// A collapsed state comes back unchanged.
pub fn enroll(state: &FlatState, count: usize, amount: f64) -> Result<FlatState, SchemeError> {
    let mut next = state.clone();
    enroll_in_place(&mut next, count, amount)?;
    Ok(next)
}

/// Display depth hint for a batch that brings the roster to `roster_after` people.
#[inline]
pub fn display_level(roster_after: usize) -> u32 {
    roster_after.max(1).ilog2() + 1
}

pub(crate) fn enroll_in_place(
    state: &mut FlatState,
    count: usize,
    amount: f64,
) -> Result<RoundReport, SchemeError> {
    check_count(count)?;
    check_amount(amount)?;

    if state.collapsed {
        warn!(round = state.current_round, "enrollment ignored: scheme has collapsed");
        return Ok(RoundReport::skipped(state.current_round));
    }

    // ── 1. New investors ──────────────────────────────────────────────────────
    let existing = state.participants.len();
    let joined_round = state.current_round + 1;
    let level = display_level(existing + count);
    let first_id = state.next_id();
    let newcomers: Vec<Investor> = (0..count)
        .map(|i| Investor::new(first_id + i as ParticipantId, amount, joined_round, level))
        .collect();

    // ── 2. Payout pool ────────────────────────────────────────────────────────
    let new_money = count as f64 * amount;
    let pool = new_money * PAYOUT_POOL_SHARE;

    // ── 3. Ordered distribution to the pre-round roster ───────────────────────
    let paid_out = distribute_in_join_order(&mut state.participants, pool, state.params.payout_rate);

    // ── 4-5. Append and roll the ledger ───────────────────────────────────────
    state.participants.extend(newcomers);
    state.total_invested += new_money;
    state.total_paid_out += paid_out;
    state.current_round = joined_round;

    debug!(
        round = state.current_round,
        joined = count,
        new_money,
        pool,
        paid_out,
        "flat round advanced"
    );

    Ok(RoundReport {
        round: state.current_round,
        joined: count,
        new_money,
        paid_out,
        skipped: false,
        collapsed: false,
    })
}

/// Pay `min(remaining, investment * rate)` to each investor in order until the
/// pool is spent. Returns the amount actually distributed.
fn distribute_in_join_order(investors: &mut [Investor], pool: f64, rate: f64) -> f64 {
    let mut remaining = pool;
    let mut distributed = 0.0;
    for investor in investors.iter_mut() {
        if remaining <= 0.0 {
            break;
        }
        let payout = remaining.min(investor.investment * rate);
        investor.credit(payout);
        remaining -= payout;
        distributed += payout;
    }
    distributed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Participant;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn founder_only_initial_state() {
        let s = initial_state(FlatParams::default()).unwrap();
        assert_eq!(s.participants().len(), 1);
        let founder = &s.participants()[0];
        assert_eq!(founder.id, 1);
        assert_eq!(founder.investment, 1000.0);
        assert_eq!(founder.net_profit, -1000.0);
        assert_eq!(founder.joined_round, 0);
        assert_eq!(s.total_invested(), 1000.0);
        assert_eq!(s.current_round(), 0);
    }

    #[test]
    fn distribution_stops_when_pool_is_spent() {
        let mut investors = vec![
            Investor::founder(1000.0),
            Investor::new(2, 500.0, 1, 2),
            Investor::new(3, 500.0, 1, 2),
        ];
        let paid = distribute_in_join_order(&mut investors, 250.0, 0.2);
        assert!(approx(paid, 250.0));
        assert!(approx(investors[0].total_earned, 200.0));
        assert!(approx(investors[1].total_earned, 50.0));
        assert_eq!(investors[2].total_earned, 0.0);
    }

    #[test]
    fn short_roster_leaves_pool_undistributed() {
        let s = initial_state(FlatParams::default()).unwrap();
        let s = enroll(&s, 2, 500.0).unwrap();
        // 800 pool, founder is owed 200 and is the only one in line
        assert!(approx(s.total_paid_out(), 200.0));
        assert!(approx(s.deficit(), 1800.0));
    }

    #[test]
    fn display_level_tracks_roster_size() {
        assert_eq!(display_level(3), 2);
        assert_eq!(display_level(4), 3);
        assert_eq!(display_level(7), 3);
        assert_eq!(display_level(8), 4);
    }

    #[test]
    fn bad_input_leaves_state_untouched() {
        let s = initial_state(FlatParams::default()).unwrap();
        assert_eq!(enroll(&s, 0, 500.0), Err(SchemeError::InvalidCount(0)));
        assert_eq!(enroll(&s, 1, -1.0), Err(SchemeError::InvalidAmount(-1.0)));
        assert!(enroll(&s, 1, f64::NAN).is_err());
        assert_eq!(s.current_round(), 0);
    }

    #[test]
    fn newcomers_get_sequential_ids_and_labels() {
        let s = initial_state(FlatParams::default()).unwrap();
        let s = enroll(&s, 3, 250.0).unwrap();
        let ids: Vec<_> = s.participants().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(s.participants()[3].label, "Investor 4");
        assert!(s.participants()[1..].iter().all(|p| p.joined_round == 1));
    }
}

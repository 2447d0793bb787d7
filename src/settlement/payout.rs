//! Tier pricing
//!
//! Fixed-odds products pay the configured amount per winning single bet.
//! Pari-mutuel products split a share of the recorded jackpot between all
//! winners of the tier; tiers without a share fall back to their fixed amount.

use crate::common::types::Money;
use crate::config::{PayoutKind, TierSpec, BPS_DENOMINATOR};

/// Prices one tier once every winner of the issue is known
pub trait PayoutStrategy: Send + Sync {
    /// Amount paid per winning single bet
    fn per_winner_amount(&self, tier: &TierSpec, winner_units: u64, jackpot: Money) -> Money;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FixedOdds;

impl PayoutStrategy for FixedOdds {
    fn per_winner_amount(&self, tier: &TierSpec, _winner_units: u64, _jackpot: Money) -> Money {
        tier.fixed_amount().unwrap_or(Money::ZERO)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PariMutuel;

impl PayoutStrategy for PariMutuel {
    fn per_winner_amount(&self, tier: &TierSpec, winner_units: u64, jackpot: Money) -> Money {
        if winner_units == 0 {
            return Money::ZERO;
        }
        match tier.pool_share_bps {
            Some(bps) => {
                // rounds down; the remainder stays in the pool
                let pool = i128::from(jackpot.minor().max(0)) * i128::from(bps) / i128::from(BPS_DENOMINATOR);
                let share = pool / i128::from(winner_units);
                Money::from_minor(i64::try_from(share).unwrap_or(i64::MAX))
            }
            None => tier.fixed_amount().unwrap_or(Money::ZERO),
        }
    }
}

static FIXED_ODDS: FixedOdds = FixedOdds;
static PARI_MUTUEL: PariMutuel = PariMutuel;

pub fn strategy_for(kind: PayoutKind) -> &'static dyn PayoutStrategy {
    match kind {
        PayoutKind::Fixed => &FIXED_ODDS,
        PayoutKind::PariMutuel => &PARI_MUTUEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(bps: u32) -> TierSpec {
        TierSpec {
            label: "first".to_string(),
            amount_minor: None,
            pool_share_bps: Some(bps),
        }
    }

    fn fixed(minor: i64) -> TierSpec {
        TierSpec {
            label: "third".to_string(),
            amount_minor: Some(minor),
            pool_share_bps: None,
        }
    }

    #[test]
    fn test_pool_is_split_between_winners() {
        let jackpot = Money::from_major(10_000);
        let pari = strategy_for(PayoutKind::PariMutuel);

        assert_eq!(pari.per_winner_amount(&shared(7_000), 1, jackpot), Money::from_major(7_000));
        assert_eq!(pari.per_winner_amount(&shared(7_000), 2, jackpot), Money::from_major(3_500));
        // 700000 minor / 3 rounds down
        assert_eq!(pari.per_winner_amount(&shared(7_000), 3, jackpot), Money::from_minor(233_333));
    }

    #[test]
    fn test_no_winners_prices_at_zero() {
        let pari = strategy_for(PayoutKind::PariMutuel);
        assert_eq!(pari.per_winner_amount(&shared(7_000), 0, Money::from_major(10_000)), Money::ZERO);
        assert_eq!(pari.per_winner_amount(&fixed(500), 0, Money::ZERO), Money::ZERO);
    }

    #[test]
    fn test_fixed_tiers_ignore_jackpot() {
        let pari = strategy_for(PayoutKind::PariMutuel);
        assert_eq!(pari.per_winner_amount(&fixed(300_000), 4, Money::ZERO), Money::from_minor(300_000));

        let fixed_odds = strategy_for(PayoutKind::Fixed);
        assert_eq!(
            fixed_odds.per_winner_amount(&fixed(104_000), 10, Money::from_major(1)),
            Money::from_minor(104_000)
        );
        assert_eq!(fixed_odds.per_winner_amount(&shared(7_000), 1, Money::from_major(1)), Money::ZERO);
    }
}

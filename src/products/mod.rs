//! Lottery products, bet types and the bet format registry
//!
//! `LotteryProduct` is the single closed set of products used everywhere in the
//! crate. Each product's number layout lives in [`rules`]; the registry turns raw
//! selections into their canonical, comparable form.

pub mod combinatorics;
pub mod registry;
pub mod rules;

pub use registry::{BetFormatRegistry, BetLimits, CanonicalSelection};
pub use rules::{rule_for, ProductRule};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported lottery products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LotteryProduct {
    /// Pick 6 of 33 plus 1 bonus of 16
    #[serde(rename = "DOUBLE_BALL")]
    DoubleBall,
    /// Five ordered digits
    #[serde(rename = "ARRANGE_V5")]
    ArrangeV5,
    /// Three ordered digits
    #[serde(rename = "ARRANGE_V3")]
    ArrangeV3,
    /// Pick 6 of 49
    #[serde(rename = "SUPER_LOTTO")]
    SuperLotto,
    /// Call 9 of the 14 pool matches
    #[serde(rename = "SELECT_NINE")]
    SelectNine,
    /// 14-match football outcome pool
    #[serde(rename = "FOOTBALL_LOTTERY")]
    FootballLottery,
    /// 4-match basketball outcome pool
    #[serde(rename = "BASKETBALL_LOTTERY")]
    BasketballLottery,
    /// One match outcome
    #[serde(rename = "SINGLE_MATCH")]
    SingleMatch,
    /// Pick 7 of 30 plus a special number
    #[serde(rename = "SEVEN_HAPPY")]
    SevenHappy,
    /// Pick up to 10, 20 of 80 drawn
    #[serde(rename = "HAPPY_8")]
    Happy8,
    /// Three ordered digits
    #[serde(rename = "WELFARE_3D")]
    Welfare3D,
}

impl LotteryProduct {
    pub const ALL: [LotteryProduct; 11] = [
        LotteryProduct::DoubleBall,
        LotteryProduct::ArrangeV5,
        LotteryProduct::ArrangeV3,
        LotteryProduct::SuperLotto,
        LotteryProduct::SelectNine,
        LotteryProduct::FootballLottery,
        LotteryProduct::BasketballLottery,
        LotteryProduct::SingleMatch,
        LotteryProduct::SevenHappy,
        LotteryProduct::Happy8,
        LotteryProduct::Welfare3D,
    ];

    /// Stable code used in storage keys and configuration
    pub fn code(&self) -> &'static str {
        match self {
            LotteryProduct::DoubleBall => "DOUBLE_BALL",
            LotteryProduct::ArrangeV5 => "ARRANGE_V5",
            LotteryProduct::ArrangeV3 => "ARRANGE_V3",
            LotteryProduct::SuperLotto => "SUPER_LOTTO",
            LotteryProduct::SelectNine => "SELECT_NINE",
            LotteryProduct::FootballLottery => "FOOTBALL_LOTTERY",
            LotteryProduct::BasketballLottery => "BASKETBALL_LOTTERY",
            LotteryProduct::SingleMatch => "SINGLE_MATCH",
            LotteryProduct::SevenHappy => "SEVEN_HAPPY",
            LotteryProduct::Happy8 => "HAPPY_8",
            LotteryProduct::Welfare3D => "WELFARE_3D",
        }
    }

    pub fn rule(&self) -> &'static ProductRule {
        rule_for(*self)
    }
}

impl fmt::Display for LotteryProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LotteryProduct {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LotteryProduct::ALL
            .iter()
            .copied()
            .find(|p| p.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown lottery product '{}'", s))
    }
}

/// How a ticket's numbers are played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetType {
    /// Exactly the selected numbers, one single bet
    Direct,
    /// Digits in any order
    Group,
    /// Any k of the n selected numbers, C(n, k) single bets
    Combination,
    /// One match outcome
    SingleMatch,
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetType::Direct => write!(f, "DIRECT"),
            BetType::Group => write!(f, "GROUP"),
            BetType::Combination => write!(f, "COMBINATION"),
            BetType::SingleMatch => write!(f, "SINGLE_MATCH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_codes_round_trip_through_serde() {
        for product in LotteryProduct::ALL {
            let json = serde_json::to_string(&product).unwrap();
            assert_eq!(json, format!("\"{}\"", product.code()));
            assert_eq!(product.code().parse::<LotteryProduct>().unwrap(), product);
        }
    }

    #[test]
    fn test_bet_type_serde_names() {
        assert_eq!(serde_json::to_string(&BetType::SingleMatch).unwrap(), "\"SINGLE_MATCH\"");
        assert_eq!(BetType::Combination.to_string(), "COMBINATION");
    }

    #[test]
    fn test_unknown_product_is_rejected() {
        assert!("LOTTO_MAX".parse::<LotteryProduct>().is_err());
        assert_eq!("welfare_3d".parse::<LotteryProduct>().unwrap(), LotteryProduct::Welfare3D);
    }
}

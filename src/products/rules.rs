//! Static number layouts per product
//!
//! Every product declares how a ticket's number groups are shaped, how the
//! winning numbers are shaped, which bet types it offers and how a ticket is
//! compared against a draw. Prize amounts are not here; they are configuration.

use super::{BetType, LotteryProduct};

/// Allowed values for one number field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Range { min: u32, max: u32 },
    Set(&'static [u32]),
}

impl Domain {
    pub fn contains(&self, value: u32) -> bool {
        match self {
            Domain::Range { min, max } => (*min..=*max).contains(&value),
            Domain::Set(values) => values.contains(&value),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Domain::Range { min, max } => format!("{}..={}", min, max),
            Domain::Set(values) => format!("{:?}", values),
        }
    }
}

/// One ticket number group
#[derive(Debug, Clone, Copy)]
pub struct Zone {
    pub name: &'static str,
    pub domain: Domain,
    /// Numbers per single bet; the minimum for variable-pick products
    pub picks: u8,
    /// Upper bound for direct bets (equal to `picks` unless variable)
    pub max_picks: u8,
    /// Upper bound for combination bets, 0 when not combinable
    pub combo_max: u8,
    /// Position of each number is significant
    pub ordered: bool,
    /// The same number may appear twice
    pub repeats: bool,
}

/// Shape of a ticket's number groups
#[derive(Debug, Clone, Copy)]
pub enum TicketLayout {
    /// Group `i` must satisfy zone `i`
    Zones(&'static [Zone]),
    /// `count` groups of `[key, value]` with distinct keys
    KeyedPicks {
        count: u8,
        key: Domain,
        value: Domain,
    },
}

/// One segment of the flat winning number sequence
#[derive(Debug, Clone, Copy)]
pub struct DrawZone {
    pub name: &'static str,
    pub count: u8,
    pub domain: Domain,
    /// Numbers within the zone are all different
    pub distinct: bool,
    /// Numbers must not appear in any earlier zone
    pub exclude_previous: bool,
}

/// Where a pick product's bonus hit comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BonusSource {
    None,
    /// Ticket group 1 against draw zone 1
    SeparateZone,
    /// Ticket group 0 against draw zone 1 (special number from the main pool)
    DrawnFromMain,
}

/// How a ticket is compared against the winning numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Set intersection of main numbers, optional bonus
    Pool { bonus: BonusSource },
    /// Variable picks against a larger drawn set
    Keno,
    /// Position-by-position comparison (digits, match outcomes)
    Positional,
    /// `[match, outcome]` pairs against the outcome list
    KeyedPositional,
}

/// Complete static description of one product
#[derive(Debug)]
pub struct ProductRule {
    pub product: LotteryProduct,
    pub layout: TicketLayout,
    pub draw: &'static [DrawZone],
    pub bet_types: &'static [BetType],
    pub matching: MatchKind,
}

impl ProductRule {
    pub fn offers(&self, bet_type: BetType) -> bool {
        self.bet_types.contains(&bet_type)
    }

    pub fn draw_len(&self) -> usize {
        self.draw.iter().map(|z| z.count as usize).sum()
    }
}

const DIGITS: Domain = Domain::Range { min: 0, max: 9 };
const WIN_DRAW_LOSS: Domain = Domain::Set(&[0, 1, 3]);
const WIN_LOSS: Domain = Domain::Set(&[0, 3]);

const fn pick_zone(name: &'static str, max: u32, picks: u8, combo_max: u8) -> Zone {
    Zone {
        name,
        domain: Domain::Range { min: 1, max },
        picks,
        max_picks: picks,
        combo_max,
        ordered: false,
        repeats: false,
    }
}

const fn sequence_zone(name: &'static str, domain: Domain, len: u8) -> Zone {
    Zone {
        name,
        domain,
        picks: len,
        max_picks: len,
        combo_max: 0,
        ordered: true,
        repeats: true,
    }
}

const fn draw_zone(name: &'static str, count: u8, domain: Domain, distinct: bool) -> DrawZone {
    DrawZone {
        name,
        count,
        domain,
        distinct,
        exclude_previous: false,
    }
}

static DOUBLE_BALL: ProductRule = ProductRule {
    product: LotteryProduct::DoubleBall,
    layout: TicketLayout::Zones(&[pick_zone("red", 33, 6, 20), pick_zone("blue", 16, 1, 16)]),
    draw: &[
        draw_zone("red", 6, Domain::Range { min: 1, max: 33 }, true),
        draw_zone("blue", 1, Domain::Range { min: 1, max: 16 }, true),
    ],
    bet_types: &[BetType::Direct, BetType::Combination],
    matching: MatchKind::Pool { bonus: BonusSource::SeparateZone },
};

static ARRANGE_V5: ProductRule = ProductRule {
    product: LotteryProduct::ArrangeV5,
    layout: TicketLayout::Zones(&[sequence_zone("digits", DIGITS, 5)]),
    draw: &[draw_zone("digits", 5, DIGITS, false)],
    bet_types: &[BetType::Direct],
    matching: MatchKind::Positional,
};

static ARRANGE_V3: ProductRule = ProductRule {
    product: LotteryProduct::ArrangeV3,
    layout: TicketLayout::Zones(&[sequence_zone("digits", DIGITS, 3)]),
    draw: &[draw_zone("digits", 3, DIGITS, false)],
    bet_types: &[BetType::Direct, BetType::Group],
    matching: MatchKind::Positional,
};

static SUPER_LOTTO: ProductRule = ProductRule {
    product: LotteryProduct::SuperLotto,
    layout: TicketLayout::Zones(&[pick_zone("main", 49, 6, 16)]),
    draw: &[draw_zone("main", 6, Domain::Range { min: 1, max: 49 }, true)],
    bet_types: &[BetType::Direct, BetType::Combination],
    matching: MatchKind::Pool { bonus: BonusSource::None },
};

static SELECT_NINE: ProductRule = ProductRule {
    product: LotteryProduct::SelectNine,
    layout: TicketLayout::KeyedPicks {
        count: 9,
        key: Domain::Range { min: 1, max: 14 },
        value: WIN_DRAW_LOSS,
    },
    draw: &[draw_zone("outcomes", 14, WIN_DRAW_LOSS, false)],
    bet_types: &[BetType::Direct],
    matching: MatchKind::KeyedPositional,
};

static FOOTBALL_LOTTERY: ProductRule = ProductRule {
    product: LotteryProduct::FootballLottery,
    layout: TicketLayout::Zones(&[sequence_zone("outcomes", WIN_DRAW_LOSS, 14)]),
    draw: &[draw_zone("outcomes", 14, WIN_DRAW_LOSS, false)],
    bet_types: &[BetType::Direct],
    matching: MatchKind::Positional,
};

static BASKETBALL_LOTTERY: ProductRule = ProductRule {
    product: LotteryProduct::BasketballLottery,
    layout: TicketLayout::Zones(&[sequence_zone("outcomes", WIN_LOSS, 4)]),
    draw: &[draw_zone("outcomes", 4, WIN_LOSS, false)],
    bet_types: &[BetType::Direct],
    matching: MatchKind::Positional,
};

static SINGLE_MATCH: ProductRule = ProductRule {
    product: LotteryProduct::SingleMatch,
    layout: TicketLayout::Zones(&[sequence_zone("outcome", WIN_DRAW_LOSS, 1)]),
    draw: &[draw_zone("outcome", 1, WIN_DRAW_LOSS, false)],
    bet_types: &[BetType::SingleMatch],
    matching: MatchKind::Positional,
};

static SEVEN_HAPPY: ProductRule = ProductRule {
    product: LotteryProduct::SevenHappy,
    layout: TicketLayout::Zones(&[pick_zone("main", 30, 7, 15)]),
    draw: &[
        draw_zone("main", 7, Domain::Range { min: 1, max: 30 }, true),
        DrawZone {
            name: "special",
            count: 1,
            domain: Domain::Range { min: 1, max: 30 },
            distinct: true,
            exclude_previous: true,
        },
    ],
    bet_types: &[BetType::Direct, BetType::Combination],
    matching: MatchKind::Pool { bonus: BonusSource::DrawnFromMain },
};

static HAPPY_8: ProductRule = ProductRule {
    product: LotteryProduct::Happy8,
    layout: TicketLayout::Zones(&[Zone {
        name: "picks",
        domain: Domain::Range { min: 1, max: 80 },
        picks: 1,
        max_picks: 10,
        combo_max: 0,
        ordered: false,
        repeats: false,
    }]),
    draw: &[draw_zone("drawn", 20, Domain::Range { min: 1, max: 80 }, true)],
    bet_types: &[BetType::Direct],
    matching: MatchKind::Keno,
};

static WELFARE_3D: ProductRule = ProductRule {
    product: LotteryProduct::Welfare3D,
    layout: TicketLayout::Zones(&[sequence_zone("digits", DIGITS, 3)]),
    draw: &[draw_zone("digits", 3, DIGITS, false)],
    bet_types: &[BetType::Direct, BetType::Group],
    matching: MatchKind::Positional,
};

/// Static rule for a product
pub fn rule_for(product: LotteryProduct) -> &'static ProductRule {
    match product {
        LotteryProduct::DoubleBall => &DOUBLE_BALL,
        LotteryProduct::ArrangeV5 => &ARRANGE_V5,
        LotteryProduct::ArrangeV3 => &ARRANGE_V3,
        LotteryProduct::SuperLotto => &SUPER_LOTTO,
        LotteryProduct::SelectNine => &SELECT_NINE,
        LotteryProduct::FootballLottery => &FOOTBALL_LOTTERY,
        LotteryProduct::BasketballLottery => &BASKETBALL_LOTTERY,
        LotteryProduct::SingleMatch => &SINGLE_MATCH,
        LotteryProduct::SevenHappy => &SEVEN_HAPPY,
        LotteryProduct::Happy8 => &HAPPY_8,
        LotteryProduct::Welfare3D => &WELFARE_3D,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_product_has_a_matching_rule() {
        for product in LotteryProduct::ALL {
            let rule = rule_for(product);
            assert_eq!(rule.product, product);
            assert!(!rule.bet_types.is_empty());
            assert!(rule.draw_len() > 0);
        }
    }

    #[test]
    fn test_combination_only_on_combinable_zones() {
        for product in LotteryProduct::ALL {
            let rule = rule_for(product);
            if !rule.offers(BetType::Combination) {
                continue;
            }
            match rule.layout {
                TicketLayout::Zones(zones) => {
                    assert!(zones.iter().all(|z| z.combo_max > z.picks && !z.ordered));
                }
                TicketLayout::KeyedPicks { .. } => panic!("{} cannot be combined", product),
            }
        }
    }

    #[test]
    fn test_domains() {
        assert!(WIN_DRAW_LOSS.contains(1));
        assert!(!WIN_DRAW_LOSS.contains(2));
        assert!(DIGITS.contains(0));
        assert!(!DIGITS.contains(10));
        assert_eq!(DIGITS.describe(), "0..=9");
    }
}

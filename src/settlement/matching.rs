//! Ticket against draw comparison
//!
//! A ticket is broken down into the single bets it implies and each single bet
//! is summarised by a [`MatchSignature`]. Combination tickets are not expanded;
//! the number of singles per signature is counted with binomials.

use crate::config::{PrizeTable, TierRule};
use crate::products::combinatorics::binomial;
use crate::products::rules::{BonusSource, MatchKind, ProductRule, TicketLayout};
use crate::products::BetType;
use std::collections::HashSet;

/// Hits of one single bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchSignature {
    /// Numbers in the single bet
    pub picked: u32,
    pub main: u32,
    pub bonus: u32,
    /// Bet type of the ticket the single bet came from
    pub bet_type: BetType,
}

impl TierRule {
    pub fn matches(&self, signature: &MatchSignature) -> bool {
        self.main == signature.main
            && self.bonus.map_or(true, |b| b == signature.bonus)
            && self.picked.map_or(true, |p| p == signature.picked)
            && self.bet_type.map_or(true, |t| t == signature.bet_type)
    }
}

/// Index into `table.tiers` of the first rule matching `signature`
pub fn tier_index(table: &PrizeTable, signature: &MatchSignature) -> Option<usize> {
    table
        .rules
        .iter()
        .find(|rule| rule.matches(signature))
        .and_then(|rule| table.rank(&rule.tier))
}

fn overlap(a: &[u32], b: &[u32]) -> u32 {
    let drawn: HashSet<u32> = b.iter().copied().collect();
    a.iter().filter(|n| drawn.contains(n)).count() as u32
}

/// Common elements counting multiplicity; both slices must be sorted
fn multiset_overlap(a: &[u32], b: &[u32]) -> u32 {
    let (mut i, mut j, mut hits) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            hits += 1;
            i += 1;
            j += 1;
        } else if a[i] < b[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    hits
}

fn zone_picks(rule: &ProductRule, zone: usize) -> u64 {
    match rule.layout {
        TicketLayout::Zones(zones) => zones.get(zone).map_or(0, |z| u64::from(z.picks)),
        TicketLayout::KeyedPicks { count, .. } => u64::from(count),
    }
}

/// Single bets of a ticket grouped by signature, zero counts omitted.
///
/// `groups` must be canonical and `draw` split into zones.
pub fn single_bet_signatures(
    rule: &ProductRule,
    bet_type: BetType,
    groups: &[Vec<u32>],
    draw: &[Vec<u32>],
) -> Vec<(MatchSignature, u64)> {
    let empty = Vec::new();
    let main_group = groups.first().unwrap_or(&empty);
    let main_draw = draw.first().unwrap_or(&empty);

    let signature = |picked: u64, main: u64, bonus: u64| MatchSignature {
        picked: picked as u32,
        main: main as u32,
        bonus: bonus as u32,
        bet_type,
    };

    match rule.matching {
        MatchKind::Pool { bonus } => {
            let n = main_group.len() as u64;
            let k = zone_picks(rule, 0);
            let h = u64::from(overlap(main_group, main_draw));
            let mut out = Vec::new();

            match bonus {
                BonusSource::None => {
                    for j in 0..=k {
                        let count = binomial(h, j).saturating_mul(binomial(n - h, k - j));
                        if count > 0 {
                            out.push((signature(k, j, 0), count));
                        }
                    }
                }
                BonusSource::SeparateZone => {
                    let bonus_group = groups.get(1).unwrap_or(&empty);
                    let bonus_draw = draw.get(1).unwrap_or(&empty);
                    let nb = bonus_group.len() as u64;
                    let kb = zone_picks(rule, 1);
                    let hb = u64::from(overlap(bonus_group, bonus_draw));
                    for j in 0..=k {
                        let main_ways = binomial(h, j).saturating_mul(binomial(n - h, k - j));
                        if main_ways == 0 {
                            continue;
                        }
                        for b in 0..=kb {
                            let bonus_ways = binomial(hb, b).saturating_mul(binomial(nb - hb, kb - b));
                            let count = main_ways.saturating_mul(bonus_ways);
                            if count > 0 {
                                out.push((signature(k + kb, j, b), count));
                            }
                        }
                    }
                }
                BonusSource::DrawnFromMain => {
                    let special = draw.get(1).and_then(|z| z.first());
                    let s = u64::from(special.map_or(false, |x| main_group.contains(x)));
                    let rest = n - h - s;
                    for j in 0..=k {
                        for b in 0..=s {
                            if j + b > k {
                                continue;
                            }
                            let count = binomial(h, j)
                                .saturating_mul(binomial(s, b))
                                .saturating_mul(binomial(rest, k - j - b));
                            if count > 0 {
                                out.push((signature(k, j, b), count));
                            }
                        }
                    }
                }
            }
            out
        }
        MatchKind::Keno => {
            let hits = overlap(main_group, main_draw);
            vec![(signature(main_group.len() as u64, u64::from(hits), 0), 1)]
        }
        MatchKind::Positional => {
            let hits = if bet_type == BetType::Group {
                let mut drawn = main_draw.clone();
                drawn.sort_unstable();
                multiset_overlap(main_group, &drawn)
            } else {
                main_group.iter().zip(main_draw).filter(|(a, b)| a == b).count() as u32
            };
            vec![(signature(main_group.len() as u64, u64::from(hits), 0), 1)]
        }
        MatchKind::KeyedPositional => {
            let hits = groups
                .iter()
                .filter(|pick| match (pick.first(), pick.get(1)) {
                    (Some(&game), Some(&outcome)) => {
                        game >= 1 && main_draw.get(game as usize - 1) == Some(&outcome)
                    }
                    _ => false,
                })
                .count() as u64;
            vec![(signature(groups.len() as u64, hits, 0), 1)]
        }
    }
}

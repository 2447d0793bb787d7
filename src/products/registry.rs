//! Bet format registry
//!
//! Pure validation and canonicalisation of number selections. Given the same
//! input it always yields the same canonical form, and feeding a canonical form
//! back in yields it unchanged.

use super::combinatorics::binomial;
use super::rules::{Domain, DrawZone, TicketLayout, Zone};
use super::{BetType, LotteryProduct};
use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Bet size limits applied on top of the product layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetLimits {
    pub max_multiple: u32,
    pub max_bet_units: u64,
}

impl Default for BetLimits {
    fn default() -> Self {
        Self {
            max_multiple: 99,
            max_bet_units: 10_000,
        }
    }
}

/// A selection in its comparable form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSelection {
    pub groups: Vec<Vec<u32>>,
    /// Number of implied single bets
    pub bet_units: u64,
}

/// Per-product validation rules
#[derive(Debug, Clone, Default)]
pub struct BetFormatRegistry {
    limits: BetLimits,
}

impl BetFormatRegistry {
    pub fn new(limits: BetLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> BetLimits {
        self.limits
    }

    /// Validate a ticket selection and return its canonical form
    pub fn validate(
        &self,
        product: LotteryProduct,
        bet_type: BetType,
        groups: &[Vec<u32>],
        multiple: u32,
    ) -> Result<CanonicalSelection, ValidationError> {
        let rule = product.rule();
        if !rule.offers(bet_type) {
            return Err(ValidationError::UnsupportedBetType { product, bet_type });
        }
        if multiple == 0 || multiple > self.limits.max_multiple {
            return Err(ValidationError::InvalidMultiple {
                multiple,
                reason: format!("must be between 1 and {}", self.limits.max_multiple),
            });
        }

        let selection = match rule.layout {
            TicketLayout::Zones(zones) => canonical_zones(zones, bet_type, groups)?,
            TicketLayout::KeyedPicks { count, key, value } => {
                canonical_keyed(count, key, value, groups)?
            }
        };

        if bet_type == BetType::Combination && selection.bet_units < 2 {
            return Err(ValidationError::InvalidMultiple {
                multiple,
                reason: "a combination bet must imply at least two single bets".to_string(),
            });
        }

        let total_units = selection.bet_units.saturating_mul(u64::from(multiple));
        if total_units > self.limits.max_bet_units {
            return Err(ValidationError::InvalidMultiple {
                multiple,
                reason: format!(
                    "{} single bets x {} exceeds the limit of {}",
                    selection.bet_units, multiple, self.limits.max_bet_units
                ),
            });
        }

        Ok(selection)
    }

    /// Validate a flat winning sequence and split it into draw zones
    pub fn validate_draw(
        &self,
        product: LotteryProduct,
        winning: &[u32],
    ) -> Result<Vec<Vec<u32>>, ValidationError> {
        split_draw(product.rule().draw, winning)
    }
}

/// Split winning numbers by draw zone, validating each segment
pub(crate) fn split_draw(draw: &[DrawZone], winning: &[u32]) -> Result<Vec<Vec<u32>>, ValidationError> {
    let expected: usize = draw.iter().map(|z| z.count as usize).sum();
    if winning.len() != expected {
        return Err(ValidationError::InvalidFieldCount {
            field: "winning numbers".to_string(),
            expected: expected.to_string(),
            actual: winning.len(),
        });
    }

    let mut seen_before: HashSet<u32> = HashSet::new();
    let mut zones = Vec::with_capacity(draw.len());
    let mut offset = 0;

    for zone in draw {
        let segment = &winning[offset..offset + zone.count as usize];
        offset += zone.count as usize;

        let mut seen = HashSet::new();
        for &value in segment {
            check_domain(zone.name, zone.domain, value)?;
            if zone.distinct && !seen.insert(value) {
                return Err(ValidationError::DuplicateNotAllowed {
                    field: zone.name.to_string(),
                    value,
                });
            }
            if zone.exclude_previous && seen_before.contains(&value) {
                return Err(ValidationError::DuplicateNotAllowed {
                    field: zone.name.to_string(),
                    value,
                });
            }
        }
        seen_before.extend(segment.iter().copied());
        zones.push(segment.to_vec());
    }

    Ok(zones)
}

fn check_domain(field: &str, domain: Domain, value: u32) -> Result<(), ValidationError> {
    if domain.contains(value) {
        Ok(())
    } else {
        Err(ValidationError::ValueOutOfRange {
            field: field.to_string(),
            value,
            allowed: domain.describe(),
        })
    }
}

fn check_group_len(zone: &Zone, bet_type: BetType, len: usize) -> Result<(), ValidationError> {
    let (min, max) = match bet_type {
        BetType::Combination => (zone.picks, zone.combo_max),
        _ => (zone.picks, zone.max_picks),
    };
    if len < min as usize || len > max as usize {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}..={}", min, max)
        };
        return Err(ValidationError::InvalidFieldCount {
            field: zone.name.to_string(),
            expected,
            actual: len,
        });
    }
    Ok(())
}

fn canonical_zones(
    zones: &[Zone],
    bet_type: BetType,
    groups: &[Vec<u32>],
) -> Result<CanonicalSelection, ValidationError> {
    if groups.len() != zones.len() {
        return Err(ValidationError::InvalidFieldCount {
            field: "number groups".to_string(),
            expected: zones.len().to_string(),
            actual: groups.len(),
        });
    }

    let mut canonical = Vec::with_capacity(groups.len());
    let mut bet_units: u64 = 1;

    for (zone, group) in zones.iter().zip(groups) {
        check_group_len(zone, bet_type, group.len())?;

        let mut seen = HashSet::with_capacity(group.len());
        for &value in group {
            check_domain(zone.name, zone.domain, value)?;
            if !zone.repeats && !seen.insert(value) {
                return Err(ValidationError::DuplicateNotAllowed {
                    field: zone.name.to_string(),
                    value,
                });
            }
        }

        let mut numbers = group.clone();
        if !zone.ordered || bet_type == BetType::Group {
            numbers.sort_unstable();
        }

        if bet_type == BetType::Group && numbers.windows(2).all(|w| w[0] == w[1]) {
            // a group bet on identical digits has only one ordering
            return Err(ValidationError::DuplicateNotAllowed {
                field: zone.name.to_string(),
                value: numbers[0],
            });
        }

        if bet_type == BetType::Combination {
            bet_units = bet_units.saturating_mul(binomial(numbers.len() as u64, u64::from(zone.picks)));
        }

        canonical.push(numbers);
    }

    Ok(CanonicalSelection {
        groups: canonical,
        bet_units,
    })
}

fn canonical_keyed(
    count: u8,
    key: Domain,
    value: Domain,
    groups: &[Vec<u32>],
) -> Result<CanonicalSelection, ValidationError> {
    if groups.len() != count as usize {
        return Err(ValidationError::InvalidFieldCount {
            field: "picks".to_string(),
            expected: count.to_string(),
            actual: groups.len(),
        });
    }

    let mut seen = HashSet::with_capacity(groups.len());
    for group in groups {
        if group.len() != 2 {
            return Err(ValidationError::InvalidFieldCount {
                field: "pick".to_string(),
                expected: "2".to_string(),
                actual: group.len(),
            });
        }
        check_domain("match", key, group[0])?;
        check_domain("outcome", value, group[1])?;
        if !seen.insert(group[0]) {
            return Err(ValidationError::DuplicateNotAllowed {
                field: "match".to_string(),
                value: group[0],
            });
        }
    }

    let mut canonical = groups.to_vec();
    canonical.sort_unstable_by_key(|pick| pick[0]);

    Ok(CanonicalSelection {
        groups: canonical,
        bet_units: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BetFormatRegistry {
        BetFormatRegistry::default()
    }

    #[test]
    fn test_double_ball_direct_is_sorted() {
        let selection = registry()
            .validate(
                LotteryProduct::DoubleBall,
                BetType::Direct,
                &[vec![6, 5, 4, 3, 2, 1], vec![7]],
                1,
            )
            .unwrap();

        assert_eq!(selection.groups, vec![vec![1, 2, 3, 4, 5, 6], vec![7]]);
        assert_eq!(selection.bet_units, 1);
    }

    #[test]
    fn test_canonicalization_is_idempotent() {
        let reg = registry();
        let cases: Vec<(LotteryProduct, BetType, Vec<Vec<u32>>)> = vec![
            (LotteryProduct::DoubleBall, BetType::Combination, vec![vec![9, 1, 2, 3, 4, 5, 6], vec![3, 7]]),
            (LotteryProduct::ArrangeV3, BetType::Direct, vec![vec![4, 2, 9]]),
            (LotteryProduct::Welfare3D, BetType::Group, vec![vec![9, 2, 2]]),
            (LotteryProduct::Happy8, BetType::Direct, vec![vec![80, 1, 40]]),
            (
                LotteryProduct::SelectNine,
                BetType::Direct,
                (1..=9).rev().map(|m| vec![m, 3]).collect(),
            ),
        ];

        for (product, bet_type, groups) in cases {
            let first = reg.validate(product, bet_type, &groups, 1).unwrap();
            let second = reg.validate(product, bet_type, &first.groups, 1).unwrap();
            assert_eq!(first, second, "{} {}", product, bet_type);
        }
    }

    #[test]
    fn test_permutation_keeps_order() {
        let selection = registry()
            .validate(LotteryProduct::ArrangeV3, BetType::Direct, &[vec![4, 2, 9]], 1)
            .unwrap();
        assert_eq!(selection.groups, vec![vec![4, 2, 9]]);

        let repeated = registry()
            .validate(LotteryProduct::ArrangeV5, BetType::Direct, &[vec![1, 1, 1, 1, 1]], 1)
            .unwrap();
        assert_eq!(repeated.groups, vec![vec![1, 1, 1, 1, 1]]);
    }

    #[test]
    fn test_invalid_field_count() {
        let err = registry()
            .validate(LotteryProduct::DoubleBall, BetType::Direct, &[vec![1, 2, 3, 4, 5], vec![7]], 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFieldCount { .. }));

        let err = registry()
            .validate(LotteryProduct::DoubleBall, BetType::Direct, &[vec![1, 2, 3, 4, 5, 6]], 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFieldCount { actual: 1, .. }));
    }

    #[test]
    fn test_value_out_of_range() {
        let err = registry()
            .validate(LotteryProduct::DoubleBall, BetType::Direct, &[vec![1, 2, 3, 4, 5, 34], vec![7]], 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::ValueOutOfRange { value: 34, .. }));

        let err = registry()
            .validate(LotteryProduct::SingleMatch, BetType::SingleMatch, &[vec![2]], 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::ValueOutOfRange { value: 2, .. }));
    }

    #[test]
    fn test_duplicates_rejected_where_disallowed() {
        let err = registry()
            .validate(LotteryProduct::SuperLotto, BetType::Direct, &[vec![1, 2, 3, 4, 5, 5]], 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateNotAllowed { value: 5, .. }));

        let err = registry()
            .validate(LotteryProduct::Welfare3D, BetType::Group, &[vec![7, 7, 7]], 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateNotAllowed { value: 7, .. }));

        let mut picks: Vec<Vec<u32>> = (1..=8).map(|m| vec![m, 1]).collect();
        picks.push(vec![3, 0]);
        let err = registry()
            .validate(LotteryProduct::SelectNine, BetType::Direct, &picks, 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateNotAllowed { value: 3, .. }));
    }

    #[test]
    fn test_combination_units() {
        let selection = registry()
            .validate(
                LotteryProduct::DoubleBall,
                BetType::Combination,
                &[vec![1, 2, 3, 4, 5, 6, 7, 8], vec![1, 2]],
                1,
            )
            .unwrap();
        // C(8, 6) * C(2, 1)
        assert_eq!(selection.bet_units, 56);
    }

    #[test]
    fn test_invalid_multiple() {
        let reg = registry();
        let err = reg
            .validate(LotteryProduct::ArrangeV3, BetType::Direct, &[vec![1, 2, 3]], 0)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidMultiple { multiple: 0, .. }));

        let err = reg
            .validate(LotteryProduct::ArrangeV3, BetType::Direct, &[vec![1, 2, 3]], 100)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidMultiple { .. }));

        // combination that implies a single bet
        let err = reg
            .validate(LotteryProduct::DoubleBall, BetType::Combination, &[vec![1, 2, 3, 4, 5, 6], vec![1]], 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidMultiple { .. }));

        // C(20, 6) * 16 single bets is far beyond the unit limit
        let all_red: Vec<u32> = (1..=20).collect();
        let all_blue: Vec<u32> = (1..=16).collect();
        let err = reg
            .validate(LotteryProduct::DoubleBall, BetType::Combination, &[all_red, all_blue], 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidMultiple { .. }));
    }

    #[test]
    fn test_unsupported_bet_type() {
        let err = registry()
            .validate(LotteryProduct::ArrangeV5, BetType::Group, &[vec![1, 2, 3, 4, 5]], 1)
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedBetType { .. }));
    }

    #[test]
    fn test_happy8_variable_picks() {
        let reg = registry();
        assert!(reg.validate(LotteryProduct::Happy8, BetType::Direct, &[vec![5]], 1).is_ok());
        let ten: Vec<u32> = (1..=10).collect();
        assert!(reg.validate(LotteryProduct::Happy8, BetType::Direct, &[ten], 1).is_ok());
        let eleven: Vec<u32> = (1..=11).collect();
        assert!(reg.validate(LotteryProduct::Happy8, BetType::Direct, &[eleven], 1).is_err());
        assert!(reg.validate(LotteryProduct::Happy8, BetType::Direct, &[vec![]], 1).is_err());
    }

    #[test]
    fn test_validate_draw() {
        let reg = registry();
        let zones = reg
            .validate_draw(LotteryProduct::DoubleBall, &[1, 2, 3, 4, 5, 6, 7])
            .unwrap();
        assert_eq!(zones, vec![vec![1, 2, 3, 4, 5, 6], vec![7]]);

        // blue may repeat a red number
        assert!(reg.validate_draw(LotteryProduct::DoubleBall, &[1, 2, 3, 4, 5, 6, 6]).is_ok());

        // special number must not be among the main numbers
        let err = reg
            .validate_draw(LotteryProduct::SevenHappy, &[1, 2, 3, 4, 5, 6, 7, 7])
            .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateNotAllowed { value: 7, .. }));

        let err = reg.validate_draw(LotteryProduct::ArrangeV3, &[1, 2]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFieldCount { actual: 2, .. }));

        assert!(reg.validate_draw(LotteryProduct::ArrangeV3, &[9, 9, 9]).is_ok());
    }
}

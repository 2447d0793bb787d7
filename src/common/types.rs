//! Shared type definitions for the lottery ledger
//!
//! Canonical identifier and currency types used by every component, so the
//! ledger, the stores and the settlement engine agree on one representation.

use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest identifier accepted anywhere in the ledger
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Minor units per major currency unit (cents per unit)
pub const MINOR_PER_MAJOR: i64 = 100;

/// Fixed-point currency amount counted in minor units.
///
/// All stakes, jackpots and payouts go through this type; floating point never
/// touches money.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn from_major(major: i64) -> Self {
        Self(major * MINOR_PER_MAJOR)
    }

    pub const fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_mul(self, factor: u64) -> Option<Money> {
        i64::try_from(factor)
            .ok()
            .and_then(|f| self.0.checked_mul(f))
            .map(Money)
    }

    /// Adds, clamping at the numeric bounds
    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    pub fn saturating_mul(self, factor: u64) -> Money {
        let factor = i64::try_from(factor).unwrap_or(i64::MAX);
        Money(self.0.saturating_mul(factor))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_MAJOR as u64;
        write!(f, "{}{}.{:02}", sign, abs / per, abs % per)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@')
}

fn validate_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.len() > MAX_IDENTIFIER_LEN || !value.chars().all(is_identifier_char) {
        return Err(ValidationError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

macro_rules! identifier_type {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                validate_identifier($field, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier_type!(
    /// Opaque, globally unique ticket identity
    TicketId,
    "ticket id"
);

identifier_type!(
    /// Owning user reference
    UserId,
    "user id"
);

identifier_type!(
    /// Draw cycle identifier, one result per product per issue
    IssueId,
    "issue"
);

impl TicketId {
    /// Wrap an id produced by a trusted identity source
    pub(crate) fn from_generated(value: String) -> Self {
        debug_assert!(validate_identifier("ticket id", &value).is_ok());
        Self(value)
    }
}

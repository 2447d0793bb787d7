//! Draw settlement
//!
//! [`SettlementEngine`] turns a recorded draw result into ticket outcomes and
//! prize tier aggregates. Matching and pricing are pure and live in their own
//! modules; the engine owns the lease and the writes.

pub mod engine;
pub mod lease;
pub mod matching;
pub mod payout;

pub use engine::{SettlementEngine, SettlementSummary};
pub use lease::{lease_key, SettlementLease};
pub use matching::{single_bet_signatures, tier_index, MatchSignature};
pub use payout::{strategy_for, FixedOdds, PariMutuel, PayoutStrategy};

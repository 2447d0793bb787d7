//! Lottery Ledger - ticket ledger and draw settlement engine
//!
//! Accepts bets for a closed set of lottery products, records official draw
//! results and settles every ticket of an issue against its result. Tickets and
//! results live in an authoritative store (RocksDB or in-memory) fronted by a
//! write-through cache and an eventually consistent analytics pipeline.
//!
//! Most callers only need [`ServiceBuilder`] and [`LotteryService`].

pub mod common;
pub mod config;
pub mod draws;
pub mod errors;
pub mod ledger;
pub mod metrics;
pub mod products;
pub mod service;
pub mod settlement;
pub mod storage;

pub use common::types::{IssueId, Money, TicketId, UserId};
pub use config::LedgerConfig;
pub use draws::{DrawResult, PrizeTier};
pub use errors::{LedgerError, LedgerResult};
pub use ledger::{BetRequest, Ticket, TicketStatus};
pub use products::{BetType, LotteryProduct};
pub use service::{LotteryService, ServiceBuilder};
pub use settlement::SettlementSummary;

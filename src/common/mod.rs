//! Common utilities and shared functionality
//!
//! Identifier and currency types, backend traits and configuration loading used
//! across the ledger.

pub mod config;
pub mod traits;
pub mod types;

//! Ledger configuration with defaults
//!
//! Operational settings plus the prize tables. Tier rules and payout shares are
//! business data and live here, never as constants in the settlement code.

use crate::common::types::Money;
use crate::errors::{ConfigurationError, LedgerResult};
use crate::products::{BetLimits, BetType, LotteryProduct};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Bundled default configuration, including prize tables for every product
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Pool shares are expressed in basis points of the jackpot
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Complete ledger configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    #[serde(default)]
    pub settlement: SettlementSettings,
    #[serde(default)]
    pub limits: BetLimits,
    #[serde(default)]
    pub prize_tables: Vec<PrizeTable>,
}

impl LedgerConfig {
    /// Parse the bundled configuration
    pub fn bundled() -> LedgerResult<Self> {
        let config: LedgerConfig = toml::from_str(DEFAULT_CONFIG_TOML).map_err(ConfigurationError::from)?;
        Ok(config)
    }

    pub fn prize_table(&self, product: LotteryProduct) -> Option<&PrizeTable> {
        self.prize_tables.iter().find(|t| t.product == product)
    }
}

/// Authoritative store backend selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    RocksDb,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rocksdb" => Ok(StorageBackend::RocksDb),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Authoritative store settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub data_dir: String,
    /// Upper bound for a single store call
    pub store_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::RocksDb,
            data_dir: "./ledger_data".to_string(),
            store_timeout_ms: 2_000,
            max_attempts: 3,
            retry_base_delay_ms: 50,
            retry_max_delay_ms: 1_000,
        }
    }
}

impl StorageSettings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Ticket cache settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Analytical store propagation settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    pub enabled: bool,
    pub queue_capacity: usize,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 10_000,
        }
    }
}

/// Settlement run settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementSettings {
    /// Must exceed the longest expected settlement run
    pub lease_ttl_secs: u64,
    pub auto_settle_on_result: bool,
    /// Concurrent ticket transitions per run
    pub parallelism: usize,
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            lease_ttl_secs: 900,
            auto_settle_on_result: false,
            parallelism: 16,
        }
    }
}

/// How a product's tier amounts are priced
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutKind {
    Fixed,
    PariMutuel,
}

/// One prize level
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    pub label: String,
    /// Fixed per-winner amount in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_minor: Option<i64>,
    /// Share of the jackpot for pari-mutuel tiers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_share_bps: Option<u32>,
}

impl TierSpec {
    pub fn fixed_amount(&self) -> Option<Money> {
        self.amount_minor.map(Money::from_minor)
    }
}

/// Maps a match signature onto a tier label
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRule {
    pub tier: String,
    /// Main hits (positions, outcomes or numbers depending on the product)
    pub main: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus: Option<u32>,
    /// Numbers picked per single bet, for variable-pick products
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picked: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bet_type: Option<BetType>,
}

/// Tiers and rules of one product, best tier first
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeTable {
    pub product: LotteryProduct,
    pub payout: PayoutKind,
    pub tiers: Vec<TierSpec>,
    pub rules: Vec<TierRule>,
}

impl PrizeTable {
    pub fn tier(&self, label: &str) -> Option<&TierSpec> {
        self.tiers.iter().find(|t| t.label == label)
    }

    /// Position of a tier, lower is better
    pub fn rank(&self, label: &str) -> Option<usize> {
        self.tiers.iter().position(|t| t.label == label)
    }
}

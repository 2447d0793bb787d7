//! Configuration loading for the lottery ledger
//!
//! File (or the bundled defaults) first, then environment overrides, then
//! validation. Nothing reaches the ledger without passing `validate`.

use crate::config::{
    AnalyticsSettings, CacheSettings, LedgerConfig, PayoutKind, PrizeTable, SettlementSettings,
    StorageBackend, StorageSettings, BPS_DENOMINATOR,
};
use crate::errors::{ConfigurationError, LedgerResult};
use crate::products::{BetLimits, LotteryProduct};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;

/// Shortest lease accepted for a settlement run
pub const MIN_LEASE_TTL_SECS: u64 = 60;

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file (or bundled defaults) and environment variables
    pub fn load(&self) -> LedgerResult<LedgerConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => LedgerConfig::bundled()?,
        };

        self.apply_overrides(&mut config, |key| env::var(key).ok())?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> LedgerResult<LedgerConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    /// Apply `LEDGER_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&self, config: &mut LedgerConfig, lookup: F) -> LedgerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("LEDGER_STORAGE_BACKEND") {
            config.storage.backend = parse_override("LEDGER_STORAGE_BACKEND", backend, "Unknown storage backend")?;
        }
        if let Some(dir) = lookup("LEDGER_DATA_DIR") {
            config.storage.data_dir = dir;
        }
        if let Some(timeout) = lookup("LEDGER_STORE_TIMEOUT_MS") {
            config.storage.store_timeout_ms = parse_override("LEDGER_STORE_TIMEOUT_MS", timeout, "Invalid timeout value")?;
        }
        if let Some(ttl) = lookup("LEDGER_CACHE_TTL_SECS") {
            config.cache.ttl_secs = parse_override("LEDGER_CACHE_TTL_SECS", ttl, "Invalid TTL value")?;
        }
        if let Some(ttl) = lookup("LEDGER_LEASE_TTL_SECS") {
            config.settlement.lease_ttl_secs = parse_override("LEDGER_LEASE_TTL_SECS", ttl, "Invalid TTL value")?;
        }
        if let Some(auto) = lookup("LEDGER_AUTO_SETTLE") {
            config.settlement.auto_settle_on_result = parse_override("LEDGER_AUTO_SETTLE", auto, "Invalid boolean value")?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self, config: &LedgerConfig) -> LedgerResult<()> {
        if config.storage.backend == StorageBackend::RocksDb && config.storage.data_dir.is_empty() {
            return Err(ConfigurationError::MissingRequired("storage.data_dir".to_string()).into());
        }
        require_nonzero("storage.store_timeout_ms", config.storage.store_timeout_ms)?;
        require_nonzero("storage.max_attempts", u64::from(config.storage.max_attempts))?;
        if config.storage.retry_max_delay_ms < config.storage.retry_base_delay_ms {
            return Err(invalid(
                "storage.retry_max_delay_ms",
                config.storage.retry_max_delay_ms,
                "Must not be below retry_base_delay_ms",
            ));
        }

        require_nonzero("cache.capacity", config.cache.capacity as u64)?;
        require_nonzero("cache.ttl_secs", config.cache.ttl_secs)?;

        if config.analytics.enabled {
            require_nonzero("analytics.queue_capacity", config.analytics.queue_capacity as u64)?;
        }

        if config.settlement.lease_ttl_secs < MIN_LEASE_TTL_SECS {
            return Err(invalid(
                "settlement.lease_ttl_secs",
                config.settlement.lease_ttl_secs,
                &format!("Lease must be at least {}s", MIN_LEASE_TTL_SECS),
            ));
        }
        require_nonzero("settlement.parallelism", config.settlement.parallelism as u64)?;

        require_nonzero("limits.max_multiple", u64::from(config.limits.max_multiple))?;
        require_nonzero("limits.max_bet_units", config.limits.max_bet_units)?;

        let mut seen = HashSet::new();
        for table in &config.prize_tables {
            if !seen.insert(table.product) {
                return Err(invalid("prize_tables.product", table.product, "Duplicate prize table"));
            }
            validate_prize_table(table)?;
        }
        for product in LotteryProduct::ALL {
            if !seen.contains(&product) {
                return Err(ConfigurationError::MissingRequired(format!("prize_tables[{}]", product)).into());
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &LedgerConfig, path: &str) -> LedgerResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

fn parse_override<T: FromStr>(field: &str, value: String, reason: &str) -> LedgerResult<T> {
    value.parse().map_err(|_| {
        ConfigurationError::InvalidValue {
            field: field.to_string(),
            value,
            reason: reason.to_string(),
        }
        .into()
    })
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> crate::errors::LedgerError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn require_nonzero(field: &str, value: u64) -> LedgerResult<()> {
    if value == 0 {
        return Err(invalid(field, 0, "Cannot be zero"));
    }
    Ok(())
}

fn validate_prize_table(table: &PrizeTable) -> LedgerResult<()> {
    let field = format!("prize_tables[{}]", table.product);

    if table.tiers.is_empty() {
        return Err(ConfigurationError::MissingRequired(format!("{}.tiers", field)).into());
    }

    let mut labels = HashSet::new();
    let mut share_total: u64 = 0;
    for tier in &table.tiers {
        if !labels.insert(tier.label.as_str()) {
            return Err(invalid(&format!("{}.tiers", field), &tier.label, "Duplicate tier label"));
        }
        if tier.amount_minor.is_none() && tier.pool_share_bps.is_none() {
            return Err(invalid(
                &format!("{}.tiers", field),
                &tier.label,
                "Tier needs amount_minor or pool_share_bps",
            ));
        }
        if tier.amount_minor.map_or(false, |a| a < 0) {
            return Err(invalid(&format!("{}.tiers", field), &tier.label, "Amount cannot be negative"));
        }
        if table.payout == PayoutKind::Fixed && tier.amount_minor.is_none() {
            return Err(invalid(
                &format!("{}.tiers", field),
                &tier.label,
                "Fixed payout tiers need amount_minor",
            ));
        }
        share_total += u64::from(tier.pool_share_bps.unwrap_or(0));
    }

    if share_total > u64::from(BPS_DENOMINATOR) {
        return Err(invalid(
            &format!("{}.tiers", field),
            share_total,
            "Pool shares exceed 10000 bps",
        ));
    }

    for rule in &table.rules {
        if !labels.contains(rule.tier.as_str()) {
            return Err(invalid(&format!("{}.rules", field), &rule.tier, "Rule names an unknown tier"));
        }
    }

    Ok(())
}

/// Builder pattern for creating configurations
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: LedgerConfig,
}

impl ConfigBuilder {
    /// Start from empty defaults (no prize tables)
    pub fn new() -> Self {
        Self {
            config: LedgerConfig::default(),
        }
    }

    /// Start from the bundled configuration
    pub fn bundled() -> LedgerResult<Self> {
        Ok(Self {
            config: LedgerConfig::bundled()?,
        })
    }

    pub fn storage(mut self, storage: StorageSettings) -> Self {
        self.config.storage = storage;
        self
    }

    /// Use the in-memory authoritative store
    pub fn in_memory(mut self) -> Self {
        self.config.storage.backend = StorageBackend::Memory;
        self
    }

    pub fn data_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.storage.backend = StorageBackend::RocksDb;
        self.config.storage.data_dir = dir.into();
        self
    }

    pub fn cache(mut self, cache: CacheSettings) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn analytics(mut self, analytics: AnalyticsSettings) -> Self {
        self.config.analytics = analytics;
        self
    }

    pub fn settlement(mut self, settlement: SettlementSettings) -> Self {
        self.config.settlement = settlement;
        self
    }

    pub fn limits(mut self, limits: BetLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Add or replace the prize table of one product
    pub fn prize_table(mut self, table: PrizeTable) -> Self {
        self.config.prize_tables.retain(|t| t.product != table.product);
        self.config.prize_tables.push(table);
        self
    }

    pub fn build(self) -> LedgerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TierRule, TierSpec};
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_bundled_config_is_valid() {
        let config = LedgerConfig::bundled().unwrap();
        assert!(ConfigLoader::new().validate(&config).is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LEDGER_STORAGE_BACKEND", "memory"),
            ("LEDGER_STORE_TIMEOUT_MS", "750"),
            ("LEDGER_LEASE_TTL_SECS", "120"),
            ("LEDGER_AUTO_SETTLE", "true"),
        ]
        .into_iter()
        .collect();

        let loader = ConfigLoader::new();
        let mut config = LedgerConfig::bundled().unwrap();
        loader
            .apply_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.store_timeout_ms, 750);
        assert_eq!(config.settlement.lease_ttl_secs, 120);
        assert!(config.settlement.auto_settle_on_result);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let loader = ConfigLoader::new();
        let mut config = LedgerConfig::bundled().unwrap();
        let err = loader
            .apply_overrides(&mut config, |k| (k == "LEDGER_AUTO_SETTLE").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("LEDGER_AUTO_SETTLE"));
    }

    #[test]
    fn test_validation_rules() {
        let loader = ConfigLoader::new();
        let base = LedgerConfig::bundled().unwrap();

        let mut config = base.clone();
        config.settlement.lease_ttl_secs = 30;
        assert!(loader.validate(&config).is_err());

        let mut config = base.clone();
        config.storage.store_timeout_ms = 0;
        assert!(loader.validate(&config).is_err());

        let mut config = base.clone();
        config.prize_tables.retain(|t| t.product != LotteryProduct::Happy8);
        assert!(loader.validate(&config).is_err());

        let mut config = base.clone();
        config.prize_tables[0].rules.push(TierRule {
            tier: "jackpot".to_string(),
            main: 6,
            bonus: None,
            picked: None,
            bet_type: None,
        });
        assert!(loader.validate(&config).is_err());

        let mut config = base;
        config.prize_tables[0].tiers.push(TierSpec {
            label: "bonus_pool".to_string(),
            amount_minor: None,
            pool_share_bps: Some(5_000),
        });
        assert!(loader.validate(&config).is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::bundled()
            .unwrap()
            .in_memory()
            .limits(BetLimits {
                max_multiple: 10,
                max_bet_units: 500,
            })
            .build();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.limits.max_multiple, 10);
        assert_eq!(config.prize_tables.len(), LotteryProduct::ALL.len());
    }

    #[test]
    fn test_save_and_load_config() -> LedgerResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let original = ConfigBuilder::bundled()?.data_dir("/tmp/ledger").build();
        let loader = ConfigLoader::new();
        loader.save(&original, path)?;

        let loaded = ConfigLoader::new().with_path(path).load()?;
        assert_eq!(loaded.prize_tables, original.prize_tables);
        assert_eq!(loaded.limits, original.limits);

        Ok(())
    }
}

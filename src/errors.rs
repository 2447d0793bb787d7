//! Error types for the lottery ledger
//!
//! One root error with category enums underneath, so callers can match on the
//! broad class (validation, storage, conflict) and still see the exact reason.

use crate::products::{BetType, LotteryProduct};
use crate::ledger::TicketStatus;
use thiserror::Error;

/// Root error type for all ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Bad input, never retried
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Missing entity
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    /// A result already exists for this (product, issue)
    #[error("Duplicate draw result for {product} issue {issue}")]
    DuplicateResult { product: LotteryProduct, issue: String },

    /// Another settlement run holds the lease for this (product, issue)
    #[error("Settlement already running for {product} issue {issue}")]
    SettlementAlreadyRunning { product: LotteryProduct, issue: String },

    /// Illegal ticket status change
    #[error("Invalid transition for ticket {ticket_id}: {from} -> {to}")]
    InvalidTransition {
        ticket_id: String,
        from: TicketStatus,
        to: TicketStatus,
    },

    /// Betting on an issue whose result is already recorded
    #[error("Issue {issue} of {product} is closed for betting")]
    IssueClosed { product: LotteryProduct, issue: String },

    /// Authoritative store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Bet and draw input validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid field count for {field}: expected {expected}, got {actual}")]
    InvalidFieldCount {
        field: String,
        expected: String,
        actual: usize,
    },

    #[error("Value {value} out of range for {field} ({allowed})")]
    ValueOutOfRange {
        field: String,
        value: u32,
        allowed: String,
    },

    #[error("Duplicate value {value} not allowed in {field}")]
    DuplicateNotAllowed { field: String, value: u32 },

    #[error("Invalid multiple {multiple}: {reason}")]
    InvalidMultiple { multiple: u32, reason: String },

    #[error("Bet type {bet_type} is not offered for {product}")]
    UnsupportedBetType {
        product: LotteryProduct,
        bet_type: BetType,
    },

    #[error("Stake must be positive, got {0}")]
    InvalidStake(String),

    #[error("Invalid {field}: '{value}'")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("Jackpot must not be negative, got {0}")]
    InvalidJackpot(String),

    #[error("Invalid payout: {0}")]
    InvalidPayout(String),
}

/// Missing entities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("ticket {0}")]
    Ticket(String),

    #[error("draw result for {product} issue {issue}")]
    DrawResult { product: LotteryProduct, issue: String },
}

/// Storage system errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    DatabaseOpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Version conflict on {key}: expected {expected}, found {actual}")]
    VersionConflict {
        key: String,
        expected: u64,
        actual: u64,
    },
}

impl StorageError {
    /// Failures worth retrying against the same store
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Timeout { .. } | StorageError::Unavailable(_))
    }
}

/// Configuration and validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

impl LedgerError {
    /// Whether the caller may reasonably retry the same request later
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Storage(e) => e.is_transient(),
            LedgerError::SettlementAlreadyRunning { .. } => true,
            _ => false,
        }
    }

    pub fn ticket_not_found(ticket_id: impl Into<String>) -> Self {
        LedgerError::NotFound(NotFoundError::Ticket(ticket_id.into()))
    }

    pub fn draw_not_found(product: LotteryProduct, issue: impl Into<String>) -> Self {
        LedgerError::NotFound(NotFoundError::DrawResult {
            product,
            issue: issue.into(),
        })
    }
}

// External error conversions
impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        use rocksdb::ErrorKind;
        match e.kind() {
            ErrorKind::Busy | ErrorKind::TryAgain | ErrorKind::TimedOut | ErrorKind::Incomplete => {
                StorageError::Unavailable(e.to_string())
            }
            ErrorKind::Corruption => StorageError::CorruptedData(e.to_string()),
            _ => StorageError::WriteFailed(e.to_string()),
        }
    }
}

impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        LedgerError::Storage(e.into())
    }
}

impl From<toml::de::Error> for ConfigurationError {
    fn from(e: toml::de::Error) -> Self {
        ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e))
    }
}

// Convenience type alias for Results
pub type LedgerResult<T> = Result<T, LedgerError>;

//! Durable authoritative store on RocksDB
//!
//! Records are JSON values under string keys. Secondary lookups are key-prefix
//! indexes written in the same batch as the record:
//!
//! | key | value |
//! |---|---|
//! | `ticket:id:{id}` | ticket |
//! | `ticket:user:{user}:{inverted created µs}:{id}` | id |
//! | `ticket:issue:{product}:{issue}:{id}` | id |
//! | `draw:result:{product}:{issue}` | draw result |
//! | `draw:index:{product}:{inverted drawn µs}:{issue}` | issue |
//! | `lease:{key}` | lease |
//!
//! Identifiers never contain `:`, so every prefix ends on a field boundary.

use super::Lease;
use crate::common::traits::AuthoritativeStore;
use crate::common::types::{IssueId, TicketId, UserId};
use crate::draws::DrawResult;
use crate::errors::StorageError;
use crate::ledger::Ticket;
use crate::products::LotteryProduct;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const TICKET_PREFIX: &str = "ticket:id:";
const USER_INDEX_PREFIX: &str = "ticket:user:";
const ISSUE_INDEX_PREFIX: &str = "ticket:issue:";
const DRAW_PREFIX: &str = "draw:result:";
const DRAW_INDEX_PREFIX: &str = "draw:index:";
const LEASE_PREFIX: &str = "lease:";

fn ticket_key(id: &TicketId) -> String {
    format!("{}{}", TICKET_PREFIX, id)
}

/// Newest first: the timestamp is inverted so ascending key order is descending
/// time. Ties within one microsecond fall back to the ascending id after it,
/// the same order [`super::newest_first`] gives the in-memory backend.
fn inverted_micros(at: DateTime<Utc>) -> String {
    let micros = at.timestamp_micros().max(0) as u64;
    format!("{:016x}", u64::MAX - micros)
}

fn user_index_prefix(user: &UserId) -> String {
    format!("{}{}:", USER_INDEX_PREFIX, user)
}

fn user_index_key(ticket: &Ticket) -> String {
    format!(
        "{}{}:{}",
        user_index_prefix(&ticket.user_id),
        inverted_micros(ticket.created_at),
        ticket.id
    )
}

fn issue_index_prefix(product: LotteryProduct, issue: &IssueId) -> String {
    format!("{}{}:{}:", ISSUE_INDEX_PREFIX, product.code(), issue)
}

fn draw_key(product: LotteryProduct, issue: &IssueId) -> String {
    format!("{}{}:{}", DRAW_PREFIX, product.code(), issue)
}

fn draw_index_prefix(product: LotteryProduct) -> String {
    format!("{}{}:", DRAW_INDEX_PREFIX, product.code())
}

fn lease_key(key: &str) -> String {
    format!("{}{}", LEASE_PREFIX, key)
}

fn read_error(e: rocksdb::Error) -> StorageError {
    match StorageError::from(e) {
        StorageError::WriteFailed(msg) => StorageError::ReadFailed(msg),
        other => other,
    }
}

fn encode<T: Serialize>(what: &str, value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| StorageError::WriteFailed(format!("Failed to encode {}: {}", what, e)))
}

fn decode<T: DeserializeOwned>(what: &str, bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::CorruptedData(format!("Failed to decode {}: {}", what, e)))
}

/// RocksDB-backed [`AuthoritativeStore`]
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    /// Serialises read-modify-write sequences (existence checks, CAS, leases)
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    fn options() -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(128 * 1024 * 1024);
        opts.set_max_write_buffer_number(4);
        opts.set_target_file_size_base(128 * 1024 * 1024);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = DB::open(&Self::options(), path.as_ref())
            .map_err(|e| StorageError::DatabaseOpenFailed(format!("{}: {}", path.as_ref().display(), e)))?;
        info!(path = %path.as_ref().display(), "Opened RocksDB ledger store");
        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Open without taking the write lock of a running service
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = DB::open_for_read_only(&Options::default(), path.as_ref(), false)
            .map_err(|e| StorageError::DatabaseOpenFailed(format!("{}: {}", path.as_ref().display(), e)))?;
        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.write_lock
            .lock()
            .map_err(|_| StorageError::Unavailable("store write lock poisoned".to_string()))
    }

    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.db.get(key.as_bytes()).map_err(read_error)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get_raw(key)? {
            Some(bytes) => Ok(Some(decode(key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Values of every key starting with `prefix`, in key order
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<Box<[u8]>>, StorageError> {
        let prefix = prefix.as_bytes();
        let mut values = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(read_error)?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(value);
        }
        Ok(values)
    }

    fn tickets_from_index(&self, prefix: &str) -> Result<Vec<Ticket>, StorageError> {
        let mut tickets = Vec::new();
        for raw_id in self.scan_prefix(prefix)? {
            let id = String::from_utf8_lossy(&raw_id);
            match self.get_json::<Ticket>(&format!("{}{}", TICKET_PREFIX, id))? {
                Some(ticket) => tickets.push(ticket),
                None => debug!(ticket_id = %id, index = prefix, "Index entry without ticket record"),
            }
        }
        Ok(tickets)
    }

    /// Run RocksDB work on the blocking pool so callers' timeouts stay effective.
    ///
    /// A call abandoned by its timeout still runs to completion in the background.
    async fn blocking<T, F>(&self, work: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&RocksDbStore) -> Result<T, StorageError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || work(&store))
            .await
            .map_err(|e| StorageError::Unavailable(format!("store task failed: {}", e)))?
    }

    fn batch_write(&self, items: &[(String, Vec<u8>)]) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        for (key, value) in items {
            batch.put(key.as_bytes(), value);
        }
        self.db.write(batch).map_err(StorageError::from)
    }
}

#[async_trait]
impl AuthoritativeStore for RocksDbStore {
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StorageError> {
        let ticket = ticket.clone();
        self.blocking(move |store| {
            let key = ticket_key(&ticket.id);
            let bytes = encode(&key, &ticket)?;

            let _guard = store.lock()?;
            if store.get_raw(&key)?.is_some() {
                return Err(StorageError::AlreadyExists(key));
            }
            let id = ticket.id.as_str().as_bytes().to_vec();
            store.batch_write(&[
                (key, bytes),
                (user_index_key(&ticket), id.clone()),
                (
                    format!("{}{}", issue_index_prefix(ticket.product, &ticket.issue), ticket.id),
                    id,
                ),
            ])
        })
        .await
    }

    async fn update_ticket(&self, ticket: &Ticket, expected_version: u64) -> Result<(), StorageError> {
        let ticket = ticket.clone();
        self.blocking(move |store| {
            let key = ticket_key(&ticket.id);
            let bytes = encode(&key, &ticket)?;

            let _guard = store.lock()?;
            let stored: Ticket = store
                .get_json(&key)?
                .ok_or_else(|| StorageError::WriteFailed(format!("{} does not exist", key)))?;
            if stored.version != expected_version {
                return Err(StorageError::VersionConflict {
                    key,
                    expected: expected_version,
                    actual: stored.version,
                });
            }
            // index keys depend only on immutable fields
            store.batch_write(&[(key, bytes)])
        })
        .await
    }

    async fn get_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, StorageError> {
        let key = ticket_key(id);
        self.blocking(move |store| store.get_json(&key)).await
    }

    async fn tickets_by_user(&self, user: &UserId) -> Result<Vec<Ticket>, StorageError> {
        let prefix = user_index_prefix(user);
        self.blocking(move |store| store.tickets_from_index(&prefix)).await
    }

    async fn tickets_by_issue(&self, product: LotteryProduct, issue: &IssueId) -> Result<Vec<Ticket>, StorageError> {
        let prefix = issue_index_prefix(product, issue);
        self.blocking(move |store| store.tickets_from_index(&prefix)).await
    }

    async fn insert_draw_result(&self, result: &DrawResult) -> Result<(), StorageError> {
        let result = result.clone();
        self.blocking(move |store| {
            let key = draw_key(result.product, &result.issue);
            let bytes = encode(&key, &result)?;

            let _guard = store.lock()?;
            if store.get_raw(&key)?.is_some() {
                return Err(StorageError::AlreadyExists(key));
            }
            let index_key = format!(
                "{}{}:{}",
                draw_index_prefix(result.product),
                inverted_micros(result.drawn_at),
                result.issue
            );
            store.batch_write(&[(key, bytes), (index_key, result.issue.as_str().as_bytes().to_vec())])
        })
        .await
    }

    async fn complete_draw_settlement(&self, result: &DrawResult) -> Result<(), StorageError> {
        let result = result.clone();
        self.blocking(move |store| {
            let key = draw_key(result.product, &result.issue);

            let _guard = store.lock()?;
            let mut stored: DrawResult = store
                .get_json(&key)?
                .ok_or_else(|| StorageError::WriteFailed(format!("{} does not exist", key)))?;
            if stored.is_settled() {
                return Ok(());
            }
            stored.tiers = result.tiers;
            stored.total_payout = result.total_payout;
            stored.settled_at = result.settled_at;
            let bytes = encode(&key, &stored)?;
            store.batch_write(&[(key, bytes)])
        })
        .await
    }

    async fn get_draw_result(&self, product: LotteryProduct, issue: &IssueId) -> Result<Option<DrawResult>, StorageError> {
        let key = draw_key(product, issue);
        self.blocking(move |store| store.get_json(&key)).await
    }

    async fn draw_results_by_product(&self, product: LotteryProduct) -> Result<Vec<DrawResult>, StorageError> {
        self.blocking(move |store| {
            let mut results = Vec::new();
            for raw_issue in store.scan_prefix(&draw_index_prefix(product))? {
                let issue = String::from_utf8_lossy(&raw_issue);
                let key = format!("{}{}:{}", DRAW_PREFIX, product.code(), issue);
                if let Some(result) = store.get_json::<DrawResult>(&key)? {
                    results.push(result);
                }
            }
            Ok(results)
        })
        .await
    }

    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let key = lease_key(key);
        let holder = holder.to_string();
        self.blocking(move |store| {
            let _guard = store.lock()?;
            if let Some(existing) = store.get_json::<Lease>(&key)? {
                if existing.is_held_by_other(&holder, now) {
                    return Ok(false);
                }
            }
            let lease = Lease { holder, expires_at };
            let bytes = encode(&key, &lease)?;
            store.batch_write(&[(key, bytes)])?;
            Ok(true)
        })
        .await
    }

    async fn release_lease(&self, key: &str, holder: &str) -> Result<(), StorageError> {
        let key = lease_key(key);
        let holder = holder.to_string();
        self.blocking(move |store| {
            let _guard = store.lock()?;
            if let Some(existing) = store.get_json::<Lease>(&key)? {
                if existing.holder == holder {
                    store.db.delete(key.as_bytes()).map_err(StorageError::from)?;
                }
            }
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "rocksdb"
    }
}

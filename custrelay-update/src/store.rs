//! Customer store
//!
//! The store maps `email -> Record` and is the only state shared across
//! concurrent update sessions. It supports many concurrent readers or one
//! exclusive writer at a time; read/modify/write races on the same key must
//! not interleave, so a full shared/exclusive lock is used rather than a
//! partial or lock-free structure.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use custrelay_common::Record;
use thiserror::Error;

/// Errors from the underlying storage engine
#[derive(Error, Debug)]
pub enum StoreError {
    /// A writer panicked while holding the lock
    #[error("store lock poisoned")]
    Poisoned,

    /// The store could not apply the record
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Interface exposed by the underlying storage service
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Insert or update the given record, keyed by email
    async fn upsert(&self, record: Record) -> Result<(), StoreError>;

    /// Return a snapshot of all records, sorted by email
    async fn list(&self) -> Result<Vec<Record>, StoreError>;
}

/// In-memory customer store backed by a hashmap.
///
/// Process-lifetime state with no expiry. Concurrent upserts to the same
/// email resolve to whichever writer the lock admits last.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn upsert(&self, record: Record) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        records.insert(record.email.clone(), record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Record>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        let mut result: Vec<Record> = records.values().cloned().collect();
        // HashMap iteration order is incidental; sort so the contract is
        // deterministic for callers and tests alike.
        result.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(result)
    }
}

use super::Ledger;
use crate::error::{Result, ScraperError};
use crate::types::ProcessedRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// In-memory ledger for development and testing.
///
/// Clones share the same underlying map, so a test can keep a handle while
/// the workflow owns another. `set_unavailable(true)` makes every call fail
/// with [`ScraperError::LedgerUnavailable`].
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    records: Arc<Mutex<HashMap<String, ProcessedRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seed an entry with an explicit timestamp
    pub fn insert_at(&self, fingerprint: &str, processed_at: DateTime<Utc>) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(
                fingerprint.to_string(),
                ProcessedRecord {
                    fingerprint: fingerprint.to_string(),
                    processed_at,
                },
            );
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<ProcessedRecord> {
        self.records.lock().ok()?.get(fingerprint).cloned()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, ProcessedRecord>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ScraperError::LedgerUnavailable("in-memory ledger marked unavailable".into()));
        }
        self.records
            .lock()
            .map_err(|e| ScraperError::LedgerUnavailable(format!("ledger lock poisoned: {e}")))
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn contains(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(fingerprint))
    }

    async fn load_all(&self) -> Result<HashSet<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn record(&self, fingerprint: &str) -> Result<()> {
        let mut records = self.lock()?;
        // First write wins; processed_at is never updated
        records
            .entry(fingerprint.to_string())
            .or_insert_with(|| ProcessedRecord::now(fingerprint));
        debug!("Recorded fingerprint {}", fingerprint);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut records = self.lock()?;
        let removed = records.len();
        records.clear();
        debug!("Cleared {} ledger entries", removed);
        Ok(())
    }

    async fn forget(&self, fingerprints: &[String]) -> Result<usize> {
        let mut records = self.lock()?;
        Ok(fingerprints
            .iter()
            .filter(|fingerprint| records.remove(fingerprint.as_str()).is_some())
            .count())
    }

    async fn prune(&self, older_than: chrono::Duration) -> Result<usize> {
        let cutoff = Utc::now() - older_than;
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, record| record.processed_at >= cutoff);
        Ok(before - records.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

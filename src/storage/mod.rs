//! The processed-events ledger: fingerprints that were confirmed delivered.

pub mod in_memory;
pub mod sqlite;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;

pub use in_memory::InMemoryLedger;
pub use sqlite::SqliteLedger;

/// Storage trait for the set of already-delivered fingerprints.
///
/// Every error an implementation returns is treated as the store being
/// unavailable. Recording a fingerprint twice is a no-op.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn contains(&self, fingerprint: &str) -> Result<bool>;

    /// Every fingerprint currently in the ledger
    async fn load_all(&self) -> Result<HashSet<String>>;

    async fn record(&self, fingerprint: &str) -> Result<()>;

    async fn record_many(&self, fingerprints: &[String]) -> Result<()> {
        for fingerprint in fingerprints {
            self.record(fingerprint).await?;
        }
        Ok(())
    }

    /// Remove every entry (full-sync reset)
    async fn clear(&self) -> Result<()>;

    /// Remove the given fingerprints; returns how many were present
    async fn forget(&self, fingerprints: &[String]) -> Result<usize>;

    /// Remove entries processed longer than `older_than` ago; returns how many
    async fn prune(&self, older_than: chrono::Duration) -> Result<usize>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

use super::Ledger;
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// SQLite-backed ledger. One row per delivered fingerprint.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS processed_events (
                fingerprint   TEXT PRIMARY KEY,
                processed_at  INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_processed_events_processed_at
                ON processed_events (processed_at);
            "#,
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ScraperError::LedgerUnavailable(format!("ledger lock poisoned: {e}")))
    }

    /// Insert with an explicit timestamp (unix seconds)
    pub fn record_at(&self, fingerprint: &str, processed_at: i64) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO processed_events (fingerprint, processed_at) VALUES (?1, ?2)",
            params![fingerprint, processed_at],
        )?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn contains(&self, fingerprint: &str) -> Result<bool> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT 1 FROM processed_events WHERE fingerprint = ?1")?;
        let mut rows = stmt.query(params![fingerprint])?;
        Ok(rows.next()?.is_some())
    }

    async fn load_all(&self) -> Result<HashSet<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT fingerprint FROM processed_events")?;
        let mut rows = stmt.query([])?;
        let mut keys = HashSet::new();
        while let Some(row) = rows.next()? {
            keys.insert(row.get::<_, String>(0)?);
        }
        debug!("Loaded {} processed fingerprints", keys.len());
        Ok(keys)
    }

    async fn record(&self, fingerprint: &str) -> Result<()> {
        self.record_at(fingerprint, Utc::now().timestamp())
    }

    async fn record_many(&self, fingerprints: &[String]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().timestamp();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO processed_events (fingerprint, processed_at) VALUES (?1, ?2)",
            )?;
            for fingerprint in fingerprints {
                stmt.execute(params![fingerprint, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let removed = self.conn()?.execute("DELETE FROM processed_events", [])?;
        info!("Cleared {} processed events", removed);
        Ok(())
    }

    async fn forget(&self, fingerprints: &[String]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM processed_events WHERE fingerprint = ?1")?;
            for fingerprint in fingerprints {
                removed += stmt.execute(params![fingerprint])?;
            }
        }
        tx.commit()?;
        debug!("Forgot {} ledger entries", removed);
        Ok(removed)
    }

    async fn prune(&self, older_than: chrono::Duration) -> Result<usize> {
        let cutoff = (Utc::now() - older_than).timestamp();
        let removed = self.conn()?.execute(
            "DELETE FROM processed_events WHERE processed_at < ?1",
            params![cutoff],
        )?;
        info!("Pruned {} processed events older than {} days", removed, older_than.num_days());
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM processed_events", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

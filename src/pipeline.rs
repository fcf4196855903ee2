//! The sync workflow: collect → dedupe → filter against ledger → deliver → ledger.

pub mod collect;

use crate::constants::source_key;
use crate::dedupe::dedupe;
use crate::delivery::Deliverer;
use crate::error::{Result, ScraperError};
use crate::observability::metrics;
use crate::storage::Ledger;
use crate::types::{CanonicalEvent, SourceAdapter};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub use collect::{Collected, SourceFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Clear the ledger, then deliver everything collected
    Full,
    /// Deliver only fingerprints the ledger has not seen
    Incremental,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Collecting,
    Deduplicating,
    FilteringAgainstLedger,
    Delivering,
    Reconciling,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Per-adapter fetch timeout
    pub collect_timeout: Duration,
    pub max_events_per_source: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            collect_timeout: Duration::from_secs(60),
            max_events_per_source: 1000,
        }
    }
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub mode: SyncMode,
    /// Canonical events collected across all sources, before dedupe
    pub collected: usize,
    /// Events that passed dedupe and the ledger filter
    pub new: usize,
    pub delivered: usize,
    /// Failed sources + dropped candidates + failed deliveries
    pub errors: usize,
    pub source_failures: Vec<SourceFailure>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    fn new(mode: SyncMode) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            mode,
            collected: 0,
            new: 0,
            delivered: 0,
            errors: 0,
            source_failures: Vec::new(),
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        let secs = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        metrics::sync::run_finished(self.mode.as_str(), secs);
        self
    }
}

/// Resets the shared state to `Idle` however the run ends.
struct IdleOnDrop<'a>(&'a Mutex<SyncState>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.lock() {
            *state = SyncState::Idle;
        }
    }
}

fn ledger_unavailable(e: ScraperError) -> ScraperError {
    match e {
        ScraperError::LedgerUnavailable(_) => e,
        other => ScraperError::LedgerUnavailable(other.to_string()),
    }
}

/// Orchestrates full and incremental syncs against one ledger.
///
/// Only one run at a time: a second trigger while a run is active fails with
/// [`ScraperError::SyncInProgress`].
pub struct SyncWorkflow {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    ledger: Arc<dyn Ledger>,
    deliverer: Deliverer,
    options: SyncOptions,
    state: Mutex<SyncState>,
    run_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for SyncWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWorkflow")
            .field("adapters", &self.source_names())
            .field("ledger", &"<Arc<dyn Ledger>>")
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

impl SyncWorkflow {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        ledger: Arc<dyn Ledger>,
        deliverer: Deliverer,
        options: SyncOptions,
    ) -> Self {
        Self {
            adapters,
            ledger,
            deliverer,
            options,
            state: Mutex::new(SyncState::Idle),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state.lock().map(|s| *s).unwrap_or(SyncState::Idle)
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    fn set_state(&self, next: SyncState) {
        if let Ok(mut state) = self.state.lock() {
            debug!("sync state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    fn selected_adapters(&self, only: Option<&[String]>) -> Vec<Arc<dyn SourceAdapter>> {
        match only {
            None => self.adapters.clone(),
            Some(names) => {
                let wanted: HashSet<String> = names.iter().map(|n| source_key(n)).collect();
                self.adapters
                    .iter()
                    .filter(|a| wanted.contains(&source_key(a.name())))
                    .cloned()
                    .collect()
            }
        }
    }

    pub async fn full_sync(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        self.run(SyncMode::Full, None, cancel).await
    }

    pub async fn incremental_sync(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        self.run(SyncMode::Incremental, None, cancel).await
    }

    /// Run one sync. `only` restricts the run to the named sources and is an
    /// error when it names none of them. A full sync restricted this way
    /// leaves other sources' ledger entries in place.
    ///
    /// Per-source, per-candidate and per-delivery failures are counted in the
    /// report. Only ledger failures (and a concurrent run) are returned as errors,
    /// and ledger access always happens before the first delivery.
    #[instrument(skip_all, fields(mode = mode.as_str()))]
    pub async fn run(
        &self,
        mode: SyncMode,
        only: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let _running = self.run_lock.try_lock().map_err(|_| ScraperError::SyncInProgress)?;
        let _idle = IdleOnDrop(&self.state);
        let mut report = SyncReport::new(mode);
        info!(run_id = %report.run_id, "🔄 Starting {} sync...", mode.as_str());

        let adapters = self.selected_adapters(only);
        if adapters.is_empty() {
            return Err(ScraperError::Config(format!(
                "no source matches {:?}, available: {:?}",
                only.unwrap_or_default(),
                self.source_names()
            )));
        }

        // A scoped full sync only resets the fingerprints it re-collects
        let scoped = only.is_some();
        if mode == SyncMode::Full && !scoped {
            warn!("Full sync: clearing the processed-events ledger");
            self.ledger.clear().await.map_err(ledger_unavailable)?;
        }

        // Collecting
        self.set_state(SyncState::Collecting);
        let collecting = collect::collect(
            &adapters,
            self.options.collect_timeout,
            self.options.max_events_per_source,
        );
        let collected = tokio::select! {
            collected = collecting => collected,
            _ = cancel.cancelled() => {
                info!("Sync cancelled while collecting");
                report.cancelled = true;
                return Ok(report.finish());
            }
        };
        report.collected = collected.events.len();
        report.errors += collected.source_failures.len() + collected.dropped;
        report.source_failures = collected.source_failures;
        metrics::sync::collected(report.collected);

        // Deduplicating
        self.set_state(SyncState::Deduplicating);
        let unique = dedupe(collected.events);
        info!(
            "📦 Collected {} events, {} unique ({} sources failed, {} candidates dropped)",
            report.collected,
            unique.len(),
            report.source_failures.len(),
            collected.dropped
        );

        // FilteringAgainstLedger
        self.set_state(SyncState::FilteringAgainstLedger);
        let pending: Vec<CanonicalEvent> = match mode {
            SyncMode::Full if scoped => {
                let fingerprints: Vec<String> = unique.iter().map(|e| e.fingerprint.clone()).collect();
                let forgotten = self.ledger.forget(&fingerprints).await.map_err(ledger_unavailable)?;
                warn!("Scoped full sync: reset {} of {} ledger entries", forgotten, fingerprints.len());
                unique
            }
            SyncMode::Full => unique,
            SyncMode::Incremental => {
                let processed = self.ledger.load_all().await.map_err(ledger_unavailable)?;
                info!("📋 Loaded {} processed event keys", processed.len());
                unique
                    .into_iter()
                    .filter(|event| !processed.contains(&event.fingerprint))
                    .collect()
            }
        };
        report.new = pending.len();
        metrics::sync::new_events(report.new);
        info!("🆕 Found {} new events", report.new);

        // Delivering, with each confirmed delivery reconciled into the ledger
        self.set_state(SyncState::Delivering);
        for event in &pending {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let outcome = self.deliverer.deliver(event, cancel).await;
            if outcome.delivered {
                self.set_state(SyncState::Reconciling);
                if let Err(e) = self.ledger.record(&event.fingerprint).await {
                    error!(
                        fingerprint = %event.fingerprint,
                        "Delivered event could not be ledgered: {}", e
                    );
                    return Err(ledger_unavailable(e));
                }
                report.delivered += 1;
                self.set_state(SyncState::Delivering);
            } else if outcome.cancelled {
                report.cancelled = true;
                break;
            } else {
                report.errors += 1;
            }
        }

        // Reconciling
        self.set_state(SyncState::Reconciling);
        metrics::sync::delivered(report.delivered);
        if let Ok(size) = self.ledger.len().await {
            metrics::sync::ledger_size(size);
        }

        let report = report.finish();
        info!(
            run_id = %report.run_id,
            "✅ {} sync complete: {}/{} events delivered, {} errors{}",
            mode.as_str(),
            report.delivered,
            report.new,
            report.errors,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }
}

//! Collecting stage: run every adapter concurrently and canonicalize what they return.

use crate::error::{Result, ScraperError};
use crate::normalize::canonicalize;
use crate::observability::metrics;
use crate::types::{CanonicalEvent, RawCandidate, SourceAdapter};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A source that failed as a whole and contributed no events.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub message: String,
}

/// Merged output of one collection round.
#[derive(Debug, Default)]
pub struct Collected {
    pub events: Vec<CanonicalEvent>,
    pub source_failures: Vec<SourceFailure>,
    /// Candidates dropped by the canonicalizer
    pub dropped: usize,
}

/// Fetch one adapter under a timeout. Failures are returned, not raised.
async fn fetch_one(
    adapter: Arc<dyn SourceAdapter>,
    timeout: Duration,
) -> (String, Result<Vec<RawCandidate>>) {
    let name = adapter.name().to_string();
    info!("🕷️  Starting {} adapter...", name);
    let started = Instant::now();

    let result = match tokio::time::timeout(timeout, adapter.fetch()).await {
        Ok(result) => result,
        Err(_) => Err(ScraperError::fetch(&name, format!("timed out after {}s", timeout.as_secs()))),
    };

    let secs = started.elapsed().as_secs_f64();
    metrics::sources::fetch_finished(&name, secs);
    match &result {
        Ok(candidates) => info!("{}: found {} candidates in {:.2}s", name, candidates.len(), secs),
        Err(e) => warn!("{}: failed after {:.2}s: {}", name, secs, e),
    }
    (name, result)
}

/// Run all `adapters` in parallel, then canonicalize in adapter order.
///
/// Each adapter's output is capped at `max_per_source` candidates. A failing
/// adapter becomes a [`SourceFailure`]; a candidate that cannot be
/// canonicalized is counted in `dropped`.
pub async fn collect(
    adapters: &[Arc<dyn SourceAdapter>],
    timeout: Duration,
    max_per_source: usize,
) -> Collected {
    let fetches = adapters
        .iter()
        .map(|adapter| fetch_one(Arc::clone(adapter), timeout));
    let results = join_all(fetches).await;

    let mut collected = Collected::default();
    for (source, result) in results {
        let candidates = match result {
            Ok(candidates) => candidates,
            Err(e) => {
                metrics::sources::error(&source);
                collected.source_failures.push(SourceFailure {
                    source,
                    message: e.to_string(),
                });
                continue;
            }
        };

        if candidates.len() > max_per_source {
            debug!("{}: capping {} candidates at {}", source, candidates.len(), max_per_source);
        }
        for raw in candidates.iter().take(max_per_source) {
            match canonicalize(raw, None) {
                Ok(event) => collected.events.push(event),
                Err(e) => {
                    let reason = match e {
                        ScraperError::MalformedDate(_) => "malformed_date",
                        _ => "invalid",
                    };
                    metrics::sync::dropped(reason);
                    debug!("{}: dropping candidate {:?}: {}", source, raw.name, e);
                    collected.dropped += 1;
                }
            }
        }
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(&'static str, Vec<RawCandidate>);

    #[async_trait]
    impl SourceAdapter for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        async fn fetch(&self) -> Result<Vec<RawCandidate>> {
            Ok(self.1.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl SourceAdapter for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        async fn fetch(&self) -> Result<Vec<RawCandidate>> {
            Err(ScraperError::fetch("broken", "403 Forbidden"))
        }
    }

    struct Hanging;

    #[async_trait]
    impl SourceAdapter for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }
        async fn fetch(&self) -> Result<Vec<RawCandidate>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    fn gig(name: &str) -> RawCandidate {
        RawCandidate::new(name, "2030-05-01", "Fixed").with_city("Utrecht")
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_isolated_per_source() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(Fixed("one", vec![gig("A"), gig("B")])),
            Arc::new(Broken),
            Arc::new(Hanging),
            Arc::new(Fixed("two", vec![gig("C")])),
        ];

        let collected = collect(&adapters, Duration::from_secs(30), 100).await;

        let names: Vec<_> = collected.events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        let failed: Vec<_> = collected.source_failures.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(failed, vec!["broken", "hanging"]);
        assert!(collected.source_failures[1].message.contains("timed out"));
    }

    #[tokio::test]
    async fn undatable_candidates_are_dropped_and_counted() {
        let mut bad = gig("Later");
        bad.date = "binnenkort".into();
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(Fixed("one", vec![gig("A"), bad]))];

        let collected = collect(&adapters, Duration::from_secs(30), 100).await;
        assert_eq!(collected.events.len(), 1);
        assert_eq!(collected.dropped, 1);
    }

    #[tokio::test]
    async fn caps_each_source() {
        let adapters: Vec<Arc<dyn SourceAdapter>> =
            vec![Arc::new(Fixed("one", vec![gig("A"), gig("B"), gig("C")]))];
        let collected = collect(&adapters, Duration::from_secs(30), 2).await;
        assert_eq!(collected.events.len(), 2);
    }
}

//! Metrics for the sync pipeline
//!
//! Thin helpers over the `metrics` facade so call sites don't repeat metric
//! names. Nothing is exported unless [`init_metrics`] installed a recorder.

use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Metric names used across the pipeline
pub mod names {
    pub const SYNC_RUNS: &str = "event_sync_runs_total";
    pub const SYNC_DURATION: &str = "event_sync_duration_seconds";
    pub const EVENTS_COLLECTED: &str = "event_sync_events_collected_total";
    pub const EVENTS_NEW: &str = "event_sync_events_new_total";
    pub const EVENTS_DELIVERED: &str = "event_sync_events_delivered_total";
    pub const EVENTS_DROPPED: &str = "event_sync_events_dropped_total";
    pub const SOURCE_ERRORS: &str = "event_sync_source_errors_total";
    pub const SOURCE_FETCH_DURATION: &str = "event_sync_source_fetch_duration_seconds";
    pub const DELIVERY_ATTEMPTS: &str = "event_sync_delivery_attempts_total";
    pub const DELIVERY_EXHAUSTED: &str = "event_sync_delivery_exhausted_total";
    pub const LEDGER_SIZE: &str = "event_sync_ledger_size";
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
/// Idempotent; a bad address or a second recorder only logs a warning.
pub fn init_metrics(addr: &str) {
    INIT.call_once(|| {
        let socket: std::net::SocketAddr = match addr.parse() {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Invalid metrics addr '{}': {}", addr, e);
                return;
            }
        };
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(socket)
            .install()
        {
            Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", socket),
            Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
        }
    });
}

pub mod sync {
    use super::names;

    pub fn run_finished(mode: &'static str, duration_secs: f64) {
        ::metrics::counter!(names::SYNC_RUNS, "mode" => mode).increment(1);
        ::metrics::histogram!(names::SYNC_DURATION, "mode" => mode).record(duration_secs);
    }

    pub fn collected(count: usize) {
        ::metrics::counter!(names::EVENTS_COLLECTED).increment(count as u64);
    }

    pub fn new_events(count: usize) {
        ::metrics::counter!(names::EVENTS_NEW).increment(count as u64);
    }

    pub fn delivered(count: usize) {
        ::metrics::counter!(names::EVENTS_DELIVERED).increment(count as u64);
    }

    /// Candidates dropped by the canonicalizer
    pub fn dropped(reason: &'static str) {
        ::metrics::counter!(names::EVENTS_DROPPED, "reason" => reason).increment(1);
    }

    pub fn ledger_size(size: usize) {
        ::metrics::gauge!(names::LEDGER_SIZE).set(size as f64);
    }
}

pub mod sources {
    use super::names;

    pub fn fetch_finished(source: &str, duration_secs: f64) {
        ::metrics::histogram!(names::SOURCE_FETCH_DURATION, "source" => source.to_string())
            .record(duration_secs);
    }

    pub fn error(source: &str) {
        ::metrics::counter!(names::SOURCE_ERRORS, "source" => source.to_string()).increment(1);
    }
}

pub mod delivery {
    use super::names;

    pub fn attempt(success: bool) {
        let outcome = if success { "success" } else { "failure" };
        ::metrics::counter!(names::DELIVERY_ATTEMPTS, "outcome" => outcome).increment(1);
    }

    pub fn exhausted() {
        ::metrics::counter!(names::DELIVERY_EXHAUSTED).increment(1);
    }
}

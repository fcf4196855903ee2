#![allow(dead_code)]

use async_trait::async_trait;
use event_sync::delivery::{Deliverer, DeliveryClient, RetryPolicy};
use event_sync::pipeline::{SyncOptions, SyncWorkflow};
use event_sync::storage::Ledger;
use event_sync::{CanonicalEvent, RawCandidate, Result, ScraperError, SourceAdapter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Returns the same candidates on every fetch.
pub struct StaticAdapter {
    name: String,
    candidates: Vec<RawCandidate>,
}

impl StaticAdapter {
    pub fn new(name: &str, candidates: Vec<RawCandidate>) -> Arc<Self> {
        Arc::new(Self { name: name.to_string(), candidates })
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawCandidate>> {
        Ok(self.candidates.clone())
    }
}

/// Always fails as a whole source.
pub struct FailingAdapter(pub &'static str);

#[async_trait]
impl SourceAdapter for FailingAdapter {
    fn name(&self) -> &str {
        self.0
    }

    async fn fetch(&self) -> Result<Vec<RawCandidate>> {
        Err(ScraperError::fetch(self.0, "connection reset by peer"))
    }
}

/// Records every send. Events named in `failures` fail that many times first;
/// a count of `u32::MAX` fails forever.
#[derive(Default)]
pub struct ScriptedDelivery {
    failures: Mutex<HashMap<String, u32>>,
    attempts: Mutex<Vec<String>>,
    delivered: Mutex<Vec<CanonicalEvent>>,
}

impl ScriptedDelivery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_times(&self, event_name: &str, times: u32) {
        self.failures.lock().unwrap().insert(event_name.to_string(), times);
    }

    /// Names of events in the order each attempt was made
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn delivered(&self) -> Vec<CanonicalEvent> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryClient for ScriptedDelivery {
    async fn send(&self, event: &CanonicalEvent) -> Result<()> {
        self.attempts.lock().unwrap().push(event.name.clone());

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&event.name) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(ScraperError::Delivery {
                    fingerprint: event.fingerprint.clone(),
                    message: "500 Internal Server Error".into(),
                });
            }
        }
        drop(failures);

        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn gig(name: &str, date: &str, city: &str) -> RawCandidate {
    RawCandidate::new(name, date, "Test Agenda").with_city(city)
}

pub fn workflow(
    adapters: Vec<Arc<dyn SourceAdapter>>,
    ledger: Arc<dyn Ledger>,
    delivery: Arc<ScriptedDelivery>,
) -> SyncWorkflow {
    let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_millis(100));
    SyncWorkflow::new(adapters, ledger, Deliverer::new(delivery, policy), SyncOptions::default())
}

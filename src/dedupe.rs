use crate::types::CanonicalEvent;
use std::collections::HashSet;

/// Drop later events whose fingerprint was already seen in this batch.
/// Survivors keep their original relative order.
pub fn dedupe(events: Vec<CanonicalEvent>) -> Vec<CanonicalEvent> {
    let mut seen = HashSet::with_capacity(events.len());
    events
        .into_iter()
        .filter(|event| seen.insert(event.fingerprint.clone()))
        .collect()
}

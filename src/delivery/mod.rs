//! Outbound delivery: the downstream sink and the retry policy around it.

pub mod http;

use crate::error::Result;
use crate::types::CanonicalEvent;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub use http::{FieldMapping, HttpDeliveryClient};

/// Accepts one canonical event. `Ok(())` means the downstream confirmed it.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn send(&self, event: &CanonicalEvent) -> Result<()>;
}

/// How many times to try one event and how long to wait in between.
#[derive(Copy, Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Multiplied by `2^attempt` to get the wait before the next attempt.
    pub backoff_base: Duration,
    /// Slept after every attempt, successful or not.
    pub rate_limit_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration, rate_limit_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            rate_limit_delay,
        }
    }

    /// Wait after failed attempt number `attempt` (counted from 1).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            rate_limit_delay: Duration::from_millis(100),
        }
    }
}

/// Result of delivering one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub delivered: bool,
    pub attempts: u32,
    pub cancelled: bool,
}

/// Wraps a [`DeliveryClient`] with retries, backoff and rate limiting.
#[derive(Clone)]
pub struct Deliverer {
    client: Arc<dyn DeliveryClient>,
    policy: RetryPolicy,
}

impl Deliverer {
    pub fn new(client: Arc<dyn DeliveryClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Try to deliver `event`, giving up after the policy's attempt budget.
    pub async fn deliver_with_retry(&self, event: &CanonicalEvent) -> bool {
        self.deliver(event, &CancellationToken::new()).await.delivered
    }

    /// Like [`Self::deliver_with_retry`] but reports attempts and stops early
    /// when `cancel` fires between attempts.
    pub async fn deliver(&self, event: &CanonicalEvent, cancel: &CancellationToken) -> DeliveryOutcome {
        let max = self.policy.max_attempts;
        let mut attempts = 0;

        for attempt in 1..=max {
            if cancel.is_cancelled() {
                return DeliveryOutcome { delivered: false, attempts, cancelled: true };
            }

            attempts = attempt;
            let result = self.client.send(event).await;
            crate::observability::metrics::delivery::attempt(result.is_ok());

            // Rate limit after every attempt
            tokio::time::sleep(self.policy.rate_limit_delay).await;

            match result {
                Ok(()) => {
                    debug!("Delivered {} ({}) on attempt {}", event.name, event.fingerprint, attempt);
                    return DeliveryOutcome { delivered: true, attempts, cancelled: false };
                }
                Err(e) => {
                    warn!("Attempt {}/{} failed for {}: {}", attempt, max, event.name, e);
                }
            }

            if attempt < max {
                let wait = self.policy.backoff_after(attempt);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancel.cancelled() => {
                        return DeliveryOutcome { delivered: false, attempts, cancelled: true };
                    }
                }
            }
        }

        error!(
            fingerprint = %event.fingerprint,
            "Failed to deliver event after {} attempts: {}", max, event.name
        );
        crate::observability::metrics::delivery::exhausted();
        DeliveryOutcome { delivered: false, attempts, cancelled: false }
    }
}

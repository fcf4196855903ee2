use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Loosely structured event listing as produced by a source adapter.
/// Never persisted; fed straight into the canonicalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub name: String,
    /// Free-form date text ("2025-12-01", "22 nov", "01/12/2025", ...)
    pub date: String,
    pub end_date: Option<String>,
    pub location: Option<String>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub organizer: Option<String>,
    pub contact: Option<String>,
    /// Either a number of days ("3", "3 dagen") or an end date
    pub duration: Option<String>,
    pub source: String,
    pub source_url: Option<String>,
}

impl RawCandidate {
    pub fn new(name: impl Into<String>, date: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date: date.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_organizer(mut self, organizer: impl Into<String>) -> Self {
        self.organizer = Some(organizer.into());
        self
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn with_end_date(mut self, end_date: impl Into<String>) -> Self {
        self.end_date = Some(end_date.into());
        self
    }
}

/// The normalized, deduplication-ready event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub name: String,
    pub date: NaiveDate,
    pub location: String,
    pub organizer: String,
    pub contact: String,
    pub source: String,
    pub duration_days: u32,
    /// Derived from `(name, date, location)` only
    pub fingerprint: String,
}

/// Ledger entry for an event that was confirmed delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub fingerprint: String,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedRecord {
    pub fn now(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            processed_at: Utc::now(),
        }
    }
}

/// Core trait that all event sources must implement
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Unique name for this source, as used in configuration and filters
    fn name(&self) -> &str;

    /// Fetch and parse every listing this source currently exposes
    async fn fetch(&self) -> Result<Vec<RawCandidate>>;
}

use super::DeliveryClient;
use crate::error::{Result, ScraperError};
use crate::types::CanonicalEvent;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Canonical field names, in wire order.
pub const CANONICAL_FIELDS: [&str; 8] = [
    "name",
    "date",
    "location",
    "organizer",
    "contact",
    "source",
    "duration_days",
    "fingerprint",
];

/// Declarative rename from canonical field names to the downstream schema.
/// Fields without an entry keep their canonical name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    renames: BTreeMap<String, String>,
}

impl FieldMapping {
    pub fn identity() -> Self {
        Self::default()
    }

    /// The downstream consumer's schema (Dutch field names, `event_date` for the date).
    pub fn client_default() -> Self {
        Self::from_pairs([
            ("name", "evenement_naam"),
            ("date", "event_date"),
            ("location", "locatie_evenement"),
            ("organizer", "organisator"),
            ("contact", "contact_organisator"),
            ("source", "bron"),
            ("duration_days", "duur_evenement"),
            ("fingerprint", "sleutel"),
        ])
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            renames: pairs
                .into_iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    /// Rejects mappings that name unknown fields or send two fields to one name.
    pub fn validate(&self) -> Result<()> {
        for field in self.renames.keys() {
            if !CANONICAL_FIELDS.contains(&field.as_str()) {
                return Err(ScraperError::Config(format!("unknown canonical field in mapping: {field}")));
            }
        }
        let mut targets: Vec<&str> = CANONICAL_FIELDS.iter().map(|f| self.wire_name(f)).collect();
        targets.sort_unstable();
        targets.dedup();
        if targets.len() != CANONICAL_FIELDS.len() {
            return Err(ScraperError::Config("field mapping sends two fields to the same name".into()));
        }
        Ok(())
    }

    pub fn renames(&self) -> &BTreeMap<String, String> {
        &self.renames
    }

    pub fn wire_name<'a>(&'a self, field: &'a str) -> &'a str {
        self.renames.get(field).map(String::as_str).unwrap_or(field)
    }

    /// Render an event as the downstream JSON object.
    pub fn to_payload(&self, event: &CanonicalEvent) -> Result<Value> {
        let Value::Object(canonical) = serde_json::to_value(event)? else {
            return Err(ScraperError::MissingField("event did not serialize to an object".into()));
        };
        let mut payload = Map::with_capacity(canonical.len());
        for (field, value) in canonical {
            payload.insert(self.wire_name(&field).to_string(), value);
        }
        Ok(Value::Object(payload))
    }
}

/// Posts each event as JSON to a fixed endpoint. Any 2xx is success.
pub struct HttpDeliveryClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
    mapping: FieldMapping,
}

impl HttpDeliveryClient {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, mapping: FieldMapping) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: None,
            timeout: None,
            mapping,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    /// Per-request timeout, overriding the shared client's.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    #[instrument(skip(self, event), fields(fingerprint = %event.fingerprint))]
    async fn send(&self, event: &CanonicalEvent) -> Result<()> {
        let payload = self.mapping.to_payload(event)?;
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| ScraperError::Delivery {
            fingerprint: event.fingerprint.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            debug!("Sent event: {}", event.name);
            Ok(())
        } else {
            warn!("Endpoint responded with status {} for {}", status.as_u16(), event.name);
            Err(ScraperError::Delivery {
                fingerprint: event.fingerprint.clone(),
                message: format!("status {}", status.as_u16()),
            })
        }
    }
}

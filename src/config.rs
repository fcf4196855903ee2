use crate::constants::{get_supported_sources, source_key, MIN_RETENTION_DAYS};
use crate::delivery::{FieldMapping, RetryPolicy};
use crate::error::{Result, ScraperError};
use crate::pipeline::SyncOptions;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub delivery: DeliveryConfig,
    pub ledger: LedgerConfig,
    pub sync: SyncConfig,
    pub scraper: ScraperConfig,
    pub server: ServerConfig,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadSchema {
    /// Canonical field names
    #[default]
    Canonical,
    /// The downstream consumer's Dutch field names
    Client,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub rate_limit_delay_ms: u64,
    pub schema: PayloadSchema,
    /// Extra per-field renames applied on top of `schema`
    pub field_names: BTreeMap<String, String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            request_timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 1000,
            rate_limit_delay_ms: 100,
            schema: PayloadSchema::Canonical,
            field_names: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite file holding processed fingerprints
    pub path: String,
    pub retention_days: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: "data/ledger.db".to_string(),
            retention_days: MIN_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_minutes: u64,
    pub collect_timeout_secs: u64,
    pub max_events_per_source: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 120,
            collect_timeout_secs: 60,
            max_events_per_source: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub user_agent: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Config {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// [`Config::load`], then environment overrides. Call `dotenv` first.
    pub fn load_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get("CLIENT_ENDPOINT") {
            self.delivery.endpoint = Some(endpoint);
        }
        if let Some(key) = get("CLIENT_API_KEY") {
            self.delivery.api_key = Some(key);
        }
        if let Some(path) = get("LEDGER_PATH") {
            self.ledger.path = path;
        }
        if let Some(minutes) = get("SCRAPE_INTERVAL_MINUTES").and_then(|v| v.parse().ok()) {
            self.sync.interval_minutes = minutes;
        }
        if let Some(max) = get("MAX_EVENTS_PER_SOURCE").and_then(|v| v.parse().ok()) {
            self.sync.max_events_per_source = max;
        }
        if let Some(agent) = get("USER_AGENT") {
            self.scraper.user_agent = Some(agent);
        }
        if let Some(port) = get("PORT").and_then(|v| v.parse::<u16>().ok()) {
            self.server.addr = format!("0.0.0.0:{port}");
        }
        debug!("Configuration after environment overrides: {:?}", self.redacted());
    }

    fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.delivery.api_key.is_some() {
            copy.delivery.api_key = Some("***".to_string());
        }
        copy
    }

    /// Check everything a sync run needs.
    pub fn validate(&self) -> Result<()> {
        match self.delivery.endpoint.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(ScraperError::Config(
                    "delivery endpoint is not set (delivery.endpoint or CLIENT_ENDPOINT)".into(),
                ))
            }
            Some(endpoint) => {
                url::Url::parse(endpoint).map_err(|e| {
                    ScraperError::Config(format!("invalid delivery endpoint '{endpoint}': {e}"))
                })?;
            }
        }
        if self.ledger.retention_days < MIN_RETENTION_DAYS {
            return Err(ScraperError::Config(format!(
                "ledger.retention_days must be at least {MIN_RETENTION_DAYS}, got {}",
                self.ledger.retention_days
            )));
        }
        if self.delivery.max_attempts == 0 {
            return Err(ScraperError::Config("delivery.max_attempts must be at least 1".into()));
        }
        let supported = get_supported_sources();
        for source in &self.sources {
            if !supported.contains(&source_key(&source.name).as_str()) {
                return Err(ScraperError::Config(format!("unknown source: {}", source.name)));
            }
        }
        self.field_mapping()?;
        Ok(())
    }

    /// Sources to run: the configured enabled ones, or every supported source
    /// when none are configured. Pairs of (name, url override).
    pub fn enabled_sources(&self) -> Vec<(String, Option<String>)> {
        if self.sources.is_empty() {
            return get_supported_sources()
                .into_iter()
                .map(|name| (name.to_string(), None))
                .collect();
        }
        self.sources
            .iter()
            .filter(|s| s.enabled)
            .map(|s| (s.name.clone(), s.url.clone()))
            .collect()
    }

    pub fn field_mapping(&self) -> Result<FieldMapping> {
        let mut renames: BTreeMap<String, String> = match self.delivery.schema {
            PayloadSchema::Canonical => BTreeMap::new(),
            PayloadSchema::Client => FieldMapping::client_default().renames().clone(),
        };
        renames.extend(self.delivery.field_names.clone());
        let mapping = FieldMapping::from_pairs(renames.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        mapping.validate()?;
        Ok(mapping)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.delivery.max_attempts,
            Duration::from_millis(self.delivery.backoff_base_ms),
            Duration::from_millis(self.delivery.rate_limit_delay_ms),
        )
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            collect_timeout: Duration::from_secs(self.sync.collect_timeout_secs),
            max_events_per_source: self.sync.max_events_per_source,
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.ledger.retention_days.max(MIN_RETENTION_DAYS))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_minutes.max(1) * 60)
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A source could not be reached or parsed; contributes zero events.
    #[error("Fetch from {source_name} failed: {message}")]
    Fetch { source_name: String, message: String },

    /// A single candidate could not be dated; the candidate is dropped.
    #[error("Malformed date: {0:?}")]
    MalformedDate(String),

    /// A single event could not be delivered; it stays unledgered.
    #[error("Delivery of {fingerprint} failed: {message}")]
    Delivery { fingerprint: String, message: String },

    /// The ledger backing store cannot be read or written. Fatal to a sync run.
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("A sync is already running")]
    SyncInProgress,
}

impl ScraperError {
    pub fn fetch(source_name: impl Into<String>, message: impl ToString) -> Self {
        ScraperError::Fetch {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}

impl From<rusqlite::Error> for ScraperError {
    fn from(e: rusqlite::Error) -> Self {
        ScraperError::LedgerUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;

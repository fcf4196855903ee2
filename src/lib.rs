pub mod apis;
pub mod config;
pub mod constants;
pub mod dedupe;
pub mod delivery;
pub mod error;
pub mod infra;
pub mod logging;
pub mod normalize;
pub mod observability;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod types;

pub use error::{Result, ScraperError};
pub use pipeline::{SyncMode, SyncReport, SyncWorkflow};
pub use types::{CanonicalEvent, RawCandidate, SourceAdapter};

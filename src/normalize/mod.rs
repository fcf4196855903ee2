//! Canonicalizer: raw candidates in, fingerprinted canonical events out.

pub mod contact;
pub mod date;
pub mod fingerprint;
pub mod text;

use crate::constants::UNKNOWN;
use crate::error::{Result, ScraperError};
use crate::types::{CanonicalEvent, RawCandidate};
use chrono::{Local, NaiveDate};
use tracing::debug;

pub use date::{duration_days, normalize_date};
pub use fingerprint::compute_fingerprint;
pub use text::{extract_domain, normalize_text};

/// Canonicalize using today's local date for year inference.
pub fn canonicalize(raw: &RawCandidate, source_url_hint: Option<&str>) -> Result<CanonicalEvent> {
    canonicalize_at(raw, source_url_hint, Local::now().date_naive())
}

/// Canonicalize with an explicit reference date.
pub fn canonicalize_at(
    raw: &RawCandidate,
    source_url_hint: Option<&str>,
    today: NaiveDate,
) -> Result<CanonicalEvent> {
    let name = normalize_text(&raw.name);
    if name.is_empty() {
        return Err(ScraperError::MissingField("name".into()));
    }

    let date = normalize_date(&text::decode_entities(&raw.date), today)?;

    let location = text::non_empty(raw.location.as_deref())
        .or_else(|| text::non_empty(raw.venue.as_deref()))
        .or_else(|| text::non_empty(raw.city.as_deref()))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let organizer = text::non_empty(raw.organizer.as_deref()).unwrap_or_else(|| UNKNOWN.to_string());
    let contact = text::non_empty(raw.contact.as_deref()).unwrap_or_else(|| UNKNOWN.to_string());

    let source = text::non_empty(Some(raw.source.as_str()))
        .or_else(|| {
            source_url_hint
                .or(raw.source_url.as_deref())
                .and_then(extract_domain)
        })
        .unwrap_or_else(|| UNKNOWN.to_string());

    let duration_days = duration_days(date, raw.end_date.as_deref(), raw.duration.as_deref(), today);

    let date_text = date.format("%Y-%m-%d").to_string();
    let fingerprint = compute_fingerprint(&name, &date_text, &location);
    debug!(%fingerprint, %name, date = %date_text, "canonicalized candidate");

    Ok(CanonicalEvent {
        name,
        date,
        location,
        organizer,
        contact,
        source,
        duration_days,
        fingerprint,
    })
}

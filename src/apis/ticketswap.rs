use super::retain_upcoming;
use crate::constants::{TICKETSWAP_LABEL, TICKETSWAP_SOURCE, TICKETSWAP_URL};
use crate::error::Result;
use crate::infra::fetch_html;
use crate::normalize::text::{decode_entities, normalize_text};
use crate::types::{RawCandidate, SourceAdapter};
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

const ORGANIZER: &str = "TicketSwap";
const CONTACT: &str = "ticketswap@ticketswap.nl";

// Event objects in the page's embedded GraphQL cache: name, start date, then the city object.
static EVENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)"__typename":"Event".*?"name":"([^"]+)".*?"startDate":"(\d{4}-\d{2}-\d{2})[^"]*".*?"city":\{"[^}]*"name":"([^"]+)""#,
    )
    .expect("valid regex")
});

/// Undo JSON string escapes (`\u0026`, `\/`) in a captured value.
fn json_unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}

fn clean(raw: &str) -> String {
    normalize_text(&decode_entities(&json_unescape(raw)))
}

/// Extract events from the JSON embedded in a TicketSwap listing page.
/// Repeats of the same (name, date, city) on one page are kept once.
pub fn parse_page(html: &str, page_url: &str) -> Vec<RawCandidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for caps in EVENT.captures_iter(html) {
        let name = clean(&caps[1]);
        let date = caps[2].to_string();
        let city = clean(&caps[3]);
        if name.chars().count() < 3 {
            continue;
        }
        if !seen.insert((name.to_lowercase(), date.clone(), city.to_lowercase())) {
            debug!("Skipping repeated event {} on {}", name, date);
            continue;
        }

        let mut candidate = RawCandidate::new(name, date, TICKETSWAP_LABEL)
            .with_city(city)
            .with_organizer(ORGANIZER)
            .with_contact(CONTACT)
            .with_duration("1 dag");
        candidate.source_url = Some(page_url.to_string());
        candidates.push(candidate);
    }

    candidates
}

pub struct TicketSwapAdapter {
    client: reqwest::Client,
    url: String,
}

impl TicketSwapAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_url(client, TICKETSWAP_URL)
    }

    pub fn with_url(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for TicketSwapAdapter {
    fn name(&self) -> &str {
        TICKETSWAP_SOURCE
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<RawCandidate>> {
        let html = fetch_html(&self.client, TICKETSWAP_SOURCE, &self.url).await?;
        let candidates = retain_upcoming(parse_page(&html, &self.url), Local::now().date_naive());

        info!("TicketSwap: extracted {} candidates", candidates.len());
        if candidates.is_empty() {
            warn!("No embedded events found - the page structure may have changed");
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><script id="__NEXT_DATA__" type="application/json">
{"props":{"apolloState":{
 "Event:1":{"__typename":"Event","id":"1","name":"Awakenings Festival","startDate":"2026-07-11T12:00:00+02:00","location":{"__typename":"Location","city":{"__typename":"City","name":"Hilvarenbeek"}}},
 "Event:2":{"__typename":"Event","id":"2","name":"Rock \u0026 Roll Night","startDate":"2026-03-01T20:00:00+01:00","location":{"__typename":"Location","city":{"__typename":"City","name":"Amsterdam"}}},
 "Event:3":{"__typename":"Event","id":"3","name":"Awakenings Festival","startDate":"2026-07-11T12:00:00+02:00","location":{"__typename":"Location","city":{"__typename":"City","name":"Hilvarenbeek"}}}
}}}
</script></html>"#;

    #[test]
    fn extracts_embedded_events() {
        let candidates = parse_page(PAGE, TICKETSWAP_URL);
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].name, "Awakenings Festival");
        assert_eq!(candidates[0].date, "2026-07-11");
        assert_eq!(candidates[0].city.as_deref(), Some("Hilvarenbeek"));
        assert_eq!(candidates[0].organizer.as_deref(), Some(ORGANIZER));
        assert_eq!(candidates[0].source, TICKETSWAP_LABEL);

        assert_eq!(candidates[1].name, "Rock & Roll Night");
        assert_eq!(candidates[1].city.as_deref(), Some("Amsterdam"));
    }

    #[test]
    fn candidates_canonicalize_to_one_day_events() {
        let today = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let event = crate::normalize::canonicalize_at(&parse_page(PAGE, TICKETSWAP_URL)[0], None, today).unwrap();
        assert_eq!(event.location, "Hilvarenbeek");
        assert_eq!(event.duration_days, 1);
        assert_eq!(event.contact, CONTACT);
    }

    #[test]
    fn events_before_today_are_skipped() {
        let today = chrono::NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let upcoming = retain_upcoming(parse_page(PAGE, TICKETSWAP_URL), today);
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].name, "Awakenings Festival");
    }

    #[test]
    fn page_without_events_yields_nothing() {
        assert!(parse_page("<html><body>Geen evenementen</body></html>", TICKETSWAP_URL).is_empty());
    }
}

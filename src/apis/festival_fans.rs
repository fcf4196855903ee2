use super::retain_upcoming;
use crate::constants::{FESTIVAL_FANS_LABEL, FESTIVAL_FANS_SOURCE, FESTIVAL_FANS_URL};
use crate::error::Result;
use crate::infra::fetch_html;
use crate::normalize::contact::extract_contact;
use crate::normalize::text::{decode_entities, normalize_text};
use crate::types::{RawCandidate, SourceAdapter};
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument, warn};

/// Shorter names are navigation fragments, not festivals.
const MIN_NAME_LEN: usize = 3;

/// Listing cards carry no region; everything on the agenda is in the Netherlands.
const DEFAULT_REGION: &str = "Nederland";

fn selectors(group: &[&str]) -> Vec<Selector> {
    group
        .iter()
        .map(|css| Selector::parse(css).expect("valid selector"))
        .collect()
}

// Each list is tried in order; the first selector with non-empty text wins.
static CARD: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"article, .festival-item, .event-item, [class*="festival"]"#).expect("valid selector")
});
static NAME: Lazy<Vec<Selector>> =
    Lazy::new(|| selectors(&["h2", "h3", ".title", ".festival-name", r#"a[href*="/festival/"]"#]));
static DATE: Lazy<Vec<Selector>> =
    Lazy::new(|| selectors(&[".date", ".datum", "time", r#"[class*="date"]"#]));
static LOCATION: Lazy<Vec<Selector>> = Lazy::new(|| selectors(&[".location", ".plaats", ".venue"]));
static ORGANIZER: Lazy<Vec<Selector>> =
    Lazy::new(|| selectors(&[".organizer", ".organisator", r#"[class*="organizer"]"#]));
static CONTACT: Lazy<Vec<Selector>> =
    Lazy::new(|| selectors(&[".contact", ".email", r#"[class*="contact"]"#]));
static END_DATE: Lazy<Vec<Selector>> = Lazy::new(|| selectors(&[".end-date", ".einddatum"]));

static DATE_IN_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,2}\s+\w+\s+\d{4}").expect("valid regex"));

fn element_text(element: ElementRef<'_>) -> String {
    normalize_text(&decode_entities(&element.text().collect::<Vec<_>>().join(" ")))
}

/// Text of the first descendant matched by the first selector that yields any text.
fn first_text(card: ElementRef<'_>, fallbacks: &[Selector]) -> Option<String> {
    fallbacks.iter().find_map(|selector| {
        card.select(selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// Parse the agenda page into raw candidates. Cards without a usable name
/// or any date text are skipped.
pub fn parse_listing(html: &str, page_url: &str) -> Vec<RawCandidate> {
    let document = Html::parse_document(html);
    let mut candidates = Vec::new();

    for card in document.select(&CARD) {
        let Some(name) = first_text(card, &NAME) else {
            continue;
        };
        if name.chars().count() < MIN_NAME_LEN {
            continue;
        }

        let card_text = element_text(card);
        let date = first_text(card, &DATE).or_else(|| {
            DATE_IN_TEXT
                .find(&card_text)
                .map(|m| m.as_str().to_string())
        });
        let Some(date) = date else {
            continue;
        };

        let mut candidate = RawCandidate::new(name, date, FESTIVAL_FANS_LABEL).with_city(DEFAULT_REGION);
        candidate.source_url = Some(page_url.to_string());
        candidate.location = first_text(card, &LOCATION);
        candidate.end_date = first_text(card, &END_DATE);
        candidate.organizer = first_text(card, &ORGANIZER);
        candidate.contact = first_text(card, &CONTACT)
            .map(|text| extract_contact(&text).unwrap_or(text))
            .or_else(|| extract_contact(&card_text));

        candidates.push(candidate);
    }

    candidates
}

/// FestivalFans.nl agenda: festival cards in server-rendered HTML.
pub struct FestivalFansAdapter {
    client: reqwest::Client,
    url: String,
}

impl FestivalFansAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_url(client, FESTIVAL_FANS_URL)
    }

    pub fn with_url(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for FestivalFansAdapter {
    fn name(&self) -> &str {
        FESTIVAL_FANS_SOURCE
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<RawCandidate>> {
        let html = fetch_html(&self.client, FESTIVAL_FANS_SOURCE, &self.url).await?;
        let candidates = retain_upcoming(parse_listing(&html, &self.url), Local::now().date_naive());

        info!("FestivalFans: extracted {} candidates", candidates.len());
        if candidates.is_empty() {
            warn!("No festivals found - the page structure may have changed");
        }
        Ok(candidates)
    }
}

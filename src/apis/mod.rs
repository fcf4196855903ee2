pub mod factory;
pub mod festival_fans;
pub mod ticketswap;

pub use factory::create_adapter;
pub use festival_fans::FestivalFansAdapter;
pub use ticketswap::TicketSwapAdapter;

use crate::normalize::{normalize_date, text::decode_entities};
use crate::types::RawCandidate;
use chrono::NaiveDate;
use tracing::debug;

/// Drop candidates dated before `today`.
///
/// Candidates whose date does not parse are kept; canonicalization drops and
/// counts them.
pub fn retain_upcoming(candidates: Vec<RawCandidate>, today: NaiveDate) -> Vec<RawCandidate> {
    let before = candidates.len();
    let upcoming: Vec<RawCandidate> = candidates
        .into_iter()
        .filter(|raw| match normalize_date(&decode_entities(&raw.date), today) {
            Ok(date) => date >= today,
            Err(_) => true,
        })
        .collect();
    if upcoming.len() < before {
        debug!("Skipped {} past events", before - upcoming.len());
    }
    upcoming
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn past_events_are_dropped_and_today_is_kept() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let candidates = vec![
            RawCandidate::new("Gisteren", "2026-05-31", "A"),
            RawCandidate::new("Vandaag", "01-06-2026", "A"),
            RawCandidate::new("Later", "3 juli 2026", "A"),
            RawCandidate::new("Onbekend", "binnenkort", "A"),
        ];

        let names: Vec<_> = retain_upcoming(candidates, today)
            .into_iter()
            .map(|raw| raw.name)
            .collect();
        assert_eq!(names, vec!["Vandaag", "Later", "Onbekend"]);
    }
}

use chrono::NaiveDate;
use event_sync::apis::{festival_fans, ticketswap};
use event_sync::constants::{FESTIVAL_FANS_LABEL, FESTIVAL_FANS_URL, TICKETSWAP_URL};
use event_sync::dedupe::dedupe;
use event_sync::delivery::FieldMapping;
use event_sync::normalize::canonicalize_at;

const FESTIVAL_FANS_PAGE: &str = r#"
<html><body>
  <article class="festival-card">
    <h2>Awakenings Festival</h2>
    <time datetime="2026-07-11">11 juli 2026</time>
    <span class="location">Hilvarenbeek</span>
    <span class="organizer">Awakenings</span>
  </article>
  <article class="festival-card">
    <h2>Into The Woods</h2>
    <span class="date">18 sep</span>
    <span class="venue">Amsterdamse Bos</span>
  </article>
</body></html>
"#;

const TICKETSWAP_PAGE: &str = r#"<script>
{"Event:9":{"__typename":"Event","name":"awakenings festival","startDate":"2026-07-11T12:00:00+02:00","location":{"city":{"__typename":"City","name":"HILVARENBEEK"}}}}
</script>"#;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
}

#[test]
fn same_festival_from_two_sources_is_delivered_once() {
    let mut raw = festival_fans::parse_listing(FESTIVAL_FANS_PAGE, FESTIVAL_FANS_URL);
    raw.extend(ticketswap::parse_page(TICKETSWAP_PAGE, TICKETSWAP_URL));
    assert_eq!(raw.len(), 3);

    let events: Vec<_> = raw
        .iter()
        .map(|candidate| canonicalize_at(candidate, None, today()).unwrap())
        .collect();
    assert_eq!(events[0].fingerprint, events[2].fingerprint);

    let unique = dedupe(events);
    assert_eq!(unique.len(), 2);
    // First seen wins, including its source label
    assert_eq!(unique[0].source, FESTIVAL_FANS_LABEL);
    assert_eq!(unique[0].organizer, "Awakenings");
}

#[test]
fn short_date_gets_the_reference_year() {
    let raw = festival_fans::parse_listing(FESTIVAL_FANS_PAGE, FESTIVAL_FANS_URL);
    let woods = canonicalize_at(&raw[1], None, today()).unwrap();
    assert_eq!(woods.date, NaiveDate::from_ymd_opt(2026, 9, 18).unwrap());
    assert_eq!(woods.location, "Amsterdamse Bos");

    // After September the same text means next year
    let late = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
    let woods = canonicalize_at(&raw[1], None, late).unwrap();
    assert_eq!(woods.date, NaiveDate::from_ymd_opt(2027, 9, 18).unwrap());
}

#[test]
fn client_payload_uses_downstream_field_names() {
    let raw = ticketswap::parse_page(TICKETSWAP_PAGE, TICKETSWAP_URL);
    let event = canonicalize_at(&raw[0], None, today()).unwrap();
    let payload = FieldMapping::client_default().to_payload(&event).unwrap();

    assert_eq!(payload["evenement_naam"], "awakenings festival");
    assert_eq!(payload["event_date"], "2026-07-11");
    assert_eq!(payload["locatie_evenement"], "HILVARENBEEK");
    assert_eq!(payload["bron"], "TicketSwap.nl");
    assert_eq!(payload["duur_evenement"], 1);
    assert_eq!(payload["sleutel"], event.fingerprint.as_str());
}

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid regex"));

// Dutch numbers: +31 / 0031 / 0, then nine digits with optional spaces
static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\+31|0031|0)\s?[1-9](\s?\d){8}").expect("valid regex"));

/// First e-mail address in `text`.
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL.find(text).map(|m| m.as_str().to_string())
}

/// First Dutch phone number in `text`, spaces removed.
pub fn extract_phone(text: &str) -> Option<String> {
    PHONE
        .find(text)
        .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect())
}

/// Contact details from a block of page text: an e-mail if present, else a phone number.
pub fn extract_contact(text: &str) -> Option<String> {
    extract_email(text).or_else(|| extract_phone(text))
}

/// First contact found across several text fragments, in order.
pub fn extract_contact_from<'a>(sources: impl IntoIterator<Item = &'a str>) -> Option<String> {
    sources.into_iter().find_map(extract_contact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_email_over_phone() {
        let text = "Bel 020 123 4567 of mail info@paradiso.nl";
        assert_eq!(extract_contact(text), Some("info@paradiso.nl".to_string()));
    }

    #[test]
    fn finds_dutch_phone_numbers() {
        assert_eq!(extract_phone("tel: +31 20 123 4567"), Some("+31201234567".to_string()));
        assert_eq!(extract_phone("tel: 0612345678"), Some("0612345678".to_string()));
        assert_eq!(extract_phone("no digits here"), None);
    }

    #[test]
    fn scans_sources_in_order() {
        let found = extract_contact_from(["geen contact", "tickets@dancevalley.nl", "info@other.nl"]);
        assert_eq!(found, Some("tickets@dancevalley.nl".to_string()));
        assert_eq!(extract_contact_from(["", "nothing"]), None);
    }
}

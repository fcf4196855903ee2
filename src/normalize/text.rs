//! Free-text cleanup shared by the canonicalizer and the source adapters.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

const ENTITIES: [(&str, &str); 6] = [
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&nbsp;", " "),
    // last, so "&amp;lt;" decodes to "&lt;" and not "<"
    ("&amp;", "&"),
];

/// Decode the handful of HTML entities listing pages commonly leak into text.
pub fn decode_entities(text: &str) -> String {
    let mut out = text.to_string();
    for (entity, replacement) in ENTITIES {
        if out.contains(entity) {
            out = out.replace(entity, replacement);
        }
    }
    out
}

/// Decode entities, trim, and collapse runs of whitespace/newlines to one space.
pub fn normalize_text(text: &str) -> String {
    let decoded = decode_entities(text);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Normalize an optional field, treating blank text as absent.
pub fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(normalize_text).filter(|s| !s.is_empty())
}

/// Host of a URL without scheme and without a leading `www.`.
pub fn extract_domain(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let host = match Url::parse(trimmed) {
        Ok(parsed) => parsed.host_str()?.to_string(),
        // Bare "www.example.nl/path" without a scheme
        Err(_) => trimmed.split('/').next()?.to_string(),
    };
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_newlines() {
        assert_eq!(normalize_text("  Dance \n\n Valley\t 2025  "), "Dance Valley 2025");
    }

    #[test]
    fn decodes_common_entities() {
        assert_eq!(
            normalize_text("Rock&nbsp;&amp;&nbsp;Roll &quot;Live&quot; &#39;25 &lt;NL&gt;"),
            "Rock & Roll \"Live\" '25 <NL>"
        );
    }

    #[test]
    fn amp_is_decoded_once() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn blank_optional_is_absent() {
        assert_eq!(non_empty(Some("  \n ")), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(" Paradiso ")), Some("Paradiso".to_string()));
    }

    #[test]
    fn domain_strips_scheme_and_www() {
        assert_eq!(
            extract_domain("https://www.festivalinfo.nl/agenda?page=2"),
            Some("festivalinfo.nl".to_string())
        );
        assert_eq!(extract_domain("http://partyflock.nl"), Some("partyflock.nl".to_string()));
        assert_eq!(extract_domain("www.uitagenda.nl/events"), Some("uitagenda.nl".to_string()));
        assert_eq!(extract_domain("   "), None);
    }
}

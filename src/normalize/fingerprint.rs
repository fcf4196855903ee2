use crate::constants::{FINGERPRINT_DELIMITER, FINGERPRINT_HEX_LEN};
use sha2::{Digest, Sha256};

/// Content fingerprint of an event.
///
/// Only name, date and location take part, so the same event reported by two
/// sources collapses to one key. Name and location are lower-cased with the
/// locale-independent Unicode mapping; all three are trimmed.
pub fn compute_fingerprint(name: &str, date: &str, location: &str) -> String {
    let mut s = String::with_capacity(name.len() + date.len() + location.len() + 2);
    s.push_str(&name.trim().to_lowercase());
    s.push(FINGERPRINT_DELIMITER);
    s.push_str(date.trim());
    s.push(FINGERPRINT_DELIMITER);
    s.push_str(&location.trim().to_lowercase());

    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let out = hasher.finalize();
    let mut key = hex::encode(out);
    key.truncate(FINGERPRINT_HEX_LEN);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic_and_fixed_length() {
        let a = compute_fingerprint("Same Festival", "2025-12-01", "Amsterdam");
        let b = compute_fingerprint("Same Festival", "2025-12-01", "Amsterdam");
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_HEX_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ignores_case_and_surrounding_whitespace() {
        assert_eq!(
            compute_fingerprint("  SAME festival ", "2025-12-01 ", " amsterdam"),
            compute_fingerprint("Same Festival", "2025-12-01", "Amsterdam")
        );
    }

    #[test]
    fn known_digest_prefix() {
        // sha256("same festival|2025-12-01|amsterdam"), truncated
        let expected = {
            let digest = Sha256::digest(b"same festival|2025-12-01|amsterdam");
            hex::encode(digest)[..FINGERPRINT_HEX_LEN].to_string()
        };
        assert_eq!(compute_fingerprint("Same Festival", "2025-12-01", "Amsterdam"), expected);
    }

    #[test]
    fn every_field_matters() {
        let base = compute_fingerprint("Same Festival", "2025-12-01", "Amsterdam");
        assert_ne!(base, compute_fingerprint("Different Festival", "2025-12-01", "Amsterdam"));
        assert_ne!(base, compute_fingerprint("Same Festival", "2025-12-02", "Amsterdam"));
        assert_ne!(base, compute_fingerprint("Same Festival", "2025-12-01", "Utrecht"));
    }

    #[test]
    fn delimiter_keeps_fields_apart() {
        assert_ne!(
            compute_fingerprint("ab", "2025-12-01", "c"),
            compute_fingerprint("a", "2025-12-01", "bc")
        );
    }
}

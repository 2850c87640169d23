//! Identifier validation and normalization.
//!
//! Pure functions, no I/O: GTIN (the UPC/EAN barcode family identifying a
//! release) check-digit validation, ISRC (recording identifier) format
//! validation, and the diacritic-insensitive string normalization used for
//! fuzzy matching and merge deduplication.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strip the separators commonly found in printed identifiers.
fn strip_separators(code: &str) -> String {
    code.chars().filter(|c| !matches!(c, ' ' | '-')).collect()
}

/// Validate a GTIN-8/12/13/14 digit string, including its check digit.
///
/// The check digit is verified by weighting digits alternately x3 and x1
/// moving leftward from the digit next to the check digit, summing, and
/// comparing `(10 - (sum mod 10)) mod 10` against the final digit.
/// Non-numeric input or a disallowed length is invalid; separators are not
/// accepted here (run the input through [`normalize_gtin`] first).
pub fn is_valid_gtin(code: &str) -> bool {
    if !matches!(code.len(), 8 | 12 | 13 | 14) {
        return false;
    }
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = code.bytes().map(|b| u32::from(b - b'0')).collect();
    let check = digits[digits.len() - 1];
    let sum: u32 = digits[..digits.len() - 1]
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| d * if i % 2 == 0 { 3 } else { 1 })
        .sum();

    (10 - (sum % 10)) % 10 == check
}

/// Normalize a GTIN: strip spaces and dashes, left-pad with `0` to 14 digits.
///
/// Padding to GTIN-14 never invalidates the check digit because leading
/// zeroes contribute nothing to the weighted sum.
pub fn normalize_gtin(code: &str) -> String {
    let stripped = strip_separators(code);
    if stripped.len() >= 14 {
        return stripped;
    }
    format!("{stripped:0>14}")
}

/// Strip separators, validate, and normalize a GTIN to its 14-digit form.
///
/// Validation runs on the stripped input, before padding: left-padding with
/// zeroes preserves the check digit, so a padded-first check would accept
/// codes of any length up to 14. Returns `None` for invalid input.
pub fn canonical_gtin(code: &str) -> Option<String> {
    let stripped = strip_separators(code);
    if !is_valid_gtin(&stripped) {
        return None;
    }
    Some(normalize_gtin(&stripped))
}

/// Validate an ISRC, ignoring separators and case.
///
/// A valid ISRC is 2 letters (country), 3 alphanumerics (registrant),
/// 2 digits (year) and 5 digits (designation) -- 12 characters total.
pub fn is_valid_isrc(code: &str) -> bool {
    let code = normalize_isrc(code);
    let bytes = code.as_bytes();
    if bytes.len() != 12 {
        return false;
    }
    bytes[..2].iter().all(u8::is_ascii_alphabetic)
        && bytes[2..5].iter().all(u8::is_ascii_alphanumeric)
        && bytes[5..].iter().all(u8::is_ascii_digit)
}

/// Normalize an ISRC: strip separators, uppercase.
pub fn normalize_isrc(code: &str) -> String {
    strip_separators(code).to_uppercase()
}

/// Normalize free text into a fuzzy-match key.
///
/// Lowercases, decomposes and strips diacritical marks, removes characters
/// outside letters/digits/whitespace, and collapses whitespace runs to a
/// single space. The result is a comparison key, not a dedupe key by itself.
pub fn normalize_string(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gtin_valid_lengths() {
        // Known-good EAN-8, UPC-A, EAN-13 and GTIN-14 codes.
        assert!(is_valid_gtin("96385074"));
        assert!(is_valid_gtin("036000291452"));
        assert!(is_valid_gtin("4006381333931"));
        assert!(is_valid_gtin("00036000291452"));
    }

    #[test]
    fn gtin_flipped_digit_fails() {
        assert!(!is_valid_gtin("036000291453"));
        assert!(!is_valid_gtin("136000291452"));
        assert!(!is_valid_gtin("4006381333932"));
    }

    #[test]
    fn gtin_rejects_bad_input() {
        assert!(!is_valid_gtin(""));
        assert!(!is_valid_gtin("1234567"));
        assert!(!is_valid_gtin("123456789"));
        assert!(!is_valid_gtin("03600029145a"));
        assert!(!is_valid_gtin("036-00029145"));
    }

    #[test]
    fn gtin_normalization_pads_and_strips() {
        assert_eq!(normalize_gtin("602-445-790920"), "00602445790920");
        assert_eq!(normalize_gtin("96385074"), "00000096385074");
        assert_eq!(normalize_gtin("00036000291452"), "00036000291452");
    }

    #[test]
    fn canonical_gtin_enforces_length_before_padding() {
        assert_eq!(
            canonical_gtin("602-445-790920").as_deref(),
            Some("00602445790920")
        );
        assert_eq!(canonical_gtin("96385074").as_deref(), Some("00000096385074"));
        // 9 digits carries a consistent check digit but is not a GTIN length;
        // padding first would have let it through.
        assert_eq!(canonical_gtin("096385074"), None);
        assert_eq!(canonical_gtin("036000291453"), None);
        assert_eq!(canonical_gtin(""), None);
    }

    #[test]
    fn isrc_validation() {
        assert!(is_valid_isrc("US-RC1-76-07839"));
        assert!(is_valid_isrc("USRC17607839"));
        assert!(is_valid_isrc("usrc17607839"));
        // 11 characters.
        assert!(!is_valid_isrc("USRC1760783"));
        // Country code must be letters.
        assert!(!is_valid_isrc("12RC17607839"));
        // Year and designation must be digits.
        assert!(!is_valid_isrc("USRC1760783X"));
        assert!(!is_valid_isrc(""));
    }

    #[test]
    fn isrc_normalization() {
        assert_eq!(normalize_isrc("us-rc1-76-07839"), "USRC17607839");
        assert_eq!(normalize_isrc("USRC17607839"), "USRC17607839");
    }

    #[test]
    fn string_normalization() {
        assert_eq!(normalize_string("Björk, Café!"), "bjork cafe");
        assert_eq!(normalize_string("Motörhead"), "motorhead");
        assert_eq!(normalize_string("  Sigur   Rós  "), "sigur ros");
        assert_eq!(normalize_string("R.E.M."), "rem");
        assert_eq!(normalize_string(""), "");
    }
}

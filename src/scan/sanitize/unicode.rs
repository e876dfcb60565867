//! Pure Unicode normalization helpers, and the `UnicodeSanitizer` scanner.
//!
//! Grounded on the teacher's `input::normalization` module: NFKC via
//! `unicode-normalization`, a fast already-normalized check, and a
//! `Cow`-based zero-allocation strip path when nothing changes.

use std::borrow::Cow;
use unicode_normalization::{is_nfkc_quick, IsNormalized, UnicodeNormalization};

/// Zero-width space range, BOM, soft hyphen, word joiner (spec §4.3).
fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}')
}

/// Bidi control and isolate characters (spec §4.3).
fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}')
}

/// Counts of what [`strip_invisible_and_bidi`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripCounts {
    /// Number of invisible characters removed.
    pub invisible: usize,
    /// Number of bidi control/isolate characters removed.
    pub bidi: usize,
}

/// Strip invisible and bidi-control characters, returning a borrowed `Cow`
/// when nothing matched (no allocation on the common path).
#[must_use]
pub fn strip_invisible_and_bidi(s: &str) -> (Cow<'_, str>, StripCounts) {
    if !s.chars().any(|c| is_invisible(c) || is_bidi_control(c)) {
        return (Cow::Borrowed(s), StripCounts::default());
    }
    let mut counts = StripCounts::default();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if is_invisible(c) {
            counts.invisible += 1;
        } else if is_bidi_control(c) {
            counts.bidi += 1;
        } else {
            out.push(c);
        }
    }
    (Cow::Owned(out), counts)
}

/// NFKC-normalize, with a fast path when the string is already normalized.
#[must_use]
pub fn normalize_nfkc(s: &str) -> Cow<'_, str> {
    if is_nfkc_quick(s.chars()) == IsNormalized::Yes {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.nfkc().collect())
}

/// Apply NFKC then invisible/bidi stripping, the default baseline used to
/// seed the `sanitized` view before any explicit sanitizer scanner runs
/// (spec §4.1(e)).
#[must_use]
pub fn default_sanitize(raw: &str) -> (String, StripCounts) {
    let nfkc = normalize_nfkc(raw);
    let (stripped, counts) = strip_invisible_and_bidi(&nfkc);
    (stripped.into_owned(), counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_zero_width_space() {
        let (out, counts) = strip_invisible_and_bidi("a\u{200B}b");
        assert_eq!(out, "ab");
        assert_eq!(counts.invisible, 1);
    }

    #[test]
    fn strips_bidi_controls() {
        let (out, counts) = strip_invisible_and_bidi("a\u{202E}b");
        assert_eq!(out, "ab");
        assert_eq!(counts.bidi, 1);
    }

    #[test]
    fn leaves_plain_text_borrowed() {
        let (out, counts) = strip_invisible_and_bidi("plain text");
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(counts, StripCounts::default());
    }

    #[test]
    fn nfkc_normalizes_ligature() {
        // U+FB01 LATIN SMALL LIGATURE FI -> "fi"
        let out = normalize_nfkc("\u{FB01}le");
        assert_eq!(out, "file");
    }
}

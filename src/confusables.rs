//! UTS#39 confusables table parsing and skeleton computation (spec §4.4,
//! §6.4).

use std::collections::HashMap;
use std::sync::LazyLock;

/// The packaged default confusables asset (spec §11.4 of SPEC_FULL.md — a
/// curated subset of the upstream `confusables.txt`, embedded so the crate
/// works with zero configuration; swap in the full upstream table at the
/// configured path without a code change).
static DEFAULT_TABLE: LazyLock<ConfusablesTable> =
    LazyLock::new(|| ConfusablesTable::parse(include_str!("../assets/confusables.txt")));

/// Borrow the packaged default confusables table.
#[must_use]
pub fn default_table() -> &'static ConfusablesTable {
    &DEFAULT_TABLE
}

/// A loaded confusables mapping: source code-point sequence → destination
/// sequence, indexed by the first code point of the source sequence for
/// fast longest-match lookup.
#[derive(Debug, Clone, Default)]
pub struct ConfusablesTable {
    /// Version string from the `# Version: X.Y.Z` header line, if present.
    pub version: Option<String>,
    /// Entries keyed by their first source code point; each bucket is
    /// sorted by descending source-sequence length so the first matching
    /// entry found is the longest match.
    entries: HashMap<char, Vec<(Vec<char>, String)>>,
    /// Longest source sequence length across the whole table, bounding how
    /// far [`ConfusablesTable::skeletonize`] needs to look ahead at each
    /// position.
    max_src_len: usize,
}

impl ConfusablesTable {
    /// Parse a `confusables.txt`-format document (spec §6.4).
    ///
    /// `#`-prefixed comments and the header are handled; malformed body
    /// lines are skipped silently, per spec.
    #[must_use]
    pub fn parse(text: &str) -> ConfusablesTable {
        let mut table = ConfusablesTable::default();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix('#') {
                if let Some(v) = rest.trim().strip_prefix("Version:") {
                    table.version = Some(v.trim().to_string());
                }
                continue;
            }
            table.ingest_line(trimmed);
        }
        table
    }

    fn ingest_line(&mut self, line: &str) {
        // Body line: "<src-hex-seq> ; <dst-hex-seq> ; <type> # comment"
        let without_comment = line.split('#').next().unwrap_or(line);
        let parts: Vec<&str> = without_comment.split(';').collect();
        if parts.len() < 2 {
            return;
        }
        let Some(src) = parse_hex_sequence(parts[0]) else {
            return;
        };
        let Some(dst_codepoints) = parse_hex_sequence(parts[1]) else {
            return;
        };
        if src.is_empty() {
            return;
        }
        let dst: String = dst_codepoints.into_iter().collect();
        self.max_src_len = self.max_src_len.max(src.len());
        let bucket = self.entries.entry(src[0]).or_default();
        bucket.push((src, dst));
        bucket.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Compute the UTS#39 confusable skeleton of `s`: NFKC, then scan
    /// left-to-right, at each position trying the longest window up to
    /// `max_src_len` that matches a mapping key, substituting the mapped
    /// sequence; if no window matches, the code point is copied verbatim
    /// (spec §4.4).
    #[must_use]
    pub fn skeletonize(&self, s: &str) -> String {
        let nfkc = crate::scan::sanitize::unicode::normalize_nfkc(s);
        let chars: Vec<char> = nfkc.chars().collect();
        let mut out = String::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            let Some(bucket) = self.entries.get(&chars[i]) else {
                out.push(chars[i]);
                i += 1;
                continue;
            };
            let remaining = chars.len() - i;
            let max_len = self.max_src_len.min(remaining);
            let mut matched = None;
            for (src, dst) in bucket {
                if src.len() <= max_len && chars[i..i + src.len()] == src[..] {
                    matched = Some((src.len(), dst));
                    break;
                }
            }
            match matched {
                Some((len, dst)) => {
                    out.push_str(dst);
                    i += len;
                }
                None => {
                    out.push(chars[i]);
                    i += 1;
                }
            }
        }
        out
    }
}

fn parse_hex_sequence(field: &str) -> Option<Vec<char>> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    let mut out = Vec::new();
    for token in field.split_whitespace() {
        let cp = u32::from_str_radix(token, 16).ok()?;
        out.push(char::from_u32(cp)?);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Confusables table
# Version: 16.0.0
0041 ; 0041 ; MA # (A) LATIN CAPITAL LETTER A
0410 ; 0041 ; MA # (А) CYRILLIC CAPITAL LETTER A
043E ; 006F ; MA # (о) CYRILLIC SMALL LETTER O
0063 006C ; 0064 ; MA # (cl) -> d
";

    #[test]
    fn parses_version() {
        let table = ConfusablesTable::parse(SAMPLE);
        assert_eq!(table.version.as_deref(), Some("16.0.0"));
    }

    #[test]
    fn single_codepoint_substitution() {
        let table = ConfusablesTable::parse(SAMPLE);
        // Cyrillic А (0410) maps to Latin A.
        let skeleton = table.skeletonize("\u{0410}BC");
        assert_eq!(skeleton, "ABC");
    }

    #[test]
    fn longest_match_preferred() {
        let table = ConfusablesTable::parse(SAMPLE);
        // "cl" (two source code points) should map to "d", not leave "cl".
        let skeleton = table.skeletonize("clear");
        assert!(skeleton.starts_with('d'));
    }

    #[test]
    fn unmapped_codepoints_pass_through() {
        let table = ConfusablesTable::parse(SAMPLE);
        assert_eq!(table.skeletonize("xyz"), "xyz");
    }

    #[test]
    fn malformed_lines_skipped_silently() {
        let text = "garbage line with no semicolons\n0041 ; 0041 ; MA\n";
        let table = ConfusablesTable::parse(text);
        assert_eq!(table.skeletonize("A"), "A");
    }
}

//! The four-view text surface (spec §3.3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four parallel textual representations of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// Verbatim input.
    Raw,
    /// Invisible/bidi-stripped, NFKC-normalized.
    Sanitized,
    /// Sanitized plus hidden-TAG ASCII revealed inline.
    Revealed,
    /// UTS#39 confusable skeleton of `revealed`.
    Skeleton,
}

impl View {
    /// All four views, in probe order (`raw, sanitized, revealed, skeleton`).
    pub const ALL: [View; 4] = [View::Raw, View::Sanitized, View::Revealed, View::Skeleton];

    /// Preference rank used to pick a finding's `target.view` when a rule
    /// matched more than one view: higher is preferred (spec §4.6).
    #[must_use]
    pub fn preference_rank(self) -> u8 {
        match self {
            View::Revealed => 3,
            View::Skeleton => 2,
            View::Sanitized => 1,
            View::Raw => 0,
        }
    }

    /// The most-preferred view among a non-empty set of matched views.
    ///
    /// Returns `None` for an empty slice.
    #[must_use]
    pub fn most_preferred(matched: &[View]) -> Option<View> {
        matched.iter().copied().max_by_key(|v| v.preference_rank())
    }

    /// Parse from the lowercase wire string.
    #[must_use]
    pub fn parse(s: &str) -> Option<View> {
        match s {
            "raw" => Some(View::Raw),
            "sanitized" => Some(View::Sanitized),
            "revealed" => Some(View::Revealed),
            "skeleton" => Some(View::Skeleton),
            _ => None,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            View::Raw => "raw",
            View::Sanitized => "sanitized",
            View::Revealed => "revealed",
            View::Skeleton => "skeleton",
        };
        f.write_str(s)
    }
}

/// Where a textual surface originated, used both as `target.source` on
/// findings and `promptChunksCanonical[].source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The user's own prompt (chunk 0).
    User,
    /// A retrieval-augmented-generation chunk.
    Retrieval,
    /// A tool call or tool result.
    Tool,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Source::User => "user",
            Source::Retrieval => "retrieval",
            Source::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// The four parallel strings for one textual surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextViewSet {
    /// Verbatim input.
    pub raw: String,
    /// Sanitized form, if computed.
    pub sanitized: Option<String>,
    /// Revealed form, if computed.
    pub revealed: Option<String>,
    /// Skeleton form, if computed.
    pub skeleton: Option<String>,
}

impl TextViewSet {
    /// Construct a view set with only `raw` populated; other views are
    /// filled in by the normalizer's default transforms or by sanitizer
    /// scanners.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            sanitized: None,
            revealed: None,
            skeleton: None,
        }
    }

    /// Fetch a view by its enum tag.
    #[must_use]
    pub fn get(&self, view: View) -> Option<&str> {
        match view {
            View::Raw => Some(self.raw.as_str()),
            View::Sanitized => self.sanitized.as_deref(),
            View::Revealed => self.revealed.as_deref(),
            View::Skeleton => self.skeleton.as_deref(),
        }
    }

    /// Set a view by its enum tag.
    pub fn set(&mut self, view: View, value: String) {
        match view {
            View::Raw => self.raw = value,
            View::Sanitized => self.sanitized = Some(value),
            View::Revealed => self.revealed = Some(value),
            View::Skeleton => self.skeleton = Some(value),
        }
    }

    /// `true` once all four views are populated (the view-closure invariant,
    /// spec §8 invariant 2).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sanitized.is_some() && self.revealed.is_some() && self.skeleton.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_order_matches_spec() {
        assert!(View::Revealed.preference_rank() > View::Skeleton.preference_rank());
        assert!(View::Skeleton.preference_rank() > View::Sanitized.preference_rank());
        assert!(View::Sanitized.preference_rank() > View::Raw.preference_rank());
    }

    #[test]
    fn most_preferred_picks_revealed_over_raw() {
        let matched = vec![View::Raw, View::Revealed, View::Skeleton];
        assert_eq!(View::most_preferred(&matched), Some(View::Revealed));
    }

    #[test]
    fn view_set_closure() {
        let mut vs = TextViewSet::from_raw("hello");
        assert!(!vs.is_closed());
        vs.set(View::Sanitized, "hello".into());
        vs.set(View::Revealed, "hello".into());
        vs.set(View::Skeleton, "hello".into());
        assert!(vs.is_closed());
    }
}

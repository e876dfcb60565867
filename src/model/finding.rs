//! `Finding` — a single piece of evidence emitted by a scanner (spec §3.4).

use crate::model::views::{Source, View};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The three kinds of scanner output that carry a `Finding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    /// Emitted by a sanitizer describing what it changed.
    Sanitize,
    /// Emitted by an enricher (in practice, the skeleton enricher emits none).
    Enrich,
    /// Emitted by a detector.
    Detect,
}

/// Risk level, ordered `None < Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// No risk signal.
    None,
    /// Low risk.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
    /// Critical risk.
    Critical,
}

impl RiskLevel {
    /// `true` for `High` and `Critical` — the only two levels `failFastRisk`
    /// may name (spec §4.2, §9 open question (b)).
    #[must_use]
    pub fn meets_fail_fast_threshold(self, threshold: RiskLevel) -> bool {
        // failFastRisk only ever takes `high` or `critical`; `medium` never
        // trips fail-fast (spec §9 open question (b)).
        if threshold < RiskLevel::High {
            return false;
        }
        self >= threshold
    }
}

/// The location of a finding: which surface, which view, which source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Which textual field the finding concerns.
    pub field: FieldKind,
    /// Which of the four views the finding is anchored to.
    pub view: View,
    /// For `promptChunk` fields, which kind of chunk this was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// For `promptChunk` fields, the stable chunk index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
}

impl Target {
    /// Build a target for the top-level user prompt surface.
    #[must_use]
    pub fn prompt(view: View) -> Self {
        Self {
            field: FieldKind::Prompt,
            view,
            source: None,
            chunk_index: None,
        }
    }

    /// Build a target for a retrieval or tool chunk.
    #[must_use]
    pub fn chunk(view: View, source: Source, chunk_index: usize) -> Self {
        Self {
            field: FieldKind::PromptChunk,
            view,
            source: Some(source),
            chunk_index: Some(chunk_index),
        }
    }

    /// Build a target for the response.
    #[must_use]
    pub fn response(view: View) -> Self {
        Self {
            field: FieldKind::Response,
            view,
            source: None,
            chunk_index: None,
        }
    }
}

/// Which textual field a [`Target`] concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    /// The top-level user prompt.
    Prompt,
    /// A prompt chunk: the user prompt itself (chunk 0) or a retrieval/tool
    /// chunk.
    PromptChunk,
    /// The model's response.
    Response,
}

/// A single piece of evidence emitted by a scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable id derived from `(scanner, requestId, localKey)`.
    pub id: String,
    /// Which kind of scanner stage produced this.
    pub kind: FindingKind,
    /// Name of the emitting scanner.
    pub scanner: String,
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Risk classification.
    pub risk: RiskLevel,
    /// Unordered tag set (kept sorted for determinism).
    pub tags: Vec<String>,
    /// Human-readable one-line cause.
    pub summary: String,
    /// Location of the finding.
    pub target: Target,
    /// Open string-keyed evidence map (`ruleId`, `category`, `matchedViews`,
    /// `snippet`, scanner-specific counters, ...).
    pub evidence: BTreeMap<String, String>,
    /// When `true`, a sanitize/enrich finding may surface in policy reasons
    /// even though it never drives the action (spec §4.8 step 5).
    #[serde(default)]
    pub surface: bool,
}

impl Finding {
    /// Derive the stable finding id from `(scanner, requestId, localKey)`.
    ///
    /// Uses sha256 truncated to 16 hex characters — short enough to be
    /// ergonomic in logs, long enough that collisions are not a practical
    /// concern for a single audit's finding stream.
    #[must_use]
    pub fn derive_id(scanner: &str, request_id: &str, local_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(scanner.as_bytes());
        hasher.update([0u8]);
        hasher.update(request_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(local_key.as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(16);
        for byte in digest.iter().take(8) {
            hex.push_str(&format!("{byte:02x}"));
        }
        hex
    }

    /// Builder for a detector finding with score clamped into `[0, 1]`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn detect(
        scanner: impl Into<String>,
        request_id: &str,
        local_key: &str,
        risk: RiskLevel,
        score: f64,
        summary: impl Into<String>,
        target: Target,
        evidence: BTreeMap<String, String>,
    ) -> Self {
        let scanner = scanner.into();
        Self {
            id: Self::derive_id(&scanner, request_id, local_key),
            kind: FindingKind::Detect,
            scanner,
            score: score.clamp(0.0, 1.0),
            risk,
            tags: Vec::new(),
            summary: summary.into(),
            target,
            evidence,
            surface: false,
        }
    }

    /// Builder for a sanitizer finding (always `kind: sanitize`, `risk: low`
    /// unless overridden).
    #[must_use]
    pub fn sanitize(
        scanner: impl Into<String>,
        request_id: &str,
        local_key: &str,
        summary: impl Into<String>,
        target: Target,
        evidence: BTreeMap<String, String>,
    ) -> Self {
        let scanner = scanner.into();
        Self {
            id: Self::derive_id(&scanner, request_id, local_key),
            kind: FindingKind::Sanitize,
            scanner,
            score: 0.0,
            risk: RiskLevel::Low,
            tags: Vec::new(),
            summary: summary.into(),
            target,
            evidence,
            surface: false,
        }
    }

    /// Attach tags, keeping them sorted for deterministic output.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self.tags.sort();
        self
    }

    /// Mark this finding as eligible to surface in policy reasons even
    /// though it does not itself drive the policy action.
    #[must_use]
    pub fn surfaced(mut self) -> Self {
        self.surface = true;
        self
    }
}

//! Sanitizer scanners (spec §4.3): read `raw`, compute modified
//! `sanitized`/`revealed`, and optionally emit a low-risk finding
//! describing what changed.
//!
//! Canonical chain order (not enforced by the runner — a caller
//! configuration responsibility per spec §4.3): `UnicodeSanitizer` →
//! `HiddenAsciiTags` → `SeparatorCollapse` → enrichers → detectors.

pub mod hidden_ascii;
pub mod separator;
pub mod tool_args;
pub mod unicode;

use crate::canonical::canonicalize;
use crate::error::ScannerError;
use crate::model::finding::Target;
use crate::model::{Finding, NormalizedInput};
use crate::scan::surface::{physical_surfaces, view_set, view_set_mut};
use crate::scan::{ScanContext, ScanKind, ScanOutput, Scanner};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// NFKC-normalizes and strips invisible/bidi characters from `sanitized`.
pub struct UnicodeSanitizer;

#[async_trait]
impl Scanner for UnicodeSanitizer {
    fn name(&self) -> &str {
        "unicode_sanitizer"
    }

    fn kind(&self) -> ScanKind {
        ScanKind::Sanitize
    }

    async fn run(&self, input: &NormalizedInput, _ctx: &ScanContext) -> Result<ScanOutput, ScannerError> {
        let mut next = input.clone();
        let mut findings = Vec::new();

        for s in physical_surfaces(input) {
            let Some(raw) = view_set(input, s).map(|vs| vs.raw.clone()) else {
                continue;
            };
            let (sanitized, counts) = unicode::default_sanitize(&raw);
            let changed = sanitized != raw || counts.invisible > 0 || counts.bidi > 0;
            if !changed {
                continue;
            }
            if let Some(vs) = view_set_mut(&mut next, s) {
                vs.sanitized = Some(sanitized.clone());
                vs.revealed = None;
                vs.skeleton = None;
            }

            let mut evidence = BTreeMap::new();
            evidence.insert("removedInvisibleCount".to_string(), counts.invisible.to_string());
            evidence.insert("removedBidiCount".to_string(), counts.bidi.to_string());
            evidence.insert("nfkcApplied".to_string(), "true".to_string());

            let local_key = format!("{:?}@{}", s.target(crate::model::views::View::Sanitized), raw.len());
            findings.push(Finding::sanitize(
                self.name(),
                &input.request_id,
                &local_key,
                "normalized Unicode and stripped invisible/bidi characters",
                s.target(crate::model::views::View::Sanitized),
                evidence,
            ));
        }

        Ok(ScanOutput::transformed(next).with_findings(findings))
    }
}

/// Reveals Unicode-TAG-encoded hidden ASCII inline, and strips the TAG range
/// from `sanitized`.
pub struct HiddenAsciiTags;

#[async_trait]
impl Scanner for HiddenAsciiTags {
    fn name(&self) -> &str {
        "hidden_ascii_tags"
    }

    fn kind(&self) -> ScanKind {
        ScanKind::Sanitize
    }

    async fn run(&self, input: &NormalizedInput, _ctx: &ScanContext) -> Result<ScanOutput, ScannerError> {
        let mut next = input.clone();
        let mut findings = Vec::new();

        for s in physical_surfaces(input) {
            let Some(vs) = view_set(input, s) else { continue };
            let base = vs.sanitized.clone().unwrap_or_else(|| vs.raw.clone());
            let (stripped, strip_stats) = hidden_ascii::strip_tag_chars(&base);
            let (revealed, _) = hidden_ascii::reveal_tag_chars(&base);

            if strip_stats.count == 0 {
                continue;
            }

            if let Some(vs_mut) = view_set_mut(&mut next, s) {
                vs_mut.sanitized = Some(stripped);
                vs_mut.revealed = Some(revealed);
                vs_mut.skeleton = None;
            }

            let mut evidence = BTreeMap::new();
            evidence.insert("hiddenTagCount".to_string(), strip_stats.count.to_string());

            let local_key = format!("{:?}@{}", s.target(crate::model::views::View::Revealed), base.len());
            findings.push(Finding::sanitize(
                self.name(),
                &input.request_id,
                &local_key,
                "revealed hidden Unicode-TAG ASCII payload",
                s.target(crate::model::views::View::Revealed),
                evidence,
            ));
        }

        Ok(ScanOutput::transformed(next).with_findings(findings))
    }
}

/// Collapses separator-obfuscated short tokens (`h.t.t.p`, `i|g|n|o|r|e`) in
/// `sanitized`.
pub struct SeparatorCollapse;

#[async_trait]
impl Scanner for SeparatorCollapse {
    fn name(&self) -> &str {
        "separator_collapse"
    }

    fn kind(&self) -> ScanKind {
        ScanKind::Sanitize
    }

    async fn run(&self, input: &NormalizedInput, _ctx: &ScanContext) -> Result<ScanOutput, ScannerError> {
        let mut next = input.clone();
        let mut findings = Vec::new();

        for s in physical_surfaces(input) {
            let Some(vs) = view_set(input, s) else { continue };
            let base = vs.sanitized.clone().unwrap_or_else(|| vs.raw.clone());
            let (collapsed, count) = separator::collapse_separators(&base);
            if count == 0 {
                continue;
            }

            if let Some(vs_mut) = view_set_mut(&mut next, s) {
                vs_mut.sanitized = Some(collapsed);
                vs_mut.revealed = None;
                vs_mut.skeleton = None;
            }

            let mut evidence = BTreeMap::new();
            evidence.insert("collapsedRunCount".to_string(), count.to_string());

            let local_key = format!("{:?}@{}", s.target(crate::model::views::View::Sanitized), base.len());
            findings.push(Finding::sanitize(
                self.name(),
                &input.request_id,
                &local_key,
                "collapsed separator-obfuscated token runs",
                s.target(crate::model::views::View::Sanitized),
                evidence,
            ));
        }

        Ok(ScanOutput::transformed(next).with_findings(findings))
    }
}

/// Normalizes every string leaf in the raw tool-call argument trees,
/// updating `canonical.toolCallsJson` if anything changed.
pub struct ToolArgsCanonicalizer {
    node_budget: usize,
}

impl Default for ToolArgsCanonicalizer {
    fn default() -> Self {
        Self {
            node_budget: tool_args::DEFAULT_NODE_BUDGET,
        }
    }
}

impl ToolArgsCanonicalizer {
    /// Build a canonicalizer with a custom node-visitation budget.
    #[must_use]
    pub fn with_budget(node_budget: usize) -> Self {
        Self { node_budget }
    }
}

#[async_trait]
impl Scanner for ToolArgsCanonicalizer {
    fn name(&self) -> &str {
        "tool_args_canonicalizer"
    }

    fn kind(&self) -> ScanKind {
        ScanKind::Sanitize
    }

    async fn run(&self, input: &NormalizedInput, _ctx: &ScanContext) -> Result<ScanOutput, ScannerError> {
        if input.raw.tool_calls.is_empty() {
            return Ok(ScanOutput::unchanged());
        }

        let mut any_changed = false;
        let mut total_strings_changed = 0usize;
        let mut max_exceeded = false;
        let mut canonicalized = Vec::with_capacity(input.raw.tool_calls.len());

        for call in &input.raw.tool_calls {
            let (value, stats) = tool_args::canonicalize_value(call, self.node_budget);
            if stats.strings_changed > 0 {
                any_changed = true;
            }
            total_strings_changed += stats.strings_changed;
            max_exceeded = max_exceeded || stats.max_nodes_exceeded;
            canonicalized.push(value);
        }

        if !any_changed {
            if max_exceeded {
                tracing::warn!(scanner = self.name(), "tool-arg node budget exceeded");
            }
            return Ok(ScanOutput::unchanged());
        }

        let mut next = input.clone();
        next.canonical.tool_calls_json = canonicalize(&serde_json::Value::Array(canonicalized));

        let mut evidence = BTreeMap::new();
        evidence.insert("stringsChanged".to_string(), total_strings_changed.to_string());
        evidence.insert("maxNodesExceeded".to_string(), max_exceeded.to_string());

        let finding = Finding::sanitize(
            self.name(),
            &input.request_id,
            "tool_calls",
            "normalized Unicode in tool-call arguments",
            Target {
                field: crate::model::finding::FieldKind::PromptChunk,
                view: crate::model::views::View::Sanitized,
                source: Some(crate::model::views::Source::Tool),
                chunk_index: None,
            },
            evidence,
        );

        Ok(ScanOutput::transformed(next).with_findings(vec![finding]))
    }
}

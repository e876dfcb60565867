//! Contradiction checks (SPEC_FULL.md §11.2) — a deliberately narrow
//! heuristic: does the response deny a capability it just exercised via a
//! tool call or tool result in the same turn?
//!
//! Full contradiction detection needs semantic understanding the rest of
//! this pipeline deliberately avoids (spec.md §1 Non-goals: no ML
//! classification). This scanner only catches the literal case where the
//! denied phrase's significant words also appear in the turn's
//! tool-call/tool-result canonical text.

use crate::error::ScannerError;
use crate::model::finding::Target;
use crate::model::{Finding, NormalizedInput, RiskLevel};
use crate::scan::{ScanContext, ScanKind, ScanOutput, Scanner};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static DENIAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        build(r"\bI (?:will not|won'?t|can'?t|cannot|do not|don'?t) ([a-z0-9 ,'\-]{3,60})"),
        build(r"\bI have no access to ([a-z0-9 ,'\-]{3,60})"),
    ]
});

fn build(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("static contradiction pattern compiles")
}

/// Words shorter than this are too generic (articles, pronouns) to use as
/// contradiction evidence on their own.
const MIN_SIGNIFICANT_WORD_LEN: usize = 4;

fn significant_words(claim: &str) -> Vec<String> {
    claim
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= MIN_SIGNIFICANT_WORD_LEN)
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Flags a response denial whose claim's significant words also appear in
/// this turn's tool-call/tool-result canonical text.
pub struct ContradictionDetector;

#[async_trait]
impl Scanner for ContradictionDetector {
    fn name(&self) -> &str {
        "contradiction"
    }

    fn kind(&self) -> ScanKind {
        ScanKind::Detect
    }

    async fn run(&self, input: &NormalizedInput, _ctx: &ScanContext) -> Result<ScanOutput, ScannerError> {
        let Some(response) = input.views.response.as_ref() else {
            return Ok(ScanOutput::unchanged());
        };
        if !input.features.has_tool_calls && !input.features.has_tool_results {
            return Ok(ScanOutput::unchanged());
        }

        let haystack = format!(
            "{} {}",
            input.canonical.tool_calls_json.to_ascii_lowercase(),
            input.canonical.tool_results_json.to_ascii_lowercase()
        );

        let mut findings = Vec::new();
        for pattern in DENIAL_PATTERNS.iter() {
            let Some(caps) = pattern.captures(&response.raw) else {
                continue;
            };
            let claim = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let words = significant_words(claim);
            let matched: Vec<&str> = words
                .iter()
                .filter(|w| haystack.contains(w.as_str()))
                .map(String::as_str)
                .collect();
            if matched.is_empty() {
                continue;
            }

            let mut evidence = BTreeMap::new();
            evidence.insert("category".to_string(), "contradiction".to_string());
            evidence.insert("claim".to_string(), claim.trim().to_string());
            evidence.insert("matchedWords".to_string(), matched.join(","));

            let target = Target::response(crate::model::views::View::Raw);
            let local_key = format!("contradiction@{claim}");
            findings.push(Finding::detect(
                self.name(),
                &input.request_id,
                &local_key,
                RiskLevel::Medium,
                0.5,
                "response denies a capability exercised elsewhere in the same turn",
                target,
                evidence,
            ));
        }

        Ok(ScanOutput::unchanged().with_findings(findings))
    }
}

//! `RulePack` — the declarative document driving the rule-pack scanner
//! (spec §3.5, §6.3).

use crate::model::finding::RiskLevel;
use crate::model::views::{Source, View};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// Which surface kind a rule's `scopes` may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The top-level prompt.
    Prompt,
    /// Any chunk (user prompt as chunk 0, retrieval, or tool).
    PromptChunk,
    /// The response.
    Response,
}

impl Scope {
    fn parse(s: &str) -> Option<Scope> {
        match s {
            "prompt" => Some(Scope::Prompt),
            "promptChunk" => Some(Scope::PromptChunk),
            "response" => Some(Scope::Response),
            _ => None,
        }
    }
}

/// A single compiled rule ready for matching.
///
/// Built from [`RuleDoc`] by [`RulePack::from_document`]; holds compiled
/// `Regex`es rather than pattern strings so matching never recompiles.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Stable identifier, e.g. `injection.override.ignore_previous_instructions`.
    pub id: String,
    /// Free-form category grouping.
    pub category: String,
    /// Compiled primary pattern.
    pub pattern: Regex,
    /// Compiled negative pattern, if present.
    pub negative_pattern: Option<Regex>,
    /// Risk classification.
    pub risk: RiskLevel,
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Human text for the finding summary.
    pub summary: String,
    /// Surfaces this rule applies to.
    pub scopes: Vec<Scope>,
    /// When `scopes` includes `promptChunk`, which chunk sources apply.
    pub sources: Vec<Source>,
    /// Views this rule is allowed to match against.
    pub views: Vec<View>,
}

impl Rule {
    /// Whether this rule applies to a target with the given scope/source.
    #[must_use]
    pub fn applies_to(&self, scope: Scope, source: Option<Source>) -> bool {
        if !self.scopes.contains(&scope) {
            return false;
        }
        if scope == Scope::PromptChunk {
            match source {
                Some(s) => self.sources.is_empty() || self.sources.contains(&s),
                None => self.sources.is_empty(),
            }
        } else {
            true
        }
    }
}

/// A loaded, validated rule pack: a version tag plus an ordered rule list.
#[derive(Debug, Clone, Default)]
pub struct RulePack {
    /// Pack version string.
    pub version: String,
    /// Rules in document order (preserved in the finding stream per spec §4.5).
    pub rules: Vec<Rule>,
    /// Ids of rules skipped during load, with a reason, for diagnostics.
    pub skipped: Vec<(String, String)>,
}

/// Wire shape of the rule pack document (spec §6.3).
#[derive(Debug, Deserialize)]
struct PackDoc {
    version: Option<String>,
    #[serde(default)]
    rules: Vec<RuleDoc>,
}

#[derive(Debug, Deserialize)]
struct RuleDoc {
    id: Option<String>,
    category: Option<String>,
    #[serde(rename = "patternType")]
    pattern_type: Option<String>,
    pattern: Option<String>,
    flags: Option<String>,
    #[serde(rename = "negativePattern")]
    negative_pattern: Option<String>,
    risk: Option<String>,
    score: Option<f64>,
    summary: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    views: Vec<String>,
}

impl RulePack {
    /// Parse and validate a rule-pack JSON document.
    ///
    /// Whole-document failures (`version` missing) return
    /// [`crate::error::RulePackError`]. A single malformed rule is skipped
    /// with a logged warning and recorded in `skipped`; the loader never
    /// fails for one bad rule (spec §4.5).
    pub fn from_document(json: &str) -> Result<RulePack, crate::error::RulePackError> {
        let doc: PackDoc =
            serde_json::from_str(json).map_err(|source| crate::error::RulePackError::Parse {
                path: "<document>".to_string(),
                source,
            })?;
        let version = doc.version.ok_or(crate::error::RulePackError::MissingVersion)?;

        let mut rules = Vec::with_capacity(doc.rules.len());
        let mut skipped = Vec::new();
        for (idx, raw) in doc.rules.into_iter().enumerate() {
            match compile_rule(raw) {
                Ok(rule) => rules.push(rule),
                Err(reason) => {
                    let label = format!("rules[{idx}]");
                    tracing::warn!(rule = %label, reason = %reason, "skipping malformed rule");
                    skipped.push((label, reason));
                }
            }
        }

        Ok(RulePack {
            version,
            rules,
            skipped,
        })
    }
}

fn compile_rule(raw: RuleDoc) -> Result<Rule, String> {
    let id = raw.id.filter(|s| !s.is_empty()).ok_or("missing id")?;
    let pattern_src = raw.pattern.filter(|s| !s.is_empty()).ok_or("missing pattern")?;

    if let Some(pt) = &raw.pattern_type {
        if pt != "regex" {
            return Err(format!("unsupported patternType: {pt}"));
        }
    }

    let flags = raw.flags.unwrap_or_default();
    let pattern = build_regex(&pattern_src, &flags).map_err(|e| format!("bad pattern: {e}"))?;
    let negative_pattern = match raw.negative_pattern {
        Some(ref np) if !np.is_empty() => {
            Some(build_regex(np, &flags).map_err(|e| format!("bad negativePattern: {e}"))?)
        }
        _ => None,
    };

    let risk = match raw.risk.as_deref() {
        Some("low") => RiskLevel::Low,
        Some("medium") => RiskLevel::Medium,
        Some("high") => RiskLevel::High,
        Some("critical") => RiskLevel::Critical,
        other => return Err(format!("invalid risk: {other:?}")),
    };

    let score = raw.score.ok_or("missing score")?;
    if !(0.0..=1.0).contains(&score) {
        return Err(format!("score out of range: {score}"));
    }

    let summary = raw.summary.unwrap_or_default();

    let scopes: Vec<Scope> = if raw.scopes.is_empty() {
        vec![Scope::Prompt, Scope::PromptChunk, Scope::Response]
    } else {
        raw.scopes
            .iter()
            .filter_map(|s| Scope::parse(s))
            .collect()
    };
    if scopes.is_empty() {
        return Err("no valid scopes".to_string());
    }

    let sources: Vec<Source> = raw
        .sources
        .iter()
        .filter_map(|s| match s.as_str() {
            "user" => Some(Source::User),
            "retrieval" => Some(Source::Retrieval),
            "tool" => Some(Source::Tool),
            _ => None,
        })
        .collect();

    let views: Vec<View> = if raw.views.is_empty() {
        View::ALL.to_vec()
    } else {
        raw.views.iter().filter_map(|v| View::parse(v)).collect()
    };
    if views.is_empty() {
        return Err("no valid views".to_string());
    }

    Ok(Rule {
        id,
        category: raw.category.unwrap_or_else(|| "uncategorized".to_string()),
        pattern,
        negative_pattern,
        risk,
        score,
        summary,
        scopes,
        sources,
        views,
    })
}

fn build_regex(pattern: &str, flags: &str) -> Result<Regex, regex::Error> {
    let mut builder = RegexBuilder::new(pattern);
    builder.case_insensitive(flags.contains('i'));
    builder.multi_line(flags.contains('m'));
    builder.dot_matches_new_line(flags.contains('s'));
    builder.unicode(!flags.contains('a'));
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_pack() {
        let json = r#"{
            "version": "1.0.0",
            "rules": [
                {"id": "x", "category": "c", "patternType": "regex",
                 "pattern": "ignore previous", "flags": "i",
                 "risk": "high", "score": 0.8, "summary": "s"}
            ]
        }"#;
        let pack = RulePack::from_document(json).unwrap();
        assert_eq!(pack.version, "1.0.0");
        assert_eq!(pack.rules.len(), 1);
        assert!(pack.rules[0].pattern.is_match("Ignore Previous instructions"));
    }

    #[test]
    fn skips_bad_rule_without_failing_whole_pack() {
        let json = r#"{
            "version": "1.0.0",
            "rules": [
                {"id": "", "pattern": "x", "risk": "high", "score": 0.5},
                {"id": "good", "pattern": "y", "risk": "low", "score": 0.2}
            ]
        }"#;
        let pack = RulePack::from_document(json).unwrap();
        assert_eq!(pack.rules.len(), 1);
        assert_eq!(pack.rules[0].id, "good");
        assert_eq!(pack.skipped.len(), 1);
    }

    #[test]
    fn missing_version_is_fatal() {
        let json = r#"{"rules": []}"#;
        assert!(RulePack::from_document(json).is_err());
    }

    #[test]
    fn negative_pattern_compiles() {
        let json = r#"{
            "version": "1.0.0",
            "rules": [
                {"id": "x", "pattern": "ignore previous instructions",
                 "negativePattern": "never ignore previous instructions",
                 "flags": "i", "risk": "high", "score": 0.8, "summary": "s"}
            ]
        }"#;
        let pack = RulePack::from_document(json).unwrap();
        let rule = &pack.rules[0];
        assert!(rule.pattern.is_match("ignore previous instructions"));
        assert!(rule
            .negative_pattern
            .as_ref()
            .unwrap()
            .is_match("I will never ignore previous instructions."));
    }
}

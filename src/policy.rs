//! The policy evaluator (L3, spec §4.8).
//!
//! Pure function: `evaluate_policy(findings, config) -> PolicyDecision`.
//! Never fails (spec §7 "Policy never fails; it always returns a
//! decision").

use crate::model::finding::{FieldKind, Finding, FindingKind, RiskLevel};
use crate::model::policy::{Action, PolicyDecision};
use serde::{Deserialize, Serialize};

/// Configurable knobs for [`evaluate_policy`] (spec §4.8 steps 2–3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Action a peak risk of `High` maps to. Spec default is `challenge`;
    /// configurable to `block`.
    pub high_action: Action,
    /// Action a peak risk of `Critical` maps to. Always `block` per spec,
    /// but exposed for symmetry with `high_action`.
    pub critical_action: Action,
    /// Action a peak risk of `Medium` maps to.
    pub medium_action: Action,
    /// `K` in the confidence formula: `min(1, sum(top-K detect scores) / K)`.
    pub confidence_k: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            high_action: Action::Challenge,
            critical_action: Action::Block,
            medium_action: Action::AllowWithWarning,
            confidence_k: 3,
        }
    }
}

fn action_for_risk(risk: RiskLevel, config: &PolicyConfig) -> Action {
    match risk {
        RiskLevel::Critical => config.critical_action,
        RiskLevel::High => config.high_action,
        RiskLevel::Medium => config.medium_action,
        RiskLevel::Low | RiskLevel::None => Action::Allow,
    }
}

fn field_wire(field: FieldKind) -> &'static str {
    match field {
        FieldKind::Prompt => "prompt",
        FieldKind::PromptChunk => "promptChunk",
        FieldKind::Response => "response",
    }
}

fn reason_label(finding: &Finding) -> String {
    let label = finding
        .evidence
        .get("category")
        .or_else(|| finding.evidence.get("ruleId"))
        .cloned()
        .unwrap_or_else(|| finding.scanner.clone());
    format!("{}/{}@{}", finding.scanner, label, field_wire(finding.target.field))
}

/// Aggregate a finding stream into a [`PolicyDecision]` (spec §4.8
/// "Algorithm").
#[must_use]
pub fn evaluate_policy(findings: &[Finding], config: Option<&PolicyConfig>) -> PolicyDecision {
    let default_config = PolicyConfig::default();
    let config = config.unwrap_or(&default_config);

    let detect: Vec<(usize, &Finding)> = findings
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind == FindingKind::Detect)
        .collect();

    let peak_risk = detect
        .iter()
        .map(|(_, f)| f.risk)
        .max()
        .unwrap_or(RiskLevel::None);

    let action = action_for_risk(peak_risk, config);

    let k = config.confidence_k.max(1);
    let mut scores: Vec<f64> = detect.iter().map(|(_, f)| f.score).collect();
    scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let top_k_sum: f64 = scores.iter().take(k).sum();
    let confidence = (top_k_sum / k as f64).min(1.0);

    // Stable sort by (risk desc, score desc), emission order as the tiebreak
    // (guaranteed by a stable sort over the original enumeration index).
    let mut ranked = detect;
    ranked.sort_by(|(ia, a), (ib, b)| {
        b.risk
            .cmp(&a.risk)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| ia.cmp(ib))
    });

    let mut reasons: Vec<String> = ranked.iter().map(|(_, f)| reason_label(f)).collect();

    // Sanitize/enrich findings flagged `surface: true` may also appear in
    // reasons, in emission order, after the detect-driven reasons (spec
    // §4.8 step 5).
    for finding in findings.iter().filter(|f| f.kind != FindingKind::Detect && f.surface) {
        reasons.push(reason_label(finding));
    }

    PolicyDecision {
        action,
        risk: peak_risk,
        confidence,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::finding::Target;
    use crate::model::views::View;
    use std::collections::BTreeMap;

    fn detect_finding(risk: RiskLevel, score: f64, category: &str) -> Finding {
        let mut evidence = BTreeMap::new();
        evidence.insert("category".to_string(), category.to_string());
        Finding::detect(
            "rule_pack",
            "r1",
            category,
            risk,
            score,
            "test",
            Target::prompt(View::Raw),
            evidence,
        )
    }

    #[test]
    fn no_findings_allows() {
        let decision = evaluate_policy(&[], None);
        assert_eq!(decision.action, Action::Allow);
        assert_eq!(decision.risk, RiskLevel::None);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn critical_finding_blocks() {
        let findings = vec![detect_finding(RiskLevel::Critical, 0.95, "authority_impersonation")];
        let decision = evaluate_policy(&findings, None);
        assert_eq!(decision.action, Action::Block);
        assert_eq!(decision.risk, RiskLevel::Critical);
        assert_eq!(decision.reasons, vec!["rule_pack/authority_impersonation@prompt".to_string()]);
    }

    #[test]
    fn high_finding_challenges_by_default() {
        let findings = vec![detect_finding(RiskLevel::High, 0.8, "tool_args_ssrf")];
        let decision = evaluate_policy(&findings, None);
        assert_eq!(decision.action, Action::Challenge);
    }

    #[test]
    fn high_action_configurable_to_block() {
        let config = PolicyConfig {
            high_action: Action::Block,
            ..PolicyConfig::default()
        };
        let findings = vec![detect_finding(RiskLevel::High, 0.8, "tool_args_ssrf")];
        let decision = evaluate_policy(&findings, Some(&config));
        assert_eq!(decision.action, Action::Block);
    }

    #[test]
    fn medium_finding_warns() {
        let findings = vec![detect_finding(RiskLevel::Medium, 0.5, "contradiction")];
        let decision = evaluate_policy(&findings, None);
        assert_eq!(decision.action, Action::AllowWithWarning);
    }

    #[test]
    fn confidence_is_average_of_top_k() {
        let findings = vec![
            detect_finding(RiskLevel::High, 0.9, "a"),
            detect_finding(RiskLevel::Medium, 0.6, "b"),
            detect_finding(RiskLevel::Low, 0.3, "c"),
            detect_finding(RiskLevel::Low, 0.1, "d"),
        ];
        let decision = evaluate_policy(&findings, None);
        // top 3 scores: 0.9, 0.6, 0.3 -> avg 0.6
        assert!((decision.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn reasons_sorted_by_risk_then_score() {
        let findings = vec![
            detect_finding(RiskLevel::Medium, 0.5, "medium_one"),
            detect_finding(RiskLevel::Critical, 0.9, "critical_one"),
            detect_finding(RiskLevel::High, 0.95, "high_one"),
        ];
        let decision = evaluate_policy(&findings, None);
        assert_eq!(
            decision.reasons,
            vec![
                "rule_pack/critical_one@prompt".to_string(),
                "rule_pack/high_one@prompt".to_string(),
                "rule_pack/medium_one@prompt".to_string(),
            ]
        );
    }

    #[test]
    fn sanitize_findings_never_drive_action_but_may_surface() {
        let mut sanitize = Finding::sanitize(
            "unicode_sanitizer",
            "r1",
            "k",
            "normalized",
            Target::prompt(View::Sanitized),
            BTreeMap::new(),
        )
        .surfaced();
        sanitize.evidence.insert("category".to_string(), "normalization".to_string());
        let decision = evaluate_policy(&[sanitize], None);
        assert_eq!(decision.action, Action::Allow);
        assert_eq!(decision.reasons, vec!["unicode_sanitizer/normalization@prompt".to_string()]);
    }
}

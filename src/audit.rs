//! The top-level `audit()` entry point: normalize → scan → decide → seal.
//!
//! Grounded on the teacher's `pipeline::executor::PipelineExecutor::run`
//! shape (build a chain, run it, fold the outcome), generalized here to
//! additionally evaluate policy and build an evidence package from the
//! chain's findings.

use crate::config::{AuditPolicy, FailMode};
use crate::confusables::{default_table, ConfusablesTable};
use crate::error::{AuditError, NormalizeError};
use crate::evidence::{build_evidence, EvidencePackage};
use crate::model::{AuditRequest, PolicyDecision};
use crate::normalize::normalize;
use crate::policy::evaluate_policy;
use crate::rulepack_loader::RulePackHandle;
use crate::scan::detect::{
    ContradictionDetector, KeywordInjectionScanner, PathTraversalDetector, RulePackScanner, SsrfDetector,
};
use crate::scan::enrich::SkeletonEnricher;
use crate::scan::sanitize::{HiddenAsciiTags, SeparatorCollapse, ToolArgsCanonicalizer, UnicodeSanitizer};
use crate::scan::{run_chain, ScanMode, ScanOptions, Scanner};
use std::sync::Arc;

/// The full result of one `audit()` call: the policy decision plus the
/// evidence package backing it.
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    /// The recommended action, risk, confidence, and reasons.
    pub decision: PolicyDecision,
    /// The sealed evidence package (spec §4.9).
    pub evidence: EvidencePackage,
}

/// Build the default scanner chain in spec §4.2's prescribed order:
/// sanitizers, then the skeleton enricher, then detectors.
#[must_use]
pub fn default_chain(rule_pack: RulePackHandle, confusables: Arc<ConfusablesTable>) -> Vec<Box<dyn Scanner>> {
    vec![
        Box::new(UnicodeSanitizer),
        Box::new(HiddenAsciiTags),
        Box::new(SeparatorCollapse),
        Box::new(ToolArgsCanonicalizer::default()),
        Box::new(SkeletonEnricher::new(confusables)),
        Box::new(RulePackScanner::new(rule_pack)),
        Box::new(KeywordInjectionScanner::default()),
        Box::new(SsrfDetector::default()),
        Box::new(PathTraversalDetector::default()),
        Box::new(ContradictionDetector),
    ]
}

/// Audit one turn of agent I/O against the packaged default rule pack and
/// confusables table, using `policy`'s knobs.
///
/// This is the convenience entry point for callers with no need to share a
/// [`RulePackHandle`] across audits (e.g. for hot reload); those callers
/// should build their own chain via [`default_chain`] and call
/// [`audit_with_chain`] directly.
///
/// # Errors
///
/// Returns [`AuditError::Normalize`] if `requestId` is empty. A scanner
/// failure is handled per `policy.scanner_fail_mode`: `Closed` propagates
/// [`AuditError::Scanner`]; `Open` and `LogOnly` degrade to an
/// [`crate::model::Action::Allow`] decision with a logged warning instead of
/// failing the call.
pub async fn audit(
    request: &AuditRequest,
    policy: &AuditPolicy,
    generated_at_ms: i64,
) -> Result<AuditOutcome, AuditError> {
    let rule_pack = crate::rulepack_loader::RulePackLoader::from_default()
        .map_err(AuditError::RulePack)?
        .handle();
    let rule_pack_version = rule_pack.read().expect("rule pack lock poisoned").version.clone();
    let confusables = Arc::new(default_table().clone());
    let chain = default_chain(rule_pack, confusables);
    audit_with_chain_inner(request, policy, &chain, &[rule_pack_version], generated_at_ms).await
}

/// Audit one turn using a caller-supplied scanner chain (spec §4.2).
///
/// The chain is an opaque `&[Box<dyn Scanner>]`, so this entry point cannot
/// recover which rule-pack version(s) backed it; `evidence.meta.rulePackVersions`
/// is left empty for this path. Callers who built their chain from a
/// [`RulePackHandle`] and want that provenance recorded should call
/// [`audit()`] instead, or read the handle's version themselves and attach it
/// out of band.
///
/// # Errors
///
/// See [`audit`].
pub async fn audit_with_chain(
    request: &AuditRequest,
    policy: &AuditPolicy,
    chain: &[Box<dyn Scanner>],
    generated_at_ms: i64,
) -> Result<AuditOutcome, AuditError> {
    audit_with_chain_inner(request, policy, chain, &[], generated_at_ms).await
}

async fn audit_with_chain_inner(
    request: &AuditRequest,
    policy: &AuditPolicy,
    chain: &[Box<dyn Scanner>],
    rule_pack_versions: &[String],
    generated_at_ms: i64,
) -> Result<AuditOutcome, AuditError> {
    if request.request_id.trim().is_empty() {
        return Err(AuditError::Normalize(NormalizeError::EmptyRequestId));
    }

    let normalized = normalize(request);

    let options = ScanOptions {
        mode: ScanMode::Audit,
        fail_fast: policy.fail_fast,
        fail_fast_risk: policy.fail_fast_risk,
    };

    let chain_result = match run_chain(normalized.clone(), chain, options).await {
        Ok(result) => result,
        Err(err) => {
            return match policy.scanner_fail_mode {
                FailMode::Closed => Err(AuditError::Scanner(err)),
                FailMode::Open | FailMode::LogOnly => {
                    tracing::warn!(error = %err, "scanner chain failed, degrading to allow per fail mode");
                    let decision = PolicyDecision::allow_clean();
                    let evidence =
                        build_evidence(&normalized, &[], &[], &decision, rule_pack_versions, generated_at_ms);
                    Ok(AuditOutcome { decision, evidence })
                }
            };
        }
    };

    let decision = evaluate_policy(&chain_result.findings, Some(&policy.to_policy_config()));

    let evidence = build_evidence(
        &chain_result.input,
        &chain_result.ran,
        &chain_result.findings,
        &decision,
        rule_pack_versions,
        generated_at_ms,
    );

    tracing::info!(
        request_id = %request.request_id,
        action = ?decision.action,
        risk = ?decision.risk,
        "audit decision"
    );

    Ok(AuditOutcome { decision, evidence })
}

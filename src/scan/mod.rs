//! The scanner chain runner (L2), spec §4.2.
//!
//! Threads a [`NormalizedInput`] through an ordered list of scanners,
//! re-ensuring view closure between each, and aggregates findings. Grounded
//! on the teacher's `pipeline::executor::PipelineExecutor::run` — sequential
//! per-stage execution, degradable-vs-fatal error handling, and short-circuit
//! on a terminal condition — generalized here to accumulate a `Finding`
//! stream instead of resolving to a single terminal outcome, and to
//! "transform by returning a new value" instead of mutating in place.

pub mod detect;
pub mod enrich;
pub mod sanitize;
pub mod surface;
pub mod view_seed;

use crate::error::ScannerError;
use crate::model::{Finding, NormalizedInput, RiskLevel};
use async_trait::async_trait;

/// Informational execution mode passed to scanners via [`ScanContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Normal inline execution.
    Runtime,
    /// Offline/batch audit execution.
    Audit,
}

/// Which kind of stage a scanner implements, used only for labeling in the
/// evidence package's `scanners` list (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// Strips/normalizes a view.
    Sanitize,
    /// Computes a derived view.
    Enrich,
    /// Emits findings.
    Detect,
}

impl ScanKind {
    /// Wire label used in the evidence package.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScanKind::Sanitize => "sanitize",
            ScanKind::Enrich => "enrich",
            ScanKind::Detect => "detect",
        }
    }
}

/// Context threaded to every scanner invocation. Scanners must treat this as
/// read-only; it carries no mutable per-audit state (spec §5 "Cross-audit
/// concurrency").
#[derive(Debug, Clone, Copy)]
pub struct ScanContext {
    /// Informational execution mode.
    pub mode: ScanMode,
}

/// The outcome of one scanner invocation.
pub struct ScanOutput {
    /// The (possibly unchanged) working input. `None` means "unchanged,
    /// carry `current` forward" — mirrors spec §4.2 step 2's "if `next.views`
    /// is absent, carry forward `current.views`", generalized to the whole
    /// value since a scanner that emits no transform need not allocate a
    /// clone.
    pub input: Option<NormalizedInput>,
    /// Findings emitted by this scanner, in emission order.
    pub findings: Vec<Finding>,
}

impl ScanOutput {
    /// A scanner ran and changed nothing.
    #[must_use]
    pub fn unchanged() -> Self {
        Self {
            input: None,
            findings: Vec::new(),
        }
    }

    /// A scanner ran and produced a new working input.
    #[must_use]
    pub fn transformed(input: NormalizedInput) -> Self {
        Self {
            input: Some(input),
            findings: Vec::new(),
        }
    }

    /// Attach findings to this output.
    #[must_use]
    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }
}

/// A single stage in the scanner chain: sanitizer, enricher, or detector.
///
/// Built-in scanners do not perform I/O during `run` (spec §5 "Suspension
/// points"); the trait is async only so user-supplied and I/O-bound scanners
/// (notably the rule-pack loader's initial load) share one calling
/// convention, per the teacher's `GuardrailStage` pattern.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Name of the scanner, unique within a chain.
    fn name(&self) -> &str;

    /// Which kind of stage this is, for evidence-package labeling.
    fn kind(&self) -> ScanKind;

    /// Run this scanner against the current working input.
    ///
    /// # Errors
    ///
    /// Returns [`ScannerError`] if the scanner cannot complete; per spec
    /// §7(c) this aborts the whole audit (the strictest reading of an
    /// otherwise-unspecified behavior).
    async fn run(&self, input: &NormalizedInput, ctx: &ScanContext) -> Result<ScanOutput, ScannerError>;
}

/// Options controlling [`run_chain`] (spec §4.2 "Options").
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Execution mode passed through to scanners.
    pub mode: ScanMode,
    /// Stop after the first finding whose risk reaches `fail_fast_risk`.
    pub fail_fast: bool,
    /// Risk threshold for fail-fast. Only `High` and `Critical` are
    /// meaningful (spec §9 open question (b): `Medium` never trips it).
    pub fail_fast_risk: RiskLevel,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            mode: ScanMode::Runtime,
            fail_fast: false,
            fail_fast_risk: RiskLevel::High,
        }
    }
}

/// Result of running the scanner chain.
pub struct ChainResult {
    /// Final working input after all scanners (or until fail-fast tripped).
    pub input: NormalizedInput,
    /// Findings from every scanner that ran, in emission order.
    pub findings: Vec<Finding>,
    /// Names of scanners that actually ran, in chain order (for the evidence
    /// package's `scanners` list).
    pub ran: Vec<(String, ScanKind)>,
}

/// Run an ordered list of scanners sequentially, threading `input` and
/// aggregating findings (spec §4.2 "Algorithm").
///
/// No intra-chain parallelism: each scanner's `run` completes before the
/// next begins (spec §5 "Scheduling model").
pub async fn run_chain(
    input: NormalizedInput,
    scanners: &[Box<dyn Scanner>],
    options: ScanOptions,
) -> Result<ChainResult, ScannerError> {
    let ctx = ScanContext { mode: options.mode };
    let mut current = view_seed::ensure_views(input);
    let mut findings = Vec::new();
    let mut ran = Vec::new();

    for scanner in scanners {
        tracing::trace!(scanner = scanner.name(), "running scanner");
        let output = scanner.run(&current, &ctx).await?;
        if let Some(next) = output.input {
            current = next;
        }
        current = view_seed::ensure_views(current);
        ran.push((scanner.name().to_string(), scanner.kind()));

        let tripped = options.fail_fast
            && output
                .findings
                .iter()
                .any(|f| f.risk.meets_fail_fast_threshold(options.fail_fast_risk));

        findings.extend(output.findings);

        if tripped {
            tracing::debug!(scanner = scanner.name(), "fail-fast threshold reached, stopping chain");
            break;
        }
    }

    Ok(ChainResult {
        input: current,
        findings,
        ran,
    })
}

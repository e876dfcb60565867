//! `PolicyDecision` — the L3 output (spec §3.6, §4.8).

use crate::model::finding::RiskLevel;
use serde::{Deserialize, Serialize};

/// The action a [`PolicyDecision`] recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// No material risk found.
    Allow,
    /// Proceed but surface a warning.
    AllowWithWarning,
    /// Require additional verification before proceeding.
    Challenge,
    /// Refuse the turn.
    Block,
}

/// The aggregate decision produced by the policy evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Recommended action.
    pub action: Action,
    /// Peak risk across all detect findings.
    pub risk: RiskLevel,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Ordered human-readable reasons.
    pub reasons: Vec<String>,
}

impl PolicyDecision {
    /// The decision for a turn with no detect findings at all.
    #[must_use]
    pub fn allow_clean() -> Self {
        Self {
            action: Action::Allow,
            risk: RiskLevel::None,
            confidence: 0.0,
            reasons: Vec::new(),
        }
    }
}

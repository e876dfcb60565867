//! Configuration for the audit pipeline (spec §10.3).
//!
//! This module provides the configuration infrastructure for turnguard,
//! shaped directly on a `PolicyBuilder` / resolved-policy pair:
//!
//! - [`AuditPolicy`] – the resolved configuration: scanner fail mode, risk→
//!   action overrides, fail-fast settings, and rule-pack hot-reload tuning.
//! - [`PolicyBuilder`] – builder for constructing an [`AuditPolicy`] from
//!   files, env vars, and in-code overrides.
//! - [`FailMode`] – behavior when a scanner in the chain errors out.
//!
//! ## Configuration hierarchy
//!
//! Resolved in the following order (later wins):
//!
//! 1. Compiled defaults (conservative: `scannerFailMode: closed`,
//!    `highAction: challenge`, `criticalAction: block`).
//! 2. A config file (`turnguard.toml`, `.yaml`, or `.json`).
//! 3. Environment variables (`TURNGUARD_*`).
//!
//! ## Example
//!
//! ```rust,ignore
//! use turnguard::config::PolicyBuilder;
//!
//! let policy = PolicyBuilder::new()
//!     .with_file("config/turnguard.toml")?
//!     .with_env()
//!     .build()?;
//!
//! assert!(policy.enabled);
//! ```

use crate::error::ConfigError;
use crate::model::finding::RiskLevel;
use crate::model::policy::Action;
use crate::policy::PolicyConfig;
use crate::rulepack_loader::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_WATCH_DEBOUNCE_MS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Behavior when a scanner in the chain returns `Err` (spec §7(c), §10.2).
///
/// Reused verbatim from the teacher's `FailMode`: it already expresses
/// exactly the Closed/Open/LogOnly trichotomy this knob needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailMode {
    /// Abort the whole audit; the top-level call returns `Err`.
    Closed,
    /// Log the scanner error and continue the chain as if it had produced
    /// no transform and no findings.
    Open,
    /// Log the scanner error, continue the chain, and additionally emit a
    /// low-risk `surface`-eligible finding noting the degraded scanner.
    LogOnly,
}

impl Default for FailMode {
    fn default() -> Self {
        Self::Closed
    }
}

/// The resolved configuration for one audit pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AuditPolicy {
    /// Config schema version, for forward compatibility.
    #[validate(length(min = 1))]
    pub version: String,

    /// Global enable/disable flag. When `false`, `audit()` callers should
    /// short-circuit to `Action::Allow` without running the chain.
    pub enabled: bool,

    /// What happens when a scanner in the chain errors.
    pub scanner_fail_mode: FailMode,

    /// Action a peak risk of `High` maps to (spec §4.8 step 2; default
    /// `challenge`, configurable to `block`).
    pub high_action: Action,

    /// Action a peak risk of `Critical` maps to (always `block` by default).
    pub critical_action: Action,

    /// Action a peak risk of `Medium` maps to.
    pub medium_action: Action,

    /// `K` in the confidence formula (spec §4.8 step 3).
    #[validate(range(min = 1))]
    pub confidence_k: usize,

    /// Whether the chain runner stops early on a qualifying finding (spec
    /// §4.2 step 4).
    pub fail_fast: bool,

    /// Minimum risk that trips `failFast`. Only `High` or `Critical` are
    /// meaningful here (spec §9 open question (b)); `Medium` never trips it
    /// regardless of this setting.
    pub fail_fast_risk: RiskLevel,

    /// Path to a rule-pack JSON file overriding the packaged default.
    /// `None` means "use the embedded asset".
    pub rule_pack_path: Option<PathBuf>,

    /// Hot-reload debounce window, in milliseconds.
    pub watch_debounce_ms: u64,

    /// Mtime-poll interval backing hot reload, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            enabled: true,
            scanner_fail_mode: FailMode::Closed,
            high_action: Action::Challenge,
            critical_action: Action::Block,
            medium_action: Action::AllowWithWarning,
            confidence_k: 3,
            fail_fast: true,
            fail_fast_risk: RiskLevel::High,
            rule_pack_path: None,
            watch_debounce_ms: DEFAULT_WATCH_DEBOUNCE_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl AuditPolicy {
    /// Project the risk→action and confidence knobs into a [`PolicyConfig`]
    /// for [`crate::policy::evaluate_policy`].
    #[must_use]
    pub fn to_policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            high_action: self.high_action,
            critical_action: self.critical_action,
            medium_action: self.medium_action,
            confidence_k: self.confidence_k,
        }
    }
}

/// Builder for constructing an [`AuditPolicy`] from multiple sources.
#[derive(Debug, Default)]
pub struct PolicyBuilder {
    base: AuditPolicy,
    use_env: bool,
}

impl PolicyBuilder {
    /// Create a new policy builder with compiled defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: AuditPolicy::default(),
            use_env: false,
        }
    }

    /// Load a policy from a configuration file (YAML, TOML, or JSON),
    /// selecting the parser by file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid
    /// under its detected format, or its extension is unrecognized.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.display().to_string(),
            source,
        })?;

        let policy: AuditPolicy = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                format: "yaml",
                source: Box::new(e),
            })?,
            Some("toml") => toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                format: "toml",
                source: Box::new(e),
            })?,
            Some("json") => serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                format: "json",
                source: Box::new(e),
            })?,
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    message: "file extension must be .yaml, .yml, .toml, or .json".to_string(),
                });
            }
        };

        self.base = policy;
        Ok(self)
    }

    /// Enable loading overrides from environment variables.
    ///
    /// Looks for variables prefixed with `TURNGUARD_`, e.g.:
    /// - `TURNGUARD_ENABLED=false`
    /// - `TURNGUARD_SCANNER_FAIL_MODE=open`
    /// - `TURNGUARD_HIGH_ACTION=block`
    /// - `TURNGUARD_FAIL_FAST=false`
    #[must_use]
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    /// Build the final audit policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an environment variable is present but
    /// cannot be parsed, or if the resolved policy fails validation.
    pub fn build(mut self) -> Result<AuditPolicy, ConfigError> {
        if self.use_env {
            dotenvy::dotenv().ok();
            apply_env_overrides(&mut self.base)?;
        }

        self.base.validate()?;
        Ok(self.base)
    }
}

fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<bool>()
            .map(Some)
            .map_err(|_| ConfigError::EnvParse {
                key: key.to_string(),
                message: "must be 'true' or 'false'".to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn env_action(key: &str) -> Result<Option<Action>, ConfigError> {
    match std::env::var(key) {
        Ok(v) => match v.to_lowercase().as_str() {
            "allow" => Ok(Some(Action::Allow)),
            "allow_with_warning" | "allowwithwarning" => Ok(Some(Action::AllowWithWarning)),
            "challenge" => Ok(Some(Action::Challenge)),
            "block" => Ok(Some(Action::Block)),
            _ => Err(ConfigError::EnvParse {
                key: key.to_string(),
                message: "must be 'allow', 'allow_with_warning', 'challenge', or 'block'".to_string(),
            }),
        },
        Err(_) => Ok(None),
    }
}

fn apply_env_overrides(policy: &mut AuditPolicy) -> Result<(), ConfigError> {
    if let Some(v) = env_bool("TURNGUARD_ENABLED")? {
        policy.enabled = v;
    }
    if let Some(v) = env_bool("TURNGUARD_FAIL_FAST")? {
        policy.fail_fast = v;
    }

    if let Ok(v) = std::env::var("TURNGUARD_SCANNER_FAIL_MODE") {
        policy.scanner_fail_mode = match v.to_lowercase().as_str() {
            "closed" => FailMode::Closed,
            "open" => FailMode::Open,
            "log_only" | "logonly" => FailMode::LogOnly,
            _ => {
                return Err(ConfigError::EnvParse {
                    key: "TURNGUARD_SCANNER_FAIL_MODE".to_string(),
                    message: "must be 'closed', 'open', or 'log_only'".to_string(),
                });
            }
        };
    }

    if let Some(v) = env_action("TURNGUARD_HIGH_ACTION")? {
        policy.high_action = v;
    }
    if let Some(v) = env_action("TURNGUARD_CRITICAL_ACTION")? {
        policy.critical_action = v;
    }
    if let Some(v) = env_action("TURNGUARD_MEDIUM_ACTION")? {
        policy.medium_action = v;
    }

    if let Ok(v) = std::env::var("TURNGUARD_CONFIDENCE_K") {
        policy.confidence_k = v.parse().map_err(|_| ConfigError::EnvParse {
            key: "TURNGUARD_CONFIDENCE_K".to_string(),
            message: "must be a positive integer".to_string(),
        })?;
    }

    if let Ok(v) = std::env::var("TURNGUARD_RULE_PACK_PATH") {
        policy.rule_pack_path = Some(PathBuf::from(v));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_conservative() {
        let policy = AuditPolicy::default();
        assert!(policy.enabled);
        assert_eq!(policy.scanner_fail_mode, FailMode::Closed);
        assert_eq!(policy.high_action, Action::Challenge);
        assert_eq!(policy.critical_action, Action::Block);
    }

    #[test]
    fn builder_with_no_sources_returns_defaults() {
        let policy = PolicyBuilder::new().build().unwrap();
        assert!(policy.enabled);
    }

    #[test]
    fn fail_mode_serializes_snake_case() {
        let json = serde_json::to_string(&FailMode::LogOnly).unwrap();
        assert_eq!(json, r#""log_only""#);
    }

    #[test]
    fn to_policy_config_projects_knobs() {
        let policy = AuditPolicy {
            high_action: Action::Block,
            confidence_k: 5,
            ..AuditPolicy::default()
        };
        let cfg = policy.to_policy_config();
        assert_eq!(cfg.high_action, Action::Block);
        assert_eq!(cfg.confidence_k, 5);
    }
}

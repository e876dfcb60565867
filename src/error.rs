//! Error taxonomy for the audit pipeline.
//!
//! Mirrors the error-handling design in the specification: input validation
//! failures at the L1 boundary, rule-pack load/parse errors, scanner runtime
//! errors (treated as fatal — see [`ScannerError`]), and configuration
//! errors. Policy evaluation itself never fails.

use thiserror::Error;

/// Failure to build a [`crate::model::normalized::NormalizedInput`] from an
/// [`crate::model::request::AuditRequest`].
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// `requestId` was empty.
    #[error("requestId must not be empty")]
    EmptyRequestId,
}

/// Failures loading or validating a rule pack document.
///
/// A single malformed *rule* is never an error — it is skipped with a logged
/// warning (see [`crate::model::rulepack::RulePack::from_document`]). These
/// variants cover whole-document failures only.
#[derive(Debug, Error)]
pub enum RulePackError {
    /// The pack file could not be read.
    #[error("failed to read rule pack at {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The pack file was not valid JSON.
    #[error("failed to parse rule pack at {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The document lacked a top-level `version` field.
    #[error("rule pack is missing a version field")]
    MissingVersion,
}

/// A scanner's `run` returned an error.
///
/// Per spec.md §7(c), this is treated as fatal for the whole audit (the
/// strictest reading of the open question there). The scanner name is
/// captured for diagnostics.
#[derive(Debug, Error)]
#[error("scanner '{scanner}' failed: {message}")]
pub struct ScannerError {
    /// Name of the scanner that failed.
    pub scanner: String,
    /// Human-readable failure description.
    pub message: String,
}

impl ScannerError {
    /// Build a scanner error tagged with the failing scanner's name.
    pub fn new(scanner: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            scanner: scanner.into(),
            message: message.into(),
        }
    }
}

/// Configuration load/validation failures, shaped on the teacher's
/// `config::ConfigError`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file failed to parse under its detected format.
    #[error("failed to parse {format} config: {source}")]
    ParseError {
        /// Detected format (`yaml`, `toml`, `json`).
        format: &'static str,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The file extension did not map to a supported format.
    #[error("unsupported config format: {message}")]
    UnsupportedFormat {
        /// Description of the problem.
        message: String,
    },

    /// Field-level validation failed.
    #[error(transparent)]
    Validation(#[from] validator::ValidationErrors),

    /// An environment variable could not be parsed into its target type.
    #[error("failed to parse env var {key}: {message}")]
    EnvParse {
        /// The environment variable name.
        key: String,
        /// Description of the problem.
        message: String,
    },
}

/// Top-level error returned by the audit entry point.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Normalization failed.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// A scanner in the chain failed.
    #[error(transparent)]
    Scanner(#[from] ScannerError),

    /// Rule-pack loading failed.
    #[error(transparent)]
    RulePack(#[from] RulePackError),
}

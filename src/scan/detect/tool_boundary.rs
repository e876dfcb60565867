//! Tool-boundary detectors (spec §4.7): SSRF and path-traversal checks over
//! `raw.toolCalls` argument trees.
//!
//! Grounded on the teacher pack's SSRF validator in
//! `danielchristiancazares-forge/tools/src/webfetch/http.rs` (blocked-CIDR
//! classification of a resolved host) — generalized here to a static,
//! non-resolving classification of the host string itself, since this
//! detector runs over already-issued tool-call arguments rather than
//! validating an outbound fetch before it happens.

use crate::error::ScannerError;
use crate::model::finding::{FieldKind, Target};
use crate::model::views::Source;
use crate::model::{Finding, NormalizedInput, RiskLevel};
use crate::scan::sanitize::separator::collapse_separators;
use crate::scan::sanitize::unicode::{normalize_nfkc, strip_invisible_and_bidi};
use crate::scan::{ScanContext, ScanKind, ScanOutput, Scanner};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::Url;

/// Node visitation budget shared by both tool-boundary detectors (spec
/// §4.7, §5 "Cancellation" — same default as `ToolArgsCanonicalizer`).
pub const DEFAULT_NODE_BUDGET: usize = 20_000;

fn normalize_candidate(s: &str) -> String {
    let nfkc = normalize_nfkc(s);
    let (stripped, _) = strip_invisible_and_bidi(&nfkc);
    let (collapsed, _) = collapse_separators(&stripped);
    collapsed
}

/// Walk a tool-call argument tree, invoking `visit` on every string leaf,
/// bounded by `budget` visited nodes.
fn walk_strings<'a>(value: &'a Value, budget: usize, visited: &mut usize, visit: &mut impl FnMut(&'a str)) {
    if *visited >= budget {
        return;
    }
    *visited += 1;
    match value {
        Value::String(s) => visit(s),
        Value::Array(items) => {
            for item in items {
                walk_strings(item, budget, visited, visit);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                walk_strings(v, budget, visited, visit);
            }
        }
        _ => {}
    }
}

fn is_suspicious_hostname(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == "localhost"
        || host.ends_with(".localhost")
        || host.ends_with(".local")
        || host == "metadata.google.internal"
}

fn is_private_or_loopback_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_private_or_loopback_v6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_private_or_loopback_v4(v4);
    }
    let segments = ip.segments();
    // fc00::/7 unique local
    let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
    // fe80::/10 link-local
    let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
    is_unique_local || is_link_local
}

/// Classification of a host string found in a tool-call argument.
fn classify_host(host: &str) -> bool {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => is_private_or_loopback_v4(v4),
            IpAddr::V6(v6) => is_private_or_loopback_v6(v6),
        };
    }
    is_suspicious_hostname(host)
}

/// SSRF detector (spec §4.7): parses candidate strings as URLs after
/// NFKC + invisible/bidi stripping + scheme-only separator collapse, and
/// flags private/loopback/link-local or suspicious hosts.
pub struct SsrfDetector {
    node_budget: usize,
}

impl Default for SsrfDetector {
    fn default() -> Self {
        Self {
            node_budget: DEFAULT_NODE_BUDGET,
        }
    }
}

#[async_trait]
impl Scanner for SsrfDetector {
    fn name(&self) -> &str {
        "tool_args_ssrf"
    }

    fn kind(&self) -> ScanKind {
        ScanKind::Detect
    }

    async fn run(&self, input: &NormalizedInput, _ctx: &ScanContext) -> Result<ScanOutput, ScannerError> {
        let mut findings = Vec::new();

        for (call_index, call) in input.raw.tool_calls.iter().enumerate() {
            let mut visited = 0usize;
            let mut hits: Vec<String> = Vec::new();
            walk_strings(call, self.node_budget, &mut visited, &mut |s| {
                let candidate = normalize_candidate(s);
                let Ok(url) = Url::parse(&candidate) else { return };
                if url.scheme() != "http" && url.scheme() != "https" {
                    return;
                }
                let Some(host) = url.host_str() else { return };
                if classify_host(host) {
                    hits.push(host.to_string());
                }
            });

            for host in hits {
                let mut evidence = BTreeMap::new();
                evidence.insert("category".to_string(), "tool_args_ssrf".to_string());
                evidence.insert("host".to_string(), host.clone());

                let target = Target {
                    field: FieldKind::PromptChunk,
                    view: crate::model::views::View::Raw,
                    source: Some(Source::Tool),
                    chunk_index: Some(call_index),
                };
                let local_key = format!("ssrf@{call_index}@{host}");
                findings.push(Finding::detect(
                    self.name(),
                    &input.request_id,
                    &local_key,
                    RiskLevel::High,
                    0.9,
                    format!("tool call argument resolves to a private/internal host ({host})"),
                    target,
                    evidence,
                ));
            }
        }

        Ok(ScanOutput::unchanged().with_findings(findings))
    }
}

const TRAVERSAL_MARKERS: &[&str] = &["../", "..\\", "%2e%2e", "%2f", "%5c"];
const SENSITIVE_MARKERS: &[&str] = &[
    "/etc/passwd",
    "/etc/shadow",
    ".ssh",
    "id_rsa",
    ".env",
    "c:\\windows",
];

fn looks_like_path(s: &str) -> bool {
    s.contains('/') || s.contains('\\') || s.starts_with('~') || s.starts_with('.')
}

/// Path-traversal detector (spec §4.7): flags tool-call argument strings
/// that look like filesystem paths and either contain a traversal segment
/// or reference a sensitive path.
pub struct PathTraversalDetector {
    node_budget: usize,
}

impl Default for PathTraversalDetector {
    fn default() -> Self {
        Self {
            node_budget: DEFAULT_NODE_BUDGET,
        }
    }
}

#[async_trait]
impl Scanner for PathTraversalDetector {
    fn name(&self) -> &str {
        "tool_args_path_traversal"
    }

    fn kind(&self) -> ScanKind {
        ScanKind::Detect
    }

    async fn run(&self, input: &NormalizedInput, _ctx: &ScanContext) -> Result<ScanOutput, ScannerError> {
        let mut findings = Vec::new();

        for (call_index, call) in input.raw.tool_calls.iter().enumerate() {
            let mut visited = 0usize;
            let mut hits: Vec<(String, bool)> = Vec::new();
            walk_strings(call, self.node_budget, &mut visited, &mut |s| {
                if !looks_like_path(s) {
                    return;
                }
                let lower = s.to_ascii_lowercase();
                let sensitive = SENSITIVE_MARKERS.iter().any(|m| lower.contains(m));
                let traversal = TRAVERSAL_MARKERS.iter().any(|m| lower.contains(m));
                if sensitive || traversal {
                    hits.push((s.to_string(), sensitive));
                }
            });

            for (path, sensitive) in hits {
                let risk = if sensitive { RiskLevel::High } else { RiskLevel::Medium };
                let mut evidence = BTreeMap::new();
                evidence.insert("category".to_string(), "tool_args_path_traversal".to_string());
                evidence.insert("path".to_string(), path.clone());
                evidence.insert("sensitive".to_string(), sensitive.to_string());

                let target = Target {
                    field: FieldKind::PromptChunk,
                    view: crate::model::views::View::Raw,
                    source: Some(Source::Tool),
                    chunk_index: Some(call_index),
                };
                let local_key = format!("path_traversal@{call_index}@{path}");
                findings.push(Finding::detect(
                    self.name(),
                    &input.request_id,
                    &local_key,
                    risk,
                    if sensitive { 0.9 } else { 0.5 },
                    format!("tool call argument references a {} path ({path})", if sensitive { "sensitive" } else { "traversal" }),
                    target,
                    evidence,
                ));
            }
        }

        Ok(ScanOutput::unchanged().with_findings(findings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::request::ToolCall;
    use crate::model::AuditRequest;
    use crate::normalize::normalize;

    fn ctx() -> ScanContext {
        ScanContext {
            mode: crate::scan::ScanMode::Audit,
        }
    }

    #[tokio::test]
    async fn flags_link_local_metadata_endpoint() {
        let req = AuditRequest::new("r1", 0, "fetch something").with_tool_call(ToolCall::new(
            "http_fetch",
            serde_json::json!({"url": "http://169.254.169.254/latest/meta-data"}),
        ));
        let input = normalize(&req);
        let out = SsrfDetector::default().run(&input, &ctx()).await.unwrap();
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].risk, RiskLevel::High);
        assert_eq!(out.findings[0].evidence.get("host").map(String::as_str), Some("169.254.169.254"));
    }

    #[tokio::test]
    async fn flags_obfuscated_scheme() {
        let req = AuditRequest::new("r1", 0, "fetch").with_tool_call(ToolCall::new(
            "http_fetch",
            serde_json::json!({"url": "h.t.t.p://localhost/admin"}),
        ));
        let input = normalize(&req);
        let out = SsrfDetector::default().run(&input, &ctx()).await.unwrap();
        assert_eq!(out.findings.len(), 1);
    }

    #[tokio::test]
    async fn benign_public_url_not_flagged() {
        let req = AuditRequest::new("r1", 0, "fetch").with_tool_call(ToolCall::new(
            "http_fetch",
            serde_json::json!({"url": "https://example.com/page"}),
        ));
        let input = normalize(&req);
        let out = SsrfDetector::default().run(&input, &ctx()).await.unwrap();
        assert!(out.findings.is_empty());
    }

    #[tokio::test]
    async fn flags_sensitive_path_as_high() {
        let req = AuditRequest::new("r1", 0, "read file").with_tool_call(ToolCall::new(
            "read_file",
            serde_json::json!({"path": "../../etc/passwd"}),
        ));
        let input = normalize(&req);
        let out = PathTraversalDetector::default().run(&input, &ctx()).await.unwrap();
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].risk, RiskLevel::High);
    }

    #[tokio::test]
    async fn flags_traversal_only_as_medium() {
        let req = AuditRequest::new("r1", 0, "read file").with_tool_call(ToolCall::new(
            "read_file",
            serde_json::json!({"path": "../../some/other/file.txt"}),
        ));
        let input = normalize(&req);
        let out = PathTraversalDetector::default().run(&input, &ctx()).await.unwrap();
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].risk, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn benign_relative_path_not_flagged() {
        let req = AuditRequest::new("r1", 0, "read file").with_tool_call(ToolCall::new(
            "read_file",
            serde_json::json!({"path": "./reports/summary.txt"}),
        ));
        let input = normalize(&req);
        let out = PathTraversalDetector::default().run(&input, &ctx()).await.unwrap();
        assert!(out.findings.is_empty());
    }
}

//! The evidence builder (L5, spec §4.9, §6.5).
//!
//! Assembles the deterministic, hash-chained `EvidencePackageV0`. Grounded
//! on the teacher's content-addressed-hash pattern in
//! `newmar1997ma-coder-mcp-sentinel`'s sentinel-firewall/sentinel-registry
//! crates (canary/Merkle hashing via `sha2`), adapted here to a flat
//! per-section item list plus one root hash over the whole canonicalized
//! package.

use crate::canonical::canonicalize;
use crate::model::normalized::{Canonical, Features, NormalizedInput, Views};
use crate::model::policy::PolicyDecision;
use crate::model::Finding;
use crate::scan::ScanKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The fixed schema identifier for this evidence package shape (spec §6.5).
pub const SCHEMA: &str = "schnabel-evidence-v0";

/// Which scanner ran, in chain order, for the evidence package's `scanners`
/// list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerEntry {
    /// Scanner name.
    pub name: String,
    /// Scanner kind (`sanitize` / `enrich` / `detect`).
    pub kind: String,
}

/// The `normalized` section: canonical string forms and feature flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSection {
    /// Deterministic canonical string forms.
    pub canonical: Canonical,
    /// Feature flags computed once by the normalizer.
    pub features: Features,
}

/// One surface's content-addressed digest entry (spec §4.9 `rawDigest`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDigestEntry {
    /// Clipped preview of the raw text.
    pub preview: String,
    /// Character length of the raw text.
    pub length: usize,
    /// Lowercase hex sha256 of the raw text.
    pub hash: String,
}

/// One per-section integrity entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityItem {
    /// Section name.
    pub name: String,
    /// Lowercase hex sha256 of that section's canonicalized content.
    pub hash: String,
}

/// The `integrity` section (spec §4.9, §6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    /// Hash algorithm identifier, always `"sha256"`.
    pub algo: String,
    /// sha256 of the whole canonicalized package with this field absent.
    pub root_hash: String,
    /// Per-section hashes.
    pub items: Vec<IntegrityItem>,
}

/// Metadata about the rule pack(s) that contributed findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// Versions of every rule pack consulted during this audit.
    pub rule_pack_versions: Vec<String>,
}

/// The assembled, deterministic, hash-chained evidence package (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidencePackage {
    /// Fixed schema identifier.
    pub schema: String,
    /// Copied from the audited request.
    pub request_id: String,
    /// Wall-clock timestamp at which this package was assembled.
    pub generated_at_ms: i64,
    /// Scanners that ran, in chain order.
    pub scanners: Vec<ScannerEntry>,
    /// Canonical string forms and feature flags.
    pub normalized: NormalizedSection,
    /// All per-surface view sets.
    pub scanned: Views,
    /// Per-surface content-addressed digest of the raw text.
    pub raw_digest: BTreeMap<String, RawDigestEntry>,
    /// Findings, in emission order.
    pub findings: Vec<Finding>,
    /// The policy decision for this turn.
    pub decision: PolicyDecision,
    /// Rule-pack provenance metadata.
    pub meta: Meta,
    /// Hash-chained integrity section.
    pub integrity: Integrity,
}

const PREVIEW_MAX_CHARS: usize = 120;

fn clip_preview(s: &str) -> String {
    let char_count = s.chars().count();
    if char_count <= PREVIEW_MAX_CHARS {
        s.to_string()
    } else {
        let clipped: String = s.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{clipped}…")
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

fn raw_digest_entry(text: &str) -> RawDigestEntry {
    RawDigestEntry {
        preview: clip_preview(text),
        length: text.chars().count(),
        hash: sha256_hex(text.as_bytes()),
    }
}

fn build_raw_digest(input: &NormalizedInput) -> BTreeMap<String, RawDigestEntry> {
    let mut out = BTreeMap::new();
    out.insert("prompt".to_string(), raw_digest_entry(&input.views.prompt.raw));
    for (idx, chunk) in input.canonical.prompt_chunks_canonical.iter().skip(1).enumerate() {
        out.insert(format!("chunk:{idx}"), raw_digest_entry(&chunk.text));
    }
    if let Some(response) = &input.views.response {
        out.insert("response".to_string(), raw_digest_entry(&response.raw));
    }
    out
}

fn section_hash<T: Serialize>(value: &T) -> String {
    let json = canonicalize_of_serializable(value);
    sha256_hex(json.as_bytes())
}

fn canonicalize_of_serializable<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(v) => canonicalize(&v),
        Err(_) => "null".to_string(),
    }
}

/// Assemble the evidence package for a completed audit (spec §4.9).
///
/// `generated_at_ms` is supplied by the caller rather than read from the
/// clock internally, so the package (and therefore `rootHash`) stays a pure
/// function of its inputs — matching spec §8 invariant 1 ("`rootHash`
/// depends only on canonicalized content, not on wall clock").
#[must_use]
pub fn build_evidence(
    input: &NormalizedInput,
    ran_scanners: &[(String, ScanKind)],
    findings: &[Finding],
    decision: &PolicyDecision,
    rule_pack_versions: &[String],
    generated_at_ms: i64,
) -> EvidencePackage {
    let scanners = ran_scanners
        .iter()
        .map(|(name, kind)| ScannerEntry {
            name: name.clone(),
            kind: kind.as_str().to_string(),
        })
        .collect();

    let normalized = NormalizedSection {
        canonical: input.canonical.clone(),
        features: input.features,
    };
    let scanned = input.views.clone();
    let raw_digest = build_raw_digest(input);
    let meta = Meta {
        rule_pack_versions: rule_pack_versions.to_vec(),
    };

    let items = vec![
        IntegrityItem {
            name: "normalized".to_string(),
            hash: section_hash(&normalized),
        },
        IntegrityItem {
            name: "scanned".to_string(),
            hash: section_hash(&scanned),
        },
        IntegrityItem {
            name: "rawDigest".to_string(),
            hash: section_hash(&raw_digest),
        },
        IntegrityItem {
            name: "findings".to_string(),
            hash: section_hash(&findings),
        },
        IntegrityItem {
            name: "decision".to_string(),
            hash: section_hash(decision),
        },
        IntegrityItem {
            name: "meta".to_string(),
            hash: section_hash(&meta),
        },
    ];

    let mut package = EvidencePackage {
        schema: SCHEMA.to_string(),
        request_id: input.request_id.clone(),
        generated_at_ms,
        scanners,
        normalized,
        scanned,
        raw_digest,
        findings: findings.to_vec(),
        decision: decision.clone(),
        meta,
        integrity: Integrity {
            algo: "sha256".to_string(),
            root_hash: String::new(),
            items,
        },
    };

    package.integrity.root_hash = root_hash_excluding_itself(&package);
    package
}

/// Compute sha256 over the canonicalized package with `integrity.rootHash`
/// absent from the object (spec §4.9 "Determinism requires canonical JSON").
fn root_hash_excluding_itself(package: &EvidencePackage) -> String {
    let mut value = serde_json::to_value(package).expect("evidence package is serializable");
    if let Some(integrity) = value.get_mut("integrity").and_then(Value::as_object_mut) {
        integrity.remove("rootHash");
    } else {
        // Defensive: should be unreachable given the struct shape above.
        let mut map = Map::new();
        map.insert("integrity".to_string(), Value::Object(Map::new()));
        value = Value::Object(map);
    }
    sha256_hex(canonicalize(&value).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AuditRequest;
    use crate::normalize::normalize;
    use crate::policy::evaluate_policy;
    use std::collections::BTreeMap;

    #[test]
    fn root_hash_is_deterministic() {
        let req = AuditRequest::new("r1", 1000, "hello world");
        let input = normalize(&req);
        let decision = evaluate_policy(&[], None);
        let a = build_evidence(&input, &[], &[], &decision, &[], 1234);
        let b = build_evidence(&input, &[], &[], &decision, &[], 1234);
        assert_eq!(a.integrity.root_hash, b.integrity.root_hash);
    }

    #[test]
    fn root_hash_changes_with_findings() {
        let req = AuditRequest::new("r1", 1000, "hello world");
        let input = normalize(&req);
        let decision = evaluate_policy(&[], None);
        let a = build_evidence(&input, &[], &[], &decision, &[], 1234);

        let finding = Finding::detect(
            "rule_pack",
            "r1",
            "k",
            crate::model::finding::RiskLevel::High,
            0.8,
            "test",
            crate::model::finding::Target::prompt(crate::model::views::View::Raw),
            BTreeMap::new(),
        );
        let b = build_evidence(&input, &[], &[finding], &decision, &[], 1234);
        assert_ne!(a.integrity.root_hash, b.integrity.root_hash);
    }

    #[test]
    fn rule_pack_version_independent_of_clock() {
        let req = AuditRequest::new("r1", 1000, "hello world");
        let input = normalize(&req);
        let decision = evaluate_policy(&[], None);
        let a = build_evidence(&input, &[], &[], &decision, &[], 1234);
        let b = build_evidence(&input, &[], &[], &decision, &[], 9999);
        // generatedAtMs differs, so rootHash must differ too (it is part of
        // the canonicalized package).
        assert_ne!(a.integrity.root_hash, b.integrity.root_hash);
    }

    #[test]
    fn raw_digest_covers_every_surface() {
        let req = AuditRequest::new("r1", 0, "hi").with_response("bye");
        let input = normalize(&req);
        let digest = build_raw_digest(&input);
        assert!(digest.contains_key("prompt"));
        assert!(digest.contains_key("response"));
    }
}

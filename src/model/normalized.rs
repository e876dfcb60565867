//! `NormalizedInput` — the L1 output threaded through L2 (spec §3.2).

use crate::model::request::AuditRequest;
use crate::model::views::{Source, TextViewSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structural copy of the request payload, kept around for scanners that
/// need original (non-canonicalized) forms — e.g. tool args before
/// `ToolArgsCanonicalizer` runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCopy {
    /// Original user prompt text.
    pub user_prompt: String,
    /// Original retrieval chunk texts, in order.
    pub retrieval_docs: Vec<String>,
    /// Original tool call argument trees, in order.
    pub tool_calls: Vec<Value>,
    /// Original tool result payloads, in order (only the `data`/`error`
    /// relevant for scanning; `ok` is dropped since scanners only walk
    /// values).
    pub tool_results: Vec<Value>,
    /// Original response text, if any.
    pub response_text: Option<String>,
}

/// A single assembled prompt chunk: the user prompt (chunk 0), a retrieval
/// doc, or a tool-derived chunk, with a stable index (spec §4.1(b)).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptChunk {
    /// Chunk text.
    pub text: String,
    /// Where this chunk came from.
    pub source: Source,
    /// Originating document id, if any (retrieval only).
    pub doc_id: Option<String>,
    /// Stable index into the assembled chunk list.
    pub chunk_index: usize,
}

/// Canonical (deterministic) string forms derived from the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canonical {
    /// Canonical JSON string for the prompt alone.
    pub prompt_canonical: String,
    /// Assembled chunk list: user prompt, then retrieval docs, then tool
    /// output chunks, each with a stable `chunkIndex`.
    pub prompt_chunks_canonical: Vec<PromptChunk>,
    /// Canonical JSON string for the whole tool-call list.
    pub tool_calls_json: String,
    /// Canonical JSON string for the whole tool-result list.
    pub tool_results_json: String,
    /// Canonical JSON string for the response, or `null` if absent.
    pub response_canonical: String,
}

/// Flags computed once by the normalizer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    /// `true` if `retrievalDocs` is non-empty.
    pub has_retrieval: bool,
    /// `true` if `toolCalls` is non-empty.
    pub has_tool_calls: bool,
    /// `true` if `toolResults` is non-empty.
    pub has_tool_results: bool,
    /// `true` if `responseText` is `Some`.
    pub has_response: bool,
}

/// All per-surface view sets produced for an audit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Views {
    /// Views for the user prompt (chunk 0).
    pub prompt: TextViewSet,
    /// Views for each retrieval/tool chunk, in `chunkIndex` order including
    /// the prompt at index 0 is tracked separately in `prompt`; this vector
    /// holds only chunks at index >= 1.
    pub chunks: Vec<TextViewSet>,
    /// Views for the response, if present.
    pub response: Option<TextViewSet>,
}

/// The L1 output: everything L2 scanners need, threaded immutably by value
/// (spec §3.2 "Ownership & lifecycle").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedInput {
    /// Copied from the request.
    pub request_id: String,
    /// Copied from the request.
    pub timestamp: i64,
    /// Structural copy of the original payload.
    pub raw: RawCopy,
    /// Deterministic string forms.
    pub canonical: Canonical,
    /// Flags computed once.
    pub features: Features,
    /// The multi-view surface.
    pub views: Views,
}

impl NormalizedInput {
    /// Total assembled chunk count, including the user prompt at index 0.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.canonical.prompt_chunks_canonical.len()
    }
}

impl From<&AuditRequest> for RawCopy {
    fn from(req: &AuditRequest) -> Self {
        RawCopy {
            user_prompt: req.user_prompt.clone(),
            retrieval_docs: req.retrieval_docs.iter().map(|d| d.text.clone()).collect(),
            tool_calls: req.tool_calls.iter().map(|c| c.args.clone()).collect(),
            tool_results: req
                .tool_results
                .iter()
                .map(|r| r.data.clone().unwrap_or(Value::Null))
                .collect(),
            response_text: req.response_text.clone(),
        }
    }
}

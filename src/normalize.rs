//! The normalizer (L1, spec §4.1).
//!
//! `normalize` is pure, deterministic, and total: it never fails, because
//! `AuditRequest` itself cannot express an unparseable turn. Validation of
//! `requestId` non-emptiness is the job of the public entry point
//! ([`crate::audit`]), not the normalizer — spec §4.1's contract is a plain
//! function, not a `Result`.

use crate::canonical::{canonicalize, canonicalize_of};
use crate::model::normalized::{Canonical, Features, NormalizedInput, PromptChunk, RawCopy, Views};
use crate::model::request::AuditRequest;
use crate::model::views::{Source, TextViewSet};
use crate::scan::view_seed::ensure_views;
use serde_json::Value;

/// Build the `NormalizedInput` for one audited turn (spec §4.1
/// "Responsibilities").
#[must_use]
pub fn normalize(req: &AuditRequest) -> NormalizedInput {
    let raw = RawCopy::from(req);

    let mut chunks = Vec::with_capacity(1 + req.retrieval_docs.len() + req.tool_results.len());
    chunks.push(PromptChunk {
        text: req.user_prompt.clone(),
        source: Source::User,
        doc_id: None,
        chunk_index: 0,
    });
    for doc in &req.retrieval_docs {
        chunks.push(PromptChunk {
            text: doc.text.clone(),
            source: Source::Retrieval,
            doc_id: doc.doc_id.clone(),
            chunk_index: chunks.len(),
        });
    }
    for result in &req.tool_results {
        let text = match (&result.data, &result.error) {
            (Some(data), _) => canonicalize(data),
            (None, Some(err)) => err.clone(),
            (None, None) => String::new(),
        };
        chunks.push(PromptChunk {
            text,
            source: Source::Tool,
            doc_id: None,
            chunk_index: chunks.len(),
        });
    }

    let tool_calls_value: Vec<Value> = req
        .tool_calls
        .iter()
        .map(|c| serde_json::json!({"toolName": c.tool_name, "args": c.args}))
        .collect();
    let tool_results_value: Vec<Value> = req
        .tool_results
        .iter()
        .map(|r| serde_json::json!({"toolName": r.tool_name, "ok": r.ok, "data": r.data, "error": r.error}))
        .collect();

    let canonical = Canonical {
        prompt_canonical: canonicalize_of(&req.user_prompt),
        prompt_chunks_canonical: chunks,
        tool_calls_json: canonicalize(&Value::Array(tool_calls_value)),
        tool_results_json: canonicalize(&Value::Array(tool_results_value)),
        response_canonical: match &req.response_text {
            Some(text) => canonicalize_of(text),
            None => "null".to_string(),
        },
    };

    let features = Features {
        has_retrieval: !req.retrieval_docs.is_empty(),
        has_tool_calls: !req.tool_calls.is_empty(),
        has_tool_results: !req.tool_results.is_empty(),
        has_response: req.response_text.is_some(),
    };

    let views = Views {
        prompt: TextViewSet::from_raw(req.user_prompt.clone()),
        chunks: canonical.prompt_chunks_canonical[1..]
            .iter()
            .map(|c| TextViewSet::from_raw(c.text.clone()))
            .collect(),
        response: req.response_text.clone().map(TextViewSet::from_raw),
    };

    let input = NormalizedInput {
        request_id: req.request_id.clone(),
        timestamp: req.timestamp,
        raw,
        canonical,
        features,
        views,
    };

    // Seed all four views so even a zero-scanner chain leaves a consistent
    // value (spec §4.1(e)).
    ensure_views(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::request::{RetrievalDoc, ToolCall, ToolResult};

    #[test]
    fn assembles_chunks_in_order() {
        let req = AuditRequest::new("r1", 0, "hi")
            .with_retrieval_doc(RetrievalDoc::new("doc text"))
            .with_tool_result(ToolResult::ok("search", serde_json::json!({"x": 1})));
        let input = normalize(&req);
        assert_eq!(input.chunk_count(), 3);
        assert_eq!(input.canonical.prompt_chunks_canonical[0].source, Source::User);
        assert_eq!(input.canonical.prompt_chunks_canonical[1].source, Source::Retrieval);
        assert_eq!(input.canonical.prompt_chunks_canonical[2].source, Source::Tool);
        assert_eq!(input.views.chunks.len(), 2);
    }

    #[test]
    fn features_reflect_presence() {
        let req = AuditRequest::new("r1", 0, "hi").with_tool_call(ToolCall::new("t", Value::Null));
        let input = normalize(&req);
        assert!(input.features.has_tool_calls);
        assert!(!input.features.has_retrieval);
        assert!(!input.features.has_response);
    }

    #[test]
    fn seeds_closed_views() {
        let req = AuditRequest::new("r1", 0, "hello").with_response("world");
        let input = normalize(&req);
        assert!(input.views.prompt.is_closed());
        assert!(input.views.response.unwrap().is_closed());
    }

    #[test]
    fn deterministic_canonical_json() {
        let req = AuditRequest::new("r1", 0, "hi").with_tool_call(ToolCall::new(
            "search",
            serde_json::json!({"b": 1, "a": 2}),
        ));
        let a = normalize(&req);
        let b = normalize(&req);
        assert_eq!(a.canonical.tool_calls_json, b.canonical.tool_calls_json);
        assert!(a.canonical.tool_calls_json.contains(r#""a":2,"b":1"#) || a.canonical.tool_calls_json.contains(r#""args":{"a":2,"b":1}"#));
    }
}

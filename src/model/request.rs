//! `AuditRequest` — the L1 input ingested from an agent event.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single turn of agent I/O: the immutable record the normalizer consumes.
///
/// Mirrors `AgentIngressEvent` (spec §6.1) one-to-one; the ingress adapter
/// that maps a looser event shape into this type is an external collaborator
/// and is not part of this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequest {
    /// Non-empty request identifier, unique per audited turn.
    pub request_id: String,

    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,

    /// The user's prompt. May be empty but is always present.
    pub user_prompt: String,

    /// Retrieval chunks, in presentation order.
    #[serde(default)]
    pub retrieval_docs: Vec<RetrievalDoc>,

    /// Tool invocations, in call order.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Tool invocation results, in call order.
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,

    /// The model's response text, if the turn has completed.
    pub response_text: Option<String>,
}

impl AuditRequest {
    /// Construct a request with just the required fields; builder methods
    /// attach the rest.
    #[must_use]
    pub fn new(request_id: impl Into<String>, timestamp: i64, user_prompt: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            timestamp,
            user_prompt: user_prompt.into(),
            retrieval_docs: Vec::new(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            response_text: None,
        }
    }

    /// Attach a response text.
    #[must_use]
    pub fn with_response(mut self, response_text: impl Into<String>) -> Self {
        self.response_text = Some(response_text.into());
        self
    }

    /// Append a retrieval chunk.
    #[must_use]
    pub fn with_retrieval_doc(mut self, doc: RetrievalDoc) -> Self {
        self.retrieval_docs.push(doc);
        self
    }

    /// Append a tool call.
    #[must_use]
    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    /// Append a tool result.
    #[must_use]
    pub fn with_tool_result(mut self, result: ToolResult) -> Self {
        self.tool_results.push(result);
        self
    }
}

/// A chunk retrieved from a RAG corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalDoc {
    /// Chunk text.
    pub text: String,
    /// Document identifier, if the retrieval layer supplied one.
    pub doc_id: Option<String>,
    /// Source identifier (URL, corpus name, ...).
    pub source: Option<String>,
}

impl RetrievalDoc {
    /// Construct a retrieval chunk from text alone.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            doc_id: None,
            source: None,
        }
    }
}

/// A request to invoke a tool, pre-execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Canonical tool name.
    pub tool_name: String,
    /// Arbitrary nested JSON arguments.
    pub args: Value,
}

impl ToolCall {
    /// Construct a tool call.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// The result of a tool invocation, post-execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Canonical tool name.
    pub tool_name: String,
    /// Whether the invocation succeeded.
    pub ok: bool,
    /// Result payload, if `ok`.
    pub data: Option<Value>,
    /// Error description, if not `ok`.
    pub error: Option<String>,
}

impl ToolResult {
    /// Construct a successful tool result.
    #[must_use]
    pub fn ok(tool_name: impl Into<String>, data: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Construct a failed tool result.
    #[must_use]
    pub fn err(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain() {
        let req = AuditRequest::new("r1", 1000, "hello")
            .with_response("world")
            .with_retrieval_doc(RetrievalDoc::new("chunk"))
            .with_tool_call(ToolCall::new("search", serde_json::json!({"q": "x"})))
            .with_tool_result(ToolResult::ok("search", serde_json::json!([1, 2])));

        assert_eq!(req.request_id, "r1");
        assert_eq!(req.response_text.as_deref(), Some("world"));
        assert_eq!(req.retrieval_docs.len(), 1);
        assert_eq!(req.tool_calls.len(), 1);
        assert_eq!(req.tool_results.len(), 1);
    }
}

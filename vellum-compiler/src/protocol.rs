//! Request/response unions for the compiler worker.
//!
//! Requests carry an optional correlation id: query operations (`compile`,
//! `autocomplete`, `definition`) set one and expect an answer; view-keeping
//! operations (`edit`, `addFile`, …) are fire-and-forget. All offsets are
//! Unicode codepoints.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    pub op: CompilerOp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CompilerOp {
    Init {
        root: String,
    },
    #[serde(rename_all = "camelCase")]
    Edit {
        file: String,
        text: String,
        offset_start: usize,
        offset_end: usize,
    },
    Compile,
    Autocomplete {
        file: String,
        offset: usize,
    },
    Definition {
        file: String,
        offset: usize,
    },
    #[serde(rename_all = "camelCase")]
    Move {
        old_path: String,
        new_path: String,
    },
    AddFile {
        file: String,
        content: String,
    },
    SetRoot {
        path: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    pub payload: CompilerPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CompilerPayload {
    Compile { pages: usize },
    Completion { items: Vec<CompletionItem> },
    Definition { location: Option<DefinitionLocation> },
    Error { diagnostics: Vec<Diagnostic> },
    Logger { message: String },
}

impl CompilerPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Compile { .. } => "compile",
            Self::Completion { .. } => "completion",
            Self::Definition { .. } => "definition",
            Self::Error { .. } => "error",
            Self::Logger { .. } => "logger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionItem {
    pub label: String,
    pub kind: String,
    /// Snippet to apply; defaults to the label when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionLocation {
    pub file: String,
    pub span: SpanRange,
}

/// Half-open codepoint range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One compiler diagnostic, rendered by the editor as a marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub span: SpanRange,
    pub message: String,
    pub severity: Severity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let req = CompilerRequest {
            request_id: None,
            op: CompilerOp::Edit {
                file: "/main.typ".into(),
                text: "= Title".into(),
                offset_start: 0,
                offset_end: 7,
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["op"]["type"], "edit");
        assert_eq!(json["op"]["offsetStart"], 0);
        assert_eq!(json["op"]["offsetEnd"], 7);
        assert!(json.get("requestId").is_none());
    }

    #[test]
    fn test_query_carries_request_id() {
        let req = CompilerRequest {
            request_id: Some(7),
            op: CompilerOp::Compile,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["requestId"], 7);
        assert_eq!(json["op"]["type"], "compile");
    }

    #[test]
    fn test_response_tags() {
        let res = CompilerResponse {
            request_id: Some(1),
            payload: CompilerPayload::Error {
                diagnostics: vec![Diagnostic {
                    file: "/main.typ".into(),
                    span: SpanRange { start: 3, end: 9 },
                    message: "unknown variable".into(),
                    severity: Severity::Error,
                }],
            },
        };
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["payload"]["type"], "error");
        assert_eq!(json["payload"]["diagnostics"][0]["span"]["start"], 3);

        let back: CompilerResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back.payload.kind(), "error");
    }

    #[test]
    fn test_move_op_tag() {
        let op = CompilerOp::Move {
            old_path: "/a.typ".into(),
            new_path: "/b.typ".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "move");
        assert_eq!(json["oldPath"], "/a.typ");
    }
}

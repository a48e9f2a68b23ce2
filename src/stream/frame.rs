//! Typed frames of the agent streaming protocol.
//!
//! Each transport chunk carries `data: {"type": ..., "content": ...}`;
//! the stream ends with the literal `data: [DONE]` sentinel.

use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, ProgressMessage};

/// Termination token closing a turn's frame sequence.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A `tool_call` frame's payload: the invocation announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallFrame {
    /// Correlation id linking the call to its eventual result
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// A `tool_result` frame's payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultFrame {
    #[serde(alias = "tool_call_id")]
    pub id: String,
    #[serde(default)]
    pub result: String,
}

/// An `error` frame's payload.
///
/// The backend usually sends a bare string, which is terminal; the
/// structured form can flag an error as recoverable, in which case it is
/// surfaced without ending accumulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ErrorContent {
    Text(String),
    Detailed {
        message: String,
        #[serde(default)]
        recoverable: bool,
    },
}

impl ErrorContent {
    pub fn message(&self) -> &str {
        match self {
            ErrorContent::Text(text) => text,
            ErrorContent::Detailed { message, .. } => message,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            ErrorContent::Text(_) => false,
            ErrorContent::Detailed { recoverable, .. } => *recoverable,
        }
    }
}

/// One discrete frame of the turn protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum StreamFrame {
    /// Partial text delta for the in-progress assistant message
    Token(String),
    /// A complete logical message
    Message(ChatMessage),
    /// Tool invocation announcement
    ToolCall(ToolCallFrame),
    /// Tool completion, correlated by id
    ToolResult(ToolResultFrame),
    /// Custom progress frame, replaced in place by run id
    Custom(ProgressMessage),
    /// Diagnostic, terminal unless flagged recoverable
    Error(ErrorContent),
}

impl StreamFrame {
    /// The frame's type discriminator, for logging.
    pub fn frame_type(&self) -> &'static str {
        match self {
            StreamFrame::Token(_) => "token",
            StreamFrame::Message(_) => "message",
            StreamFrame::ToolCall(_) => "tool_call",
            StreamFrame::ToolResult(_) => "tool_result",
            StreamFrame::Custom(_) => "custom",
            StreamFrame::Error(_) => "error",
        }
    }
}

/// What the relay hands downstream: a frame, or the end of the sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Frame(StreamFrame),
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;

    #[test]
    fn test_token_frame_wire_format() {
        let frame: StreamFrame =
            serde_json::from_str(r#"{"type": "token", "content": "Hel"}"#).unwrap();
        assert_eq!(frame, StreamFrame::Token("Hel".to_string()));
        assert_eq!(frame.frame_type(), "token");
    }

    #[test]
    fn test_message_frame_wire_format() {
        let frame: StreamFrame = serde_json::from_str(
            r#"{"type": "message", "content": {"type": "ai", "content": "Hello"}}"#,
        )
        .unwrap();
        match frame {
            StreamFrame::Message(msg) => {
                assert_eq!(msg.role, MessageRole::Assistant);
                assert_eq!(msg.content, "Hello");
            }
            other => panic!("expected message frame, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_call_frame_wire_format() {
        let frame: StreamFrame = serde_json::from_str(
            r#"{"type": "tool_call", "content": {"id": "a1", "name": "search", "arguments": {"q": "rust"}}}"#,
        )
        .unwrap();
        match frame {
            StreamFrame::ToolCall(call) => {
                assert_eq!(call.id, "a1");
                assert_eq!(call.name, "search");
                assert_eq!(call.arguments["q"], "rust");
            }
            other => panic!("expected tool_call frame, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_result_accepts_correlation_alias() {
        let frame: StreamFrame = serde_json::from_str(
            r#"{"type": "tool_result", "content": {"tool_call_id": "a1", "result": "42"}}"#,
        )
        .unwrap();
        match frame {
            StreamFrame::ToolResult(result) => {
                assert_eq!(result.id, "a1");
                assert_eq!(result.result, "42");
            }
            other => panic!("expected tool_result frame, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_frame_wire_format() {
        let frame: StreamFrame = serde_json::from_str(
            r#"{"type": "custom", "content": {"name": "index", "run_id": "r1", "state": "running", "data": {"step": 2}}}"#,
        )
        .unwrap();
        match frame {
            StreamFrame::Custom(progress) => {
                assert_eq!(progress.run_id, "r1");
                assert_eq!(progress.data["step"], 2);
            }
            other => panic!("expected custom frame, got {other:?}"),
        }
    }

    #[test]
    fn test_error_frame_bare_string_is_terminal() {
        let frame: StreamFrame =
            serde_json::from_str(r#"{"type": "error", "content": "backend exploded"}"#).unwrap();
        match frame {
            StreamFrame::Error(error) => {
                assert_eq!(error.message(), "backend exploded");
                assert!(!error.is_recoverable());
            }
            other => panic!("expected error frame, got {other:?}"),
        }
    }

    #[test]
    fn test_error_frame_structured_recoverable() {
        let frame: StreamFrame = serde_json::from_str(
            r#"{"type": "error", "content": {"message": "tool flaked", "recoverable": true}}"#,
        )
        .unwrap();
        match frame {
            StreamFrame::Error(error) => {
                assert_eq!(error.message(), "tool flaked");
                assert!(error.is_recoverable());
            }
            other => panic!("expected error frame, got {other:?}"),
        }
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = StreamFrame::Token("abc".to_string());
        let json = serde_json::to_string(&frame).unwrap();
        let back: StreamFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame, back);
    }
}

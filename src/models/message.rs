use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::thread::provisional_id;

/// Role of a message in a conversation.
///
/// The agent backend emits `human`/`ai`; those are accepted as aliases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[serde(alias = "human")]
    User,
    #[serde(alias = "ai")]
    Assistant,
    System,
}

/// A complete logical message as sent by the agent backend.
///
/// This is the wire form carried by `message` frames and returned by the
/// non-streaming invoke endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Server-assigned message id, when the backend provides one
    #[serde(default)]
    pub id: Option<String>,
    /// Message kind (the backend tags this field "type")
    #[serde(rename = "type", alias = "role")]
    pub role: MessageRole,
    /// Full message text
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    /// Build an assistant message, as the invoke endpoint returns.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A plain text entry in the visible message timeline.
///
/// While streaming, tokens accumulate in `partial_content`; `finalize`
/// promotes the accumulated text to `content` once the turn settles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineMessage {
    /// Entry id; provisional for in-flight assistant messages
    pub id: String,
    pub role: MessageRole,
    /// Settled message text
    pub content: String,
    /// Text accumulated during streaming
    #[serde(default)]
    pub partial_content: String,
    /// Whether tokens are still arriving for this entry
    #[serde(default)]
    pub is_streaming: bool,
    /// Whether this entry represents a surfaced error
    #[serde(default)]
    pub is_error: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TimelineMessage {
    /// A settled message with the given role.
    pub fn finalized(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: provisional_id(),
            role,
            content: content.into(),
            partial_content: String::new(),
            is_streaming: false,
            is_error: false,
            created_at: Utc::now(),
        }
    }

    /// A finalized user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::finalized(MessageRole::User, content)
    }

    /// An empty assistant placeholder awaiting streamed tokens.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: MessageRole::Assistant,
            content: String::new(),
            partial_content: String::new(),
            is_streaming: true,
            is_error: false,
            created_at: Utc::now(),
        }
    }

    /// A finalized error entry surfaced into the timeline.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            id: provisional_id(),
            role: MessageRole::System,
            content: message.into(),
            partial_content: String::new(),
            is_streaming: false,
            is_error: true,
            created_at: Utc::now(),
        }
    }

    /// Append a streamed token to the partial content.
    pub fn append_token(&mut self, token: &str) {
        self.partial_content.push_str(token);
    }

    /// Finalize the message by moving partial content to content and
    /// marking streaming as complete. No-op on settled messages.
    pub fn finalize(&mut self) {
        if self.is_streaming {
            self.content = std::mem::take(&mut self.partial_content);
            self.is_streaming = false;
        }
    }

    /// The text a renderer should currently display.
    pub fn visible_text(&self) -> &str {
        if self.is_streaming {
            &self.partial_content
        } else {
            &self.content
        }
    }
}

/// Execution status of a tool invocation entry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    #[default]
    Running,
    Complete,
}

/// A tool invocation shown as its own timeline entry.
///
/// Created by a `tool_call` frame; the matching `tool_result` frame fills
/// in `result` by correlation id, never creating a second entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMessage {
    pub tool_call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub status: ToolStatus,
}

impl ToolMessage {
    pub fn new(tool_call_id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            arguments,
            result: None,
            status: ToolStatus::Running,
        }
    }

    /// Attach the result and mark the invocation complete.
    pub fn complete(&mut self, result: impl Into<String>) {
        self.result = Some(result.into());
        self.status = ToolStatus::Complete;
    }
}

/// Lifecycle state of a custom progress entry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgressState {
    #[default]
    New,
    Running,
    Complete,
}

/// A custom progress frame's payload, rendered as a single evolving entry.
///
/// Identified by `run_id`; a later frame with the same `run_id` replaces
/// the earlier entry in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressMessage {
    pub name: String,
    pub run_id: String,
    #[serde(default)]
    pub state: ProgressState,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// One entry in a thread's visible message timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineItem {
    Message(TimelineMessage),
    Tool(ToolMessage),
    Progress(ProgressMessage),
}

impl TimelineItem {
    /// The identity under which this entry is addressed.
    pub fn id(&self) -> &str {
        match self {
            TimelineItem::Message(m) => &m.id,
            TimelineItem::Tool(t) => &t.tool_call_id,
            TimelineItem::Progress(p) => &p.run_id,
        }
    }

    pub fn as_message(&self) -> Option<&TimelineMessage> {
        match self {
            TimelineItem::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_tool(&self) -> Option<&ToolMessage> {
        match self {
            TimelineItem::Tool(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_progress(&self) -> Option<&ProgressMessage> {
        match self {
            TimelineItem::Progress(p) => Some(p),
            _ => None,
        }
    }
}

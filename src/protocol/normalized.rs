use serde::{Deserialize, Serialize};

/// Role of a message in the normalized conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A single part of a message's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NormalizedPart {
    Text {
        text: String,
    },
    /// Either a `data:<mime>;base64,<payload>` URI or any other reference
    /// (usually an http URL).
    Image {
        image: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolResult {
        #[serde(default)]
        tool_call_id: Option<String>,
        #[serde(default)]
        tool_name: Option<String>,
        result: serde_json::Value,
    },
}

impl NormalizedPart {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        NormalizedPart::Text { text: text.into() }
    }

    #[must_use]
    pub fn image(image: impl Into<String>) -> Self {
        NormalizedPart::Image {
            image: image.into(),
        }
    }
}

/// A single message in the normalized conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub role: NormalizedRole,
    pub content: Vec<NormalizedPart>,
}

impl NormalizedMessage {
    #[must_use]
    pub fn new(role: NormalizedRole, content: Vec<NormalizedPart>) -> Self {
        Self { role, content }
    }

    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(NormalizedRole::System, vec![NormalizedPart::text(text)])
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(NormalizedRole::User, vec![NormalizedPart::text(text)])
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(NormalizedRole::Assistant, vec![NormalizedPart::text(text)])
    }

    /// A tool message carrying one result.
    #[must_use]
    pub fn tool_result(
        tool_call_id: Option<String>,
        tool_name: Option<String>,
        result: serde_json::Value,
    ) -> Self {
        Self::new(
            NormalizedRole::Tool,
            vec![NormalizedPart::ToolResult {
                tool_call_id,
                tool_name,
                result,
            }],
        )
    }
}

/// Closed set of reasons a stream finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    Other,
    #[default]
    Unknown,
}

impl FinishReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content-filter",
            FinishReason::ToolCalls => "tool-calls",
            FinishReason::Error => "error",
            FinishReason::Other => "other",
            FinishReason::Unknown => "unknown",
        }
    }
}

/// Token usage reported on the finish event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
}

/// The only event type exposed to stream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientStreamEvent {
    TextDelta {
        id: String,
        delta: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCallDelta {
        tool_call_id: String,
        tool_name: String,
        args_text_delta: String,
    },
    Finish {
        reason: FinishReason,
        usage: Usage,
    },
}

impl ClientStreamEvent {
    #[must_use]
    pub fn is_finish(&self) -> bool {
        matches!(self, ClientStreamEvent::Finish { .. })
    }
}

use serde_json::json;

use crate::config::BodyCasing;
use crate::protocol::adk::{FunctionCall, FunctionResponse, InlineData, RemoteMessage, RemotePart};
use crate::protocol::mapping::normalized_role_to_remote;
use crate::protocol::normalized::{NormalizedMessage, NormalizedPart, NormalizedRole};

const UNKNOWN_TOOL_FIELD: &str = "unknown";
const INLINE_IMAGE_DISPLAY_NAME: &str = "image.png";

/// Translate a whole normalized conversation into ADK messages, preserving order.
#[must_use]
pub fn to_remote_messages(conversation: &[NormalizedMessage]) -> Vec<RemoteMessage> {
    conversation.iter().map(to_remote_message).collect()
}

/// Translate the final message of a conversation, which is all `/run_sse`
/// needs: the service keeps earlier turns in the session.
#[must_use]
pub fn last_remote_message(conversation: &[NormalizedMessage]) -> Option<RemoteMessage> {
    conversation.last().map(to_remote_message)
}

/// Translate one normalized message into an ADK message.
#[must_use]
pub fn to_remote_message(message: &NormalizedMessage) -> RemoteMessage {
    let role = normalized_role_to_remote(message.role);
    let parts = match message.role {
        NormalizedRole::System | NormalizedRole::User => encode_user_parts(&message.content),
        NormalizedRole::Assistant => encode_assistant_parts(&message.content),
        NormalizedRole::Tool => encode_tool_parts(&message.content),
    };
    RemoteMessage { role, parts }
}

fn encode_user_parts(content: &[NormalizedPart]) -> Vec<RemotePart> {
    let mut parts = Vec::with_capacity(content.len());
    for part in content {
        match part {
            NormalizedPart::Text { text } => parts.push(RemotePart::Text(text.clone())),
            NormalizedPart::Image { image } => parts.push(encode_image(image)),
            NormalizedPart::ToolCall { .. } | NormalizedPart::ToolResult { .. } => {
                tracing::debug!("ADK encoder: tool part in user message skipped");
            }
        }
    }
    parts
}

fn encode_assistant_parts(content: &[NormalizedPart]) -> Vec<RemotePart> {
    let mut parts = Vec::with_capacity(content.len());
    for part in content {
        match part {
            NormalizedPart::Text { text } => parts.push(RemotePart::Text(text.clone())),
            NormalizedPart::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => parts.push(RemotePart::FunctionCall(FunctionCall {
                id: Some(tool_call_id.clone()),
                name: tool_name.clone(),
                args: args.clone(),
            })),
            NormalizedPart::Image { .. } | NormalizedPart::ToolResult { .. } => {
                tracing::debug!("ADK encoder: unsupported assistant part skipped");
            }
        }
    }
    parts
}

fn encode_tool_parts(content: &[NormalizedPart]) -> Vec<RemotePart> {
    let mut parts: Vec<RemotePart> = content
        .iter()
        .filter_map(|part| match part {
            NormalizedPart::ToolResult {
                tool_call_id,
                tool_name,
                result,
            } => Some(RemotePart::FunctionResponse(FunctionResponse {
                id: Some(
                    tool_call_id
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_TOOL_FIELD.to_string()),
                ),
                name: tool_name
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_TOOL_FIELD.to_string()),
                response: wrap_function_response(result.clone()),
            })),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        // Tool message without a structured result: forward the raw content.
        let raw = serde_json::to_value(content).unwrap_or(serde_json::Value::Null);
        parts.push(RemotePart::FunctionResponse(FunctionResponse {
            id: Some(UNKNOWN_TOOL_FIELD.to_string()),
            name: UNKNOWN_TOOL_FIELD.to_string(),
            response: wrap_function_response(raw),
        }));
    }
    parts
}

/// Function responses must be JSON objects on the wire.
fn wrap_function_response(value: serde_json::Value) -> serde_json::Value {
    if value.is_object() {
        value
    } else {
        json!({ "result": value })
    }
}

/// Map an image reference to an ADK part.
///
/// `data:<mime>;base64,<payload>` becomes inline data. Anything else becomes
/// a text placeholder naming the reference: the schema has no URL image part.
#[must_use]
pub fn encode_image(image: &str) -> RemotePart {
    if let Some((mime_type, data)) = split_base64_data_uri(image) {
        return RemotePart::InlineData(InlineData {
            display_name: INLINE_IMAGE_DISPLAY_NAME.to_string(),
            data: data.to_string(),
            mime_type: mime_type.to_string(),
        });
    }
    let reference = if image.trim().is_empty() {
        "uploaded image"
    } else {
        image
    };
    tracing::debug!("ADK encoder: non-inline image mapped as text reference");
    RemotePart::Text(format!("[Image: {reference}]"))
}

fn split_base64_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    };
    Some((mime_type, payload))
}

/// Body of a `POST /run_sse` call.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: RemoteMessage,
    pub streaming: bool,
}

impl RunRequest {
    /// Render the body with the configured key casing. Nested message keys
    /// (`inlineData`, `functionCall`, ...) are camelCase in both shapes.
    #[must_use]
    pub fn to_body(&self, casing: BodyCasing) -> serde_json::Value {
        match casing {
            BodyCasing::Camel => json!({
                "appName": self.app_name,
                "userId": self.user_id,
                "sessionId": self.session_id,
                "newMessage": self.new_message,
                "streaming": self.streaming,
            }),
            BodyCasing::Snake => json!({
                "app_name": self.app_name,
                "user_id": self.user_id,
                "session_id": self.session_id,
                "new_message": self.new_message,
                "streaming": self.streaming,
            }),
        }
    }
}

pub mod encoder;
pub mod stream;

use serde::{Deserialize, Deserializer, Serialize};

/// Message role in the ADK schema. There is no system role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum RemoteRole {
    User,
    #[default]
    Model,
}

impl From<String> for RemoteRole {
    fn from(value: String) -> Self {
        if value == "user" {
            RemoteRole::User
        } else {
            RemoteRole::Model
        }
    }
}

/// Base64 payload with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub display_name: String,
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub response: serde_json::Value,
}

/// A single part within an ADK message.
///
/// Serializes as a single-key object (`{"text": ...}`, `{"functionCall": ...}`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RemotePart {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "inlineData")]
    InlineData(InlineData),
    #[serde(rename = "functionCall")]
    FunctionCall(FunctionCall),
    #[serde(rename = "functionResponse")]
    FunctionResponse(FunctionResponse),
}

/// Incoming part shape. The service may attach extra keys (`thought`,
/// `thoughtSignature`, ...) next to the payload key, so parts are read as an
/// optional-field struct and narrowed afterwards.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PartWire {
    text: Option<String>,
    inline_data: Option<InlineData>,
    function_call: Option<FunctionCall>,
    function_response: Option<FunctionResponse>,
}

impl PartWire {
    fn into_part(self) -> Option<RemotePart> {
        if let Some(call) = self.function_call {
            return Some(RemotePart::FunctionCall(call));
        }
        if let Some(response) = self.function_response {
            return Some(RemotePart::FunctionResponse(response));
        }
        if let Some(data) = self.inline_data {
            return Some(RemotePart::InlineData(data));
        }
        self.text.map(RemotePart::Text)
    }
}

fn deserialize_parts<'de, D>(deserializer: D) -> Result<Vec<RemotePart>, D::Error>
where
    D: Deserializer<'de>,
{
    let wire: Option<Vec<PartWire>> = Option::deserialize(deserializer)?;
    Ok(wire
        .unwrap_or_default()
        .into_iter()
        .filter_map(PartWire::into_part)
        .collect())
}

/// A content message in ADK format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMessage {
    #[serde(default)]
    pub role: RemoteRole,
    #[serde(default, deserialize_with = "deserialize_parts")]
    pub parts: Vec<RemotePart>,
}

/// Side effects attached to an event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventActions {
    pub state_delta: serde_json::Map<String, serde_json::Value>,
    pub artifact_delta: serde_json::Map<String, serde_json::Value>,
    pub requested_auth_configs: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u64>,
    pub candidates_token_count: Option<u64>,
    pub total_token_count: Option<u64>,
    pub thoughts_token_count: Option<u64>,
}

/// One decoded `data:` frame of a `/run_sse` stream.
///
/// Every field is optional on the wire; absent `partial` means final.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteEvent {
    pub content: Option<RemoteMessage>,
    pub invocation_id: Option<String>,
    pub author: Option<String>,
    pub actions: EventActions,
    pub id: Option<String>,
    pub timestamp: Option<f64>,
    pub partial: Option<bool>,
    pub finish_reason: Option<String>,
    pub usage_metadata: Option<UsageMetadata>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl RemoteEvent {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.partial.unwrap_or(false)
    }

    #[must_use]
    pub fn parts(&self) -> &[RemotePart] {
        self.content
            .as_ref()
            .map_or(&[], |content| content.parts.as_slice())
    }
}

/// Remote conversational session as returned by the session endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    #[serde(alias = "sessionId")]
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub state: serde_json::Map<String, serde_json::Value>,
    pub events: Vec<RemoteEvent>,
    pub last_update_time: f64,
}

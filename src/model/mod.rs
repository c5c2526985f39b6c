mod adk;

pub use adk::{AdkLanguageModel, AdkProvider, PROVIDER_NAME, SPECIFICATION_VERSION};

use crate::error::AdapterError;
use crate::protocol::normalized::{FinishReason, NormalizedMessage, NormalizedPart, Usage};
use crate::stream::ClientEventStream;

/// Input to a model call.
#[derive(Debug, Clone, Default)]
pub struct StreamRequest {
    pub conversation: Vec<NormalizedMessage>,
    /// Overrides the model's own id in logs when set.
    pub model_id: Option<String>,
}

impl StreamRequest {
    #[must_use]
    pub fn new(conversation: Vec<NormalizedMessage>) -> Self {
        Self {
            conversation,
            model_id: None,
        }
    }
}

/// What was actually sent, for callers that record requests.
#[derive(Debug, Clone)]
pub struct RawCall {
    /// Exact JSON body posted to the run endpoint.
    pub raw_prompt: serde_json::Value,
    /// Adapter settings with secrets redacted.
    pub raw_settings: serde_json::Value,
}

pub struct StreamResponse {
    pub stream: ClientEventStream,
    pub raw_call: RawCall,
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("raw_call", &self.raw_call)
            .finish_non_exhaustive()
    }
}

/// Result shape of a non-streaming call. No ADK model produces one.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: Vec<NormalizedPart>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub raw_call: RawCall,
}

/// Vendor-neutral streaming model contract.
pub trait LanguageModel: Send + Sync {
    fn specification_version(&self) -> &'static str;

    fn provider(&self) -> &'static str;

    fn model_id(&self) -> &str;

    /// Start a stream. Connection failures and a non-2xx answer from the run
    /// endpoint fail here; later failures arrive as a terminal stream item.
    fn do_stream(
        &self,
        request: StreamRequest,
    ) -> impl std::future::Future<Output = Result<StreamResponse, AdapterError>> + Send;

    /// Generate a whole response in one call.
    fn do_generate(
        &self,
        request: StreamRequest,
    ) -> impl std::future::Future<Output = Result<GenerateResponse, AdapterError>> + Send;
}

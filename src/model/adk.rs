use std::sync::Arc;

use futures_util::StreamExt;

use super::{GenerateResponse, LanguageModel, RawCall, StreamRequest, StreamResponse};
use crate::config::{AgentConfig, AppConfig, HttpConfig};
use crate::error::AdapterError;
use crate::observability::StreamUsageLog;
use crate::protocol::adk::encoder::{last_remote_message, RunRequest};
use crate::session::{endpoint_url, SessionManager};
use crate::stream::{client_event_stream, ClientEventStream};
use crate::transport::HttpTransport;

pub const PROVIDER_NAME: &str = "google-adk";
pub const SPECIFICATION_VERSION: &str = "v2";

const RUN_SSE_SEGMENT: &str = "run_sse";

/// Factory for ADK-backed models sharing one config and one HTTP client.
#[derive(Debug, Clone)]
pub struct AdkProvider {
    agent: Arc<AgentConfig>,
    transport: Arc<HttpTransport>,
}

impl AdkProvider {
    /// # Errors
    ///
    /// Returns [`AdapterError::Config`] when the HTTP client cannot be built.
    pub fn new(agent: AgentConfig, http: &HttpConfig) -> Result<Self, AdapterError> {
        let transport = HttpTransport::new(http, agent.api_key.as_deref())?;
        Ok(Self {
            agent: Arc::new(agent),
            transport: Arc::new(transport),
        })
    }

    /// # Errors
    ///
    /// Same as [`AdkProvider::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, AdapterError> {
        Self::new(config.agent.clone(), &config.http)
    }

    #[must_use]
    pub fn agent(&self) -> &AgentConfig {
        &self.agent
    }

    /// A model with its own current-session reference.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Config`] when the agent base URL does not parse.
    pub fn language_model(&self, model_id: impl Into<String>) -> Result<AdkLanguageModel, AdapterError> {
        let sessions = SessionManager::new(&self.agent, Arc::clone(&self.transport))?;
        Ok(AdkLanguageModel {
            model_id: model_id.into(),
            agent: Arc::clone(&self.agent),
            transport: Arc::clone(&self.transport),
            sessions: Arc::new(sessions),
        })
    }

    /// A model using the configured default model id.
    ///
    /// # Errors
    ///
    /// Same as [`AdkProvider::language_model`].
    pub fn default_model(&self) -> Result<AdkLanguageModel, AdapterError> {
        self.language_model(self.agent.model_id.clone())
    }
}

/// Streaming model backed by an ADK agent's `/run_sse` endpoint.
///
/// Clones share the session reference. Concurrent streams on one instance
/// also share it; use separate models for independent conversations.
#[derive(Debug, Clone)]
pub struct AdkLanguageModel {
    model_id: String,
    agent: Arc<AgentConfig>,
    transport: Arc<HttpTransport>,
    sessions: Arc<SessionManager>,
}

impl AdkLanguageModel {
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn run_request(
        &self,
        request: &StreamRequest,
        user_id: String,
        session_id: String,
    ) -> Result<RunRequest, AdapterError> {
        let new_message = last_remote_message(&request.conversation).ok_or_else(|| {
            AdapterError::InvalidRequest("conversation has no messages".to_string())
        })?;
        Ok(RunRequest {
            app_name: self.agent.app_name.clone(),
            user_id,
            session_id,
            new_message,
            streaming: self.agent.streaming,
        })
    }

    /// Like [`LanguageModel::do_stream`], with any startup error delivered as
    /// the single item of the returned stream.
    #[must_use]
    pub fn stream(&self, request: StreamRequest) -> ClientEventStream {
        let model = self.clone();
        let events = futures_util::stream::once(async move { model.do_stream(request).await })
            .flat_map(|result| match result {
                Ok(response) => response.stream,
                Err(err) => Box::pin(futures_util::stream::once(futures_util::future::ready(
                    Err(err),
                ))) as ClientEventStream,
            });
        Box::pin(events)
    }
}

impl LanguageModel for AdkLanguageModel {
    fn specification_version(&self) -> &'static str {
        SPECIFICATION_VERSION
    }

    fn provider(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn do_stream(&self, request: StreamRequest) -> Result<StreamResponse, AdapterError> {
        if request.conversation.is_empty() {
            return Err(AdapterError::InvalidRequest(
                "conversation has no messages".to_string(),
            ));
        }
        let session = self.sessions.ensure_session().await;
        let run = self.run_request(&request, session.user_id, session.session_id)?;
        let body = run.to_body(self.agent.body_casing);
        let url = endpoint_url(self.sessions.base_url(), &[RUN_SSE_SEGMENT])?;

        tracing::debug!(
            app_name = %run.app_name,
            session_id = %run.session_id,
            casing = %self.agent.body_casing,
            "opening ADK run stream"
        );
        let response = self.transport.open_stream(url, &body).await?;

        let model_name = request.model_id.unwrap_or_else(|| self.model_id.clone());
        let mut usage_log = StreamUsageLog::new(model_name);
        let events = client_event_stream(response.bytes_stream()).inspect(move |item| {
            if let Ok(event) = item {
                usage_log.observe(event);
            }
        });

        Ok(StreamResponse {
            stream: Box::pin(events),
            raw_call: RawCall {
                raw_prompt: body,
                raw_settings: self.agent.redacted_settings(),
            },
        })
    }

    async fn do_generate(&self, _request: StreamRequest) -> Result<GenerateResponse, AdapterError> {
        Err(AdapterError::UnsupportedOperation(
            "ADK agents only support streaming; use do_stream".to_string(),
        ))
    }
}

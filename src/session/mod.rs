//! Remote session lifecycle for one adapter instance.
//!
//! The service owns sessions; the manager only keeps a reference to the
//! current one plus the last copy returned by a create/get/update call.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::config::AgentConfig;
use crate::error::AdapterError;
use crate::protocol::adk::Session;
use crate::transport::HttpTransport;
use crate::util::unix_now_millis;

/// The `(user, session)` pair a stream runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionRef {
    pub user_id: String,
    pub session_id: String,
}

impl SessionRef {
    #[must_use]
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// Append escaped path segments to a base URL.
pub(crate) fn endpoint_url(base: &url::Url, segments: &[&str]) -> Result<url::Url, AdapterError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| AdapterError::Config(format!("base URL cannot carry a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Session CRUD plus the adapter's single current-session reference.
#[derive(Debug)]
pub struct SessionManager {
    transport: Arc<HttpTransport>,
    base_url: url::Url,
    app_name: String,
    fixed_user_id: Option<String>,
    current: Mutex<Option<SessionRef>>,
    cached: Mutex<Option<Session>>,
}

impl SessionManager {
    /// # Errors
    ///
    /// Returns [`AdapterError::Config`] when the base URL does not parse.
    pub fn new(agent: &AgentConfig, transport: Arc<HttpTransport>) -> Result<Self, AdapterError> {
        let base_url = url::Url::parse(agent.session_base_url())
            .map_err(|err| AdapterError::Config(format!("Invalid agent base_url: {err}")))?;
        Ok(Self {
            transport,
            base_url,
            app_name: agent.app_name.clone(),
            fixed_user_id: agent
                .user_id
                .clone()
                .filter(|user_id| !user_id.trim().is_empty()),
            current: Mutex::new(None),
            cached: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &url::Url {
        &self.base_url
    }

    fn session_url(&self, user_id: &str, session_id: &str) -> Result<url::Url, AdapterError> {
        endpoint_url(
            &self.base_url,
            &[
                "apps",
                &self.app_name,
                "users",
                user_id,
                "sessions",
                session_id,
            ],
        )
    }

    fn decode_session(&self, bytes: &[u8]) -> Result<Session, AdapterError> {
        let session: Session = serde_json::from_slice(bytes).map_err(|err| {
            AdapterError::InvalidResponse(format!("session body did not decode: {err}"))
        })?;
        *self.cached.lock() = Some(session.clone());
        Ok(session)
    }

    /// Create a session, optionally seeding its state.
    ///
    /// # Errors
    ///
    /// [`AdapterError::TransportUnavailable`] when the service cannot be
    /// reached, [`AdapterError::RemoteRejected`] for a non-2xx answer, and
    /// [`AdapterError::InvalidResponse`] when the body is not a session.
    pub async fn create_session(
        &self,
        user_id: &str,
        session_id: &str,
        initial_state: Option<&Map<String, Value>>,
    ) -> Result<Session, AdapterError> {
        let url = self.session_url(user_id, session_id)?;
        let body = Value::Object(initial_state.cloned().unwrap_or_default());
        let bytes = self
            .transport
            .send_json(http::Method::POST, url, Some(&body))
            .await?;
        tracing::debug!(user_id, session_id, "ADK session created");
        self.decode_session(&bytes)
    }

    /// Fetch a session. Also usable to check that a pinned reference is live.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::create_session`].
    pub async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Session, AdapterError> {
        let url = self.session_url(user_id, session_id)?;
        let bytes = self
            .transport
            .send_json(http::Method::GET, url, None)
            .await?;
        self.decode_session(&bytes)
    }

    /// Merge `state_delta` into the session state. Keys in the delta
    /// overwrite; the service keeps every other key.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::create_session`].
    pub async fn update_session(
        &self,
        user_id: &str,
        session_id: &str,
        state_delta: &Map<String, Value>,
    ) -> Result<Session, AdapterError> {
        let url = self.session_url(user_id, session_id)?;
        let body = serde_json::json!({ "stateDelta": state_delta });
        let bytes = self
            .transport
            .send_json(http::Method::PATCH, url, Some(&body))
            .await?;
        self.decode_session(&bytes)
    }

    /// Delete a session. Any 2xx (including 204) is success, and so is 404,
    /// so deleting twice is not an error.
    ///
    /// The current-session reference is left alone; release it with
    /// [`SessionManager::clear_current_session`].
    ///
    /// # Errors
    ///
    /// [`AdapterError::TransportUnavailable`] or a non-404
    /// [`AdapterError::RemoteRejected`].
    pub async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<(), AdapterError> {
        let url = self.session_url(user_id, session_id)?;
        match self
            .transport
            .send_json(http::Method::DELETE, url, None)
            .await
        {
            Ok(_) => {}
            Err(err) if err.is_not_found() => {
                tracing::debug!(user_id, session_id, "ADK session already absent");
            }
            Err(err) => return Err(err),
        }
        let mut cached = self.cached.lock();
        if cached
            .as_ref()
            .is_some_and(|session| session.id == session_id && session.user_id == user_id)
        {
            *cached = None;
        }
        Ok(())
    }

    pub fn set_current_session(&self, session: SessionRef) {
        *self.current.lock() = Some(session);
    }

    pub fn clear_current_session(&self) {
        *self.current.lock() = None;
    }

    #[must_use]
    pub fn current_session(&self) -> Option<SessionRef> {
        self.current.lock().clone()
    }

    /// Last session body returned by the service, if any.
    #[must_use]
    pub fn cached_session(&self) -> Option<Session> {
        self.cached.lock().clone()
    }

    /// Fresh ids: `s_<millis>_<uuid>` for the session, and either the
    /// configured user id or `u_<uuid>`.
    #[must_use]
    pub fn synthesize_ref(&self) -> SessionRef {
        let user_id = self
            .fixed_user_id
            .clone()
            .unwrap_or_else(|| format!("u_{}", uuid::Uuid::new_v4().simple()));
        let session_id = format!("s_{}_{}", unix_now_millis(), uuid::Uuid::new_v4().simple());
        SessionRef {
            user_id,
            session_id,
        }
    }

    /// Return the current session, creating one first if there is none.
    ///
    /// Creation failure never fails the caller: it is logged and the
    /// synthesized ids are used anyway, since the service may create the
    /// session itself on the first run. The ids become the current session
    /// either way so later turns keep the same conversation.
    pub async fn ensure_session(&self) -> SessionRef {
        if let Some(current) = self.current_session() {
            return current;
        }
        let session = self.synthesize_ref();
        if let Err(err) = self
            .create_session(&session.user_id, &session.session_id, None)
            .await
        {
            let err = err.into_bootstrap_failure();
            tracing::warn!(
                user_id = %session.user_id,
                session_id = %session.session_id,
                error = %err,
                "failed to create ADK session, continuing anyway"
            );
        }
        self.set_current_session(session.clone());
        session
    }
}

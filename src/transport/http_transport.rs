use std::time::Duration;

use http::header::{HeaderValue, ACCEPT, AUTHORIZATION};

use crate::config::HttpConfig;
use crate::error::AdapterError;

const EVENT_STREAM: &str = "text/event-stream";

fn build_reqwest_client(config: &HttpConfig) -> Result<reqwest::Client, AdapterError> {
    let pool_idle_timeout = if config.pool_idle_timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(config.pool_idle_timeout_secs))
    };

    // Timeouts are per request: session calls and streams differ.
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(reqwest::redirect::Policy::none());

    if let Some(proxy_url) = config.proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| AdapterError::Config(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !config.use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| AdapterError::Config(format!("Failed to build HTTP client: {err}")))
}

fn bearer_header(api_key: &str) -> Result<HeaderValue, AdapterError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| AdapterError::Config("api_key contains invalid header characters".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// HTTP client for the agent service: JSON session calls and the SSE run
/// endpoint. Requests are sent once; there are no retries.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    request_timeout: Duration,
    stream_timeout: Option<Duration>,
    authorization: Option<HeaderValue>,
}

impl HttpTransport {
    /// Build a transport from the `http` config section.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Config`] for an invalid proxy URL or an API key
    /// that cannot be sent as a header.
    pub fn new(config: &HttpConfig, api_key: Option<&str>) -> Result<Self, AdapterError> {
        let authorization = api_key
            .filter(|key| !key.trim().is_empty())
            .map(bearer_header)
            .transpose()?;
        Ok(Self {
            client: build_reqwest_client(config)?,
            request_timeout: Duration::from_secs(config.timeout_secs),
            stream_timeout: config.stream_timeout_secs.map(Duration::from_secs),
            authorization,
        })
    }

    #[must_use]
    pub fn has_authorization(&self) -> bool {
        self.authorization.is_some()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn request(&self, method: http::Method, url: url::Url) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(value) = self.authorization.as_ref() {
            builder = builder.header(AUTHORIZATION, value.clone());
        }
        builder
    }

    /// Send a bounded JSON request and return the body of a 2xx response.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::TransportUnavailable`] when the request cannot
    /// be sent or its body cannot be read, and
    /// [`AdapterError::RemoteRejected`] for any non-2xx status.
    pub async fn send_json(
        &self,
        method: http::Method,
        url: url::Url,
        body: Option<&serde_json::Value>,
    ) -> Result<bytes::Bytes, AdapterError> {
        let mut builder = self
            .request(method.clone(), url.clone())
            .timeout(self.request_timeout);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(|err| {
            tracing::debug!(%method, %url, error = %err, "ADK request failed to send");
            AdapterError::TransportUnavailable(err.to_string())
        })?;
        let response = check_status(response).await?;
        response
            .bytes()
            .await
            .map_err(|err| AdapterError::TransportUnavailable(err.to_string()))
    }

    /// POST a JSON body to an SSE endpoint and return the open response.
    ///
    /// The status is checked before any body byte is read, so a rejected run
    /// fails here rather than inside the event stream.
    ///
    /// # Errors
    ///
    /// Same as [`HttpTransport::send_json`].
    pub async fn open_stream(
        &self,
        url: url::Url,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, AdapterError> {
        let mut builder = self
            .request(http::Method::POST, url)
            .header(ACCEPT, HeaderValue::from_static(EVENT_STREAM))
            .json(body);
        if let Some(timeout) = self.stream_timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| AdapterError::TransportUnavailable(err.to_string()))?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), "ADK service returned non-success status");
    Err(AdapterError::RemoteRejected {
        status: status.as_u16(),
        body,
    })
}

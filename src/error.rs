/// Error type used across the adapter.
///
/// `MalformedFrame` and `SessionBootstrapFailed` are only ever logged; no
/// public operation returns them.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),
    #[error("Remote rejected request: status={status}, body={body}")]
    RemoteRejected { status: u16, body: String },
    #[error("Malformed SSE frame: {0}")]
    MalformedFrame(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("Session bootstrap failed: {0}")]
    SessionBootstrapFailed(String),
    #[error("Invalid response from remote: {0}")]
    InvalidResponse(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category, used for logging and for callers that want to
/// branch without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    NotFound,
    Rejected,
    Protocol,
    Unsupported,
    Config,
}

/// Map a remote HTTP status code to an error category.
#[must_use]
pub fn category_from_remote_status(status: u16) -> ErrorCategory {
    match status {
        404 => ErrorCategory::NotFound,
        500..=599 => ErrorCategory::Transport,
        _ => ErrorCategory::Rejected,
    }
}

impl AdapterError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            AdapterError::Config(_) | AdapterError::Internal(_) => ErrorCategory::Config,
            AdapterError::TransportUnavailable(_) => ErrorCategory::Transport,
            AdapterError::RemoteRejected { status, .. } => category_from_remote_status(*status),
            AdapterError::MalformedFrame(_)
            | AdapterError::InvalidResponse(_)
            | AdapterError::SessionBootstrapFailed(_) => ErrorCategory::Protocol,
            AdapterError::UnsupportedOperation(_) | AdapterError::InvalidRequest(_) => {
                ErrorCategory::Unsupported
            }
        }
    }

    /// True when the remote answered `404 Not Found`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Wrap an error raised while auto-creating a session for a stream.
    #[must_use]
    pub fn into_bootstrap_failure(self) -> AdapterError {
        match self {
            AdapterError::SessionBootstrapFailed(_) => self,
            other => AdapterError::SessionBootstrapFailed(other.to_string()),
        }
    }
}

impl From<crate::config::ConfigError> for AdapterError {
    fn from(err: crate::config::ConfigError) -> Self {
        AdapterError::Config(err.to_string())
    }
}

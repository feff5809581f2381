use thiserror::Error;

/// Errors returned by a chat service client.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Transport-level failure (connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The service rejected the supplied credentials or token.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// An operation exceeded its allowed time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The client-specific configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ChannelError {
    /// Transient faults are expected to clear on a later tick.
    pub fn is_transient(&self) -> bool {
        match self {
            ChannelError::Http(_) | ChannelError::Timeout { .. } | ChannelError::Parse(_) => true,
            ChannelError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

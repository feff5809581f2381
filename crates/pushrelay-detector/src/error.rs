use thiserror::Error;

/// Errors produced while building or running a detector.
#[derive(Debug, Error)]
pub enum DetectError {
    /// A pattern string failed to compile.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The detector has no backend to classify with.
    #[error("detector not implemented: {0}")]
    NotImplemented(String),

    /// The classifier backend failed or answered with something unusable.
    #[error("classifier backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, DetectError>;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pushrelay_core::Attachment;

use crate::error::Result;

/// Result of classifying one message. Produced fresh per message, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    pub is_push_request: bool,
    /// Job identifier extracted from the text, if any.
    pub job_id: Option<String>,
    pub has_attachment: bool,
    /// Confidence in `[0, 1]`. Pattern matches are always 1.0.
    pub confidence: f32,
}

impl DetectionOutcome {
    /// A "not a push request" outcome.
    pub fn negative() -> Self {
        Self {
            is_push_request: false,
            job_id: None,
            has_attachment: false,
            confidence: 1.0,
        }
    }

    pub fn matched(job_id: Option<String>, attachments: &[Attachment], confidence: f32) -> Self {
        Self {
            is_push_request: true,
            job_id,
            has_attachment: !attachments.is_empty(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Common interface for every message classifier.
///
/// Empty or absent text must yield [`DetectionOutcome::negative`] for every
/// implementation. Async so that network-backed classifiers fit the same
/// capability as the in-process pattern matcher.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detector name for logging.
    fn name(&self) -> &str;

    async fn detect(&self, text: Option<&str>, attachments: &[Attachment])
        -> Result<DetectionOutcome>;
}

/// Non-empty text or `None`.
pub(crate) fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}

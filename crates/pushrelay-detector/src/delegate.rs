use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use pushrelay_core::Attachment;

use crate::detector::{non_empty, DetectionOutcome, Detector};
use crate::error::{DetectError, Result};

/// Confidence assigned to outcomes produced by a classifier backend.
pub const DELEGATE_CONFIDENCE: f32 = 0.9;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a message analyzer. \
Determine if the message is asking someone to push or prioritize a job. \
If yes, extract the job ID if mentioned. \
Respond in JSON only: {\"is_push_request\": true|false, \"job_id\": \"<id>\"|null}";

/// A higher-cost classifier (e.g. a language model) behind [`DelegateDetector`].
#[async_trait]
pub trait ClassifierBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Classify `text` and return the raw JSON reply described by the system prompt.
    async fn classify(&self, system_prompt: &str, text: &str) -> Result<String>;
}

/// Detector that defers to a pluggable classifier backend.
///
/// Without a backend every call fails with [`DetectError::NotImplemented`];
/// it never silently reports "not a push request".
pub struct DelegateDetector {
    backend: Option<Arc<dyn ClassifierBackend>>,
    system_prompt: String,
}

#[derive(Debug, Deserialize)]
struct ClassifierReply {
    is_push_request: bool,
    #[serde(default)]
    job_id: Option<String>,
}

impl DelegateDetector {
    /// A detector with no backend attached yet.
    pub fn unconfigured() -> Self {
        Self {
            backend: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_backend(backend: Arc<dyn ClassifierBackend>) -> Self {
        Self {
            backend: Some(backend),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }
}

/// Parse a backend reply, tolerating prose or code fences around the JSON object.
fn parse_reply(raw: &str) -> Result<ClassifierReply> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &raw[s..=e],
        _ => return Err(DetectError::Backend(format!("no JSON object in reply: {raw}"))),
    };
    serde_json::from_str(json).map_err(|e| DetectError::Backend(e.to_string()))
}

#[async_trait]
impl Detector for DelegateDetector {
    fn name(&self) -> &str {
        "delegate"
    }

    async fn detect(
        &self,
        text: Option<&str>,
        attachments: &[Attachment],
    ) -> Result<DetectionOutcome> {
        let Some(text) = non_empty(text) else {
            return Ok(DetectionOutcome::negative());
        };
        let Some(backend) = &self.backend else {
            return Err(DetectError::NotImplemented(
                "delegate detector has no classifier backend configured".to_string(),
            ));
        };

        let raw = backend.classify(&self.system_prompt, text).await?;
        let reply = parse_reply(&raw)?;
        debug!(backend = %backend.name(), is_push_request = reply.is_push_request, "classifier replied");

        if !reply.is_push_request {
            return Ok(DetectionOutcome::negative());
        }
        let job_id = reply.job_id.filter(|j| !j.trim().is_empty());
        Ok(DetectionOutcome::matched(job_id, attachments, DELEGATE_CONFIDENCE))
    }
}

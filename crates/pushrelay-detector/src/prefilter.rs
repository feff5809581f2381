use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use pushrelay_core::Attachment;

use crate::detector::{non_empty, DetectionOutcome, Detector};
use crate::error::Result;

// Both patterns are constant and compiled by `keyword_regexes_compile` below.

/// push / pushed / pushing / pushes, any case, whole word.
static PUSH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpush(?:ed|ing|es)?\b").expect("push keyword regex"));

/// Upper-case "IT" as a standalone word. Never "it", "bit" or "with".
static IT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bIT\b").expect("IT keyword regex"));

/// True when `text` contains a push keyword or the standalone acronym "IT".
pub fn matches_keywords(text: &str) -> bool {
    PUSH_RE.is_match(text) || IT_RE.is_match(text)
}

/// Keyword gate in front of another detector.
///
/// Text without a trigger word is rejected without calling the inner
/// detector, which keeps expensive classifiers off ordinary chatter. When a
/// trigger fires the inner outcome is returned unchanged. Wrappers nest.
pub struct KeywordPreFilter {
    inner: Arc<dyn Detector>,
}

impl KeywordPreFilter {
    pub fn new(inner: Arc<dyn Detector>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Detector for KeywordPreFilter {
    fn name(&self) -> &str {
        "keyword-prefilter"
    }

    async fn detect(
        &self,
        text: Option<&str>,
        attachments: &[Attachment],
    ) -> Result<DetectionOutcome> {
        let Some(text) = non_empty(text) else {
            return Ok(DetectionOutcome::negative());
        };
        if !matches_keywords(text) {
            debug!(inner = %self.inner.name(), "no trigger keyword, skipping inner detector");
            return Ok(DetectionOutcome::negative());
        }
        self.inner.detect(Some(text), attachments).await
    }
}

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use pushrelay_core::Attachment;

use crate::detector::{non_empty, DetectionOutcome, Detector};
use crate::error::{DetectError, Result};

/// Regex-based detector.
///
/// Patterns are tried in declaration order and the first match wins. When
/// the winning pattern has a capture group, group 1 is the job id.
#[derive(Debug, Default)]
pub struct PatternDetector {
    patterns: Vec<Regex>,
}

impl PatternDetector {
    /// Compile `patterns`, dropping (and logging) any that fail to compile.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut compiled = Vec::with_capacity(patterns.len());
        for p in patterns {
            match compile(p.as_ref()) {
                Ok(re) => compiled.push(re),
                Err(e) => warn!(error = %e, "skipping invalid detection pattern"),
            }
        }
        Self { patterns: compiled }
    }

    /// Append a pattern at runtime. On error the pattern list is unchanged.
    pub fn add_pattern(&mut self, pattern: &str) -> Result<()> {
        let re = compile(pattern)?;
        self.patterns.push(re);
        Ok(())
    }

    /// Source text of the active patterns, in match order.
    pub fn patterns(&self) -> Vec<&str> {
        self.patterns.iter().map(Regex::as_str).collect()
    }

    /// True when no pattern compiled; such a detector never matches.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Synchronous core of [`Detector::detect`].
    pub fn detect_sync(&self, text: Option<&str>, attachments: &[Attachment]) -> DetectionOutcome {
        let Some(text) = non_empty(text) else {
            return DetectionOutcome::negative();
        };

        for re in &self.patterns {
            if let Some(caps) = re.captures(text) {
                let job_id = caps.get(1).map(|m| m.as_str().to_string());
                debug!(pattern = %re.as_str(), job_id = ?job_id, "pattern matched");
                return DetectionOutcome::matched(job_id, attachments, 1.0);
            }
        }
        DetectionOutcome::negative()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| DetectError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Detector for PatternDetector {
    fn name(&self) -> &str {
        "pattern"
    }

    async fn detect(
        &self,
        text: Option<&str>,
        attachments: &[Attachment],
    ) -> Result<DetectionOutcome> {
        Ok(self.detect_sync(text, attachments))
    }
}

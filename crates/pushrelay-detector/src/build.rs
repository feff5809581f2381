use std::sync::Arc;

use tracing::{info, warn};

use pushrelay_core::config::DetectorMode;

use crate::delegate::{ClassifierBackend, DelegateDetector};
use crate::detector::Detector;
use crate::pattern::PatternDetector;
use crate::prefilter::KeywordPreFilter;

/// Compose the detector chain selected by configuration.
///
/// `backend` is only consulted for [`DetectorMode::KeywordDelegate`]; when
/// it is `None` the chain is still built, and every message that passes the
/// keyword gate fails with a "not implemented" error.
pub fn build_detector(
    mode: DetectorMode,
    patterns: &[String],
    backend: Option<Arc<dyn ClassifierBackend>>,
) -> Arc<dyn Detector> {
    let detector: Arc<dyn Detector> = match mode {
        DetectorMode::Pattern => Arc::new(pattern_detector(patterns)),
        DetectorMode::KeywordPattern => {
            Arc::new(KeywordPreFilter::new(Arc::new(pattern_detector(patterns))))
        }
        DetectorMode::KeywordDelegate => {
            let delegate = match backend {
                Some(b) => DelegateDetector::with_backend(b),
                None => {
                    warn!("delegate detector selected without a classifier backend");
                    DelegateDetector::unconfigured()
                }
            };
            Arc::new(KeywordPreFilter::new(Arc::new(delegate)))
        }
    };
    info!(detector = %detector.name(), ?mode, "detector chain built");
    detector
}

fn pattern_detector(patterns: &[String]) -> PatternDetector {
    let det = PatternDetector::new(patterns);
    if det.is_empty() {
        warn!(
            configured = patterns.len(),
            "no usable detection patterns, nothing will be forwarded"
        );
    } else if det.patterns().len() < patterns.len() {
        warn!(
            configured = patterns.len(),
            active = det.patterns().len(),
            "some detection patterns were dropped"
        );
    }
    det
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectError;

    fn patterns() -> Vec<String> {
        vec![r"push\s+([\w-]+)".to_string()]
    }

    #[tokio::test]
    async fn pattern_mode_matches_without_keyword_gate() {
        let det = build_detector(DetectorMode::Pattern, &[r"expedite\s+(\w+)".into()], None);
        assert_eq!(det.name(), "pattern");
        let out = det.detect(Some("expedite j9"), &[]).await.unwrap();
        assert_eq!(out.job_id.as_deref(), Some("j9"));
    }

    #[tokio::test]
    async fn keyword_pattern_mode_gates_first() {
        let det = build_detector(
            DetectorMode::KeywordPattern,
            &[r"expedite\s+(\w+)".into()],
            None,
        );
        assert_eq!(det.name(), "keyword-prefilter");
        // pattern would match, but no keyword fires
        assert!(!det.detect(Some("expedite j9"), &[]).await.unwrap().is_push_request);
        let out = det.detect(Some("push: expedite j9"), &[]).await.unwrap();
        assert_eq!(out.job_id.as_deref(), Some("j9"));
    }

    #[test]
    fn invalid_patterns_are_dropped_from_chain() {
        let det = pattern_detector(&["(".to_string(), r"push\s+(\w+)".to_string()]);
        assert_eq!(det.patterns(), vec![r"push\s+(\w+)"]);
        assert!(!det.is_empty());

        let none = pattern_detector(&["(".to_string(), "[".to_string()]);
        assert!(none.is_empty());
        assert!(!none.detect_sync(Some("push job-1"), &[]).is_push_request);
    }

    #[tokio::test]
    async fn keyword_delegate_without_backend_reports_not_implemented() {
        let det = build_detector(DetectorMode::KeywordDelegate, &patterns(), None);
        assert!(!det.detect(Some("hello"), &[]).await.unwrap().is_push_request);
        assert!(matches!(
            det.detect(Some("push job-1"), &[]).await,
            Err(DetectError::NotImplemented(_))
        ));
    }
}

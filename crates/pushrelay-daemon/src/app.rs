use std::sync::Arc;

use tracing::info;

use pushrelay_channels::GraphClient;
use pushrelay_core::RelayConfig;
use pushrelay_detector::{build_detector, PatternDetector};
use pushrelay_pipeline::{shared_forwarded_store, shared_poll_store, Pipeline, PipelineSettings};
use pushrelay_state::{ForwardedStore, PollStateStore};

/// Wire the chat client, detector chain and both state stores into a pipeline.
pub fn build_pipeline(config: &RelayConfig) -> anyhow::Result<Pipeline> {
    let client = Arc::new(GraphClient::new(&config.graph)?);
    info!(base_url = %config.graph.base_url, "graph client ready");

    // No classifier backend ships with the daemon; delegate mode reports
    // "not implemented" per message until one is wired in here.
    let detector = build_detector(config.detector.mode, &config.patterns, None);

    let poll_state = shared_poll_store(PollStateStore::open(&config.state.poll_state_path));
    let forwarded = shared_forwarded_store(ForwardedStore::open(
        &config.state.forwarded_history_path,
    ));

    Ok(Pipeline::new(
        client,
        detector,
        poll_state,
        forwarded,
        PipelineSettings::from_config(config),
    ))
}

/// Patterns split into those that compile and those the detector would drop.
pub struct PatternReport {
    pub active: Vec<String>,
    pub dropped: Vec<String>,
}

pub fn pattern_report(patterns: &[String]) -> PatternReport {
    let detector = PatternDetector::new(patterns);
    let active: Vec<String> = detector.patterns().into_iter().map(String::from).collect();
    let dropped = patterns
        .iter()
        .filter(|p| !active.contains(p))
        .cloned()
        .collect();
    PatternReport { active, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_separates_broken_patterns() {
        let patterns = vec![
            r"push\s+([\w-]+)".to_string(),
            "(unclosed".to_string(),
            r"expedite\s+(\S+)".to_string(),
        ];
        let report = pattern_report(&patterns);
        assert_eq!(report.active.len(), 2);
        assert_eq!(report.dropped, vec!["(unclosed".to_string()]);
    }

    #[test]
    fn build_fails_without_token() {
        let config: RelayConfig = serde_json::from_value(serde_json::json!({
            "target_conversation_id": "19:target",
            "display_name": "Jane Doe",
            "patterns": ["push"]
        }))
        .unwrap();
        assert!(build_pipeline(&config).is_err());
    }
}

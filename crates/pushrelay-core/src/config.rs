use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/beta";
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 30_000; // per remote call, keeps a stalled tick bounded
pub const DEFAULT_CONFIG_FILE: &str = "pushrelay.toml";
pub const ENV_PREFIX: &str = "PUSHRELAY_";

/// Top-level config (pushrelay.toml + PUSHRELAY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Conversation that receives forwarded push requests.
    pub target_conversation_id: String,
    /// Display name of the monitored identity (mention matching, self-exclusion).
    pub display_name: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Ordered detection patterns. The first capture group is the job id.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Include messages authored by the monitored identity itself.
    #[serde(default)]
    pub include_self: bool,
    /// React to the original message after a successful forward.
    #[serde(default)]
    pub add_reaction_after_forward: bool,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub forward: ForwardConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

/// Which detector chain to build at startup.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DetectorMode {
    /// Pattern detector only.
    #[default]
    Pattern,
    /// Keyword pre-filter in front of the pattern detector.
    KeywordPattern,
    /// Keyword pre-filter in front of the delegate (model-backed) detector.
    KeywordDelegate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub mode: DetectorMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    /// Text attached to each forward. `{job_id}` is replaced with the
    /// extracted job id, or `unknown` when none was captured.
    /// `None` forwards without an annotation.
    #[serde(default = "default_annotation")]
    pub annotation: Option<String>,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            annotation: default_annotation(),
        }
    }
}

impl ForwardConfig {
    /// Render the annotation for a forwarded message.
    pub fn render(&self, job_id: Option<&str>) -> Option<String> {
        self.annotation
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.replace("{job_id}", job_id.unwrap_or("unknown")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_poll_state_path")]
    pub poll_state_path: String,
    #[serde(default = "default_forwarded_history_path")]
    pub forwarded_history_path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            poll_state_path: default_poll_state_path(),
            forwarded_history_path: default_forwarded_history_path(),
        }
    }
}

/// Microsoft Graph connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    /// Delegated bearer token. Usually supplied via PUSHRELAY_GRAPH__ACCESS_TOKEN.
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_reaction_type")]
    pub reaction_type: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
            access_token: String::new(),
            timeout_ms: default_timeout_ms(),
            reaction_type: default_reaction_type(),
        }
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_annotation() -> Option<String> {
    Some("Push request for job {job_id}".to_string())
}
fn default_poll_state_path() -> String {
    "poll_state.json".to_string()
}
fn default_forwarded_history_path() -> String {
    "forwarded_history.json".to_string()
}
fn default_graph_base_url() -> String {
    DEFAULT_GRAPH_BASE_URL.to_string()
}
fn default_timeout_ms() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_MS
}
fn default_reaction_type() -> String {
    "like".to_string()
}

impl RelayConfig {
    /// Load config from a TOML file with PUSHRELAY_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. PUSHRELAY_CONFIG env var
    ///   3. ./pushrelay.toml
    ///
    /// Nested keys use a double underscore: `PUSHRELAY_GRAPH__ACCESS_TOKEN`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var(format!("{ENV_PREFIX}CONFIG")).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let config: RelayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    ///
    /// Individual malformed patterns are not rejected here; the detector
    /// drops them with a warning.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::RelayError::Config;

        if self.target_conversation_id.trim().is_empty() {
            return Err(Config("target_conversation_id must not be empty".into()));
        }
        if self.display_name.trim().is_empty() {
            return Err(Config("display_name must not be empty".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(Config("poll_interval_secs must be greater than 0".into()));
        }
        if self.graph.access_token.trim().is_empty() {
            return Err(Config(
                "graph.access_token is required (set PUSHRELAY_GRAPH__ACCESS_TOKEN)".into(),
            ));
        }
        if self.detector.mode != DetectorMode::KeywordDelegate && self.patterns.is_empty() {
            return Err(Config(
                "at least one pattern is required for pattern-based detection".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_minimal_file_with_defaults() {
        let file = write_config(
            r#"
target_conversation_id = "19:target@thread.v2"
display_name = "Jane Doe"
patterns = ['push\s+([\w-]+)']

[graph]
access_token = "token"
"#,
        );
        let cfg = RelayConfig::load(file.path().to_str()).unwrap();
        assert_eq!(cfg.target_conversation_id, "19:target@thread.v2");
        assert_eq!(cfg.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert_eq!(cfg.patterns, vec![r"push\s+([\w-]+)".to_string()]);
        assert!(!cfg.include_self);
        assert_eq!(cfg.detector.mode, DetectorMode::Pattern);
        assert_eq!(cfg.state.poll_state_path, "poll_state.json");
        assert_eq!(cfg.graph.base_url, DEFAULT_GRAPH_BASE_URL);
        cfg.validate().unwrap();
    }

    #[test]
    fn detector_mode_is_kebab_case() {
        let file = write_config(
            r#"
target_conversation_id = "t"
display_name = "me"

[detector]
mode = "keyword-delegate"
"#,
        );
        let cfg = RelayConfig::load(file.path().to_str()).unwrap();
        assert_eq!(cfg.detector.mode, DetectorMode::KeywordDelegate);
    }

    #[test]
    fn missing_required_field_is_config_error() {
        let file = write_config("display_name = \"me\"\n");
        let err = RelayConfig::load(file.path().to_str()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    fn valid() -> RelayConfig {
        RelayConfig {
            target_conversation_id: "t".into(),
            display_name: "me".into(),
            poll_interval_secs: 30,
            patterns: vec!["push".into()],
            include_self: false,
            add_reaction_after_forward: false,
            detector: DetectorConfig::default(),
            forward: ForwardConfig::default(),
            state: StateConfig::default(),
            graph: GraphConfig {
                access_token: "token".into(),
                ..GraphConfig::default()
            },
        }
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut cfg = valid();
        cfg.poll_interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_display_name() {
        let mut cfg = valid();
        cfg.display_name = "  ".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_requires_patterns_unless_delegate() {
        let mut cfg = valid();
        cfg.patterns.clear();
        assert!(cfg.validate().is_err());
        cfg.detector.mode = DetectorMode::KeywordDelegate;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn annotation_substitutes_job_id() {
        let fwd = ForwardConfig::default();
        assert_eq!(
            fwd.render(Some("job-42")).as_deref(),
            Some("Push request for job job-42")
        );
        assert_eq!(
            fwd.render(None).as_deref(),
            Some("Push request for job unknown")
        );
        let none = ForwardConfig { annotation: None };
        assert_eq!(none.render(Some("x")), None);
    }
}

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use pushrelay_channels::{with_timeout, ChannelError, ChatClient};

use crate::SharedForwardedStore;

/// Which check identified a message as already relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    /// The message id is in the local forwarded history.
    LocalRecord,
    /// The target conversation holds a forward reference to the message.
    ForwardReference,
    /// The target conversation already mentions the job id.
    JobMention,
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::LocalRecord => write!(f, "local_record"),
            DuplicateReason::ForwardReference => write!(f, "forward_reference"),
            DuplicateReason::JobMention => write!(f, "job_mention"),
        }
    }
}

/// Decides whether a detected push request has already reached the target.
///
/// Checks run in order and stop at the first hit:
///
/// 1. local forwarded history (no network)
/// 2. forward references in the target conversation
/// 3. the job id appearing in any target message body (non-empty job ids only)
///
/// Both remote checks re-read the full target conversation on every call.
/// A remote failure counts as "not found" for that check only.
pub struct DuplicateChecker {
    client: Arc<dyn ChatClient>,
    target_conversation_id: String,
    forwarded: SharedForwardedStore,
    timeout_ms: u64,
}

impl DuplicateChecker {
    pub fn new(
        client: Arc<dyn ChatClient>,
        target_conversation_id: impl Into<String>,
        forwarded: SharedForwardedStore,
        timeout_ms: u64,
    ) -> Self {
        Self {
            client,
            target_conversation_id: target_conversation_id.into(),
            forwarded,
            timeout_ms,
        }
    }

    pub async fn is_duplicate(&self, message_id: &str, job_id: Option<&str>) -> bool {
        self.check(message_id, job_id).await.is_some()
    }

    #[instrument(skip(self), fields(target = %self.target_conversation_id))]
    pub async fn check(&self, message_id: &str, job_id: Option<&str>) -> Option<DuplicateReason> {
        if self.forwarded.lock().await.contains(message_id) {
            debug!("found in forwarded history");
            return Some(DuplicateReason::LocalRecord);
        }

        match self.target_has_forward_of(message_id).await {
            Ok(true) => return Some(DuplicateReason::ForwardReference),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "forward-reference check failed, assuming not forwarded"),
        }

        let job_id = job_id.filter(|j| !j.is_empty())?;
        match self.target_mentions_job(job_id).await {
            Ok(true) => Some(DuplicateReason::JobMention),
            Ok(false) => None,
            Err(e) => {
                warn!(error = %e, "job-mention check failed, assuming not mentioned");
                None
            }
        }
    }

    async fn target_has_forward_of(&self, message_id: &str) -> Result<bool, ChannelError> {
        let messages = with_timeout(
            self.timeout_ms,
            self.client.list_messages(&self.target_conversation_id),
        )
        .await?;
        Ok(messages
            .iter()
            .flat_map(|m| m.attachments.iter())
            .filter_map(|a| a.forwarded_original_id())
            .any(|original| original == message_id))
    }

    async fn target_mentions_job(&self, job_id: &str) -> Result<bool, ChannelError> {
        let messages = with_timeout(
            self.timeout_ms,
            self.client.list_messages(&self.target_conversation_id),
        )
        .await?;
        let needle = job_id.to_lowercase();
        Ok(messages
            .iter()
            .filter_map(|m| m.text())
            .any(|body| body.to_lowercase().contains(&needle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_forwarded_store;
    use crate::testing::{forward_reference, message, FakeChatClient};
    use chrono::Utc;
    use pushrelay_core::ChatMessage;
    use pushrelay_state::ForwardedStore;

    const TARGET: &str = "19:target";

    fn checker(
        client: FakeChatClient,
        dir: &tempfile::TempDir,
    ) -> (Arc<FakeChatClient>, SharedForwardedStore, DuplicateChecker) {
        let client = Arc::new(client);
        let store = shared_forwarded_store(ForwardedStore::open(dir.path().join("fwd.json")));
        let checker = DuplicateChecker::new(client.clone(), TARGET, store.clone(), 1_000);
        (client, store, checker)
    }

    #[tokio::test]
    async fn local_record_needs_no_remote_call() {
        let dir = tempfile::tempdir().unwrap();
        let (client, store, checker) = checker(FakeChatClient::new(), &dir);
        store
            .lock()
            .await
            .record("m1", Some("JOB-1"), "f1")
            .unwrap();

        assert_eq!(
            checker.check("m1", Some("JOB-1")).await,
            Some(DuplicateReason::LocalRecord)
        );
        assert_eq!(client.list_calls(), 0);
    }

    #[tokio::test]
    async fn forward_reference_in_target_is_a_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let forwarded = ChatMessage {
            id: "t1".into(),
            attachments: vec![forward_reference("m7")],
            ..ChatMessage::default()
        };
        let client = FakeChatClient::new().with_messages(TARGET, vec![forwarded]);
        let (_c, _s, checker) = checker(client, &dir);

        assert_eq!(
            checker.check("m7", None).await,
            Some(DuplicateReason::ForwardReference)
        );
        assert_eq!(checker.check("m8", None).await, None);
    }

    #[tokio::test]
    async fn job_mention_is_case_insensitive_substring() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeChatClient::new().with_messages(
            TARGET,
            vec![message("t1", "already pushed JOB-9", "Ops", Utc::now())],
        );
        let (_c, _s, checker) = checker(client, &dir);

        assert_eq!(
            checker.check("new-message", Some("job-9")).await,
            Some(DuplicateReason::JobMention)
        );
        assert!(!checker.is_duplicate("new-message", Some("job-10")).await);
    }

    #[tokio::test]
    async fn job_check_skipped_without_job_id() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeChatClient::new()
            .with_messages(TARGET, vec![message("t1", "anything", "Ops", Utc::now())]);
        let (client, _s, checker) = checker(client, &dir);

        assert!(!checker.is_duplicate("m1", None).await);
        assert_eq!(client.list_calls(), 1);
        assert!(!checker.is_duplicate("m1", Some("")).await);
        assert_eq!(client.list_calls(), 2);
    }

    #[tokio::test]
    async fn each_remote_check_refetches_target() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeChatClient::new().with_messages(TARGET, Vec::new());
        let (client, _s, checker) = checker(client, &dir);

        assert!(!checker.is_duplicate("m1", Some("JOB-1")).await);
        assert_eq!(client.list_calls(), 2);
    }

    #[tokio::test]
    async fn remote_failure_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeChatClient::new().with_messages(
            TARGET,
            vec![message("t1", "already pushed JOB-9", "Ops", Utc::now())],
        );
        client.fail_messages_for(TARGET);
        let (_c, _s, checker) = checker(client, &dir);

        assert_eq!(checker.check("m1", Some("JOB-9")).await, None);
    }
}

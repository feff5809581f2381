use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use pushrelay_channels::{with_timeout, ChannelError, ChatClient};
use pushrelay_core::{ChatMessage, Conversation, ConversationKind, NewMessage};

use crate::SharedPollStore;

/// Identity and limits the monitor filters with.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Display name of the monitored identity.
    pub display_name: String,
    /// Keep messages authored by the monitored identity.
    pub include_self: bool,
    pub timeout_ms: u64,
}

/// Result of polling one conversation.
#[derive(Debug)]
pub enum PollOutcome {
    /// Fetch succeeded; the cursor was advanced. May be empty.
    Polled(Vec<NewMessage>),
    /// Fetch failed; the cursor was left where it was.
    Failed(ChannelError),
}

impl PollOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PollOutcome::Failed(_))
    }

    /// The new messages, or nothing on failure.
    pub fn into_messages(self) -> Vec<NewMessage> {
        match self {
            PollOutcome::Polled(messages) => messages,
            PollOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// Incremental per-conversation fetch over the poll cursor store.
pub struct MessageMonitor {
    client: Arc<dyn ChatClient>,
    poll_state: SharedPollStore,
    options: MonitorOptions,
}

impl MessageMonitor {
    pub fn new(
        client: Arc<dyn ChatClient>,
        poll_state: SharedPollStore,
        options: MonitorOptions,
    ) -> Self {
        Self {
            client,
            poll_state,
            options,
        }
    }

    /// Messages in `conversation` that arrived since the last successful poll
    /// and pass the self and conversation-kind filters, in server order.
    ///
    /// On success the cursor moves to the time the fetch started, whether or
    /// not anything matched. A failed fetch leaves the cursor untouched so the
    /// same window is retried next tick.
    #[instrument(skip(self, conversation), fields(conversation_id = %conversation.id, kind = %conversation.kind))]
    pub async fn get_new_messages(&self, conversation: &Conversation) -> PollOutcome {
        let cursor = self.poll_state.lock().await.get(&conversation.id);
        let fetched_at = Utc::now();

        let messages = match with_timeout(
            self.options.timeout_ms,
            self.client.list_messages(&conversation.id),
        )
        .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "failed to fetch messages");
                return PollOutcome::Failed(e);
            }
        };

        let fetched = messages.len();
        let new: Vec<NewMessage> = messages
            .into_iter()
            .filter(|m| self.is_unseen(m, cursor))
            .filter(|m| self.passes_kind_rule(conversation.kind, m))
            .map(|message| NewMessage {
                conversation_id: conversation.id.clone(),
                message,
            })
            .collect();

        if let Err(e) = self
            .poll_state
            .lock()
            .await
            .set(&conversation.id, fetched_at)
        {
            warn!(error = %e, "failed to persist poll cursor");
        }

        debug!(fetched, new = new.len(), "conversation polled");
        PollOutcome::Polled(new)
    }

    fn is_unseen(&self, message: &ChatMessage, cursor: Option<chrono::DateTime<Utc>>) -> bool {
        if message.text().is_none() {
            debug!(message_id = %message.id, "skipping empty message");
            return false;
        }
        if !self.options.include_self
            && message.author_name() == Some(self.options.display_name.as_str())
        {
            debug!(message_id = %message.id, "skipping own message");
            return false;
        }
        // Messages without a timestamp cannot be placed against the cursor and are kept.
        if let (Some(cursor), Some(created)) = (cursor, message.created_at) {
            if created <= cursor {
                return false;
            }
        }
        true
    }

    fn passes_kind_rule(&self, kind: ConversationKind, message: &ChatMessage) -> bool {
        match kind {
            ConversationKind::Direct => true,
            ConversationKind::Group => {
                let mentioned = message.mentions_name(&self.options.display_name);
                if !mentioned {
                    debug!(message_id = %message.id, "group message does not mention us");
                }
                mentioned
            }
            ConversationKind::Meeting => false,
        }
    }
}

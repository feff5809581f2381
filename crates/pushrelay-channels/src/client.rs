use std::future::Future;

use async_trait::async_trait;
use tokio::time::{timeout, Duration};

use pushrelay_core::{ChatMessage, Conversation};

use crate::error::ChannelError;

/// A request to relay one message into another conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRequest {
    pub source_conversation_id: String,
    pub message_id: String,
    pub target_conversation_id: String,
    /// Optional text posted alongside the forwarded message.
    pub annotation: Option<String>,
}

/// Interface to the remote chat service, authenticated as a single identity.
///
/// Implementations must be `Send + Sync` so one client can be shared by the
/// monitor, the duplicate checker and the pipeline.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Stable lowercase identifier for logging (e.g. `"graph"`).
    fn name(&self) -> &str;

    /// Every conversation the authenticated identity takes part in.
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ChannelError>;

    /// Messages of one conversation in server order.
    ///
    /// Callers must not assume chronological order; each message carries its
    /// own timestamp.
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, ChannelError>;

    /// Forward a message and return the id of the new message in the target.
    async fn forward(&self, req: &ForwardRequest) -> Result<String, ChannelError>;

    /// Add a reaction to a message. Best effort: `Ok(false)` when the service
    /// declined without a transport error.
    async fn react(&self, conversation_id: &str, message_id: &str) -> Result<bool, ChannelError>;
}

/// Run a client call with an upper bound on its duration.
///
/// A stalled remote call would otherwise block every conversation after it
/// in the same tick.
pub async fn with_timeout<T, F>(ms: u64, fut: F) -> Result<T, ChannelError>
where
    F: Future<Output = Result<T, ChannelError>>,
{
    match timeout(Duration::from_millis(ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(ChannelError::Timeout { ms }),
    }
}

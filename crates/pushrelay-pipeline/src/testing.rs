//! In-memory chat service used by the pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pushrelay_channels::{ChannelError, ChatClient, ForwardRequest};
use pushrelay_core::types::FORWARD_REFERENCE_CONTENT_TYPE;
use pushrelay_core::{Attachment, Author, ChatMessage, Conversation, Mention};

#[derive(Default)]
pub struct FakeChatClient {
    conversations: Mutex<Vec<Conversation>>,
    messages: Mutex<HashMap<String, Vec<ChatMessage>>>,
    failing_conversations: Mutex<HashSet<String>>,
    fail_forward: Mutex<HashSet<String>>,
    fail_listing: Mutex<bool>,
    fail_react: Mutex<bool>,
    list_calls: AtomicUsize,
    pub forwards: Mutex<Vec<ForwardRequest>>,
    pub reactions: Mutex<Vec<(String, String)>>,
    next_forward_id: AtomicUsize,
}

impl FakeChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversation(self, conversation: Conversation, messages: Vec<ChatMessage>) -> Self {
        self.messages
            .lock()
            .unwrap()
            .insert(conversation.id.clone(), messages);
        self.conversations.lock().unwrap().push(conversation);
        self
    }

    /// Messages for a conversation that is not returned by `list_conversations`
    /// (e.g. the target chat in duplicate-checker tests).
    pub fn with_messages(self, conversation_id: &str, messages: Vec<ChatMessage>) -> Self {
        self.messages
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), messages);
        self
    }

    pub fn fail_messages_for(&self, conversation_id: &str) {
        self.failing_conversations
            .lock()
            .unwrap()
            .insert(conversation_id.to_string());
    }

    pub fn heal_messages_for(&self, conversation_id: &str) {
        self.failing_conversations
            .lock()
            .unwrap()
            .remove(conversation_id);
    }

    pub fn fail_forward_of(&self, message_id: &str) {
        self.fail_forward
            .lock()
            .unwrap()
            .insert(message_id.to_string());
    }

    pub fn heal_forward_of(&self, message_id: &str) {
        self.fail_forward.lock().unwrap().remove(message_id);
    }

    pub fn fail_listing(&self) {
        *self.fail_listing.lock().unwrap() = true;
    }

    pub fn fail_reactions(&self) {
        *self.fail_react.lock().unwrap() = true;
    }

    pub fn push_message(&self, conversation_id: &str, message: ChatMessage) {
        self.messages
            .lock()
            .unwrap()
            .entry(conversation_id.to_string())
            .or_default()
            .push(message);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn forwarded_ids(&self) -> Vec<String> {
        self.forwards
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.message_id.clone())
            .collect()
    }
}

#[async_trait]
impl ChatClient for FakeChatClient {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ChannelError> {
        if *self.fail_listing.lock().unwrap() {
            return Err(ChannelError::Api {
                status: 503,
                message: "listing unavailable".into(),
            });
        }
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, ChannelError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_conversations
            .lock()
            .unwrap()
            .contains(conversation_id)
        {
            return Err(ChannelError::Api {
                status: 502,
                message: "bad gateway".into(),
            });
        }
        Ok(self
            .messages
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn forward(&self, req: &ForwardRequest) -> Result<String, ChannelError> {
        if self.fail_forward.lock().unwrap().contains(&req.message_id) {
            return Err(ChannelError::Api {
                status: 400,
                message: "forward rejected".into(),
            });
        }
        let n = self.next_forward_id.fetch_add(1, Ordering::SeqCst);
        let forwarded_id = format!("fwd-{n}");
        self.forwards.lock().unwrap().push(req.clone());
        // The copy in the target carries a forward reference, like the real service.
        self.push_message(
            &req.target_conversation_id,
            ChatMessage {
                id: forwarded_id.clone(),
                body: req.annotation.clone(),
                attachments: vec![forward_reference(&req.message_id)],
                ..ChatMessage::default()
            },
        );
        Ok(forwarded_id)
    }

    async fn react(&self, conversation_id: &str, message_id: &str) -> Result<bool, ChannelError> {
        if *self.fail_react.lock().unwrap() {
            return Err(ChannelError::Timeout { ms: 1 });
        }
        self.reactions
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), message_id.to_string()));
        Ok(true)
    }
}

pub fn forward_reference(original_message_id: &str) -> Attachment {
    Attachment {
        id: Some(format!("att-{original_message_id}")),
        content_type: FORWARD_REFERENCE_CONTENT_TYPE.to_string(),
        content: Some(format!(r#"{{"originalMessageId":"{original_message_id}"}}"#)),
        name: None,
    }
}

pub fn message(id: &str, body: &str, author: &str, at: DateTime<Utc>) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        body: Some(body.to_string()),
        author: Some(Author {
            id: None,
            display_name: Some(author.to_string()),
        }),
        created_at: Some(at),
        attachments: Vec::new(),
        mentions: Vec::new(),
    }
}

pub fn mentioning(mut msg: ChatMessage, name: &str) -> ChatMessage {
    msg.mentions.push(Mention {
        display_name: Some(name.to_string()),
    });
    msg
}

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Attachment content type the chat service uses for forward references.
pub const FORWARD_REFERENCE_CONTENT_TYPE: &str = "forwardedMessageReference";

/// Kind of chat thread. Decides which new messages the monitor considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    /// One-on-one chat: every new message is a candidate.
    Direct,
    /// Group chat: only messages mentioning the monitored identity.
    Group,
    /// Meeting chat: not monitored yet.
    Meeting,
}

impl ConversationKind {
    /// Map the chat service's `chatType` string. Unknown kinds are treated as groups.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "oneOnOne" => ConversationKind::Direct,
            "meeting" => ConversationKind::Meeting,
            _ => ConversationKind::Group,
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationKind::Direct => write!(f, "direct"),
            ConversationKind::Group => write!(f, "group"),
            ConversationKind::Meeting => write!(f, "meeting"),
        }
    }
}

/// A chat thread as listed by the chat service. Re-fetched every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    pub topic: Option<String>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, kind: ConversationKind) -> Self {
        Self {
            id: id.into(),
            kind,
            topic: None,
        }
    }
}

/// Author of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

/// A user mention carried by a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub display_name: Option<String>,
}

/// A file, card or forward reference attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Option<String>,
    pub content_type: String,
    /// Raw content. For forward references this is a JSON document.
    pub content: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForwardReferenceContent {
    original_message_id: Option<String>,
}

impl Attachment {
    pub fn is_forward_reference(&self) -> bool {
        self.content_type == FORWARD_REFERENCE_CONTENT_TYPE
    }

    /// Id of the message this forward reference points back to.
    ///
    /// Returns `None` for other attachment types and for malformed content.
    pub fn forwarded_original_id(&self) -> Option<String> {
        if !self.is_forward_reference() {
            return None;
        }
        let raw = self.content.as_deref()?;
        serde_json::from_str::<ForwardReferenceContent>(raw)
            .ok()?
            .original_message_id
    }
}

/// A chat message. Read-only to the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub body: Option<String>,
    pub author: Option<Author>,
    /// Creation time normalised to UTC.
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
}

impl ChatMessage {
    /// Message body, or `None` for empty (system/control) messages.
    pub fn text(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }

    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref()?.display_name.as_deref()
    }

    /// True when any mention targets `display_name` exactly.
    pub fn mentions_name(&self, display_name: &str) -> bool {
        self.mentions
            .iter()
            .any(|m| m.display_name.as_deref() == Some(display_name))
    }
}

/// Parse an ISO-8601 timestamp into UTC.
///
/// Offset-aware values are converted; naive values (no offset) are taken
/// as UTC so every comparison happens in one reference frame.
pub fn parse_utc_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// A message selected by the monitor, paired with the conversation it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: String,
    pub message: ChatMessage,
}

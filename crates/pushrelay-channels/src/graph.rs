//! Microsoft Graph (beta) chat client.
//!
//! Only the four calls the pipeline needs are implemented. Authentication
//! is a delegated bearer token supplied by configuration; acquiring and
//! refreshing that token happens outside this crate.
//!
//! List calls read the first page the service returns. `@odata.nextLink`
//! is not followed, so very long chats are only partially visible.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use pushrelay_core::config::GraphConfig;
use pushrelay_core::types::parse_utc_timestamp;
use pushrelay_core::{Attachment, Author, ChatMessage, Conversation, ConversationKind, Mention};

use crate::client::{ChatClient, ForwardRequest};
use crate::error::ChannelError;

pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    reaction_type: String,
}

impl GraphClient {
    pub fn new(config: &GraphConfig) -> Result<Self, ChannelError> {
        if config.access_token.trim().is_empty() {
            return Err(ChannelError::ConfigError(
                "graph access token is empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            reaction_type: config.reaction_type.clone(),
        })
    }

    fn chat_url(&self, chat_id: &str) -> String {
        format!("{}/chats/{}", self.base_url, urlencoding::encode(chat_id))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ChannelError> {
        debug!(%url, "graph GET");
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ChannelError::Parse(e.to_string()))
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ChannelError> {
        debug!(%url, "graph POST");
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        check_status(resp).await
    }
}

#[async_trait]
impl ChatClient for GraphClient {
    fn name(&self) -> &str {
        "graph"
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ChannelError> {
        let url = format!("{}/me/chats", self.base_url);
        let page: ListPage<WireChat> = self.get_json(&url).await?;
        Ok(page.into_items().into_iter().map(Conversation::from).collect())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, ChannelError> {
        let url = format!("{}/messages", self.chat_url(conversation_id));
        let page: ListPage<WireMessage> = self.get_json(&url).await?;
        Ok(page.into_items().into_iter().map(ChatMessage::from).collect())
    }

    async fn forward(&self, req: &ForwardRequest) -> Result<String, ChannelError> {
        let url = format!(
            "{}/messages/forwardToChat",
            self.chat_url(&req.source_conversation_id)
        );
        let resp = self.post_json(&url, &forward_body(req)).await?;
        let parsed: ListPage<WireForwardResult> = resp
            .json()
            .await
            .map_err(|e| ChannelError::Parse(e.to_string()))?;
        first_forwarded_id(parsed)
    }

    async fn react(&self, conversation_id: &str, message_id: &str) -> Result<bool, ChannelError> {
        let url = format!(
            "{}/messages/{}/setReaction",
            self.chat_url(conversation_id),
            urlencoding::encode(message_id)
        );
        let body = serde_json::json!({ "reactionType": self.reaction_type });
        match self.post_json(&url, &body).await {
            Ok(_) => Ok(true),
            Err(ChannelError::Api { status, message }) if status < 500 => {
                warn!(status, %message, "graph rejected reaction");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ChannelError> {
    let status = resp.status().as_u16();
    if resp.status().is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    warn!(status, body = %text, "graph API error");
    if status == 401 || status == 403 {
        return Err(ChannelError::AuthFailed(text));
    }
    Err(ChannelError::Api {
        status,
        message: text,
    })
}

fn forward_body(req: &ForwardRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "targetChatIds": [req.target_conversation_id],
        "messageIds": [req.message_id],
    });
    if let Some(text) = req.annotation.as_deref().filter(|t| !t.is_empty()) {
        body["additionalMessage"] = serde_json::json!({ "body": { "content": text } });
    }
    body
}

fn first_forwarded_id(page: ListPage<WireForwardResult>) -> Result<String, ChannelError> {
    page.into_items()
        .into_iter()
        .find_map(|r| r.forwarded_message_id)
        .ok_or_else(|| {
            ChannelError::Parse("forward completed but no message id was returned".to_string())
        })
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListPage<T> {
    value: Option<Vec<T>>,
}

impl<T> ListPage<T> {
    fn into_items(self) -> Vec<T> {
        self.value.unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChat {
    id: String,
    chat_type: Option<String>,
    topic: Option<String>,
}

impl From<WireChat> for Conversation {
    fn from(w: WireChat) -> Self {
        Conversation {
            id: w.id,
            kind: ConversationKind::from_wire(w.chat_type.as_deref().unwrap_or_default()),
            topic: w.topic,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    id: String,
    body: Option<WireBody>,
    from: Option<WireFrom>,
    created_date_time: Option<String>,
    attachments: Option<Vec<WireAttachment>>,
    mentions: Option<Vec<WireMention>>,
}

#[derive(Debug, Deserialize)]
struct WireBody {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFrom {
    user: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUser {
    id: Option<String>,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAttachment {
    id: Option<String>,
    content_type: Option<String>,
    content: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMention {
    mentioned: Option<WireMentioned>,
}

#[derive(Debug, Deserialize)]
struct WireMentioned {
    user: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireForwardResult {
    forwarded_message_id: Option<String>,
}

impl From<WireMessage> for ChatMessage {
    fn from(w: WireMessage) -> Self {
        let created_at = w.created_date_time.as_deref().and_then(|ts| {
            let parsed = parse_utc_timestamp(ts);
            if parsed.is_none() {
                warn!(message_id = %w.id, %ts, "unparseable createdDateTime");
            }
            parsed
        });
        ChatMessage {
            body: w.body.and_then(|b| b.content),
            author: w.from.and_then(|f| f.user).map(|u| Author {
                id: u.id,
                display_name: u.display_name,
            }),
            created_at,
            attachments: w
                .attachments
                .unwrap_or_default()
                .into_iter()
                .map(|a| Attachment {
                    id: a.id,
                    content_type: a.content_type.unwrap_or_default(),
                    content: a.content,
                    name: a.name,
                })
                .collect(),
            mentions: w
                .mentions
                .unwrap_or_default()
                .into_iter()
                .map(|m| Mention {
                    display_name: m.mentioned.and_then(|x| x.user).and_then(|u| u.display_name),
                })
                .collect(),
            id: w.id,
        }
    }
}

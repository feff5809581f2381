use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use pushrelay_core::types::parse_utc_timestamp;

use crate::error::Result;
use crate::file::{load_json_or_default, write_json_atomic};

/// On-disk shape: `{"chats": {"<conversation id>": {"last_poll_time": "<ISO-8601>"}}}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PollStateFile {
    #[serde(default)]
    chats: BTreeMap<String, PollEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PollEntry {
    last_poll_time: String,
}

/// Per-conversation poll cursors, persisted as JSON.
///
/// A cursor only ever moves forward; entries are never removed.
pub struct PollStateStore {
    path: PathBuf,
    cursors: BTreeMap<String, DateTime<Utc>>,
}

impl PollStateStore {
    /// Load the store from `path`. Missing or corrupt files give an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file: PollStateFile = load_json_or_default(&path);

        let mut cursors = BTreeMap::new();
        for (conversation_id, entry) in file.chats {
            match parse_utc_timestamp(&entry.last_poll_time) {
                Some(ts) => {
                    cursors.insert(conversation_id, ts);
                }
                None => warn!(
                    conversation_id = %conversation_id,
                    value = %entry.last_poll_time,
                    "dropping unparseable poll cursor"
                ),
            }
        }
        debug!(path = %path.display(), conversations = cursors.len(), "poll state loaded");
        Self { path, cursors }
    }

    /// Last processed time for a conversation, or `None` if never polled.
    pub fn get(&self, conversation_id: &str) -> Option<DateTime<Utc>> {
        self.cursors.get(conversation_id).copied()
    }

    /// Advance the cursor for a conversation and persist immediately.
    ///
    /// Returns `Ok(false)` without writing when `at` is older than the stored
    /// cursor, so a clock step backwards cannot roll a cursor back.
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub fn set(&mut self, conversation_id: &str, at: DateTime<Utc>) -> Result<bool> {
        if let Some(current) = self.cursors.get(conversation_id) {
            if at < *current {
                warn!(current = %current, requested = %at, "refusing to move poll cursor backwards");
                return Ok(false);
            }
        }
        self.cursors.insert(conversation_id.to_string(), at);
        self.save()?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    fn save(&self) -> Result<()> {
        let file = PollStateFile {
            chats: self
                .cursors
                .iter()
                .map(|(id, ts)| {
                    (
                        id.clone(),
                        PollEntry {
                            last_poll_time: ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                        },
                    )
                })
                .collect(),
        };
        write_json_atomic(&self.path, &file)
    }
}

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use pushrelay_core::types::parse_utc_timestamp;

use crate::error::Result;
use crate::file::{load_json_or_default, write_json_atomic};

/// A message that has been relayed to the target conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedRecord {
    pub job_id: Option<String>,
    /// Id of the copy created in the target conversation.
    pub forwarded_message_id: String,
    pub forwarded_at: DateTime<Utc>,
}

/// On-disk shape:
///
/// ```json
/// {
///   "forwarded_messages": {
///     "<message id>": {"job_id": "JOB-1", "forwarded_message_id": "...", "forwarded_at": "..."}
///   },
///   "forwarded_job_ids": ["JOB-1"]
/// }
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
struct ForwardedFile {
    #[serde(default)]
    forwarded_messages: BTreeMap<String, RecordEntry>,
    #[serde(default)]
    forwarded_job_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordEntry {
    job_id: Option<String>,
    forwarded_message_id: String,
    forwarded_at: String,
}

/// History of forwarded messages with a case-insensitive job-id index.
///
/// Records are permanent: a message id is recorded at most once and there
/// is no removal path. The job-id index is derived from the records and is
/// rebuilt on load, so it always holds exactly the non-empty job ids found
/// in them.
pub struct ForwardedStore {
    path: PathBuf,
    records: BTreeMap<String, ForwardedRecord>,
    /// Job ids in first-seen order, original spelling.
    job_ids: Vec<String>,
    /// Lower-cased job ids for O(1) lookups.
    job_index: HashSet<String>,
}

impl ForwardedStore {
    /// Load the store from `path`. Missing or corrupt files give an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file: ForwardedFile = load_json_or_default(&path);

        let mut store = Self {
            path,
            records: BTreeMap::new(),
            job_ids: Vec::new(),
            job_index: HashSet::new(),
        };

        for (message_id, entry) in file.forwarded_messages {
            let forwarded_at = parse_utc_timestamp(&entry.forwarded_at).unwrap_or_else(|| {
                warn!(message_id = %message_id, value = %entry.forwarded_at, "unparseable forwarded_at");
                DateTime::<Utc>::default()
            });
            let job_id = normalise_job_id(entry.job_id.as_deref());
            if let Some(job) = &job_id {
                store.index_job(job);
            }
            store.records.insert(
                message_id,
                ForwardedRecord {
                    job_id,
                    forwarded_message_id: entry.forwarded_message_id,
                    forwarded_at,
                },
            );
        }

        // The persisted list is informational; ids without a backing record are dropped.
        let orphans = file
            .forwarded_job_ids
            .iter()
            .filter(|j| !store.job_index.contains(&j.to_lowercase()))
            .count();
        if orphans > 0 {
            debug!(orphans, "ignoring job ids without a forwarded record");
        }

        debug!(
            path = %store.path.display(),
            records = store.records.len(),
            job_ids = store.job_ids.len(),
            "forwarded history loaded"
        );
        store
    }

    /// True when the message has already been forwarded.
    pub fn contains(&self, message_id: &str) -> bool {
        self.records.contains_key(message_id)
    }

    /// True when any forwarded record carries this job id (case-insensitive).
    pub fn contains_job(&self, job_id: &str) -> bool {
        self.job_index.contains(&job_id.to_lowercase())
    }

    pub fn get(&self, message_id: &str) -> Option<&ForwardedRecord> {
        self.records.get(message_id)
    }

    /// Every recorded job id, in its first-seen spelling.
    pub fn all_job_ids(&self) -> BTreeSet<String> {
        self.job_ids.iter().cloned().collect()
    }

    /// Record a successful forward and persist immediately.
    ///
    /// Returns `Ok(false)` and changes nothing when the message is already
    /// recorded. An absent or empty `job_id` leaves the job index untouched.
    #[instrument(skip(self), fields(message_id = %message_id))]
    pub fn record(
        &mut self,
        message_id: &str,
        job_id: Option<&str>,
        forwarded_message_id: &str,
    ) -> Result<bool> {
        if self.records.contains_key(message_id) {
            debug!("message already recorded");
            return Ok(false);
        }

        let job_id = normalise_job_id(job_id);
        if let Some(job) = &job_id {
            self.index_job(job);
        }
        self.records.insert(
            message_id.to_string(),
            ForwardedRecord {
                job_id,
                forwarded_message_id: forwarded_message_id.to_string(),
                forwarded_at: Utc::now(),
            },
        );
        self.save()?;
        info!(forwarded_message_id, "forward recorded");
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn index_job(&mut self, job_id: &str) {
        if self.job_index.insert(job_id.to_lowercase()) {
            self.job_ids.push(job_id.to_string());
        }
    }

    fn save(&self) -> Result<()> {
        let file = ForwardedFile {
            forwarded_messages: self
                .records
                .iter()
                .map(|(id, r)| {
                    (
                        id.clone(),
                        RecordEntry {
                            job_id: r.job_id.clone(),
                            forwarded_message_id: r.forwarded_message_id.clone(),
                            forwarded_at: r.forwarded_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                        },
                    )
                })
                .collect(),
            forwarded_job_ids: self.job_ids.clone(),
        };
        write_json_atomic(&self.path, &file)
    }
}

fn normalise_job_id(job_id: Option<&str>) -> Option<String> {
    job_id.filter(|j| !j.is_empty()).map(str::to_string)
}

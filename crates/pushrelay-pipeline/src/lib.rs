//! `pushrelay-pipeline` — the detect → deduplicate → forward pipeline.
//!
//! One tick, strictly sequential:
//!
//! 1. list conversations (target conversation excluded)
//! 2. [`MessageMonitor`] pulls messages newer than each conversation's cursor
//! 3. the detector chain classifies each message
//! 4. [`DuplicateChecker`] drops anything already relayed
//! 5. the message is forwarded and recorded in the forwarded history
//!
//! The stores are shared handles so the monitor, the checker and the
//! pipeline can all hold them; ticks never overlap, so the locks are never
//! contended.

use std::sync::Arc;

use tokio::sync::Mutex;

use pushrelay_state::{ForwardedStore, PollStateStore};

pub mod duplicate;
pub mod monitor;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use duplicate::{DuplicateChecker, DuplicateReason};
pub use monitor::{MessageMonitor, MonitorOptions, PollOutcome};
pub use pipeline::{Pipeline, PipelineCommand, PipelineSettings, TickSummary};

pub type SharedPollStore = Arc<Mutex<PollStateStore>>;
pub type SharedForwardedStore = Arc<Mutex<ForwardedStore>>;

pub fn shared_poll_store(store: PollStateStore) -> SharedPollStore {
    Arc::new(Mutex::new(store))
}

pub fn shared_forwarded_store(store: ForwardedStore) -> SharedForwardedStore {
    Arc::new(Mutex::new(store))
}

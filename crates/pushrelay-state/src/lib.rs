//! `pushrelay-state` — durable, human-readable state behind the pipeline.
//!
//! Two independent JSON-file stores:
//!
//! - [`PollStateStore`]: per-conversation poll cursor (last processed time).
//! - [`ForwardedStore`]: messages already relayed, plus a case-folded job-id index.
//!
//! Both load on construction (missing or corrupt file ⇒ empty state) and
//! write the whole file through on every mutation.

pub mod error;
pub mod file;
pub mod forwarded;
pub mod poll;

pub use error::{Result, StateError};
pub use forwarded::{ForwardedRecord, ForwardedStore};
pub use poll::PollStateStore;

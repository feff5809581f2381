//! `pushrelay-scheduler` — fixed-interval tick trigger for the pipeline.
//!
//! The scheduler owns the clock; the pipeline owns the work. Ticks travel
//! over a bounded command channel, so a tick that is still queued or running
//! causes the next one to be skipped rather than run alongside it.

pub mod engine;

pub use engine::TickScheduler;

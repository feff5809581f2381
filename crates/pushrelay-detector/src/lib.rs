//! `pushrelay-detector` — classifiers that decide whether a chat message is
//! a push request and which job it names.
//!
//! Every variant implements [`Detector`]. Variants compose by wrapping:
//!
//! | Variant              | Behaviour                                              |
//! |----------------------|--------------------------------------------------------|
//! | `PatternDetector`    | Ordered regexes, first match wins, group 1 = job id    |
//! | `KeywordPreFilter`   | Cheap keyword gate in front of any inner detector      |
//! | `DelegateDetector`   | Hands the text to a pluggable classifier backend       |

pub mod build;
pub mod delegate;
pub mod detector;
pub mod error;
pub mod pattern;
pub mod prefilter;

pub use build::build_detector;
pub use delegate::{ClassifierBackend, DelegateDetector};
pub use detector::{DetectionOutcome, Detector};
pub use error::{DetectError, Result};
pub use pattern::PatternDetector;
pub use prefilter::KeywordPreFilter;

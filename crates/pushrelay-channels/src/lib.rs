pub mod client;
pub mod error;
pub mod graph;

pub use client::{with_timeout, ChatClient, ForwardRequest};
pub use error::ChannelError;
pub use graph::GraphClient;

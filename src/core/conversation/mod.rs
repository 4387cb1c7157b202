//! Per-session conversation pipeline: the query queue, the turn processor and
//! the synthesis dispatcher.
//!
//! None of these types know about the client transport. Everything they want
//! the client to see goes through a [`ClientSink`].

pub mod queue;
pub mod synthesis;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use bytes::Bytes;

pub use queue::{Query, QueryHandler, QueryQueue};
pub use synthesis::{SynthesisDispatcher, SynthesisJob};
pub use turn::TurnProcessor;

/// Output of the conversation pipeline addressed to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    /// Reply text, possibly empty
    Assistant(String),
    /// One complete synthesized payload
    Audio(Bytes),
    Error(String),
}

/// Delivery to the client. Delivery to a closed client is silently dropped.
#[async_trait]
pub trait ClientSink: Send + Sync {
    async fn deliver(&self, event: ConversationEvent);
}

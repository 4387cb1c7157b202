//! WebSocket message types and routing
//!
//! Control messages are JSON objects tagged by `type`. Audio travels as raw
//! binary frames in both directions.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::conversation::{ClientSink, ConversationEvent};

/// WebSocket message types for incoming messages
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    #[serde(rename = "start")]
    Start {
        /// Session to bind; a fresh UUID is generated when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    #[serde(rename = "stop")]
    Stop,
}

/// WebSocket message types for outgoing messages
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    #[serde(rename = "hello")]
    Hello { message: String },
    #[serde(rename = "ready")]
    Ready { session_id: String },
    #[serde(rename = "interim")]
    Interim { text: String },
    #[serde(rename = "final")]
    Final { text: String },
    #[serde(rename = "assistant")]
    Assistant { text: String },
    #[serde(rename = "stopped")]
    Stopped,
    #[serde(rename = "error")]
    Error { message: String },
}

impl OutgoingMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Everything written to the client goes through one channel drained by a
/// single sender task
#[derive(Debug)]
pub enum MessageRoute {
    Outgoing(OutgoingMessage),
    Binary(Bytes),
}

impl From<ConversationEvent> for MessageRoute {
    fn from(event: ConversationEvent) -> Self {
        match event {
            ConversationEvent::Assistant(text) => {
                MessageRoute::Outgoing(OutgoingMessage::Assistant { text })
            }
            ConversationEvent::Audio(data) => MessageRoute::Binary(data),
            ConversationEvent::Error(message) => {
                MessageRoute::Outgoing(OutgoingMessage::Error { message })
            }
        }
    }
}

#[async_trait]
impl ClientSink for mpsc::Sender<MessageRoute> {
    async fn deliver(&self, event: ConversationEvent) {
        if self.send(event.into()).await.is_err() {
            debug!("Client gone, dropping conversation event");
        }
    }
}

//! WebSocket error types
//!
//! Every variant ends up in front of the client as an `error` event.

use thiserror::Error;

/// WebSocket handler error types
#[derive(Debug, Error)]
pub enum WebSocketError {
    /// A capability the session depends on has no credentials configured
    #[error("Cannot start session, not configured: {0}")]
    CapabilitiesMissing(String),

    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

impl WebSocketError {
    /// Convert error to outgoing message format
    pub fn to_message(&self) -> String {
        self.to_string()
    }
}

/// Result type for WebSocket operations
pub type WebSocketResult<T> = Result<T, WebSocketError>;

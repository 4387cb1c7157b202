//! Conversation-history persistence keyed by session id.

pub mod backend;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::core::llm::ChatMessage;
use backend::{FilesystemBackend, HistoryBackend, MemoryBackend};

pub const DEFAULT_HISTORY_TTL: Duration = Duration::from_secs(86_400);
pub const DEFAULT_MAX_MESSAGES: usize = 200;

const MEMORY_MAX_SESSIONS: u64 = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("History backend error: {0}")]
    Backend(String),
}

/// History capability consumed by the turn processor
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Ordered messages for `session_id`; empty when none are stored
    async fn load(&self, session_id: &str) -> Result<Vec<ChatMessage>, HistoryError>;

    /// Replace the stored history, keeping only the most recent entries
    async fn save(&self, session_id: &str, messages: &[ChatMessage]) -> Result<(), HistoryError>;
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Directory for the filesystem backend; `None` keeps history in memory
    pub path: Option<PathBuf>,
    pub ttl: Duration,
    pub max_messages: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            ttl: DEFAULT_HISTORY_TTL,
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }
}

/// JSON-encoded history on top of a [`HistoryBackend`]
pub struct SessionHistoryStore {
    backend: Arc<dyn HistoryBackend>,
    ttl: Duration,
    max_messages: usize,
}

impl SessionHistoryStore {
    pub async fn from_config(config: HistoryConfig) -> Result<Self, HistoryError> {
        let backend: Arc<dyn HistoryBackend> = match config.path {
            Some(path) => Arc::new(FilesystemBackend::new(path).await?),
            None => Arc::new(MemoryBackend::new(MEMORY_MAX_SESSIONS)),
        };
        Ok(Self::with_backend(backend, config.ttl, config.max_messages))
    }

    pub fn with_backend(
        backend: Arc<dyn HistoryBackend>,
        ttl: Duration,
        max_messages: usize,
    ) -> Self {
        Self {
            backend,
            ttl,
            max_messages: max_messages.max(1),
        }
    }

    pub fn backend_type(&self) -> &'static str {
        self.backend.backend_type()
    }

    fn key(session_id: &str) -> String {
        format!("session:{session_id}:messages")
    }
}

#[async_trait]
impl HistoryStore for SessionHistoryStore {
    async fn load(&self, session_id: &str) -> Result<Vec<ChatMessage>, HistoryError> {
        let Some(raw) = self.backend.get(&Self::key(session_id)).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_slice::<Vec<ChatMessage>>(&raw) {
            Ok(messages) => Ok(messages),
            Err(e) => {
                warn!("Discarding undecodable history for {}: {}", session_id, e);
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, session_id: &str, messages: &[ChatMessage]) -> Result<(), HistoryError> {
        let start = messages.len().saturating_sub(self.max_messages);
        let retained = &messages[start..];
        let encoded = serde_json::to_vec(retained)?;

        self.backend
            .set(&Self::key(session_id), Bytes::from(encoded), self.ttl)
            .await?;
        debug!(
            "Saved {} history messages for {}",
            retained.len(),
            session_id
        );
        Ok(())
    }
}

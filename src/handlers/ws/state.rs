//! Per-connection session state
//!
//! Owned by the connection's receive loop and only ever touched from that
//! task, so it needs no locking. The query queue and speech manager are
//! shared with their own background tasks through their handles.

use crate::core::conversation::QueryQueue;
use crate::core::stt::{AudioForwarder, SpeechEvent};

/// Lifecycle of one client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingStart,
    Active,
    Closed,
}

/// A speech event tagged with the speech connection that produced it
#[derive(Debug)]
pub struct SessionSpeechEvent {
    pub generation: u64,
    pub event: SpeechEvent,
}

pub struct ConnectionState {
    pub phase: SessionPhase,
    /// Bound by the first successful `start` and kept across `stop`
    pub session_id: Option<String>,
    pub speech: Option<AudioForwarder>,
    /// Bumped for every new speech connection; events from older ones are stale
    pub speech_generation: u64,
    /// Created with the first started session and reused after `stop`
    pub queue: Option<QueryQueue>,
    pub last_interim: Option<String>,
    pub last_final: Option<String>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::AwaitingStart,
            session_id: None,
            speech: None,
            speech_generation: 0,
            queue: None,
            last_interim: None,
            last_final: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Drop pending queries and transcript buffers. In-flight turns finish.
    pub fn clear_conversation(&mut self) {
        if let Some(queue) = &self.queue {
            queue.clear();
        }
        self.last_interim = None;
        self.last_final = None;
    }

    /// Tear down the speech connection. Safe to call repeatedly.
    pub async fn release_speech(&mut self) {
        if let Some(speech) = self.speech.take() {
            speech.shutdown().await;
        }
    }
}

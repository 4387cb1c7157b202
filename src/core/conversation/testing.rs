//! Stub capabilities shared by the conversation unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{ClientSink, ConversationEvent};
use crate::core::history::{HistoryError, HistoryStore};
use crate::core::llm::{ChatMessage, LLMError, LanguageModel};
use crate::core::metrics::{LatencyRecord, LatencySink};
use crate::core::tts::{AudioData, SpeechSynthesizer, TTSError, TTSResult};

#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ConversationEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<ConversationEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl ClientSink for CollectingSink {
    async fn deliver(&self, event: ConversationEvent) {
        self.events.lock().push(event);
    }
}

#[derive(Default)]
pub struct RecordingLatency {
    records: Mutex<Vec<LatencyRecord>>,
}

impl RecordingLatency {
    pub fn records(&self) -> Vec<LatencyRecord> {
        self.records.lock().clone()
    }
}

impl LatencySink for RecordingLatency {
    fn record(&self, record: LatencyRecord) {
        self.records.lock().push(record);
    }
}

/// Returns `audio:<text>`, optionally slow for one specific text
#[derive(Default)]
pub struct StubSynthesizer {
    fail: bool,
    slow: Option<(String, Duration)>,
}

impl StubSynthesizer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            slow: None,
        }
    }

    pub fn with_delay_for(text: &str, delay: Duration) -> Self {
        Self {
            fail: false,
            slow: Some((text.to_string(), delay)),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for StubSynthesizer {
    async fn synthesize(&self, text: &str) -> TTSResult<AudioData> {
        if let Some((slow_text, delay)) = &self.slow
            && slow_text == text
        {
            tokio::time::sleep(*delay).await;
        }
        if self.fail {
            return Err(TTSError::ProviderError("API error (500): boom".to_string()));
        }
        Ok(AudioData {
            data: Bytes::from(format!("audio:{text}")),
            sample_rate: 44100,
            format: "mp3".to_string(),
            duration_ms: None,
        })
    }

    fn get_provider_info(&self) -> &'static str {
        "stub"
    }
}

enum Reply {
    Echo,
    Fixed(String),
    Fail,
}

/// Records every history it is called with
pub struct StubModel {
    reply: Reply,
    pub seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl StubModel {
    fn with(reply: Reply) -> Self {
        Self {
            reply,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replies `reply to: <last user message>`
    pub fn echo() -> Self {
        Self::with(Reply::Echo)
    }

    pub fn replying(text: &str) -> Self {
        Self::with(Reply::Fixed(text.to_string()))
    }

    pub fn failing() -> Self {
        Self::with(Reply::Fail)
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LLMError> {
        self.seen.lock().push(messages.to_vec());
        match &self.reply {
            Reply::Echo => Ok(format!(
                "reply to: {}",
                messages.last().map(|m| m.content_str()).unwrap_or_default()
            )),
            Reply::Fixed(text) => Ok(text.clone()),
            Reply::Fail => Err(LLMError::RequestFailed("upstream down".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

pub struct FailingHistory;

#[async_trait]
impl HistoryStore for FailingHistory {
    async fn load(&self, _session_id: &str) -> Result<Vec<ChatMessage>, HistoryError> {
        Err(HistoryError::Backend("store unavailable".to_string()))
    }

    async fn save(&self, _session_id: &str, _messages: &[ChatMessage]) -> Result<(), HistoryError> {
        Err(HistoryError::Backend("store unavailable".to_string()))
    }
}

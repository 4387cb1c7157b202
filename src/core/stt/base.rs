use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Transcript delta produced by the speech-recognition upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Provisional text for a segment that is still being spoken
    Interim(String),
    /// Text that will not be revised any further for its segment
    Final(String),
}

impl TranscriptEvent {
    pub fn text(&self) -> &str {
        match self {
            TranscriptEvent::Interim(text) | TranscriptEvent::Final(text) => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, TranscriptEvent::Final(_))
    }
}

/// Everything the speech socket manager reports back to its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Transcript(TranscriptEvent),
    /// End-of-utterance hint. Never used for queue admission.
    UtteranceEnd,
    /// Informational, non-fatal upstream failure
    Error(String),
}

/// Sending half of the per-session speech event stream
pub type SpeechEventSender = mpsc::UnboundedSender<SpeechEvent>;

/// Receiving half of the per-session speech event stream
pub type SpeechEventReceiver = mpsc::UnboundedReceiver<SpeechEvent>;

/// Configuration for the streaming speech-recognition upstream
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct STTConfig {
    /// API key for the STT provider
    pub api_key: String,
    /// Model to use for transcription
    pub model: String,
    /// Language code for transcription (e.g., "en-GB", "es-ES")
    pub language: String,
    /// Sample rate of the inbound PCM audio in Hz
    pub sample_rate: u32,
    /// Number of audio channels (1 for mono)
    pub channels: u16,
    /// Encoding of the audio
    pub encoding: String,
    /// Silence in milliseconds before the upstream closes a segment
    pub endpointing_ms: u32,
}

impl Default for STTConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "nova-3".to_string(),
            language: "en-GB".to_string(),
            sample_rate: 48000,
            channels: 1,
            encoding: "linear16".to_string(),
            endpointing_ms: 100,
        }
    }
}

/// Error types for STT operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum STTError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Socket closed")]
    SocketClosed,
}

/// One open upstream streaming connection
#[async_trait::async_trait]
pub trait SpeechSocket: Send + Sync {
    /// Forward a raw audio frame upstream
    async fn send_audio(&self, audio: Bytes) -> Result<(), STTError>;

    /// Send the lightweight frame that keeps an idle stream alive
    async fn send_keepalive(&self) -> Result<(), STTError>;

    /// Whether the upstream is still accepting frames
    fn is_open(&self) -> bool;

    /// Best-effort close. Must tolerate an already closed socket.
    async fn close(&self);
}

/// Process-wide factory for upstream speech connections
///
/// Implementations classify every inbound upstream message themselves and push
/// the resulting [`SpeechEvent`]s into `events`.
#[async_trait::async_trait]
pub trait SpeechConnector: Send + Sync {
    async fn connect(&self, events: SpeechEventSender) -> Result<Arc<dyn SpeechSocket>, STTError>;

    fn get_provider_info(&self) -> &'static str;
}

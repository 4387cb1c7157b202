//! # TTS Base Trait
//!
//! Unified interface over request/response speech-synthesis services. A
//! synthesizer turns one complete assistant reply into one encoded audio
//! payload; the conversation layer decides when and whether to call it.

use async_trait::async_trait;
use bytes::Bytes;

/// Audio produced for one reply
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Encoded audio bytes in `format`
    pub data: Bytes,
    /// Sample rate of the audio
    pub sample_rate: u32,
    /// Audio format (e.g., "mp3", "wav")
    pub format: String,
    /// Duration of the audio in milliseconds, when the provider reports it
    pub duration_ms: Option<u32>,
}

impl AudioData {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// TTS-specific error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum TTSError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),
}

/// Result type for TTS operations
pub type TTSResult<T> = Result<T, TTSError>;

/// Configuration for TTS providers
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct TTSConfig {
    pub provider: String,
    /// API key for the TTS provider
    pub api_key: String,
    /// Voice ID or name to use for synthesis
    pub voice_id: Option<String>,
    /// Model to use for TTS
    pub model: String,
    /// Audio format preference
    pub audio_format: Option<String>,
    /// Sample rate preference
    pub sample_rate: Option<u32>,
    /// Request timeout in seconds
    pub request_timeout: Option<u64>,
    /// Overrides the provider's API origin
    pub base_url: Option<String>,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            provider: "elevenlabs".to_string(),
            api_key: String::new(),
            voice_id: None,
            model: String::new(),
            audio_format: None,
            sample_rate: None,
            request_timeout: Some(60),
            base_url: None,
        }
    }
}

/// Text-to-speech capability used by the synthesis dispatcher
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into a single audio payload
    async fn synthesize(&self, text: &str) -> TTSResult<AudioData>;

    /// Get provider-specific information
    fn get_provider_info(&self) -> &'static str;
}

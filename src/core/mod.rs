pub mod conversation;
pub mod history;
pub mod llm;
pub mod metrics;
pub mod state;
pub mod stt;
pub mod tts;

// Re-export commonly used types for convenience
pub use conversation::{ClientSink, ConversationEvent, QueryQueue, TurnProcessor};
pub use history::{HistoryConfig, HistoryError, HistoryStore, SessionHistoryStore};
pub use llm::{ChatMessage, LLMConfig, LLMError, LanguageModel, OpenAIClient};
pub use metrics::{JsonlLatencySink, LatencyRecord, LatencySink};
pub use stt::{
    STTConfig, STTError, SpeechConnector, SpeechEvent, SpeechSocket, SpeechSocketManager,
    TranscriptEvent, create_speech_connector,
};
pub use tts::{AudioData, SpeechSynthesizer, TTSConfig, TTSError, create_tts_provider};

// Re-export CoreState for external use
pub use state::CoreState;

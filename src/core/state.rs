use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::history::{HistoryError, HistoryStore, SessionHistoryStore};
use crate::core::llm::{LanguageModel, OpenAIClient};
use crate::core::metrics::{JsonlLatencySink, LatencySink};
use crate::core::stt::manager::{DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_RETRY_DELAY};
use crate::core::stt::{SpeechConnector, create_speech_connector};
use crate::core::tts::{SpeechSynthesizer, create_tts_provider};

/// Core-specific shared state for the application.
///
/// Holds the process-wide capability handles every session draws from. A
/// capability whose credentials are missing is `None`; sessions that need it
/// report an error on `start` instead of the server failing to boot.
#[derive(Clone)]
pub struct CoreState {
    pub speech: Option<Arc<dyn SpeechConnector>>,
    pub model: Option<Arc<dyn LanguageModel>>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub history: Arc<dyn HistoryStore>,
    pub latency: Arc<dyn LatencySink>,
    /// Pause between closing a failed speech socket and reconnecting
    pub stt_retry_delay: Duration,
    pub stt_keepalive_interval: Duration,
}

impl CoreState {
    /// Initialize core state from configuration.
    ///
    /// Only the history store can fail here, since a configured directory
    /// that cannot be created is a deployment error.
    pub async fn new(config: &ServerConfig) -> Result<Arc<Self>, HistoryError> {
        let speech = match config.stt_config() {
            Some(stt_config) => match create_speech_connector("deepgram", stt_config) {
                Ok(connector) => Some(connector),
                Err(e) => {
                    warn!("Speech recognition disabled: {}", e);
                    None
                }
            },
            None => {
                warn!("DEEPGRAM_API_KEY not set; speech recognition disabled");
                None
            }
        };

        let model = match config.llm_config() {
            Some(llm_config) => match OpenAIClient::new(llm_config) {
                Ok(client) => Some(Arc::new(client) as Arc<dyn LanguageModel>),
                Err(e) => {
                    warn!("Language model disabled: {}", e);
                    None
                }
            },
            None => {
                warn!("No LLM API key set; language model disabled");
                None
            }
        };

        let synthesizer = match config.tts_config() {
            Some(tts_config) => match create_tts_provider(tts_config) {
                Ok(synthesizer) => Some(synthesizer),
                Err(e) => {
                    warn!("Speech synthesis disabled: {}", e);
                    None
                }
            },
            None => {
                warn!(
                    "No API key for TTS provider '{}'; speech synthesis disabled",
                    config.tts_provider
                );
                None
            }
        };

        let history = SessionHistoryStore::from_config(config.history_config()).await?;
        info!("Initialized {} history store", history.backend_type());

        Ok(Arc::new(Self {
            speech,
            model,
            synthesizer,
            history: Arc::new(history),
            latency: Arc::new(JsonlLatencySink::new(config.latency_log_path.clone())),
            stt_retry_delay: config.stt_retry_delay(),
            stt_keepalive_interval: config.stt_keepalive_interval(),
        }))
    }

    /// State with no external capabilities, for wiring in custom ones
    pub fn with_stores(history: Arc<dyn HistoryStore>, latency: Arc<dyn LatencySink>) -> Self {
        Self {
            speech: None,
            model: None,
            synthesizer: None,
            history,
            latency,
            stt_retry_delay: DEFAULT_RETRY_DELAY,
            stt_keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechConnector>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_timing(mut self, retry_delay: Duration, keepalive_interval: Duration) -> Self {
        self.stt_retry_delay = retry_delay;
        self.stt_keepalive_interval = keepalive_interval;
        self
    }

    /// Names of the capabilities a session cannot run without
    pub fn missing_capabilities(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.speech.is_none() {
            missing.push("speech recognition");
        }
        if self.model.is_none() {
            missing.push("language model");
        }
        if self.synthesizer.is_none() {
            missing.push("speech synthesis");
        }
        missing
    }
}

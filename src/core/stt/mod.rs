mod base;
pub mod deepgram;
pub mod manager;

pub use base::{
    STTConfig, STTError, SpeechConnector, SpeechEvent, SpeechEventReceiver, SpeechEventSender,
    SpeechSocket, TranscriptEvent,
};
pub use deepgram::{DeepgramSTT, parse_deepgram_message};
pub use manager::{AudioForwarder, SpeechSocketManager};

use std::sync::Arc;

/// Supported speech-recognition upstreams
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum STTProvider {
    /// Deepgram streaming listen API
    Deepgram,
}

impl std::fmt::Display for STTProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            STTProvider::Deepgram => write!(f, "deepgram"),
        }
    }
}

impl std::str::FromStr for STTProvider {
    type Err = STTError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deepgram" => Ok(STTProvider::Deepgram),
            _ => Err(STTError::ConfigurationError(format!(
                "Unsupported STT provider: {s}. Supported providers: deepgram"
            ))),
        }
    }
}

/// Build the process-wide connector for `provider`
pub fn create_speech_connector(
    provider: &str,
    config: STTConfig,
) -> Result<Arc<dyn SpeechConnector>, STTError> {
    match provider.parse::<STTProvider>()? {
        STTProvider::Deepgram => Ok(Arc::new(DeepgramSTT::new(config)?)),
    }
}

#[cfg(test)]
mod factory_tests {
    use super::*;

    #[test]
    fn test_stt_provider_from_string() {
        assert_eq!(
            "deepgram".parse::<STTProvider>().unwrap(),
            STTProvider::Deepgram
        );
        assert_eq!(
            "DEEPGRAM".parse::<STTProvider>().unwrap(),
            STTProvider::Deepgram
        );

        let result = "whisper".parse::<STTProvider>();
        if let Err(STTError::ConfigurationError(msg)) = result {
            assert!(msg.contains("Unsupported STT provider: whisper"));
        } else {
            panic!("Expected ConfigurationError");
        }
    }

    #[test]
    fn test_create_speech_connector() {
        let config = STTConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        };
        let connector = create_speech_connector("deepgram", config).unwrap();
        assert_eq!(connector.get_provider_info(), "Deepgram STT WebSocket v1");

        assert!(create_speech_connector("deepgram", STTConfig::default()).is_err());
    }
}

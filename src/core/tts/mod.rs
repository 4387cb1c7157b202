mod base;
pub mod deepgram;
pub mod elevenlabs;
pub mod provider;

pub use base::{AudioData, SpeechSynthesizer, TTSConfig, TTSError, TTSResult};
pub use deepgram::DeepgramTTS;
pub use elevenlabs::ElevenLabsTTS;
pub use provider::{HttpSynthesizer, TTSRequestBuilder};

use std::sync::Arc;

/// Supported TTS providers. Both are plain HTTPS request/response APIs;
/// AWS Polly is not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TTSProvider {
    ElevenLabs,
    Deepgram,
}

impl std::fmt::Display for TTSProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TTSProvider::ElevenLabs => write!(f, "elevenlabs"),
            TTSProvider::Deepgram => write!(f, "deepgram"),
        }
    }
}

impl std::str::FromStr for TTSProvider {
    type Err = TTSError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "elevenlabs" => Ok(TTSProvider::ElevenLabs),
            "deepgram" => Ok(TTSProvider::Deepgram),
            _ => Err(TTSError::InvalidConfiguration(format!(
                "Unsupported TTS provider: {s}. Supported providers: elevenlabs, deepgram"
            ))),
        }
    }
}

/// Factory function to create the configured synthesizer
pub fn create_tts_provider(config: TTSConfig) -> TTSResult<Arc<dyn SpeechSynthesizer>> {
    match config.provider.parse::<TTSProvider>()? {
        TTSProvider::ElevenLabs => Ok(Arc::new(ElevenLabsTTS::from_config(config)?)),
        TTSProvider::Deepgram => Ok(Arc::new(DeepgramTTS::from_config(config)?)),
    }
}

#[cfg(test)]
mod factory_tests {
    use super::*;

    #[test]
    fn test_tts_provider_from_str() {
        assert_eq!(
            "ElevenLabs".parse::<TTSProvider>().unwrap(),
            TTSProvider::ElevenLabs
        );
        assert_eq!(
            "deepgram".parse::<TTSProvider>().unwrap(),
            TTSProvider::Deepgram
        );
        assert!("polly".parse::<TTSProvider>().is_err());
    }

    #[test]
    fn test_create_tts_provider() {
        let tts = create_tts_provider(TTSConfig {
            provider: "deepgram".to_string(),
            api_key: "key".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(tts.get_provider_info(), "Deepgram TTS REST");

        let tts = create_tts_provider(TTSConfig {
            api_key: "key".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(tts.get_provider_info(), "ElevenLabs TTS REST");
    }
}

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::base::{TTSConfig, TTSError, TTSResult};
use super::provider::{HttpSynthesizer, TTSRequestBuilder};

/// Voice settings for ElevenLabs TTS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Voice stability (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<f32>,
    /// Similarity boost (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_boost: Option<f32>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: Some(0.5),
            similarity_boost: Some(0.8),
        }
    }
}

pub const ELEVENLABS_API_URL: &str = "https://api.elevenlabs.io";
pub const ELEVENLABS_DEFAULT_VOICE: &str = "JBFqnCBsd6RMkjVDRZzb";
pub const ELEVENLABS_DEFAULT_MODEL: &str = "eleven_flash_v2_5";
pub const ELEVENLABS_DEFAULT_FORMAT: &str = "mp3_44100_128";

/// ElevenLabs-specific request builder
pub struct ElevenLabsRequestBuilder {
    config: TTSConfig,
    voice_settings: VoiceSettings,
}

impl ElevenLabsRequestBuilder {
    fn voice_id(&self) -> &str {
        self.config
            .voice_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(ELEVENLABS_DEFAULT_VOICE)
    }

    fn model_id(&self) -> &str {
        if self.config.model.is_empty() {
            ELEVENLABS_DEFAULT_MODEL
        } else {
            &self.config.model
        }
    }

    /// ElevenLabs format id, e.g. `mp3_44100_128` or `pcm_24000`
    fn format_id(&self) -> String {
        match self.config.audio_format.as_deref() {
            None | Some("mp3") => ELEVENLABS_DEFAULT_FORMAT.to_string(),
            Some("linear16") | Some("pcm") => {
                format!("pcm_{}", self.config.sample_rate.unwrap_or(24000))
            }
            Some(other) => other.to_string(),
        }
    }
}

impl TTSRequestBuilder for ElevenLabsRequestBuilder {
    fn build_http_request(&self, client: &reqwest::Client, text: &str) -> reqwest::RequestBuilder {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(ELEVENLABS_API_URL)
            .trim_end_matches('/');
        let format_id = self.format_id();
        let url = format!(
            "{base}/v1/text-to-speech/{}?output_format={format_id}",
            self.voice_id()
        );

        let body = json!({
            "text": text,
            "model_id": self.model_id(),
            "voice_settings": self.voice_settings,
        });

        let accept = if format_id.starts_with("pcm") {
            "audio/pcm"
        } else {
            "audio/mpeg"
        };

        client
            .post(url)
            .header("xi-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .header("Accept", accept)
            .json(&body)
    }

    fn get_config(&self) -> &TTSConfig {
        &self.config
    }

    fn output_format(&self) -> (String, u32) {
        let format_id = self.format_id();
        let mut parts = format_id.split('_');
        let codec = parts.next().unwrap_or("mp3").to_string();
        let sample_rate = parts
            .next()
            .and_then(|rate| rate.parse().ok())
            .unwrap_or(44100);
        (codec, sample_rate)
    }

    fn provider_info(&self) -> &'static str {
        "ElevenLabs TTS REST"
    }
}

/// ElevenLabs TTS over the HTTP REST API
pub type ElevenLabsTTS = HttpSynthesizer<ElevenLabsRequestBuilder>;

impl ElevenLabsTTS {
    pub fn from_config(config: TTSConfig) -> TTSResult<Self> {
        if config.api_key.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "API key is required for ElevenLabs".to_string(),
            ));
        }

        HttpSynthesizer::new(ElevenLabsRequestBuilder {
            config,
            voice_settings: VoiceSettings::default(),
        })
    }
}

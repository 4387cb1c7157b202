//! # Deepgram TTS
//!
//! REST synthesis against `POST /v1/speak`. The whole reply is sent in one
//! request and the response body is the encoded audio.

use serde_json::json;
use url::Url;

use super::base::{TTSConfig, TTSError, TTSResult};
use super::provider::{HttpSynthesizer, TTSRequestBuilder};

pub const DEEPGRAM_API_URL: &str = "https://api.deepgram.com";
pub const DEEPGRAM_DEFAULT_VOICE: &str = "aura-2-thalia-en";

/// Deepgram-specific request builder
pub struct DeepgramRequestBuilder {
    config: TTSConfig,
}

impl DeepgramRequestBuilder {
    /// Build the speak URL with query parameters
    fn build_url(&self) -> TTSResult<Url> {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEEPGRAM_API_URL)
            .trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/v1/speak"))
            .map_err(|e| TTSError::InvalidConfiguration(format!("Invalid base URL: {e}")))?;

        let (encoding, sample_rate) = self.output_format();
        url.query_pairs_mut()
            .append_pair("model", self.model())
            .append_pair("encoding", &encoding)
            .append_pair("sample_rate", &sample_rate.to_string())
            .append_pair("container", "wav");

        Ok(url)
    }

    fn model(&self) -> &str {
        self.config
            .voice_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .or_else(|| Some(self.config.model.as_str()).filter(|m| !m.is_empty()))
            .unwrap_or(DEEPGRAM_DEFAULT_VOICE)
    }
}

impl TTSRequestBuilder for DeepgramRequestBuilder {
    fn build_http_request(&self, client: &reqwest::Client, text: &str) -> reqwest::RequestBuilder {
        // URL is validated in `DeepgramTTS::from_config`
        let url = self
            .build_url()
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{DEEPGRAM_API_URL}/v1/speak"));

        client
            .post(url)
            .header("Authorization", format!("Token {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&json!({ "text": text }))
    }

    fn get_config(&self) -> &TTSConfig {
        &self.config
    }

    fn output_format(&self) -> (String, u32) {
        (
            self.config
                .audio_format
                .clone()
                .unwrap_or_else(|| "linear16".to_string()),
            self.config.sample_rate.unwrap_or(48000),
        )
    }

    fn provider_info(&self) -> &'static str {
        "Deepgram TTS REST"
    }
}

/// Deepgram TTS over the HTTP REST API
pub type DeepgramTTS = HttpSynthesizer<DeepgramRequestBuilder>;

impl DeepgramTTS {
    pub fn from_config(config: TTSConfig) -> TTSResult<Self> {
        if config.api_key.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Missing API key in provider configuration".to_string(),
            ));
        }

        let request_builder = DeepgramRequestBuilder { config };
        request_builder.build_url()?;
        HttpSynthesizer::new(request_builder)
    }
}

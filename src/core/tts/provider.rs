//! Generic HTTP synthesis shared by every REST-based TTS provider.
//!
//! Providers only describe how to build their request through
//! [`TTSRequestBuilder`]; sending, status handling and body collection live in
//! [`HttpSynthesizer`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use super::base::{AudioData, SpeechSynthesizer, TTSConfig, TTSError, TTSResult};

/// Provider-specific part of an HTTP synthesis call
pub trait TTSRequestBuilder: Send + Sync {
    /// Build the HTTP request with provider-specific URL, headers and body
    fn build_http_request(&self, client: &reqwest::Client, text: &str) -> reqwest::RequestBuilder;

    /// Get the configuration
    fn get_config(&self) -> &TTSConfig;

    /// Format and sample rate of the audio the request asks for
    fn output_format(&self) -> (String, u32);

    fn provider_info(&self) -> &'static str;
}

/// Synthesizer that posts one request per reply and returns the whole body
pub struct HttpSynthesizer<B: TTSRequestBuilder> {
    client: reqwest::Client,
    request_builder: B,
}

impl<B: TTSRequestBuilder> HttpSynthesizer<B> {
    pub fn new(request_builder: B) -> TTSResult<Self> {
        let timeout = request_builder.get_config().request_timeout.unwrap_or(60);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| TTSError::ConnectionFailed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            request_builder,
        })
    }

    pub fn request_builder(&self) -> &B {
        &self.request_builder
    }
}

#[async_trait]
impl<B: TTSRequestBuilder> SpeechSynthesizer for HttpSynthesizer<B> {
    async fn synthesize(&self, text: &str) -> TTSResult<AudioData> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Cannot synthesize empty text".to_string(),
            ));
        }

        let response = self
            .request_builder
            .build_http_request(&self.client, text)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TTSError::TimeoutError(format!("Request timed out: {e}"))
                } else {
                    TTSError::NetworkError(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("TTS API error ({}): {}", status, error_body);
            return Err(TTSError::ProviderError(format!(
                "API error ({status}): {error_body}"
            )));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| TTSError::AudioGenerationFailed(format!("Failed to read audio: {e}")))?;

        let (format, sample_rate) = self.request_builder.output_format();
        debug!(
            "Synthesized {} bytes of {} audio via {}",
            data.len(),
            format,
            self.request_builder.provider_info()
        );

        Ok(AudioData {
            data,
            sample_rate,
            format,
            duration_ms: None,
        })
    }

    fn get_provider_info(&self) -> &'static str {
        self.request_builder.provider_info()
    }
}

//! Configuration module for the voicebridge server
//!
//! Configuration comes from environment variables (with `.env` support) or from
//! a YAML file. When a YAML file is given its values win and environment
//! variables fill the gaps.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment-only loading
//! - `merge`: Merging YAML and environment values with defaults
//! - `validation`: Configuration validation logic
//! - `utils`: Helpers for parsing raw values
//!
//! # Example
//! ```rust,no_run
//! use voicebridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//!
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::history::HistoryConfig;
use crate::core::llm::LLMConfig;
use crate::core::stt::STTConfig;
use crate::core::tts::TTSConfig;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

/// Server configuration
///
/// Credentials are optional: a missing key disables the capability that needs
/// it instead of failing startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Speech recognition
    pub deepgram_api_key: Option<String>,
    pub stt_model: String,
    pub stt_language: String,
    pub stt_sample_rate: u32,
    pub stt_endpointing_ms: u32,
    pub stt_keepalive_seconds: u64,
    pub stt_retry_delay_ms: u64,

    // Language model
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_max_attempts: u32,
    pub system_prompt_path: PathBuf,

    // Speech synthesis
    pub tts_provider: String,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: String,
    pub elevenlabs_model: String,

    // Persistence
    pub history_path: Option<PathBuf>, // if None, history is kept in memory
    pub history_ttl_seconds: u64,
    pub history_max_messages: usize,
    pub latency_log_path: PathBuf,
    pub bookings_path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from a YAML file, with environment variables filling
    /// any value the file leaves out.
    ///
    /// The `.env` file is not read here; only real environment variables apply.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Speech-recognition settings, or `None` without a Deepgram key
    pub fn stt_config(&self) -> Option<STTConfig> {
        let api_key = self.deepgram_api_key.clone()?;
        Some(STTConfig {
            api_key,
            model: self.stt_model.clone(),
            language: self.stt_language.clone(),
            sample_rate: self.stt_sample_rate,
            endpointing_ms: self.stt_endpointing_ms,
            ..Default::default()
        })
    }

    pub fn stt_keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.stt_keepalive_seconds)
    }

    pub fn stt_retry_delay(&self) -> Duration {
        Duration::from_millis(self.stt_retry_delay_ms)
    }

    /// Language-model settings, or `None` without an API key
    pub fn llm_config(&self) -> Option<LLMConfig> {
        let api_key = self.llm_api_key.clone()?;
        Some(LLMConfig {
            api_key,
            base_url: self.llm_base_url.clone(),
            model: self.llm_model.clone(),
            max_attempts: self.llm_max_attempts,
            system_prompt_path: Some(self.system_prompt_path.clone()),
            bookings_path: self.bookings_path.clone(),
            ..Default::default()
        })
    }

    /// Synthesis settings for the configured provider, or `None` when that
    /// provider's key is missing
    pub fn tts_config(&self) -> Option<TTSConfig> {
        match self.tts_provider.as_str() {
            "deepgram" => Some(TTSConfig {
                provider: "deepgram".to_string(),
                api_key: self.deepgram_api_key.clone()?,
                ..Default::default()
            }),
            _ => Some(TTSConfig {
                provider: "elevenlabs".to_string(),
                api_key: self.elevenlabs_api_key.clone()?,
                voice_id: Some(self.elevenlabs_voice_id.clone()),
                model: self.elevenlabs_model.clone(),
                ..Default::default()
            }),
        }
    }

    pub fn history_config(&self) -> HistoryConfig {
        HistoryConfig {
            path: self.history_path.clone(),
            ttl: Duration::from_secs(self.history_ttl_seconds),
            max_messages: self.history_max_messages,
        }
    }
}

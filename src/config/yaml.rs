use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// Every field is optional so a file may configure only part of the server.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///
/// stt:
///   deepgram_api_key: "your-deepgram-key"
///   model: "nova-3"
///   language: "en-GB"
///   sample_rate: 48000
///   endpointing_ms: 100
///   keepalive_seconds: 12
///   retry_delay_ms: 200
///
/// llm:
///   api_key: "your-llm-key"
///   base_url: "https://api.groq.com/openai/v1"
///   model: "moonshotai/kimi-k2-instruct-0905"
///   max_attempts: 3
///   system_prompt_path: "lib/prompts/prompt.txt"
///
/// tts:
///   provider: "elevenlabs"
///   elevenlabs_api_key: "your-elevenlabs-key"
///   voice_id: "JBFqnCBsd6RMkjVDRZzb"
///   model: "eleven_flash_v2_5"
///
/// storage:
///   history_path: "/var/lib/voicebridge/history"
///   history_ttl_seconds: 86400
///   history_max_messages: 200
///   latency_log_path: "logs/latency.jsonl"
///   bookings_path: "bookings.csv"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub stt: Option<SttYaml>,
    pub llm: Option<LlmYaml>,
    pub tts: Option<TtsYaml>,
    pub storage: Option<StorageYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SttYaml {
    pub deepgram_api_key: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub sample_rate: Option<u32>,
    pub endpointing_ms: Option<u32>,
    pub keepalive_seconds: Option<u64>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LlmYaml {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_attempts: Option<u32>,
    pub system_prompt_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TtsYaml {
    pub provider: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub voice_id: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageYaml {
    pub history_path: Option<PathBuf>,
    pub history_ttl_seconds: Option<u64>,
    pub history_max_messages: Option<usize>,
    pub latency_log_path: Option<PathBuf>,
    pub bookings_path: Option<PathBuf>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {e}", path.display()))?;
        Ok(config)
    }
}

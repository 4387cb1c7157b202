use std::path::PathBuf;

use super::ServerConfig;
use super::utils::{first_env_value, parse_env};
use super::yaml::YamlConfig;

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. YAML configuration values
/// 2. Environment variables (first non-blank of the listed names)
/// 3. Default values
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let stt = yaml.stt.unwrap_or_default();
    let llm = yaml.llm.unwrap_or_default();
    let tts = yaml.tts.unwrap_or_default();
    let storage = yaml.storage.unwrap_or_default();

    // YAML > ENV > Default
    macro_rules! get_value {
        ($yaml_value:expr, [$($env_var:expr),+], $default:expr) => {
            $yaml_value
                .or_else(|| first_env_value(&[$($env_var),+]))
                .unwrap_or_else(|| $default.to_string())
        };
    }

    // YAML > ENV
    macro_rules! get_optional {
        ($yaml_value:expr, [$($env_var:expr),+]) => {
            $yaml_value
                .filter(|v: &String| !v.trim().is_empty())
                .or_else(|| first_env_value(&[$($env_var),+]))
        };
    }

    // YAML > parsed ENV > Default
    macro_rules! get_parsed {
        ($yaml_value:expr, [$($env_var:expr),+], $default:expr) => {
            match $yaml_value {
                Some(value) => value,
                None => parse_env(&[$($env_var),+])?.unwrap_or($default),
            }
        };
    }

    let host = get_value!(server.host, ["HOST"], "0.0.0.0");
    let port = get_parsed!(server.port, ["PORT"], 3001u16);

    // Speech recognition
    let deepgram_api_key = get_optional!(stt.deepgram_api_key, ["DEEPGRAM_API_KEY"]);
    let stt_model = get_value!(stt.model, ["STT_MODEL"], "nova-3");
    let stt_language = get_value!(stt.language, ["STT_LANGUAGE"], "en-GB");
    let stt_sample_rate = get_parsed!(stt.sample_rate, ["STT_SAMPLE_RATE"], 48_000u32);
    let stt_endpointing_ms = get_parsed!(
        stt.endpointing_ms,
        ["ENDPOINTING_MS", "DEEPGRAM_ENDPOINTING_MS"],
        100u32
    );
    let stt_keepalive_seconds =
        get_parsed!(stt.keepalive_seconds, ["STT_KEEPALIVE_SECONDS"], 12u64);
    let stt_retry_delay_ms = get_parsed!(stt.retry_delay_ms, ["STT_RETRY_DELAY_MS"], 200u64);

    // Language model
    let llm_api_key = get_optional!(
        llm.api_key,
        ["LLM_API_KEY", "GROQ_API_KEY", "OPENAI_API_KEY"]
    );
    let llm_base_url = get_value!(
        llm.base_url,
        ["OPENAI_BASE_URL"],
        "https://api.groq.com/openai/v1"
    );
    let llm_model = get_value!(llm.model, ["LLM_MODEL"], "moonshotai/kimi-k2-instruct-0905");
    let llm_max_attempts = get_parsed!(llm.max_attempts, ["LLM_MAX_ATTEMPTS"], 3u32);
    let system_prompt_path = llm
        .system_prompt_path
        .or_else(|| first_env_value(&["SYSTEM_PROMPT_PATH"]).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("lib/prompts/prompt.txt"));

    // Speech synthesis
    let tts_provider = get_value!(tts.provider, ["TTS_PROVIDER"], "elevenlabs").to_lowercase();
    let elevenlabs_api_key = get_optional!(tts.elevenlabs_api_key, ["ELEVENLABS_API_KEY"]);
    let elevenlabs_voice_id = get_value!(
        tts.voice_id,
        ["ELEVENLABS_VOICE_ID"],
        "JBFqnCBsd6RMkjVDRZzb"
    );
    let elevenlabs_model = get_value!(tts.model, ["ELEVENLABS_MODEL"], "eleven_flash_v2_5");

    // Persistence
    let history_path = storage
        .history_path
        .or_else(|| first_env_value(&["HISTORY_PATH"]).map(PathBuf::from));
    let history_ttl_seconds =
        get_parsed!(storage.history_ttl_seconds, ["HISTORY_TTL_SECONDS"], 86_400u64);
    let history_max_messages =
        get_parsed!(storage.history_max_messages, ["HISTORY_MAX_MESSAGES"], 200usize);
    let latency_log_path = storage
        .latency_log_path
        .or_else(|| first_env_value(&["LATENCY_LOG_PATH"]).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("logs/latency.jsonl"));
    let bookings_path = storage
        .bookings_path
        .or_else(|| first_env_value(&["BOOKINGS_PATH"]).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("bookings.csv"));

    Ok(ServerConfig {
        host,
        port,
        deepgram_api_key,
        stt_model,
        stt_language,
        stt_sample_rate,
        stt_endpointing_ms,
        stt_keepalive_seconds,
        stt_retry_delay_ms,
        llm_api_key,
        llm_base_url,
        llm_model,
        llm_max_attempts,
        system_prompt_path,
        tts_provider,
        elevenlabs_api_key,
        elevenlabs_voice_id,
        elevenlabs_model,
        history_path,
        history_ttl_seconds,
        history_max_messages,
        latency_log_path,
        bookings_path,
    })
}

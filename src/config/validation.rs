use super::ServerConfig;

const TTS_PROVIDERS: &[&str] = &["elevenlabs", "deepgram"];

/// Validate the merged configuration
pub fn validate_config(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_tts_provider(&config.tts_provider)?;
    validate_non_zero("STT_SAMPLE_RATE", u64::from(config.stt_sample_rate))?;
    validate_non_zero("STT_KEEPALIVE_SECONDS", config.stt_keepalive_seconds)?;
    validate_non_zero("LLM_MAX_ATTEMPTS", u64::from(config.llm_max_attempts))?;
    validate_non_zero("HISTORY_MAX_MESSAGES", config.history_max_messages as u64)?;
    Ok(())
}

/// Validate that the synthesis provider is one we can build
pub fn validate_tts_provider(provider: &str) -> Result<(), Box<dyn std::error::Error>> {
    if TTS_PROVIDERS.contains(&provider) {
        return Ok(());
    }
    Err(format!(
        "Unsupported TTS_PROVIDER '{provider}'. Supported providers: {}",
        TTS_PROVIDERS.join(", ")
    )
    .into())
}

fn validate_non_zero(name: &str, value: u64) -> Result<(), Box<dyn std::error::Error>> {
    if value == 0 {
        return Err(format!("{name} must be greater than zero").into());
    }
    Ok(())
}

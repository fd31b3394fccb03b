use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub stt: ProviderConfig,
    pub stt_language: Option<String>,
    pub chat: ProviderConfig,
    pub slice_interval: Duration,
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_STT_MODEL: &str = "whisper-1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SLICE_MS: u64 = 5000;

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Read configuration from the environment. Both providers share
    /// `OPENAI_API_KEY` unless a per-provider key is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let shared_key = env::var("OPENAI_API_KEY").ok().filter(|v| !v.trim().is_empty());

        let stt_key = env::var("STT_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| shared_key.clone())
            .ok_or(ConfigError::MissingVar("OPENAI_API_KEY"))?;

        let chat_key = env::var("CHAT_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or(shared_key)
            .ok_or(ConfigError::MissingVar("OPENAI_API_KEY"))?;

        let slice_ms_raw = var_or("SLICE_INTERVAL_MS", &DEFAULT_SLICE_MS.to_string());
        let slice_ms: u64 = slice_ms_raw
            .parse()
            .map_err(|_| ConfigError::InvalidVar { name: "SLICE_INTERVAL_MS", value: slice_ms_raw })?;

        let language = env::var("STT_LANGUAGE").ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: var_or("DATABASE_URL", "sqlite:data/voicepad.db"),
            stt: ProviderConfig {
                base_url: var_or("STT_BASE_URL", DEFAULT_BASE_URL),
                api_key: stt_key,
                model: var_or("STT_MODEL", DEFAULT_STT_MODEL),
            },
            stt_language: language.or_else(|| Some("en".to_string())),
            chat: ProviderConfig {
                base_url: var_or("CHAT_BASE_URL", DEFAULT_BASE_URL),
                api_key: chat_key,
                model: var_or("CHAT_MODEL", DEFAULT_CHAT_MODEL),
            },
            slice_interval: Duration::from_millis(slice_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_or_falls_back_on_missing_and_blank() {
        assert_eq!(var_or("VOICEPAD_TEST_UNSET_VAR", "fallback"), "fallback");

        unsafe { env::set_var("VOICEPAD_TEST_BLANK_VAR", "   ") };
        assert_eq!(var_or("VOICEPAD_TEST_BLANK_VAR", "fallback"), "fallback");
        unsafe { env::remove_var("VOICEPAD_TEST_BLANK_VAR") };
    }
}

//! Process configuration, resolved once at startup.
//!
//! Everything comes from environment variables (plus the `--bind` flag in
//! the server binary). The Gemini API key is required; startup fails fast
//! without it. The key is never logged.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8000;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 500;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("GEMINI_API_KEY is not set. Export it before starting the server.")]
    MissingApiKey,
    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

/// Resolved configuration for the whole process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub api_key: String,
    pub model: String,
    /// Base URL of the Gemini API. Overridable mainly so tests can point
    /// the client at a local mock.
    pub api_base_url: String,
    /// Document text is truncated to this many characters before it is
    /// interpolated into the prompt.
    pub max_context_chars: usize,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    /// Directory for temporary upload files.
    pub upload_dir: PathBuf,
}

impl Settings {
    /// Resolve settings from the environment. `bind_arg` is the `--bind`
    /// CLI override, which wins over `PAPERCHAT_BIND`.
    pub fn from_env(bind_arg: Option<&str>) -> Result<Self, SettingsError> {
        let api_key = match std::env::var("GEMINI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ => return Err(SettingsError::MissingApiKey),
        };

        let bind_addr = bind_arg
            .map(|s| s.to_string())
            .or_else(|| env_nonempty("PAPERCHAT_BIND"))
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        Ok(Settings {
            bind_addr,
            api_key,
            model: env_nonempty("PAPERCHAT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base_url: env_nonempty("GEMINI_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            max_context_chars: env_parse("PAPERCHAT_MAX_CONTEXT_CHARS", DEFAULT_MAX_CONTEXT_CHARS)?,
            max_output_tokens: env_parse("PAPERCHAT_MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS)?,
            temperature: env_parse("PAPERCHAT_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            request_timeout_secs: env_parse("PAPERCHAT_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            upload_dir: env_nonempty("PAPERCHAT_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => None,
    }
}

fn env_parse<T: FromStr>(name: &'static str, default: T) -> Result<T, SettingsError> {
    match env_nonempty(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| SettingsError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

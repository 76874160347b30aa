//! Configuration management for Smart Companion.
//!
//! Backend (`smart-companion`) environment variables:
//! - `GEMINI_API_KEY` - Required. Google Gemini API key.
//! - `GEMINI_MODEL` - Optional. Model id. Defaults to `gemini-2.5-flash`.
//! - `GEMINI_ENDPOINT` - Optional. API base URL. Defaults to the public v1beta endpoint.
//! - `LLM_TIMEOUT_SECS` - Optional. Provider request timeout. Defaults to `30`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `5000`.
//! - `SANITIZE_NAMES` - Optional. Extra comma-separated names to redact.
//!
//! Terminal front-end (`companion`) environment variables:
//! - `COMPANION_API_URL` - Optional. Backend base URL. Defaults to `http://localhost:5000`.
//! - `COMPANION_DATA_DIR` - Optional. Where preferences and streak live. Defaults to `./.smart-companion`.
//! - `COMPANION_TTS_COMMAND` - Optional. Speech program. Defaults to `espeak-ng`; empty disables speech.
//! - `COMPANION_STT_COMMAND` - Optional. Dictation program printing one transcript to stdout.
//! - `COMPANION_REQUEST_TIMEOUT_SECS` - Optional. Backend request timeout. Defaults to `60`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::llm::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL};
use crate::sanitize::SanitizerRules;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key
    pub api_key: String,

    /// Gemini model identifier
    pub model: String,

    /// Gemini API base URL
    pub endpoint: String,

    /// Timeout for a single provider request
    pub llm_timeout: Duration,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Names redacted in addition to the built-in list
    pub extra_names: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());

        let endpoint = std::env::var("GEMINI_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_GEMINI_ENDPOINT.to_string());
        validate_url("GEMINI_ENDPOINT", &endpoint)?;

        let llm_timeout = Duration::from_secs(parse_var("LLM_TIMEOUT_SECS", 30u64)?);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_var("PORT", 5000u16)?;

        let extra_names = std::env::var("SANITIZE_NAMES")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        Ok(Self {
            api_key,
            model,
            endpoint,
            llm_timeout,
            host,
            port,
            extra_names,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            llm_timeout: Duration::from_secs(30),
            host: "127.0.0.1".to_string(),
            port: 5000,
            extra_names: Vec::new(),
        }
    }

    pub fn sanitizer_rules(&self) -> SanitizerRules {
        SanitizerRules::with_extra_names(self.extra_names.iter().cloned())
    }
}

/// Terminal front-end configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash
    pub api_url: String,

    /// Directory for `user_profile.json` and `streak_data.json`
    pub data_dir: PathBuf,

    /// Speech program; `None` disables spoken output
    pub tts_command: Option<String>,

    /// Dictation program; `None` disables voice input
    pub stt_command: Option<String>,

    /// Timeout for one backend request
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000".to_string(),
            data_dir: PathBuf::from("./.smart-companion"),
            tts_command: Some("espeak-ng".to_string()),
            stt_command: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables. Everything has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = std::env::var("COMPANION_API_URL").unwrap_or(defaults.api_url);
        validate_url("COMPANION_API_URL", &api_url)?;
        let api_url = api_url.trim_end_matches('/').to_string();

        let data_dir = std::env::var("COMPANION_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let tts_command = match std::env::var("COMPANION_TTS_COMMAND") {
            Ok(v) => non_empty(v),
            Err(_) => defaults.tts_command,
        };

        let stt_command = std::env::var("COMPANION_STT_COMMAND").ok().and_then(non_empty);

        let request_timeout =
            Duration::from_secs(parse_var("COMPANION_REQUEST_TIMEOUT_SECS", 60u64)?);

        Ok(Self {
            api_url,
            data_dir,
            tts_command,
            stt_command,
            request_timeout,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))
}

fn validate_url(name: &str, raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("unsupported scheme '{}'", other),
        )),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let config = Config::new("key".to_string(), DEFAULT_GEMINI_MODEL.to_string());
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.endpoint, DEFAULT_GEMINI_ENDPOINT);
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value::<u16>("PORT", " 8080 ").unwrap(), 8080);
        let err = parse_value::<u16>("PORT", "eighty").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "PORT"));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("X", "http://localhost:5000").is_ok());
        assert!(validate_url("X", "https://example.com/v1beta").is_ok());
        assert!(validate_url("X", "localhost:5000").is_err());
        assert!(validate_url("X", "ftp://example.com").is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("Meera, ,Arjun,"), vec!["Meera", "Arjun"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_sanitizer_rules_include_extra_names() {
        let mut config = Config::new("key".to_string(), DEFAULT_GEMINI_MODEL.to_string());
        config.extra_names = vec!["Meera".to_string()];
        assert!(config.sanitizer_rules().names.iter().any(|n| n == "Meera"));
    }

    #[test]
    fn test_client_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:5000");
        assert_eq!(config.tts_command.as_deref(), Some("espeak-ng"));
        assert!(config.stt_command.is_none());
    }
}

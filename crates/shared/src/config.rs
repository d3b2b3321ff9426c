use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config_env::{
    optional_trimmed_env, parse_bool_env, parse_f32_env, parse_u32_env, parse_u64_env,
};
use crate::inference::InferenceOptions;

const DEFAULT_CACHE_DIR: &str = ".flight-agent-cache";
const DEFAULT_LOCAL_ORIGIN: &str = "http://localhost/";
const DEFAULT_REMOTE_ORIGIN: &str =
    "https://storage.googleapis.com/jmstore/WebAIDemos/models/Gemma2/";
const DEFAULT_MODEL_FILE: &str = "gemma2-2b-it-gpu-int8.bin";
const DEFAULT_FILESET_FILE: &str = "genai-fileset.json";
const DEFAULT_COMPLETION_URL: &str = "http://localhost:8080/completion";
const DEFAULT_SEARCH_DELAY_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub cache_dir: PathBuf,
    pub cache_disabled: bool,
    pub local_origin: Url,
    pub remote_origin: Url,
    pub model_file: String,
    pub fileset_file: String,
    pub completion_url: Url,
    pub fetch_timeout: Option<Duration>,
    pub search_delay: Duration,
    pub inference: InferenceOptions,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid float in env var {0}")]
    ParseFloat(String),
    #[error("invalid boolean in env var {0}")]
    ParseBool(String),
    #[error("invalid url in env var {key}: {value}")]
    InvalidUrl { key: String, value: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = InferenceOptions::default();
        let inference = InferenceOptions {
            max_tokens: parse_u32_env("FLIGHT_AGENT_MAX_TOKENS", defaults.max_tokens)?,
            top_k: parse_u32_env("FLIGHT_AGENT_TOP_K", defaults.top_k)?,
            temperature: parse_f32_env("FLIGHT_AGENT_TEMPERATURE", defaults.temperature)?,
            random_seed: parse_u64_env("FLIGHT_AGENT_RANDOM_SEED", defaults.random_seed)?,
        };
        if inference.max_tokens == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "FLIGHT_AGENT_MAX_TOKENS must be greater than 0".to_string(),
            ));
        }

        let fetch_timeout = match optional_trimmed_env("FLIGHT_AGENT_FETCH_TIMEOUT_MS") {
            Some(_) => Some(Duration::from_millis(parse_u64_env(
                "FLIGHT_AGENT_FETCH_TIMEOUT_MS",
                0,
            )?)),
            None => None,
        };

        Ok(Self {
            cache_dir: optional_trimmed_env("FLIGHT_AGENT_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            cache_disabled: parse_bool_env("FLIGHT_AGENT_CACHE_DISABLED", false)?,
            local_origin: parse_origin_env("FLIGHT_AGENT_LOCAL_ORIGIN", DEFAULT_LOCAL_ORIGIN)?,
            remote_origin: parse_origin_env("FLIGHT_AGENT_REMOTE_ORIGIN", DEFAULT_REMOTE_ORIGIN)?,
            model_file: optional_trimmed_env("FLIGHT_AGENT_MODEL_FILE")
                .unwrap_or_else(|| DEFAULT_MODEL_FILE.to_string()),
            fileset_file: optional_trimmed_env("FLIGHT_AGENT_FILESET_FILE")
                .unwrap_or_else(|| DEFAULT_FILESET_FILE.to_string()),
            completion_url: parse_url_env("FLIGHT_AGENT_COMPLETION_URL", DEFAULT_COMPLETION_URL)?,
            fetch_timeout,
            search_delay: Duration::from_millis(parse_u64_env(
                "FLIGHT_AGENT_SEARCH_DELAY_MS",
                DEFAULT_SEARCH_DELAY_MS,
            )?),
            inference,
        })
    }
}

fn parse_url_env(key: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = optional_trimmed_env(key).unwrap_or_else(|| default.to_string());
    let url = Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl {
        key: key.to_string(),
        value: raw.clone(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidConfiguration(format!(
            "{key} must start with http:// or https://"
        )));
    }
    Ok(url)
}

// Origins are joined with relative file names, so they must end in a slash.
fn parse_origin_env(key: &str, default: &str) -> Result<Url, ConfigError> {
    let url = parse_url_env(key, default)?;
    if url.path().ends_with('/') {
        return Ok(url);
    }

    let mut normalized = url;
    let path = format!("{}/", normalized.path());
    normalized.set_path(&path);
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::{parse_origin_env, parse_url_env};

    #[test]
    fn default_origin_keeps_trailing_slash() {
        let origin = parse_origin_env("FLIGHT_AGENT_TEST_UNSET_ORIGIN", "http://localhost/models")
            .expect("default origin should parse");

        assert_eq!(origin.as_str(), "http://localhost/models/");
        assert_eq!(
            origin
                .join("gemma.bin")
                .expect("join should succeed")
                .as_str(),
            "http://localhost/models/gemma.bin"
        );
    }

    #[test]
    fn non_http_urls_are_rejected() {
        let err = parse_url_env("FLIGHT_AGENT_TEST_UNSET_URL", "file:///tmp/model.bin")
            .expect_err("file urls must be rejected");

        assert!(err.to_string().contains("http://"));
    }
}

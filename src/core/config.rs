use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};

use crate::chat::{ConversationLog, CoordinatorOptions};
use crate::gemini::{GeminiClient, GenerationConfig};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_hostname: String,
    pub api_key: String,
    pub model: String,
    pub generation_config: GenerationConfig,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub history_limit: Option<usize>,
    pub system_instruction: Option<String>,
}

impl AppConfig {
    /// Load the config from environment variables. Only the API key
    /// is required, everything else has a default.
    pub fn from_env() -> Result<Self> {
        let defaults = GenerationConfig::default();

        let api_key = env::var("GEMINI_API_KEY").context("Missing env var GEMINI_API_KEY")?;
        let api_hostname = env::var("GEMCHAT_API_HOSTNAME")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
        let model = env::var("GEMCHAT_MODEL").unwrap_or_else(|_| "gemini-1.0-pro".to_string());
        let generation_config = GenerationConfig {
            temperature: parse_env("GEMCHAT_TEMPERATURE")?.unwrap_or(defaults.temperature),
            top_p: parse_env("GEMCHAT_TOP_P")?.unwrap_or(defaults.top_p),
            top_k: parse_env("GEMCHAT_TOP_K")?.unwrap_or(defaults.top_k),
            max_output_tokens: parse_env("GEMCHAT_MAX_OUTPUT_TOKENS")?
                .unwrap_or(defaults.max_output_tokens),
        };
        let request_timeout_secs: u64 = parse_env("GEMCHAT_REQUEST_TIMEOUT_SECS")?.unwrap_or(60);
        if request_timeout_secs == 0 {
            bail!("Invalid value for env var GEMCHAT_REQUEST_TIMEOUT_SECS: must be at least 1");
        }
        let max_retries = parse_env("GEMCHAT_MAX_RETRIES")?.unwrap_or(0);
        let history_limit = parse_env("GEMCHAT_HISTORY_LIMIT")?;
        let system_instruction = env::var("GEMCHAT_SYSTEM_INSTRUCTION")
            .ok()
            .filter(|i| !i.trim().is_empty());

        Ok(Self {
            api_hostname,
            api_key,
            model,
            generation_config,
            request_timeout_secs,
            max_retries,
            history_limit,
            system_instruction,
        })
    }

    pub fn gemini_client(&self) -> Result<GeminiClient> {
        let client = GeminiClient::new(
            &self.api_hostname,
            &self.api_key,
            &self.model,
            self.generation_config.clone(),
        )?
        .history_limit(self.history_limit)
        .system_instruction(self.system_instruction.as_deref());
        Ok(client)
    }

    /// The log shares the history limit with the client so the
    /// transcript and the replayed context stay the same size.
    pub fn conversation_log(&self) -> ConversationLog {
        match self.history_limit {
            Some(limit) => ConversationLog::with_limit(limit),
            None => ConversationLog::new(),
        }
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            ..Default::default()
        }
    }
}

// Unset or empty means use the default, anything else has to parse
fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid value for env var {}: {} ({})", key, val, e)),
        _ => Ok(None),
    }
}

//! Configuration management for question_forge.
//!
//! Configuration can be set via environment variables:
//! - `AI_PROVIDER` - Optional. `deepseek`, `openrouter`, `ollama` or `offline`. Defaults to `deepseek`.
//! - `LLM_API_KEY` - Optional. Bearer key for the chat-completions providers.
//! - `LLM_API_URL` - Optional. Chat-completions endpoint. Defaults per provider.
//! - `DEFAULT_MODEL` - Optional. Model identifier. Defaults per provider.
//! - `OLLAMA_URL` - Optional. Defaults to `http://localhost:11434`.
//! - `OLLAMA_MODEL` - Optional. Defaults to `deepseek-coder:6.7b`.
//! - `DATA_DIR` - Optional. Task snapshots, stopwords and checklists. Defaults to `data`.
//! - `OUTPUT_DIR` - Optional. Generated artifacts. Defaults to `data/output`.
//! - `TEMPLATES_DIR` - Optional. Question templates. Defaults to `templates`.
//! - `TASK_STORE` - Optional. `file` or `memory`. Defaults to `file`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. HTTP timeout. Defaults to `120`.
//! - `STANDIN_FALLBACK` - Optional. Answer with stand-ins when the provider fails. Defaults to `true`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::store::TaskStoreType;
use crate::task::Stage;
use crate::util::parse_bool;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Which generative service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    DeepSeek,
    OpenRouter,
    Ollama,
    /// Stand-in responses only, no network.
    Offline,
}

impl Provider {
    fn default_api_url(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            _ => "https://api.deepseek.com/v1/chat/completions",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "deepseek/deepseek-chat",
            _ => "deepseek-chat",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deepseek" => Ok(Provider::DeepSeek),
            "openrouter" => Ok(Provider::OpenRouter),
            "ollama" => Ok(Provider::Ollama),
            "offline" | "mock" | "standin" => Ok(Provider::Offline),
            other => Err(ConfigError::InvalidValue(
                "AI_PROVIDER".to_string(),
                other.to_string(),
            )),
        }
    }
}

/// Maximum output tokens requested per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageBudgets {
    pub content: u64,
    pub rt: u64,
    pub de: u64,
    pub validator: u64,
}

impl Default for StageBudgets {
    fn default() -> Self {
        Self {
            content: 4000,
            rt: 4000,
            de: 4000,
            validator: 6000,
        }
    }
}

impl StageBudgets {
    pub fn for_stage(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Content => self.content,
            Stage::Rt => self.rt,
            Stage::De => self.de,
            Stage::Validator => self.validator,
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,

    /// Bearer key for chat-completions providers
    pub api_key: Option<String>,

    /// Chat-completions endpoint
    pub api_url: String,

    /// Chat-completions model identifier
    pub model: String,

    /// Ollama base URL (without `/api/generate`)
    pub ollama_url: String,

    pub ollama_model: String,

    /// Task snapshots, stopwords and checklists
    pub data_dir: PathBuf,

    /// Generated questions, reports and documents
    pub output_dir: PathBuf,

    pub templates_dir: PathBuf,

    pub task_store: TaskStoreType,

    pub request_timeout: Duration,

    /// Wrap the provider so failures answer with stand-in responses
    pub standin_fallback: bool,

    pub budgets: StageBudgets,
}

impl Default for Config {
    fn default() -> Self {
        let provider = Provider::default();
        Self {
            provider,
            api_key: None,
            api_url: provider.default_api_url().to_string(),
            model: provider.default_model().to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "deepseek-coder:6.7b".to_string(),
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("data/output"),
            templates_dir: PathBuf::from("templates"),
            task_store: TaskStoreType::File,
            request_timeout: Duration::from_secs(120),
            standin_fallback: true,
            budgets: StageBudgets::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unknown provider or store,
    /// or a non-numeric timeout.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any name -> value lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let provider = match var("AI_PROVIDER") {
            Some(value) => value.parse()?,
            None => defaults.provider,
        };

        let task_store = match var("TASK_STORE") {
            Some(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidValue("TASK_STORE".to_string(), e))?,
            None => defaults.task_store,
        };

        let request_timeout = match var("REQUEST_TIMEOUT_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| {
                    ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string(), format!("{}", e))
                })?,
            None => defaults.request_timeout,
        };

        Ok(Self {
            provider,
            api_key: var("LLM_API_KEY"),
            api_url: var("LLM_API_URL").unwrap_or_else(|| provider.default_api_url().to_string()),
            model: var("DEFAULT_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            ollama_url: var("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: var("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            output_dir: var("OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            templates_dir: var("TEMPLATES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.templates_dir),
            task_store,
            request_timeout,
            standin_fallback: parse_bool(var("STANDIN_FALLBACK").as_deref(), true),
            budgets: defaults.budgets,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn offline(data_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            provider: Provider::Offline,
            data_dir,
            output_dir,
            ..Self::default()
        }
    }
}

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use teloxide::types::ChatId;

use crate::chatbot::ChatbotConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Failed to read the system prompt file.
    ReadPrompt { path: PathBuf, source: std::io::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::ReadPrompt { path, source } => {
                write!(f, "failed to read system prompt '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::ReadPrompt { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    telegram_bot_token: String,
    /// Base URL of the Ollama server.
    #[serde(default = "default_ollama_host")]
    ollama_host: String,
    ollama_model: String,
    #[serde(default = "default_trigger_word")]
    trigger_word: String,
    #[serde(default = "default_max_chain_depth")]
    max_chain_depth: usize,
    #[serde(default = "default_system_prompt_path")]
    system_prompt_path: String,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    /// Answer every message in private chats.
    #[serde(default)]
    respond_in_private: bool,
    /// Answer messages that mention @bot_username.
    #[serde(default)]
    respond_to_mentions: bool,
    #[serde(default = "default_context_capacity")]
    context_capacity: usize,
    /// Chat that receives WARN/ERROR log lines.
    log_chat_id: Option<i64>,
    /// Directory for log files. Defaults to current directory.
    data_dir: Option<String>,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_trigger_word() -> String {
    "хуба".to_string()
}

fn default_max_chain_depth() -> usize {
    10
}

fn default_system_prompt_path() -> String {
    "prompts/system_prompt.txt".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_context_capacity() -> usize {
    5000
}

/// Process-wide settings, read once at start-up.
pub struct Config {
    pub telegram_bot_token: String,
    pub ollama_host: String,
    pub ollama_model: String,
    pub trigger_word: String,
    pub max_chain_depth: usize,
    pub system_prompt_path: PathBuf,
    /// Contents of `system_prompt_path`, trimmed.
    pub system_prompt: String,
    pub request_timeout: Duration,
    pub respond_in_private: bool,
    pub respond_to_mentions: bool,
    pub context_capacity: usize,
    pub log_chat_id: Option<ChatId>,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }
        if file.ollama_model.trim().is_empty() {
            return Err(ConfigError::Validation("ollama_model is required".into()));
        }
        let ollama_host = file.ollama_host.trim().trim_end_matches('/').to_string();
        if !ollama_host.starts_with("http://") && !ollama_host.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "ollama_host must be an http(s) URL, got '{}'",
                file.ollama_host
            )));
        }
        if file.trigger_word.trim().is_empty() {
            return Err(ConfigError::Validation("trigger_word must not be blank".into()));
        }
        if file.max_chain_depth == 0 {
            return Err(ConfigError::Validation("max_chain_depth must be at least 1".into()));
        }
        // A full chain plus the incoming message must fit in the reply index.
        if file.context_capacity <= file.max_chain_depth {
            return Err(ConfigError::Validation(format!(
                "context_capacity must be greater than max_chain_depth ({})",
                file.max_chain_depth
            )));
        }
        if !(1..=600).contains(&file.request_timeout_secs) {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be between 1 and 600".into(),
            ));
        }

        let system_prompt_path = PathBuf::from(&file.system_prompt_path);
        let system_prompt = std::fs::read_to_string(&system_prompt_path)
            .map_err(|e| ConfigError::ReadPrompt { path: system_prompt_path.clone(), source: e })?
            .trim()
            .to_string();
        if system_prompt.is_empty() {
            return Err(ConfigError::Validation(format!(
                "system prompt '{}' is empty",
                system_prompt_path.display()
            )));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            ollama_host,
            ollama_model: file.ollama_model.trim().to_string(),
            trigger_word: file.trigger_word.trim().to_string(),
            max_chain_depth: file.max_chain_depth,
            system_prompt_path,
            system_prompt,
            request_timeout: Duration::from_secs(file.request_timeout_secs),
            respond_in_private: file.respond_in_private,
            respond_to_mentions: file.respond_to_mentions,
            context_capacity: file.context_capacity,
            log_chat_id: file.log_chat_id.map(ChatId),
            data_dir,
        })
    }

    /// Engine settings once the bot's own account is known.
    pub fn chatbot_config(&self, bot_user_id: i64, bot_username: Option<String>) -> ChatbotConfig {
        ChatbotConfig {
            bot_user_id,
            bot_username,
            trigger_word: self.trigger_word.clone(),
            max_chain_depth: self.max_chain_depth,
            respond_in_private: self.respond_in_private,
            respond_to_mentions: self.respond_to_mentions,
            context_capacity: self.context_capacity,
        }
    }
}

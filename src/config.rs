//! Environment-backed configuration.
//!
//! All values are resolved once at startup and passed down explicitly;
//! nothing reads the environment after `Config::from_env` returns.

use std::env;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token from BotFather.
    pub bot_token: String,
    /// User IDs allowed to talk to the bot.
    pub allowed_ids: Vec<i64>,
    /// Admin user IDs (always allowed).
    pub admin_ids: Vec<i64>,
    /// Process messages from anyone in group chats.
    pub allow_all_users_in_groups: bool,
    /// Ollama model name used for every conversation.
    pub model: String,
    /// Inference backend host.
    pub ollama_host: String,
    /// Inference backend port.
    pub ollama_port: u16,
    /// Total timeout for one streaming request, in seconds.
    pub timeout_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable '{0}' is not set")]
    MissingVar(&'static str),

    #[error("invalid value for '{var}': {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bot_token: require("BOT_TOKEN")?,
            allowed_ids: parse_id_list("USER_ID", &optional("USER_ID").unwrap_or_default())?,
            admin_ids: parse_id_list("ADMIN_ID", &optional("ADMIN_ID").unwrap_or_default())?,
            allow_all_users_in_groups: parse_flag(
                "ALLOW_ALL_USERS_IN_GROUPS",
                &optional("ALLOW_ALL_USERS_IN_GROUPS").unwrap_or_else(|| "0".to_string()),
            )?,
            model: require("MODEL")?,
            ollama_host: require("OLLAMA_HOST")?,
            ollama_port: match optional("OLLAMA_PORT") {
                Some(raw) => parse_number("OLLAMA_PORT", &raw)?,
                None => default_ollama_port(),
            },
            timeout_seconds: match optional("TIMEOUT") {
                Some(raw) => parse_number("TIMEOUT", &raw)?,
                None => default_timeout_seconds(),
            },
        })
    }

    /// Total timeout applied to one streaming chat request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_ollama_port() -> u16 {
    11434
}

fn default_timeout_seconds() -> u64 {
    3000
}

// ============================================================================
// Env Helpers
// ============================================================================

fn require(var: &'static str) -> Result<String, ConfigError> {
    optional(var).ok_or(ConfigError::MissingVar(var))
}

fn optional(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// Parse a comma-separated list of numeric user IDs. Empty input is an
/// empty list, not an error.
fn parse_id_list(var: &'static str, raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|e| ConfigError::InvalidValue {
                var,
                reason: format!("'{part}' is not a user id: {e}"),
            })
        })
        .collect()
}

/// Parse a `0`/`1` flag.
fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(ConfigError::InvalidValue {
            var,
            reason: format!("expected 0 or 1, got '{other}'"),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        var,
        reason: format!("'{raw}': {e}"),
    })
}

// ============================================================================
// Tests
// ============================================================================

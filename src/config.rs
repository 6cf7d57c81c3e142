//! Environment-sourced configuration.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// How updates reach the bot: pushed by Telegram to our webhook, or pulled
/// by long-polling `getUpdates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Webhook,
    Polling,
}

impl std::str::FromStr for DeploymentMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "webhook" => Ok(Self::Webhook),
            "polling" => Ok(Self::Polling),
            other => Err(ConfigError::InvalidValue {
                key: "INTAKE_ASSIST_MODE".to_string(),
                message: format!("expected 'webhook' or 'polling', got '{other}'"),
            }),
        }
    }
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webhook => write!(f, "webhook"),
            Self::Polling => write!(f, "polling"),
        }
    }
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot access token. Doubles as the webhook path secret.
    pub telegram_token: String,
    /// API key for the completion-generation service.
    pub openai_api_key: SecretString,
    /// Public base URL for webhook registration (webhook mode only).
    pub server_url: Option<String>,
    /// HTTP listen port.
    pub port: u16,
    pub mode: DeploymentMode,
    /// Completion model identifier.
    pub model: String,
    /// Path to the local conversation-log database file.
    pub db_path: String,
    /// Upper bound on a single completion call.
    pub completion_timeout: Duration,
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an injected lookup (tests pass a map).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let telegram_token = get("TELEGRAM_BOT_TOKEN")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()))?;

        let openai_api_key = get("OPENAI_API_KEY")
            .filter(|v| !v.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let mode = match get("INTAKE_ASSIST_MODE") {
            Some(raw) => raw.parse()?,
            None => DeploymentMode::Webhook,
        };

        let server_url = get("SERVER_URL").filter(|v| !v.is_empty());
        if mode == DeploymentMode::Webhook && server_url.is_none() {
            return Err(ConfigError::MissingEnvVar("SERVER_URL".to_string()));
        }

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("expected a port number, got '{raw}'"),
            })?,
            None => 3000,
        };

        let completion_timeout = match get("INTAKE_ASSIST_COMPLETION_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "INTAKE_ASSIST_COMPLETION_TIMEOUT_SECS".to_string(),
                    message: format!("expected seconds, got '{raw}'"),
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(30),
        };

        Ok(Self {
            telegram_token,
            openai_api_key,
            server_url,
            port,
            mode,
            model: get("INTAKE_ASSIST_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            db_path: get("INTAKE_ASSIST_DB_PATH")
                .unwrap_or_else(|| "./data/intake-assist.db".to_string()),
            completion_timeout,
        })
    }

    /// Full webhook URL: server base URL with the bot token appended as the
    /// secret path segment.
    pub fn webhook_url(&self) -> Option<String> {
        self.server_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), self.telegram_token))
    }
}

//! Configuration for pairbridge.

use std::env::VarError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::{ConfigError, ServerError};
use crate::observability::ObservabilityConfig;
use crate::telegram::{ChatId, DEFAULT_API_URL};

/// Source of raw configuration values.
type Lookup<'a> = &'a dyn Fn(&str) -> Result<String, VarError>;

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub http: HttpConfig,
    pub relay: RelayConfig,
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Does not read `.env`; the binary loads it once before parsing the CLI.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| std::env::var(key))
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            telegram: TelegramConfig::from_lookup(lookup)?,
            http: HttpConfig::from_lookup(lookup)?,
            relay: RelayConfig::from_lookup(lookup)?,
            observability: ObservabilityConfig {
                backend: optional_env(lookup, "OBSERVABILITY_BACKEND")?
                    .unwrap_or_else(|| "none".to_string()),
            },
        })
    }
}

/// Bot API access.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_url: String,
    /// Bound on every outbound copy/send call.
    pub delivery_timeout: Duration,
}

impl TelegramConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            bot_token: SecretString::from(required_env(lookup, "BOT_TOKEN")?),
            api_url: optional_env(lookup, "TELEGRAM_API_URL")?
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            delivery_timeout: Duration::from_secs(parse_optional_env(
                lookup,
                "DELIVERY_TIMEOUT_SECS",
                10u64,
            )?),
        })
    }
}

/// Webhook listener and registration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, without trailing `/`.
    pub base_url: String,
    /// Path segment of the webhook URL and expected secret header value.
    pub webhook_secret: SecretString,
}

impl HttpConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let base_url = required_env(lookup, "APP_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "APP_BASE_URL".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            host: optional_env(lookup, "HTTP_HOST")?.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_optional_env(lookup, "PORT", 10000)?,
            base_url,
            webhook_secret: SecretString::from(
                optional_env(lookup, "WEBHOOK_SECRET_TOKEN")?
                    .unwrap_or_else(|| "use-long-random".to_string()),
            ),
        })
    }

    /// Full URL to register with the platform (exposes the secret).
    pub fn webhook_url(&self) -> String {
        format!(
            "{}/webhook/{}",
            self.base_url,
            self.webhook_secret.expose_secret()
        )
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> Result<SocketAddr, ServerError> {
        let raw = if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        };
        raw.parse().map_err(|_| ServerError::InvalidAddress(raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    Pair,
    Forward,
}

impl std::str::FromStr for RelayMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pair" | "pairs" => Ok(Self::Pair),
            "forward" | "forward-all" | "forward_all" => Ok(Self::Forward),
            _ => Err(ConfigError::InvalidValue {
                key: "RELAY_MODE".to_string(),
                message: format!("unknown mode: {s}, expected 'pair' or 'forward'"),
            }),
        }
    }
}

/// Which relay runs, with its mode-specific settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayConfig {
    Pair {
        pairs_file: PathBuf,
    },
    Forward {
        target: ChatId,
        source: Option<ChatId>,
    },
}

impl RelayConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let mode = optional_env(lookup, "RELAY_MODE")?
            .map(|s| s.parse::<RelayMode>())
            .transpose()?
            .unwrap_or(RelayMode::Pair);

        match mode {
            RelayMode::Pair => Ok(Self::Pair {
                pairs_file: optional_env(lookup, "PAIRS_FILE")?
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("pairs.json")),
            }),
            RelayMode::Forward => {
                let raw = required_env(lookup, "TARGET_CHAT_ID")?;
                let target = parse_chat_id("TARGET_CHAT_ID", &raw)?;
                let source = optional_env(lookup, "SOURCE_CHAT_ID")?
                    .map(|s| parse_chat_id("SOURCE_CHAT_ID", &s))
                    .transpose()?;
                Ok(Self::Forward { target, source })
            }
        }
    }
}

fn parse_chat_id(key: &str, raw: &str) -> Result<ChatId, ConfigError> {
    raw.trim().parse::<ChatId>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("must be an integer chat id: {e}"),
    })
}

fn required_env(lookup: Lookup<'_>, key: &str) -> Result<String, ConfigError> {
    optional_env(lookup, key)?.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn optional_env(lookup: Lookup<'_>, key: &str) -> Result<Option<String>, ConfigError> {
    match lookup(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

fn parse_optional_env<T>(lookup: Lookup<'_>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(lookup, key)?
        .map(|s| {
            s.parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}

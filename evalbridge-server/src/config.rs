//! Server configuration from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `EVALBRIDGE_HOST` | `0.0.0.0` |
//! | `PORT` | `8000` |
//! | `OPENAI_API_KEY` | unset |
//! | `EVALBRIDGE_JUDGE_BASE_URL` | `https://api.openai.com/v1` |
//! | `EVALBRIDGE_JUDGE_MODEL` | `gpt-4o` |
//! | `EVALBRIDGE_JUDGE_TIMEOUT_SECS` | `120` |
//! | `EVALBRIDGE_LOG_FORMAT` | `pretty` |

use evalbridge_judge::{JudgeConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be parsed.
    #[error("Invalid value for {var}: {message}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Why it was rejected.
        message: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            message: message.into(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{}'", other)),
        }
    }
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub addr: SocketAddr,
    /// Judge backend settings.
    pub judge: JudgeConfig,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            judge: JudgeConfig::default(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value
    /// if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let host = get("EVALBRIDGE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let ip = IpAddr::from_str(host.trim())
            .map_err(|e| ConfigError::invalid("EVALBRIDGE_HOST", e.to_string()))?;

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid("PORT", e.to_string()))?,
            None => DEFAULT_PORT,
        };

        let base_url = get("EVALBRIDGE_JUDGE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::invalid("EVALBRIDGE_JUDGE_BASE_URL", e.to_string()))?;

        let model = get("EVALBRIDGE_JUDGE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout = match get("EVALBRIDGE_JUDGE_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::invalid(
                        "EVALBRIDGE_JUDGE_TIMEOUT_SECS",
                        "must be greater than zero",
                    ))
                }
                Ok(secs) => secs,
                Err(e) => {
                    return Err(ConfigError::invalid(
                        "EVALBRIDGE_JUDGE_TIMEOUT_SECS",
                        e.to_string(),
                    ))
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        let log_format = match get("EVALBRIDGE_LOG_FORMAT") {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| ConfigError::invalid("EVALBRIDGE_LOG_FORMAT", e))?,
            None => LogFormat::Pretty,
        };

        let mut judge = JudgeConfig::default()
            .base_url(base_url.trim_end_matches('/'))
            .default_model(model)
            .timeout_seconds(timeout);
        judge.api_key = get("OPENAI_API_KEY");

        Ok(Self {
            addr: SocketAddr::new(ip, port),
            judge,
            log_format,
        })
    }
}

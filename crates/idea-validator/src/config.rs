use std::str::FromStr;

use idea_common::error::CommonError;
use idea_common::openai::OpenAiClientConfig;

use crate::error::AppError;

/// Application configuration loaded explicitly from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL (e.g. "redis://127.0.0.1:6379").
    pub redis_url: String,
    /// Port to listen on, bound on all interfaces.
    pub port: u16,
    /// Completion service settings.
    pub openai: OpenAiClientConfig,
    /// Extra completion calls allowed when a reply fails validation.
    pub repair_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `REDIS_URL`: Redis connection string
    /// - `OPENAI_API_KEY`: completion service credential
    ///
    /// Optional:
    /// - `PORT` (default 3000)
    /// - `EVAL_REPAIR_ATTEMPTS` (default 0)
    /// - `OPENAI_BASE_URL`, `OPENAI_MODEL`, `OPENAI_TEMPERATURE`,
    ///   `OPENAI_TIMEOUT_SECS`, `OPENAI_MAX_ERROR_BODY_BYTES`
    pub fn from_env() -> Result<Self, AppError> {
        let redis_url = std::env::var("REDIS_URL").map_err(|_| {
            AppError::Config("REDIS_URL environment variable is required".to_string())
        })?;

        let port = parse_setting("PORT", std::env::var("PORT").ok(), 3000u16)?;
        let repair_attempts = parse_setting(
            "EVAL_REPAIR_ATTEMPTS",
            std::env::var("EVAL_REPAIR_ATTEMPTS").ok(),
            0u32,
        )?;

        let openai = OpenAiClientConfig::from_env().map_err(|e| match e {
            CommonError::MissingEnv(name) => {
                AppError::Config(format!("{name} environment variable is required"))
            }
            other => AppError::Config(other.to_string()),
        })?;

        Ok(Self {
            redis_url,
            port,
            openai,
            repair_attempts,
        })
    }

    pub fn bind_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Parse an optional setting; unset falls back to `default`, anything
/// unparseable is a configuration error.
fn parse_setting<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T, AppError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

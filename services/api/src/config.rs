//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// SMTP settings for the report notifier. Absent when the environment
/// does not configure an outbound relay.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub send_timeout: Duration,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub audit_model: String,
    pub max_contract_bytes: usize,
    pub analysis_max_attempts: u32,
    pub analysis_timeout: Duration,
    pub analysis_backoff: Duration,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://audit_history.db".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Key (as optional) and Model ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let audit_model =
            std::env::var("AUDIT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        // --- Load Pipeline Limits ---
        let max_contract_bytes = parse_var("MAX_CONTRACT_BYTES", 100 * 1024)?;
        let analysis_max_attempts = parse_var("ANALYSIS_MAX_ATTEMPTS", 3u32)?;
        let analysis_timeout = Duration::from_secs(parse_var("ANALYSIS_TIMEOUT_SECS", 60u64)?);
        let analysis_backoff =
            Duration::from_millis(parse_var("ANALYSIS_BACKOFF_MS", 500u64)?);

        let smtp = Self::smtp_from_env()?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            audit_model,
            max_contract_bytes,
            analysis_max_attempts,
            analysis_timeout,
            analysis_backoff,
            smtp,
        })
    }

    /// SMTP is configured only when host, user, and password are all
    /// present; a partial set is treated as absent, matching the
    /// "settings missing" behavior of the notifier.
    fn smtp_from_env() -> Result<Option<SmtpConfig>, ConfigError> {
        let host = std::env::var("SMTP_HOST").ok().filter(|v| !v.is_empty());
        let username = std::env::var("SMTP_USER").ok().filter(|v| !v.is_empty());
        let password = std::env::var("SMTP_PASS").ok().filter(|v| !v.is_empty());

        let (host, username, password) = match (host, username, password) {
            (Some(h), Some(u), Some(p)) => (h, u, p),
            _ => return Ok(None),
        };

        let port = parse_var("SMTP_PORT", 587u16)?;
        let from = std::env::var("SMTP_FROM").unwrap_or_else(|_| username.clone());
        let send_timeout = Duration::from_secs(parse_var("SMTP_TIMEOUT_SECS", 30u64)?);

        Ok(Some(SmtpConfig {
            host,
            port,
            username,
            password,
            from,
            send_timeout,
        }))
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

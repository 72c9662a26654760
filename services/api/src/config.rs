//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use shelf_core::DocumentStrategyKind;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;
use url::Url;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Postgres URL for chat histories. Histories are kept in memory when unset.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub chat_model: String,
    /// The externally visible base URL of this service, used to build proxy and
    /// blob links. A path prefix (`https://host/shelf`) is kept.
    pub public_base_url: Url,
    /// The browser origin allowed by CORS and assumed by the client-side strategies.
    pub client_origin: String,
    /// When set, the PDF proxy endpoints require `Authorization: Bearer <token>`.
    pub proxy_api_token: Option<String>,
    pub document_chain: Vec<DocumentStrategyKind>,
    pub strategy_timeout: Duration,
    pub http_timeout: Duration,
    pub transcript_turns: usize,
    pub max_document_bytes: usize,
    pub blob_cache_capacity: usize,
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address = parse("BIND_ADDRESS", &var("BIND_ADDRESS", "0.0.0.0:3000"))?;
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Chat Model ---
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
        let openai_base_url = lookup("OPENAI_BASE_URL");
        let chat_model = var("CHAT_MODEL", "gpt-4o-mini");

        // --- Document Resolution ---
        let public_base_url = Url::parse(&var("PUBLIC_BASE_URL", "http://localhost:3000"))
            .map_err(|e| ConfigError::InvalidValue("PUBLIC_BASE_URL".to_string(), e.to_string()))?;
        let client_origin = var("CLIENT_ORIGIN", "http://localhost:5173");
        let proxy_api_token = lookup("PROXY_API_TOKEN").filter(|v| !v.is_empty());
        let document_chain = match lookup("DOCUMENT_STRATEGIES") {
            Some(raw) => DocumentStrategyKind::parse_chain(&raw)
                .map_err(|e| ConfigError::InvalidValue("DOCUMENT_STRATEGIES".to_string(), e))?,
            None => DocumentStrategyKind::DEFAULT_CHAIN.to_vec(),
        };

        let strategy_timeout =
            Duration::from_secs(parse("STRATEGY_TIMEOUT_SECS", &var("STRATEGY_TIMEOUT_SECS", "15"))?);
        let http_timeout =
            Duration::from_secs(parse("HTTP_TIMEOUT_SECS", &var("HTTP_TIMEOUT_SECS", "30"))?);
        let transcript_turns = parse("TRANSCRIPT_TURNS", &var("TRANSCRIPT_TURNS", "6"))?;
        let max_document_bytes =
            parse("MAX_DOCUMENT_BYTES", &var("MAX_DOCUMENT_BYTES", "52428800"))?;
        let blob_cache_capacity = parse("BLOB_CACHE_CAPACITY", &var("BLOB_CACHE_CAPACITY", "64"))?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_base_url,
            chat_model,
            public_base_url,
            client_origin,
            proxy_api_token,
            document_chain,
            strategy_timeout,
            http_timeout,
            transcript_turns,
            max_document_bytes,
            blob_cache_capacity,
        })
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

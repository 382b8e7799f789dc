//! Runtime configuration for the assessment service
//!
//! Values come from environment variables with defaults from
//! utils/constants.rs. Nothing here is read on the request path.

use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use super::errors::{AppError, AppResult};
use crate::utils::constants::{
    DEFAULT_ARTIFACT_PATH, DEFAULT_MAX_BATCH, DEFAULT_PORT, DEFAULT_RATE_LIMIT_PER_MINUTE,
};

/// Service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Model artifact location
    pub artifact_path: PathBuf,
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Requests per minute per client key
    pub rate_limit_per_minute: u32,
    /// Maximum applications in one batch request
    pub max_batch: usize,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            max_batch: DEFAULT_MAX_BATCH,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl EngineConfig {
    /// Build from process environment
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here)
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let artifact_path = lookup("CREDIT_RISK_ARTIFACT")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.artifact_path);

        let host = lookup("CREDIT_RISK_HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(defaults.host);

        // Hosting platforms set PORT; CREDIT_RISK_PORT is for local runs
        let port = match lookup("PORT").or_else(|| lookup("CREDIT_RISK_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => defaults.port,
        };

        let rate_limit_per_minute = match lookup("CREDIT_RISK_RATE_LIMIT") {
            Some(raw) => parse_value("CREDIT_RISK_RATE_LIMIT", &raw)?,
            None => defaults.rate_limit_per_minute,
        };

        let max_batch: usize = match lookup("CREDIT_RISK_MAX_BATCH") {
            Some(raw) => parse_value("CREDIT_RISK_MAX_BATCH", &raw)?,
            None => defaults.max_batch,
        };
        if max_batch == 0 {
            return Err(AppError::invalid_config("CREDIT_RISK_MAX_BATCH", "0"));
        }

        let cors_origins = lookup("CREDIT_RISK_CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or(defaults.cors_origins);

        let config = Self {
            artifact_path,
            host,
            port,
            rate_limit_per_minute,
            max_batch,
            cors_origins,
        };

        info!(
            artifact = %config.artifact_path.display(),
            port = config.port,
            max_batch = config.max_batch,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::invalid_config(key, raw))
}

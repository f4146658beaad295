//! Configuration types, read from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmConfig;
use crate::store::Auth0Config;
use crate::worker::DEFAULT_TICK;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5001";
const DEFAULT_STORE_URL: &str = "http://admin-api:8080";

/// How the service authenticates to the task store.
#[derive(Debug, Clone)]
pub enum StoreAuth {
    /// Client-credentials grant against Auth0.
    Auth0(Auth0Config),
    /// Fixed bearer token.
    Static(SecretString),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    /// Base URL of the task store.
    pub store_url: String,
    pub store_auth: StoreAuth,
    pub llm: LlmConfig,
    /// Scheduler worker tick.
    pub tick: Duration,
    /// Directory for daily-rolling log files; stdout only when unset.
    pub log_dir: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let api_key = require("OPENAI_API_KEY")?;
        let mut llm = LlmConfig::new(SecretString::from(api_key));
        if let Some(model) = get("SCRAPER_PRIMARY_MODEL") {
            llm.primary_model = model;
        }
        if let Some(model) = get("SCRAPER_LIGHT_MODEL") {
            llm.light_model = model;
        }
        if let Some(model) = get("SCRAPER_SUMMARY_MODEL") {
            llm.summary_model = model;
        }

        let bind = get("SCRAPER_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind.parse().map_err(|e| ConfigError::InvalidValue {
            key: "SCRAPER_BIND_ADDR".to_string(),
            message: format!("{bind}: {e}"),
        })?;

        let tick = match get("SCRAPER_TICK_MS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "SCRAPER_TICK_MS".to_string(),
                        message: format!("expected a positive integer, got {raw}"),
                    });
                }
            },
            None => DEFAULT_TICK,
        };

        let store_auth = match get("TASK_STORE_TOKEN") {
            Some(token) => StoreAuth::Static(SecretString::from(token)),
            None => StoreAuth::Auth0(Auth0Config {
                domain: require("AUTH0_DOMAIN")?,
                client_id: require("AUTH0_CLIENT_ID")?,
                client_secret: SecretString::from(require("AUTH0_CLIENT_SECRET")?),
                audience: get("AUTH0_AUDIENCE"),
            }),
        };

        Ok(Self {
            bind_addr,
            store_url: get("TASK_STORE_URL").unwrap_or_else(|| DEFAULT_STORE_URL.to_string()),
            store_auth,
            llm,
            tick,
            log_dir: get("SCRAPER_LOG_DIR").map(PathBuf::from),
        })
    }
}

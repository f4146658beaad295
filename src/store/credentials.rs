//! Bearer credential for the task store.
//!
//! The token is fetched lazily on first use, shared read-only afterwards, and
//! replaced when the store rejects it.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::StoreError;

/// Something that can mint a fresh bearer token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<SecretString, StoreError>;
}

/// A fixed token supplied through configuration.
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self(token)
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn fetch_token(&self) -> Result<SecretString, StoreError> {
        Ok(self.0.clone())
    }
}

/// Auth0 client-credentials settings.
#[derive(Debug, Clone)]
pub struct Auth0Config {
    pub domain: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Defaults to the management API of `domain` when unset.
    pub audience: Option<String>,
}

impl Auth0Config {
    pub fn audience(&self) -> String {
        self.audience
            .clone()
            .unwrap_or_else(|| format!("https://{}/api/v2/", self.domain))
    }

    pub fn token_url(&self) -> String {
        format!("https://{}/oauth/token", self.domain)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Mints tokens with the Auth0 client-credentials grant.
pub struct Auth0TokenSource {
    config: Auth0Config,
    client: reqwest::Client,
}

impl Auth0TokenSource {
    pub fn new(config: Auth0Config, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl TokenSource for Auth0TokenSource {
    async fn fetch_token(&self) -> Result<SecretString, StoreError> {
        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret.expose_secret(),
            "audience": self.config.audience(),
        });

        let response = self
            .client
            .post(self.config.token_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Credential {
                reason: format!("token request to {} failed: {e}", self.config.domain),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                domain = %self.config.domain,
                status = status.as_u16(),
                "Auth0 token request rejected"
            );
            return Err(StoreError::Credential {
                reason: format!("token endpoint returned {status}: {text}"),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| StoreError::Credential {
            reason: format!("invalid token response: {e}"),
        })?;

        token
            .access_token
            .map(SecretString::from)
            .ok_or_else(|| StoreError::Credential {
                reason: "No access token received from Auth0".to_string(),
            })
    }
}

/// Caches the current token and refreshes it on demand.
pub struct CredentialHolder {
    source: Arc<dyn TokenSource>,
    current: RwLock<Option<SecretString>>,
}

impl CredentialHolder {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            current: RwLock::new(None),
        }
    }

    /// The cached token, fetching one on first use.
    pub async fn token(&self) -> Result<SecretString, StoreError> {
        if let Some(token) = self.current.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.refresh().await
    }

    /// Discard the cached token and fetch a new one.
    pub async fn refresh(&self) -> Result<SecretString, StoreError> {
        let mut current = self.current.write().await;
        let token = self.source.fetch_token().await?;
        *current = Some(token.clone());
        info!("Task store credential refreshed");
        Ok(token)
    }
}

//! HTTP client for the remote task store.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::credentials::CredentialHolder;
use crate::store::traits::TaskStore;
use crate::tasks::{TaskDetails, TaskRecord};

/// Task store reached over HTTP with a bearer credential.
///
/// A 401 triggers one credential refresh and one retry.
pub struct HttpTaskStore {
    base_url: String,
    client: reqwest::Client,
    credentials: Arc<CredentialHolder>,
}

impl HttpTaskStore {
    pub fn new(
        base_url: impl Into<String>,
        client: reqwest::Client,
        credentials: Arc<CredentialHolder>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            credentials,
        }
    }

    pub fn task_url(&self, user_id: &str, task_id: &str) -> String {
        format!("{}/api/user/{user_id}/task/{task_id}", self.base_url)
    }

    /// Send a request built by `build`, refreshing the credential once on 401.
    async fn send<F>(&self, url: &str, build: F) -> Result<reqwest::Response, StoreError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut token = self.credentials.token().await?;
        let mut refreshed = false;

        loop {
            let response = build(&self.client)
                .bearer_auth(token.expose_secret())
                .send()
                .await
                .map_err(|e| StoreError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            if response.status() == StatusCode::UNAUTHORIZED && !refreshed {
                warn!(url = url, "Task store rejected credential, refreshing");
                token = self.credentials.refresh().await?;
                refreshed = true;
                continue;
            }

            let status = response.status();
            if status != StatusCode::OK {
                let body = response.text().await.unwrap_or_default();
                warn!(
                    url = url,
                    status = status.as_u16(),
                    body = %body,
                    "Task store request failed"
                );
                return Err(StoreError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }
            return Ok(response);
        }
    }
}

#[async_trait]
impl TaskStore for HttpTaskStore {
    async fn get_task(&self, user_id: &str, task_id: &str) -> Result<TaskRecord, StoreError> {
        let url = self.task_url(user_id, task_id);
        let response = self.send(&url, |client| client.get(&url)).await?;
        let record: TaskRecord = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        debug!(user_id, task_id, status = ?record.status, "Fetched task record");
        Ok(record)
    }

    async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        details: &TaskDetails,
    ) -> Result<serde_json::Value, StoreError> {
        let url = self.task_url(user_id, task_id);
        let response = self
            .send(&url, |client| client.put(&url).json(details))
            .await?;
        let reply: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        debug!(user_id, task_id, status = ?details.status, "Updated task record");
        Ok(reply)
    }
}

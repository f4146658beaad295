//! Inference client — applies the request timeout and normalizes replies.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::InferenceError;
use crate::llm::provider::{CompletionRequest, LlmProvider};

/// Thin wrapper over a provider that enforces `CompletionRequest::timeout`.
#[derive(Clone)]
pub struct InferenceClient {
    provider: Arc<dyn LlmProvider>,
}

impl InferenceClient {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Run one completion and return the trimmed reply text.
    ///
    /// An empty reply is reported as an invalid response.
    pub async fn generate(&self, request: CompletionRequest) -> Result<String, InferenceError> {
        let provider = self.provider.provider_name().to_string();
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.model_name().to_string());
        let timeout = request.timeout;

        let call = self.provider.complete(request);
        let response = match timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                warn!(provider = %provider, model = %model, ?limit, "Generation call timed out");
                InferenceError::Timeout {
                    provider: provider.clone(),
                    timeout: limit,
                }
            })??,
            None => call.await?,
        };

        let content = response.content.trim();
        if content.is_empty() {
            return Err(InferenceError::InvalidResponse {
                provider,
                reason: "empty completion".to_string(),
            });
        }

        debug!(model = %response.model, reply_len = content.len(), "Generation call completed");
        Ok(content.to_string())
    }
}

//! Bridges rig-core's OpenAI client to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;

use crate::error::InferenceError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

const PROVIDER: &str = "openai";

/// OpenAI provider backed by a rig client.
///
/// A fresh agent is built per request so each call can pick its own model
/// and token budget.
pub struct RigAdapter {
    client: rig::client::Client<openai::client::OpenAIResponsesExt>,
    default_model: String,
}

impl RigAdapter {
    pub fn new(
        client: rig::client::Client<openai::client::OpenAIResponsesExt>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            default_model: default_model.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for RigAdapter {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.default_model
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, InferenceError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let prompt = request
            .user_prompt()
            .ok_or_else(|| InferenceError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "request has no user message".to_string(),
            })?
            .to_string();
        let preamble = request.system_prompt();

        let mut builder = self.client.agent(model.as_str());
        if !preamble.is_empty() {
            builder = builder.preamble(&preamble);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        let agent = builder.build();

        tracing::debug!(model = %model, prompt_len = prompt.len(), "Calling OpenAI");

        let content = agent
            .prompt(prompt.as_str())
            .await
            .map_err(|e| InferenceError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        Ok(CompletionResponse { content, model })
    }
}

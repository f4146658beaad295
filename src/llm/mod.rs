//! LLM integration.
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` to bridge
//! rig's OpenAI client to our `LlmProvider` trait. `InferenceClient` adds the
//! per-request timeout on top of any provider.

pub mod client;
pub mod provider;
mod rig_adapter;

pub use client::InferenceClient;
pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::error::InferenceError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    /// Model for image-aware extraction requests.
    pub primary_model: String,
    /// Model for text-only extraction requests.
    pub light_model: String,
    /// Model for summaries.
    pub summary_model: String,
}

impl LlmConfig {
    pub const DEFAULT_PRIMARY_MODEL: &'static str = "gpt-4o";
    pub const DEFAULT_LIGHT_MODEL: &'static str = "gpt-4o-mini-2024-07-18";
    pub const DEFAULT_SUMMARY_MODEL: &'static str = "gpt-4o-mini";

    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            primary_model: Self::DEFAULT_PRIMARY_MODEL.to_string(),
            light_model: Self::DEFAULT_LIGHT_MODEL.to_string(),
            summary_model: Self::DEFAULT_SUMMARY_MODEL.to_string(),
        }
    }
}

/// Create the OpenAI provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, InferenceError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            InferenceError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    tracing::info!(
        "Using OpenAI (primary: {}, light: {}, summary: {})",
        config.primary_model,
        config.light_model,
        config.summary_model
    );
    Ok(Arc::new(RigAdapter::new(client, &config.light_model)))
}

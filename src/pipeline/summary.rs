//! One-paragraph summaries of a full extraction response.

use tracing::info;

use crate::error::InferenceError;
use crate::llm::{ChatMessage, CompletionRequest, InferenceClient};
use crate::tasks::{OutputSlot, OutputType};

const SUMMARY_SYSTEM_PROMPT: &str = "You are a summarization assistant.";

const SUMMARY_MAX_TOKENS: u32 = 1000;

/// Name recorded on the summary output slot.
pub const SUMMARY_SLOT_NAME: &str = "summary";

/// Summarizes full responses with a dedicated model. No timeout is applied.
#[derive(Clone)]
pub struct Summarizer {
    inference: InferenceClient,
    model: String,
}

impl Summarizer {
    pub fn new(inference: InferenceClient, model: impl Into<String>) -> Self {
        Self {
            inference,
            model: model.into(),
        }
    }

    pub fn request(&self, full_response: &str) -> CompletionRequest {
        CompletionRequest::new(vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Summarize the following scraped data into one paragraph with less than 200 words:\n{full_response}"
            )),
        ])
        .with_model(&self.model)
        .with_max_tokens(SUMMARY_MAX_TOKENS)
    }

    pub async fn summarize(&self, full_response: &str) -> Result<String, InferenceError> {
        let summary = self.inference.generate(self.request(full_response)).await?;
        info!(model = %self.model, summary_len = summary.len(), "Summary generated");
        Ok(summary)
    }

    /// Summarize and wrap the result as the summary output slot.
    pub async fn summary_slot(&self, full_response: &str) -> Result<OutputSlot, InferenceError> {
        let summary = self.summarize(full_response).await?;
        Ok(OutputSlot::new(OutputType::Summary, SUMMARY_SLOT_NAME, summary))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::llm::{CompletionResponse, LlmProvider};

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        fn provider_name(&self) -> &str {
            "echo"
        }
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, InferenceError> {
            Ok(CompletionResponse {
                content: format!(
                    " summary of {} chars ",
                    request.user_prompt().unwrap_or("").len()
                ),
                model: request.model.unwrap_or_default(),
            })
        }
    }

    #[test]
    fn request_uses_summary_budget_without_timeout() {
        let summarizer = Summarizer::new(InferenceClient::new(Arc::new(EchoLlm)), "gpt-4o-mini");
        let request = summarizer.request("a,b\\n1,2");
        assert_eq!(request.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(request.max_tokens, Some(1000));
        assert!(request.timeout.is_none());
        assert_eq!(request.system_prompt(), "You are a summarization assistant.");
        assert!(request.user_prompt().unwrap().ends_with(":\na,b\\n1,2"));
    }

    #[tokio::test]
    async fn summary_slot_is_tagged() {
        let summarizer = Summarizer::new(InferenceClient::new(Arc::new(EchoLlm)), "m");
        let slot = summarizer.summary_slot("data").await.unwrap();
        assert_eq!(slot.kind, OutputType::Summary);
        assert_eq!(slot.name, "summary");
        assert!(slot.value.starts_with("summary of"));
    }
}

//! Extraction pipeline — fetch, build prompt, infer, extract preview.
//!
//! Each stage returns its own error type; the first failure stops the run and
//! is surfaced as a `PipelineError`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FormatError, PipelineError};
use crate::llm::InferenceClient;
use crate::pipeline::fetcher::DocumentFetcher;
use crate::pipeline::preview::{extract_preview, is_no_data_sentinel};
use crate::pipeline::prompt::{PromptBuilder, PromptInput};
use crate::tasks::{OutputFormat, RawOutputFormat, TaskDetails};

/// Inbound preview request body as sent by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewBody {
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default, rename = "sourceURL")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub output_format: Option<RawOutputFormat>,
    #[serde(default)]
    pub data_types: Vec<String>,
}

/// A validated extraction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    pub task_name: String,
    pub source_url: String,
    pub keywords: Vec<String>,
    pub data_types: Vec<String>,
    pub output_format: OutputFormat,
}

impl PipelineRequest {
    /// Validate the parts every caller must supply.
    pub fn new(
        task_name: impl Into<String>,
        source_url: impl Into<String>,
        keywords: Vec<String>,
        data_types: Vec<String>,
        output_format: OutputFormat,
    ) -> Result<Self, FormatError> {
        let source_url = source_url.into();
        if source_url.trim().is_empty() {
            return Err(FormatError::MissingField("sourceURL"));
        }
        if keywords.is_empty() {
            return Err(FormatError::MissingField("keywords"));
        }
        if keywords.len() != data_types.len() {
            return Err(FormatError::Invalid(format!(
                "{} keywords but {} data types",
                keywords.len(),
                data_types.len()
            )));
        }
        Ok(Self {
            task_name: task_name.into(),
            source_url,
            keywords,
            data_types,
            output_format,
        })
    }

    /// Build the request a scheduled run executes from stored task details.
    ///
    /// Keywords come from the target names and data types from the target
    /// values, in order.
    pub fn from_details(details: &TaskDetails) -> Result<Self, FormatError> {
        let definition = details
            .task_definition
            .as_ref()
            .ok_or(FormatError::MissingField("task_definition"))?;
        let source_url = definition
            .source
            .first()
            .map(|source| source.url.clone())
            .unwrap_or_default();
        let (keywords, data_types): (Vec<String>, Vec<String>) = definition
            .target
            .iter()
            .map(|target| (target.name.clone(), target.value.clone()))
            .unzip();

        Self::new(
            details.task_name.clone().unwrap_or_default(),
            source_url,
            keywords,
            data_types,
            definition.output_format()?,
        )
    }
}

impl TryFrom<PreviewBody> for PipelineRequest {
    type Error = FormatError;

    fn try_from(body: PreviewBody) -> Result<Self, Self::Error> {
        let output_format: OutputFormat = body
            .output_format
            .ok_or(FormatError::MissingField("outputFormat"))?
            .try_into()?;
        Self::new(
            body.task_name.unwrap_or_default(),
            body.source_url.unwrap_or_default(),
            body.keywords,
            body.data_types,
            output_format,
        )
    }
}

/// Result of one successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub cleaned_text: String,
    pub images: Vec<String>,
    pub preview: String,
    pub full_response: String,
}

/// Runs the four extraction stages in order.
#[derive(Clone)]
pub struct ExtractionPipeline {
    fetcher: Arc<dyn DocumentFetcher>,
    inference: InferenceClient,
    prompts: PromptBuilder,
}

impl ExtractionPipeline {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        inference: InferenceClient,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            fetcher,
            inference,
            prompts,
        }
    }

    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineOutput, PipelineError> {
        info!(
            task_name = %request.task_name,
            url = %request.source_url,
            format = %request.output_format,
            keywords = request.keywords.len(),
            "Running extraction pipeline"
        );

        let document = self.fetcher.fetch(&request.source_url).await.inspect_err(|e| {
            warn!(url = %request.source_url, error = %e, "Fetch stage failed");
        })?;

        let prompt = self.prompts.build(PromptInput {
            task_name: &request.task_name,
            keywords: &request.keywords,
            data_types: &request.data_types,
            output_format: request.output_format,
            cleaned_text: &document.content,
            images: &document.images,
        });
        let model = prompt.profile.model.clone();

        let reply = self
            .inference
            .generate(prompt.into_request())
            .await
            .inspect_err(|e| {
                warn!(model = %model, error = %e, "Inference stage failed");
            })?;

        let preview = if is_no_data_sentinel(&reply) {
            info!(task_name = %request.task_name, "Generator reported no relevant data");
            reply.clone()
        } else {
            extract_preview(&reply, request.output_format)
        };

        info!(
            task_name = %request.task_name,
            model = %model,
            reply_len = reply.len(),
            preview_len = preview.len(),
            "Extraction pipeline completed"
        );

        Ok(PipelineOutput {
            cleaned_text: document.content,
            images: document.images,
            preview,
            full_response: reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::{FetchError, InferenceError};
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::pipeline::fetcher::CleanedDocument;
    use crate::tasks::{OutputSlot, OutputType, TaskDefinition, Target, UrlSource};

    struct StubFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl DocumentFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<CleanedDocument, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
            Ok(CleanedDocument {
                content: "Apple 1\nBanana 2".into(),
                images: vec!["https://img/apple.png".into()],
            })
        }
    }

    struct RecordingLlm {
        reply: &'static str,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        fn provider_name(&self) -> &str {
            "stub"
        }
        fn model_name(&self) -> &str {
            "stub-model"
        }
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, InferenceError> {
            let model = request.model.clone().unwrap_or_default();
            self.requests.lock().unwrap().push(request);
            Ok(CompletionResponse {
                content: self.reply.to_string(),
                model,
            })
        }
    }

    fn pipeline(
        reply: &'static str,
        fail_fetch: bool,
    ) -> (ExtractionPipeline, Arc<StubFetcher>, Arc<RecordingLlm>) {
        let fetcher = Arc::new(StubFetcher {
            calls: AtomicUsize::new(0),
            fail: fail_fetch,
        });
        let llm = Arc::new(RecordingLlm {
            reply,
            requests: Mutex::new(Vec::new()),
        });
        let pipeline = ExtractionPipeline::new(
            fetcher.clone(),
            InferenceClient::new(llm.clone()),
            PromptBuilder::new("primary", "light"),
        );
        (pipeline, fetcher, llm)
    }

    fn request(format: OutputFormat, data_types: &[&str]) -> PipelineRequest {
        PipelineRequest::new(
            "fruit",
            "https://shop.example.com",
            data_types.iter().map(|_| "kw".to_string()).collect(),
            data_types.iter().map(|s| s.to_string()).collect(),
            format,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn successful_run_truncates_preview() {
        let (pipeline, _, llm) = pipeline(r"name,price\nA,1\nB,2\nC,3\nD,4", false);
        let out = pipeline
            .run(&request(OutputFormat::Csv, &["Text", "Number"]))
            .await
            .unwrap();
        assert_eq!(out.preview, r"name,price\nA,1\nB,2\nC,3");
        assert_eq!(out.full_response, r"name,price\nA,1\nB,2\nC,3\nD,4");
        assert_eq!(out.cleaned_text, "Apple 1\nBanana 2");

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests[0].model.as_deref(), Some("light"));
        assert!(!requests[0].user_prompt().unwrap().contains("Image URLs"));
    }

    #[tokio::test]
    async fn image_request_uses_primary_model() {
        let (pipeline, _, llm) = pipeline("No data found.", false);
        let out = pipeline
            .run(&request(OutputFormat::Json, &["Text", "Image URL"]))
            .await
            .unwrap();
        assert_eq!(out.preview, "No data found.");
        assert_eq!(out.full_response, "No data found.");

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests[0].model.as_deref(), Some("primary"));
        assert!(requests[0].user_prompt().unwrap().contains("https://img/apple.png"));
    }

    #[tokio::test]
    async fn fetch_failure_stops_before_inference() {
        let (pipeline, fetcher, llm) = pipeline("unused", true);
        let err = pipeline
            .run(&request(OutputFormat::Csv, &["Text"]))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "fetch");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn summary_marker_rejected_as_output_format() {
        let body = PreviewBody {
            task_name: Some("t".into()),
            source_url: Some("https://x".into()),
            keywords: vec!["name".into()],
            output_format: Some(RawOutputFormat::Code(3)),
            data_types: vec!["Text".into()],
        };
        assert!(matches!(
            PipelineRequest::try_from(body),
            Err(FormatError::UnsupportedOutputFormat(_))
        ));
    }

    #[test]
    fn validation_rejects_incomplete_requests() {
        let ok = PreviewBody {
            task_name: None,
            source_url: Some("https://x".into()),
            keywords: vec!["name".into()],
            output_format: Some(RawOutputFormat::Name("csv".into())),
            data_types: vec!["Text".into()],
        };
        assert!(PipelineRequest::try_from(ok.clone()).is_ok());

        let no_url = PreviewBody {
            source_url: None,
            ..ok.clone()
        };
        assert!(matches!(
            PipelineRequest::try_from(no_url),
            Err(FormatError::MissingField("sourceURL"))
        ));

        let mismatched = PreviewBody {
            data_types: vec![],
            ..ok.clone()
        };
        assert!(matches!(
            PipelineRequest::try_from(mismatched),
            Err(FormatError::Invalid(_))
        ));

        let no_format = PreviewBody {
            output_format: None,
            ..ok
        };
        assert!(PipelineRequest::try_from(no_format).is_err());
    }

    #[test]
    fn preview_body_reads_client_field_names() {
        let body: PreviewBody = serde_json::from_value(serde_json::json!({
            "taskName": "fruit",
            "sourceURL": "https://x",
            "keywords": ["name", "price"],
            "outputFormat": "CSV",
            "dataTypes": ["Text", "Number"]
        }))
        .unwrap();
        let request = PipelineRequest::try_from(body).unwrap();
        assert_eq!(request.source_url, "https://x");
        assert_eq!(request.output_format, OutputFormat::Csv);
    }

    #[test]
    fn request_from_stored_details() {
        let details = TaskDetails {
            task_name: Some("fruit".into()),
            task_definition: Some(TaskDefinition {
                source: vec![UrlSource {
                    kind: 1,
                    url: "https://x".into(),
                }],
                target: vec![
                    Target {
                        kind: 1,
                        name: "name".into(),
                        value: "Text".into(),
                    },
                    Target {
                        kind: 1,
                        name: "photo".into(),
                        value: "Image URL".into(),
                    },
                ],
                output: vec![OutputSlot::new(OutputType::Markdown, "", "")],
                period: Some(2),
                ..Default::default()
            }),
            status: None,
        };
        let request = PipelineRequest::from_details(&details).unwrap();
        assert_eq!(request.keywords, vec!["name", "photo"]);
        assert_eq!(request.data_types, vec!["Text", "Image URL"]);
        assert_eq!(request.output_format, OutputFormat::Markdown);
    }
}

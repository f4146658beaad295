//! Per-task scheduled job.
//!
//! Each invocation:
//! 1. Re-reads the task record; a canceled task deregisters the job
//! 2. Runs the extraction pipeline; any stage failure marks the task failed
//!    and deregisters
//! 3. Writes preview and full response into slots 0 and 1, status running
//! 4. Summarizes the full response into slot 2 and writes again

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::{ExtractionPipeline, PipelineOutput, PipelineRequest, Summarizer};
use crate::store::TaskStore;
use crate::tasks::{FULL_RESPONSE_SLOT, PREVIEW_SLOT, SUMMARY_SLOT, TaskDetails, TaskStatus};
use crate::worker::scheduler::{Job, JobOutcome};

/// Shared dependencies for task jobs.
#[derive(Clone)]
pub struct JobDeps {
    pub pipeline: ExtractionPipeline,
    pub summarizer: Summarizer,
    pub store: Arc<dyn TaskStore>,
}

/// Scheduled extraction bound to one task.
pub struct TaskJob {
    user_id: String,
    task_id: String,
    /// Details from the schedule request, updated with each run's outputs.
    details: Mutex<TaskDetails>,
    deps: JobDeps,
}

impl TaskJob {
    pub fn new(
        user_id: impl Into<String>,
        task_id: impl Into<String>,
        details: TaskDetails,
        deps: JobDeps,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            task_id: task_id.into(),
            details: Mutex::new(details),
            deps,
        }
    }

    /// Current details, including outputs written by previous runs.
    pub async fn details(&self) -> TaskDetails {
        self.details.lock().await.clone()
    }

    async fn is_canceled(&self, run_id: Uuid) -> Option<bool> {
        match self.deps.store.get_task(&self.user_id, &self.task_id).await {
            Ok(record) => Some(record.status == TaskStatus::Canceled),
            Err(e) => {
                warn!(
                    %run_id,
                    task_id = %self.task_id,
                    error = %e,
                    "Failed to read task record, skipping this run"
                );
                None
            }
        }
    }

    async fn extract(&self, details: &TaskDetails) -> Result<PipelineOutput, PipelineError> {
        let request = PipelineRequest::from_details(details)?;
        self.deps.pipeline.run(&request).await
    }

    async fn persist(&self, run_id: Uuid, details: &TaskDetails, what: &str) {
        match self
            .deps
            .store
            .update_task(&self.user_id, &self.task_id, details)
            .await
        {
            Ok(_) => info!(%run_id, task_id = %self.task_id, what, "Task updated"),
            Err(e) => error!(
                %run_id,
                task_id = %self.task_id,
                what,
                error = %e,
                "Failed to update task"
            ),
        }
    }
}

#[async_trait]
impl Job for TaskJob {
    async fn run(&self, tag: &str) -> JobOutcome {
        let run_id = Uuid::new_v4();
        info!(%run_id, tag, user_id = %self.user_id, "Running scheduled task");

        match self.is_canceled(run_id).await {
            Some(true) => {
                info!(%run_id, task_id = %self.task_id, "Task canceled, deregistering");
                return JobOutcome::Deregister;
            }
            Some(false) => {}
            None => return JobOutcome::Continue,
        }

        let mut details = self.details.lock().await;

        let output = match self.extract(&details).await {
            Ok(output) => output,
            Err(e) => {
                error!(
                    %run_id,
                    task_id = %self.task_id,
                    stage = e.stage(),
                    error = %e,
                    "Scheduled extraction failed"
                );
                details.status = Some(TaskStatus::Failed);
                self.persist(run_id, &details, "failed status").await;
                return JobOutcome::Deregister;
            }
        };

        {
            let definition = details.definition_mut();
            definition.pad_outputs(FULL_RESPONSE_SLOT + 1);
            definition.output[PREVIEW_SLOT].value = output.preview;
            definition.output[FULL_RESPONSE_SLOT].value = output.full_response.clone();
        }
        details.status = Some(TaskStatus::Running);
        self.persist(run_id, &details, "preview and full response").await;

        match self.deps.summarizer.summary_slot(&output.full_response).await {
            Ok(slot) => {
                details.definition_mut().set_output(SUMMARY_SLOT, slot);
                self.persist(run_id, &details, "summary").await;
            }
            Err(e) => {
                warn!(
                    %run_id,
                    task_id = %self.task_id,
                    error = %e,
                    "Failed to summarize task output"
                );
            }
        }

        JobOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{FetchError, InferenceError, StoreError};
    use crate::llm::{CompletionRequest, CompletionResponse, InferenceClient, LlmProvider};
    use crate::pipeline::{CleanedDocument, DocumentFetcher, PromptBuilder};
    use crate::tasks::{OutputSlot, OutputType, TaskDefinition, TaskRecord, Target, UrlSource};

    struct StubFetcher {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<CleanedDocument, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 500,
                });
            }
            Ok(CleanedDocument {
                content: "Apple 1".into(),
                images: vec![],
            })
        }
    }

    struct StubLlm {
        fail_summary: bool,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn provider_name(&self) -> &str {
            "stub"
        }
        fn model_name(&self) -> &str {
            "stub"
        }
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, InferenceError> {
            let is_summary = request.system_prompt().contains("summarization");
            if is_summary && self.fail_summary {
                return Err(InferenceError::RequestFailed {
                    provider: "stub".into(),
                    reason: "quota".into(),
                });
            }
            let content = if is_summary {
                "Five fruits with prices.".to_string()
            } else {
                r"name,price\nA,1\nB,2\nC,3\nD,4\nE,5".to_string()
            };
            Ok(CompletionResponse {
                content,
                model: "stub".into(),
            })
        }
    }

    struct StubStore {
        status: TaskStatus,
        fail_read: bool,
        updates: StdMutex<Vec<TaskDetails>>,
    }

    #[async_trait]
    impl TaskStore for StubStore {
        async fn get_task(&self, _user: &str, task_id: &str) -> Result<TaskRecord, StoreError> {
            if self.fail_read {
                return Err(StoreError::Request {
                    url: "http://store".into(),
                    reason: "connection refused".into(),
                });
            }
            Ok(serde_json::from_value(serde_json::json!({
                "id": task_id,
                "status": self.status.code(),
            }))
            .unwrap())
        }

        async fn update_task(
            &self,
            _user: &str,
            _task: &str,
            details: &TaskDetails,
        ) -> Result<serde_json::Value, StoreError> {
            self.updates.lock().unwrap().push(details.clone());
            Ok(serde_json::json!({"message": "ok"}))
        }
    }

    struct Harness {
        job: TaskJob,
        fetcher: Arc<StubFetcher>,
        store: Arc<StubStore>,
    }

    fn details(outputs: usize) -> TaskDetails {
        TaskDetails {
            task_name: Some("fruit".into()),
            task_definition: Some(TaskDefinition {
                source: vec![UrlSource {
                    kind: 1,
                    url: "https://shop.example.com".into(),
                }],
                target: vec![Target {
                    kind: 1,
                    name: "name".into(),
                    value: "Text".into(),
                }],
                output: vec![OutputSlot::new(OutputType::Csv, "", ""); outputs],
                period: Some(2),
                ..Default::default()
            }),
            status: None,
        }
    }

    fn harness(
        status: TaskStatus,
        fail_read: bool,
        fail_fetch: bool,
        fail_summary: bool,
    ) -> Harness {
        let fetcher = Arc::new(StubFetcher {
            fail: fail_fetch,
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(StubStore {
            status,
            fail_read,
            updates: StdMutex::new(Vec::new()),
        });
        let inference = InferenceClient::new(Arc::new(StubLlm { fail_summary }));
        let deps = JobDeps {
            pipeline: ExtractionPipeline::new(
                fetcher.clone(),
                inference.clone(),
                PromptBuilder::new("primary", "light"),
            ),
            summarizer: Summarizer::new(inference, "summary"),
            store: store.clone(),
        };
        Harness {
            job: TaskJob::new("u1", "42", details(1), deps),
            fetcher,
            store,
        }
    }

    #[tokio::test]
    async fn canceled_task_deregisters_without_running() {
        let h = harness(TaskStatus::Canceled, false, false, false);
        assert_eq!(h.job.run("42").await, JobOutcome::Deregister);
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(h.store.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_written_without_a_code_still_runs() {
        let h = harness(TaskStatus::Unknown, false, false, false);
        assert_eq!(h.job.run("42").await, JobOutcome::Continue);
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
        let updates = h.store.updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].status, Some(TaskStatus::Running));
    }

    #[tokio::test]
    async fn store_read_failure_skips_the_run() {
        let h = harness(TaskStatus::Running, true, false, false);
        assert_eq!(h.job.run("42").await, JobOutcome::Continue);
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(h.store.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pipeline_failure_marks_failed_and_deregisters() {
        let h = harness(TaskStatus::Running, false, true, false);
        assert_eq!(h.job.run("42").await, JobOutcome::Deregister);
        let updates = h.store.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, Some(TaskStatus::Failed));
    }

    #[tokio::test]
    async fn success_writes_slots_then_summary() {
        let h = harness(TaskStatus::Scheduled, false, false, false);
        assert_eq!(h.job.run("42").await, JobOutcome::Continue);

        let updates = h.store.updates.lock().unwrap();
        assert_eq!(updates.len(), 2);

        let first = updates[0].task_definition.as_ref().unwrap();
        assert_eq!(updates[0].status, Some(TaskStatus::Running));
        assert_eq!(first.output.len(), 2);
        assert_eq!(first.output[PREVIEW_SLOT].value, r"name,price\nA,1\nB,2\nC,3");
        assert_eq!(first.output[PREVIEW_SLOT].kind, OutputType::Csv);
        assert_eq!(
            first.output[FULL_RESPONSE_SLOT].value,
            r"name,price\nA,1\nB,2\nC,3\nD,4\nE,5"
        );

        let second = updates[1].task_definition.as_ref().unwrap();
        assert!(second.output.len() >= 3);
        assert_eq!(second.output[SUMMARY_SLOT].kind, OutputType::Summary);
        assert_eq!(second.output[SUMMARY_SLOT].name, "summary");
        assert_eq!(second.output[SUMMARY_SLOT].value, "Five fruits with prices.");
    }

    #[tokio::test]
    async fn summary_failure_keeps_registration() {
        let h = harness(TaskStatus::Running, false, false, true);
        assert_eq!(h.job.run("42").await, JobOutcome::Continue);
        let updates = h.store.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, Some(TaskStatus::Running));
    }

    #[tokio::test]
    async fn repeated_runs_overwrite_slots_in_place() {
        let h = harness(TaskStatus::Running, false, false, false);
        h.job.run("42").await;
        h.job.run("42").await;
        let details = h.job.details().await;
        assert_eq!(details.task_definition.unwrap().output.len(), 3);
        assert_eq!(h.store.updates.lock().unwrap().len(), 4);
    }
}

//! REST endpoints for previews, schedules, summaries and cancellation.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::response::{ApiError, json_body};
use crate::error::{FormatError, StoreError};
use crate::pipeline::{ExtractionPipeline, PipelineRequest, PreviewBody, Summarizer};
use crate::store::TaskStore;
use crate::tasks::{Period, SUMMARY_SLOT, TaskDetails, TaskStatus};
use crate::worker::{JobDeps, Scheduler, TaskJob};

/// Shared state for the task routes.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub pipeline: ExtractionPipeline,
    pub summarizer: Summarizer,
    pub store: Arc<dyn TaskStore>,
}

impl AppState {
    fn job_deps(&self) -> JobDeps {
        JobDeps {
            pipeline: self.pipeline.clone(),
            summarizer: self.summarizer.clone(),
            store: self.store.clone(),
        }
    }
}

/// Body of the schedule and summary endpoints.
#[derive(Debug, Deserialize)]
pub struct TaskDetailsBody {
    #[serde(rename = "TaskDetails", default)]
    pub task_details: TaskDetails,
}

/// Build the task REST routes with CORS and request tracing.
pub fn task_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/schedules", get(list_schedules))
        .route("/api/{user_id}/task", post(preview_task))
        .route("/api/{user_id}/task/{task_id}", put(schedule_task))
        .route("/api/{user_id}/task/{task_id}/summary", put(summarize_task))
        .route("/api/{user_id}/task/{task_id}/cancel", put(cancel_task))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "scrape-scheduler"
    }))
}

async fn list_schedules(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.registrations().await)
}

// ── Preview ─────────────────────────────────────────────────────────────

/// POST /api/{user_id}/task
///
/// Runs the pipeline once inside the request and returns the preview.
async fn preview_task(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<PreviewBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = PipelineRequest::try_from(json_body(payload)?)?;
    info!(
        user_id = %user_id,
        task_name = %request.task_name,
        url = %request.source_url,
        format = %request.output_format,
        "Preview requested"
    );

    let output = state.pipeline.run(&request).await?;

    Ok(Json(serde_json::json!({
        "message": "Task received successfully",
        "cleaned_text": output.cleaned_text,
        "keywords": request.keywords,
        "dataTypes": request.data_types,
        "gpt_response": output.preview,
        "gpt_full_response": output.full_response,
        "outputFormat": request.output_format,
    })))
}

// ── Schedule ────────────────────────────────────────────────────────────

/// PUT /api/{user_id}/task/{task_id}
///
/// Registers (or replaces) the recurring job for a task. The job runs once
/// right away.
async fn schedule_task(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(String, String)>,
    payload: Result<Json<TaskDetailsBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let details = json_body(payload)?.task_details;

    let code = details
        .task_definition
        .as_ref()
        .and_then(|definition| definition.period)
        .ok_or(FormatError::MissingField("task_definition.period"))?;
    let period = Period::try_from(code)?;
    PipelineRequest::from_details(&details)?;

    let job = TaskJob::new(user_id.clone(), task_id.clone(), details, state.job_deps());
    state
        .scheduler
        .schedule(task_id.clone(), period, Arc::new(job))
        .await;

    info!(user_id = %user_id, task_id = %task_id, period = %period, "Task scheduled");
    Ok(Json(serde_json::json!({
        "message": format!("Task {task_id} scheduled {period}"),
    })))
}

// ── Summary ─────────────────────────────────────────────────────────────

/// PUT /api/{user_id}/task/{task_id}/summary
///
/// Summarizes the full response in output slot 1, writes it to slot 2 and
/// forwards the details to the task store.
async fn summarize_task(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(String, String)>,
    payload: Result<Json<TaskDetailsBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut details = json_body(payload)?.task_details;

    let full_response = details
        .task_definition
        .as_ref()
        .and_then(|definition| definition.full_response())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("Full response not found"))?;

    let slot = state.summarizer.summary_slot(&full_response).await?;
    details.definition_mut().set_output(SUMMARY_SLOT, slot);

    let reply = state.store.update_task(&user_id, &task_id, &details).await?;
    info!(user_id = %user_id, task_id = %task_id, "Summary stored");
    Ok(Json(reply))
}

// ── Cancel ──────────────────────────────────────────────────────────────

/// PUT /api/{user_id}/task/{task_id}/cancel
///
/// Removes the registration and marks the task canceled in the store.
/// The stored name and definition are written back with the new status.
/// A running invocation is not interrupted.
async fn cancel_task(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.scheduler.cancel(&task_id).await {
        return Err(ApiError::not_found(format!(
            "No scheduled job found for task {task_id}"
        )));
    }

    if let Err(e) = mark_canceled(state.store.as_ref(), &user_id, &task_id).await {
        warn!(task_id = %task_id, error = %e, "Job deregistered but store update failed");
        return Err(e.into());
    }

    Ok(Json(serde_json::json!({
        "message": format!("Task {task_id} canceled"),
    })))
}

async fn mark_canceled(
    store: &dyn TaskStore,
    user_id: &str,
    task_id: &str,
) -> Result<(), StoreError> {
    let record = store.get_task(user_id, task_id).await?;
    let details = record.with_status(TaskStatus::Canceled);
    store.update_task(user_id, task_id, &details).await?;
    Ok(())
}

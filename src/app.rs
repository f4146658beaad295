//! Service wiring — builds every component from a `ServiceConfig`.

use std::sync::Arc;

use tracing::info;

use crate::api::AppState;
use crate::config::{ServiceConfig, StoreAuth};
use crate::error::{PipelineError, Result, StoreError};
use crate::llm::{InferenceClient, create_provider};
use crate::pipeline::{ExtractionPipeline, HttpFetcher, PromptBuilder, Summarizer};
use crate::store::{Auth0TokenSource, CredentialHolder, HttpTaskStore, StaticToken, TokenSource};
use crate::worker::Scheduler;

/// Build the shared application state.
///
/// The store credential is fetched once here so a misconfigured credential
/// fails startup rather than the first scheduled run.
pub async fn build_state(config: &ServiceConfig) -> Result<AppState> {
    let provider = create_provider(&config.llm).map_err(PipelineError::from)?;
    let inference = InferenceClient::new(provider);

    let fetcher = Arc::new(HttpFetcher::new().map_err(PipelineError::from)?);
    let pipeline = ExtractionPipeline::new(
        fetcher,
        inference.clone(),
        PromptBuilder::from_config(&config.llm),
    );
    let summarizer = Summarizer::new(inference, &config.llm.summary_model);

    let http = reqwest::Client::builder()
        .build()
        .map_err(|e| StoreError::Request {
            url: config.store_url.clone(),
            reason: format!("failed to build HTTP client: {e}"),
        })?;

    let source: Arc<dyn TokenSource> = match &config.store_auth {
        StoreAuth::Auth0(auth0) => {
            info!(domain = %auth0.domain, "Using Auth0 client credentials for the task store");
            Arc::new(Auth0TokenSource::new(auth0.clone(), http.clone()))
        }
        StoreAuth::Static(token) => {
            info!("Using static bearer token for the task store");
            Arc::new(StaticToken::new(token.clone()))
        }
    };
    let credentials = Arc::new(CredentialHolder::new(source));
    credentials.token().await?;

    let store = Arc::new(HttpTaskStore::new(&config.store_url, http, credentials));
    info!(store_url = %config.store_url, "Task store client ready");

    Ok(AppState {
        scheduler: Arc::new(Scheduler::new(config.tick)),
        pipeline,
        summarizer,
        store,
    })
}

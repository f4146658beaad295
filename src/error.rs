//! Error types for the scrape scheduler.

use std::time::Duration;

use axum::http::StatusCode;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures retrieving the source document.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to retrieve the page {url}: status code {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to retrieve the page {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Failed to read the page body from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Text-generation service errors.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout {
        provider: String,
        timeout: Duration,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Invalid or incomplete request input.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Unsupported output format: {0}")]
    UnsupportedOutputFormat(String),

    #[error("Unknown task status code: {0}")]
    UnknownStatus(i64),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid request: {0}")]
    Invalid(String),
}

/// Task store (system of record) errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to obtain store credential: {reason}")]
    Credential { reason: String },

    #[error("Store request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Store rejected request to {url} with status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode store response: {0}")]
    Decode(String),
}

/// Scheduler errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid schedule period: {code}")]
    InvalidPeriod { code: i64 },
}

/// Error from one stage of the extraction pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Error communicating with the generation service: {0}")]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl PipelineError {
    /// Short stage label for logging.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Inference(_) => "infer",
            Self::Format(_) => "format",
        }
    }
}

/// Maps an error onto the HTTP status reported to callers.
pub trait HttpStatus {
    fn status_code(&self) -> StatusCode;
}

impl HttpStatus for FetchError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_GATEWAY
    }
}

impl HttpStatus for InferenceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl HttpStatus for FormatError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

impl HttpStatus for SchedulerError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

impl HttpStatus for StoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl HttpStatus for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Fetch(e) => e.status_code(),
            Self::Inference(e) => e.status_code(),
            Self::Format(e) => e.status_code(),
        }
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

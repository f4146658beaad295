//! Extraction pipeline.
//!
//! A run flows through:
//! 1. `DocumentFetcher::fetch()` — download and clean the source page
//! 2. `PromptBuilder::build()` — format template and generation request
//! 3. `InferenceClient::generate()` — bounded call to the generation service
//! 4. `extract_preview()` — deterministic truncation into a preview
//!
//! `Summarizer` is the separate sub-call that fills the summary slot.

pub mod extraction;
pub mod fetcher;
pub mod preview;
pub mod prompt;
pub mod summary;

pub use extraction::{ExtractionPipeline, PipelineOutput, PipelineRequest, PreviewBody};
pub use fetcher::{CleanedDocument, DocumentFetcher, HttpFetcher};
pub use preview::{NO_DATA_SENTINEL, extract_preview, is_no_data_sentinel};
pub use prompt::{PromptBuilder, format_template};
pub use summary::Summarizer;

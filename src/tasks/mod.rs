//! Task model shared by the pipeline, the scheduler, and the HTTP surface.

pub mod model;

pub use model::{
    FULL_RESPONSE_SLOT, OutputFormat, OutputSlot, OutputType, PREVIEW_SLOT, Period,
    RawOutputFormat, SUMMARY_SLOT, Target, TaskDefinition, TaskDetails, TaskRecord, TaskStatus,
    UrlSource,
};

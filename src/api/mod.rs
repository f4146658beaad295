//! HTTP surface.

pub mod response;
pub mod routes;

pub use response::ApiError;
pub use routes::{AppState, TaskDetailsBody, task_routes};

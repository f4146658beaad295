//! `TaskStore` trait — the single async interface to the system of record.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::tasks::{TaskDetails, TaskRecord};

/// Remote store that owns durable task state.
///
/// The scheduler never caches what it reads here beyond one tick.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch the current record of a task.
    async fn get_task(&self, user_id: &str, task_id: &str) -> Result<TaskRecord, StoreError>;

    /// Apply `details` to a task. Absent fields are left unchanged by the store.
    ///
    /// Returns the store's reply body.
    async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        details: &TaskDetails,
    ) -> Result<serde_json::Value, StoreError>;
}

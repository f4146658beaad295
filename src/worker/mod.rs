//! Recurring task execution.
//!
//! - `scheduler` — registration map and the single worker loop
//! - `job` — per-task job run on each due tick

pub mod job;
pub mod scheduler;

pub use job::{JobDeps, TaskJob};
pub use scheduler::{DEFAULT_TICK, Job, JobOutcome, RegistrationInfo, Scheduler};

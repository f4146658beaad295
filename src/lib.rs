//! Scrape Scheduler — recurring web extraction backed by a text-generation service.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod store;
pub mod tasks;
pub mod worker;

//! Worker module for draining the article queue
//!
//! This module provides:
//! - TaskRunner: Main worker loop that blocks on the queue and tracks task status
//! - TaskProcessor: Processes one task (keyword -> generation -> article commit)
//! - WorkerConfig: Configuration for the worker

pub mod config;
pub mod processor;
pub mod task_runner;

pub use config::WorkerConfig;
pub use processor::{ProcessedArticle, TaskProcessor};
pub use task_runner::{setup_signal_handler, TaskRunner, WorkerStats};

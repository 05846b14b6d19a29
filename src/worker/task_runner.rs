//! Task runner - main worker loop

use crate::error::{PipelineError, Result};
use crate::queue::{TaskQueue, TaskRecord, TaskStatus};
use crate::worker::{TaskProcessor, WorkerConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

/// Counters for one worker lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: usize,
    pub failed: usize,
    /// Payloads that could not be decoded
    pub dropped: usize,
}

/// Single consumer that drains the article queue
pub struct TaskRunner {
    queue: Arc<TaskQueue>,
    config: WorkerConfig,
    processor: TaskProcessor,
    completed: AtomicUsize,
    failed: AtomicUsize,
    dropped: AtomicUsize,
}

impl TaskRunner {
    /// Create a new task runner
    pub fn new(queue: Arc<TaskQueue>, config: WorkerConfig, processor: TaskProcessor) -> Self {
        Self {
            queue,
            config,
            processor,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Main worker loop
    ///
    /// Blocks on the queue and processes tasks until `cancel` fires. A task
    /// already in flight runs to completion before this returns.
    pub async fn run(&self, cancel: CancellationToken) -> Result<WorkerStats> {
        info!("Starting article worker...");
        info!("Task timeout: {:?}", self.config.task_timeout);
        info!("Sanitize mode: {:?}", self.config.sanitize);

        loop {
            match self.queue.dequeue(&cancel).await {
                Ok(Some(task)) => {
                    self.process_task(task).await;
                }
                Ok(None) => {
                    info!("Shutdown signal received, stopping worker...");
                    break;
                }
                Err(PipelineError::Deserialization(e)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!("Dropping malformed task payload: {}", e);
                }
                Err(e) => {
                    error!("Worker error: {}", e);
                    if !self.backoff(&cancel).await {
                        info!("Shutdown signal received during backoff, stopping worker...");
                        break;
                    }
                }
            }
        }

        let stats = self.stats();
        info!(
            "Worker stopped (completed: {}, failed: {}, dropped: {})",
            stats.completed, stats.failed, stats.dropped
        );
        Ok(stats)
    }

    /// Process a single task and exit (for testing with --once flag)
    ///
    /// Returns the task's final record, or `None` if cancelled before a task
    /// arrived.
    pub async fn run_once(&self, cancel: CancellationToken) -> Result<Option<TaskRecord>> {
        info!("Running worker in single-task mode...");
        loop {
            match self.queue.dequeue(&cancel).await {
                Ok(Some(task)) => return Ok(Some(self.process_task(task).await)),
                Ok(None) => return Ok(None),
                Err(PipelineError::Deserialization(e)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!("Dropping malformed task payload: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Drive one dequeued task to a terminal state
    ///
    /// Every failure is recorded on the task; nothing propagates.
    pub async fn process_task(&self, mut task: TaskRecord) -> TaskRecord {
        let span = info_span!("task", task_id = %task.id, keyword_id = task.keyword_id);

        async {
            if let Err(e) = task.transition(TaskStatus::Running) {
                warn!("Skipping task in state {}: {}", task.status, e);
                return;
            }
            self.publish(&task).await;
            info!("Processing task");

            let result =
                tokio::time::timeout(self.config.task_timeout, self.processor.process(&task))
                    .await
                    .unwrap_or(Err(PipelineError::TaskTimeout));

            let outcome = match result {
                Ok(processed) => {
                    info!(
                        "Task completed: article {} ({}) via {}",
                        processed.article_id, processed.slug, processed.provider
                    );
                    self.completed.fetch_add(1, Ordering::Relaxed);
                    task.complete()
                }
                Err(e) => {
                    error!("Task failed: {}", e);
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    task.fail(e.to_string())
                }
            };
            if let Err(e) = outcome {
                error!("Could not finish task: {}", e);
            }

            self.publish(&task).await;
        }
        .instrument(span)
        .await;

        task
    }

    async fn publish(&self, task: &TaskRecord) {
        if let Err(e) = self.queue.publish_status(task).await {
            warn!("Failed to publish status {}: {}", task.status, e);
        }
    }

    /// Sleep for the error backoff; false if cancelled first
    async fn backoff(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.error_backoff) => true,
        }
    }
}

/// Setup signal handlers for graceful shutdown
pub fn setup_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut terminate = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!("Failed to listen for SIGTERM: {}", e);
                    wait_for_ctrl_c(cancel).await;
                    return;
                }
            };

            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        error!("Failed to listen for Ctrl+C: {}", e);
                        return;
                    }
                    info!("Received Ctrl+C, initiating shutdown...");
                }
                _ = terminate.recv() => {
                    info!("Received SIGTERM, initiating shutdown...");
                }
            }
            cancel.cancel();
        }

        #[cfg(not(unix))]
        wait_for_ctrl_c(cancel).await;
    });
}

async fn wait_for_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, initiating shutdown...");
            cancel.cancel();
        }
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    // Worker loop tests drive the in-memory queue store - see tests/ directory
}

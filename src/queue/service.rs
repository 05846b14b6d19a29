//! Task queue operations over a `QueueStore`

use crate::error::{PipelineError, Result};
use crate::queue::store::{AtomicAppend, QueueStore};
use crate::queue::task::{TaskRecord, TaskStatus};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Ordered list of pending task payloads
pub const ARTICLE_QUEUE_KEY: &str = "article:queue";

/// Set of every task id ever enqueued (until pruned)
pub const ARTICLE_SET_KEY: &str = "article:set";

/// How long a task's latest status stays readable
pub const STATUS_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Default server-side wait per blocking pop
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Status key for a task id
pub fn status_key(task_id: &str) -> String {
    format!("task:{}", task_id)
}

/// Producer and consumer API for generation tasks
pub struct TaskQueue {
    store: Arc<dyn QueueStore>,
    block_timeout: Duration,
    retention: Duration,
}

impl TaskQueue {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            block_timeout: DEFAULT_BLOCK_TIMEOUT,
            retention: STATUS_RETENTION,
        }
    }

    /// Set how long a single blocking pop waits before cancellation is re-checked
    pub fn with_block_timeout(mut self, block_timeout: Duration) -> Self {
        self.block_timeout = block_timeout;
        self
    }

    /// Add a task to the queue
    ///
    /// The task is reset to `pending` with fresh timestamps, then appended to
    /// the list, registered in the id set and given a status key in one
    /// atomic step. An id that is still in the set is rejected with
    /// `InvalidTask` and nothing is written.
    pub async fn enqueue(&self, task: &mut TaskRecord) -> Result<()> {
        if task.id.trim().is_empty() {
            return Err(PipelineError::InvalidTask("task id is empty".to_string()));
        }
        if task.status != TaskStatus::Pending {
            return Err(PipelineError::InvalidTransition {
                from: task.status,
                to: TaskStatus::Pending,
            });
        }

        let now = Utc::now();
        task.error = None;
        task.created_at = now;
        task.updated_at = now;

        let payload = serde_json::to_string(task)
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;
        let key = status_key(&task.id);

        let appended = self
            .store
            .append_atomic(AtomicAppend {
                list_key: ARTICLE_QUEUE_KEY,
                set_key: ARTICLE_SET_KEY,
                member: &task.id,
                status_key: &key,
                payload: &payload,
                ttl: self.retention,
            })
            .await?;
        if !appended {
            return Err(PipelineError::InvalidTask(format!(
                "task id already exists: {}",
                task.id
            )));
        }

        info!("Enqueued task {} (keyword {})", task.id, task.keyword_id);
        Ok(())
    }

    /// Enqueue one fresh task per keyword
    ///
    /// Each keyword gets its own result so one failed enqueue does not affect
    /// the others.
    pub async fn batch_enqueue(
        &self,
        keyword_ids: &[i64],
        category_ids: &[i64],
        user_id: Option<i64>,
    ) -> Vec<Result<String>> {
        let mut tasks: Vec<TaskRecord> = keyword_ids
            .iter()
            .map(|keyword_id| TaskRecord::new(*keyword_id, category_ids.to_vec(), user_id))
            .collect();

        join_all(tasks.iter_mut().map(|task| async move {
            self.enqueue(task).await?;
            Ok::<_, PipelineError>(task.id.clone())
        }))
        .await
    }

    /// Pop the next task, waiting until one arrives or `cancel` fires
    ///
    /// Returns `Ok(None)` once cancelled. Cancellation is checked between
    /// bounded blocking pops, so an item popped by the store is never dropped
    /// on the floor.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<TaskRecord>> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            let Some(payload) = self
                .store
                .blocking_pop(ARTICLE_QUEUE_KEY, self.block_timeout)
                .await?
            else {
                continue;
            };

            let task: TaskRecord = serde_json::from_str(&payload)
                .map_err(|e| PipelineError::Deserialization(e.to_string()))?;
            debug!("Dequeued task {}", task.id);
            return Ok(Some(task));
        }
    }

    /// Write the task's latest state to its status key
    pub async fn publish_status(&self, task: &TaskRecord) -> Result<()> {
        let payload = serde_json::to_string(task)
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;
        self.store
            .set_with_expiry(&status_key(&task.id), &payload, self.retention)
            .await
    }

    /// Read a task's latest status
    ///
    /// `NotFound` means the id was never enqueued (or was pruned); `Expired`
    /// means it was, but its status has aged out.
    pub async fn get_status(&self, task_id: &str) -> Result<TaskRecord> {
        if !self.store.is_member(ARTICLE_SET_KEY, task_id).await? {
            return Err(PipelineError::NotFound(task_id.to_string()));
        }

        let payload = self
            .store
            .get(&status_key(task_id))
            .await?
            .ok_or_else(|| PipelineError::Expired(task_id.to_string()))?;

        serde_json::from_str(&payload).map_err(|e| PipelineError::Deserialization(e.to_string()))
    }

    /// List the tasks owned by a user, oldest first
    ///
    /// Scans every known id; entries that expired or fail to decode are
    /// skipped.
    pub async fn list_for_owner(&self, user_id: i64) -> Result<Vec<TaskRecord>> {
        let ids = self.store.members(ARTICLE_SET_KEY).await?;

        let mut tasks = Vec::new();
        for id in ids {
            match self.get_status(&id).await {
                Ok(task) if task.user_id == Some(user_id) => tasks.push(task),
                Ok(_) => {}
                Err(PipelineError::StoreUnavailable(e)) => {
                    return Err(PipelineError::StoreUnavailable(e));
                }
                Err(e) => debug!("Skipping task {}: {}", id, e),
            }
        }

        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    /// Drop ids whose status has expired from the id set
    pub async fn prune_expired(&self) -> Result<usize> {
        let ids = self.store.members(ARTICLE_SET_KEY).await?;

        let mut removed = 0;
        for id in ids {
            if self.store.get(&status_key(&id)).await?.is_none() {
                self.store.remove_member(ARTICLE_SET_KEY, &id).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            warn!("Pruned {} expired task ids", removed);
        }
        Ok(removed)
    }

    /// Number of tasks waiting in the list
    pub async fn pending_count(&self) -> Result<usize> {
        self.store.list_len(ARTICLE_QUEUE_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueueStore;

    fn queue() -> (Arc<MemoryQueueStore>, TaskQueue) {
        let store = Arc::new(MemoryQueueStore::new());
        let queue =
            TaskQueue::new(store.clone()).with_block_timeout(Duration::from_millis(20));
        (store, queue)
    }

    #[tokio::test]
    async fn test_enqueue_makes_pending_status_readable() {
        let (_, queue) = queue();
        let mut task = TaskRecord::new(1, vec![2], Some(3));
        queue.enqueue(&mut task).await.unwrap();

        let status = queue.get_status(&task.id).await.unwrap();
        assert_eq!(status.status, TaskStatus::Pending);
        assert_eq!(status.keyword_id, 1);
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_non_pending_task() {
        let (_, queue) = queue();
        let mut task = TaskRecord::new(1, vec![], None);
        task.transition(TaskStatus::Running).unwrap();

        let err = queue.enqueue(&mut task).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_empty_id() {
        let (_, queue) = queue();
        let mut task = TaskRecord::with_id("", 1, vec![], None);
        assert!(matches!(
            queue.enqueue(&mut task).await,
            Err(PipelineError::InvalidTask(_))
        ));
    }

    #[tokio::test]
    async fn test_enqueue_rejects_known_id() {
        let (_, queue) = queue();
        let mut task = TaskRecord::with_id("job-1", 1, vec![], None);
        queue.enqueue(&mut task).await.unwrap();

        let cancel = CancellationToken::new();
        let mut running = queue.dequeue(&cancel).await.unwrap().unwrap();
        running.transition(TaskStatus::Running).unwrap();
        running.transition(TaskStatus::Completed).unwrap();
        queue.publish_status(&running).await.unwrap();

        let mut again = TaskRecord::with_id("job-1", 2, vec![], None);
        let err = queue.enqueue(&mut again).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTask(msg) if msg.contains("job-1")));

        let status = queue.get_status("job-1").await.unwrap();
        assert_eq!(status.status, TaskStatus::Completed);
        assert_eq!(status.keyword_id, 1);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_fails_when_store_down() {
        let (store, queue) = queue();
        store.set_unavailable(true);
        let mut task = TaskRecord::new(1, vec![], None);
        assert!(matches!(
            queue.enqueue(&mut task).await,
            Err(PipelineError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_dequeue_round_trip() {
        let (_, queue) = queue();
        let mut task = TaskRecord::new(5, vec![1, 2], None);
        queue.enqueue(&mut task).await.unwrap();

        let cancel = CancellationToken::new();
        let popped = queue.dequeue(&cancel).await.unwrap().unwrap();
        assert_eq!(popped, task);
    }

    #[tokio::test]
    async fn test_dequeue_returns_none_when_cancelled() {
        let (_, queue) = queue();
        let cancel = CancellationToken::new();
        let waiter = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            waiter.cancel();
        });

        assert!(queue.dequeue(&cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dequeue_malformed_payload() {
        let (store, queue) = queue();
        store.push_raw(ARTICLE_QUEUE_KEY, "{not json");

        let cancel = CancellationToken::new();
        let err = queue.dequeue(&cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::Deserialization(_)));
        // The bad payload is gone
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_status_not_found_vs_expired() {
        let (store, queue) = queue();
        assert!(matches!(
            queue.get_status("missing").await,
            Err(PipelineError::NotFound(_))
        ));

        let mut task = TaskRecord::new(1, vec![], None);
        queue.enqueue(&mut task).await.unwrap();
        store.expire(&status_key(&task.id));

        assert!(matches!(
            queue.get_status(&task.id).await,
            Err(PipelineError::Expired(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_status_overwrites() {
        let (_, queue) = queue();
        let mut task = TaskRecord::new(1, vec![], None);
        queue.enqueue(&mut task).await.unwrap();

        task.transition(TaskStatus::Running).unwrap();
        queue.publish_status(&task).await.unwrap();

        let status = queue.get_status(&task.id).await.unwrap();
        assert_eq!(status.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_list_for_owner_filters_and_skips_expired() {
        let (store, queue) = queue();
        let mut mine = TaskRecord::new(1, vec![], Some(10));
        let mut theirs = TaskRecord::new(2, vec![], Some(20));
        let mut gone = TaskRecord::new(3, vec![], Some(10));
        queue.enqueue(&mut mine).await.unwrap();
        queue.enqueue(&mut theirs).await.unwrap();
        queue.enqueue(&mut gone).await.unwrap();
        store.expire(&status_key(&gone.id));

        let listed = queue.list_for_owner(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
    }

    #[tokio::test]
    async fn test_batch_enqueue_creates_independent_tasks() {
        let (_, queue) = queue();
        let results = queue.batch_enqueue(&[7, 7, 8], &[1], Some(4)).await;

        let ids: Vec<String> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(ids.len(), 3);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(queue.pending_count().await.unwrap(), 3);
        assert_eq!(queue.list_for_owner(4).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_prune_expired_removes_only_expired_ids() {
        let (store, queue) = queue();
        let mut live = TaskRecord::new(1, vec![], None);
        let mut stale = TaskRecord::new(2, vec![], None);
        queue.enqueue(&mut live).await.unwrap();
        queue.enqueue(&mut stale).await.unwrap();
        store.expire(&status_key(&stale.id));

        assert_eq!(queue.prune_expired().await.unwrap(), 1);
        assert!(queue.get_status(&live.id).await.is_ok());
        assert!(matches!(
            queue.get_status(&stale.id).await,
            Err(PipelineError::NotFound(_))
        ));
    }
}

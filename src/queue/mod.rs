//! Durable task queue for article generation
//!
//! This module provides:
//! - TaskRecord / TaskStatus: the unit of work and its lifecycle
//! - TaskQueue: enqueue, blocking dequeue, status reads and owner listings
//! - QueueStore: the storage seam, with Redis and in-memory backends

pub mod service;
pub mod store;
pub mod task;

pub use service::{
    status_key, TaskQueue, ARTICLE_QUEUE_KEY, ARTICLE_SET_KEY, DEFAULT_BLOCK_TIMEOUT,
    STATUS_RETENTION,
};
pub use store::{AtomicAppend, MemoryQueueStore, QueueStore, RedisQueueStore};
pub use task::{generate_task_id, TaskRecord, TaskStatus};

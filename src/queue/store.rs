//! Queue store backends
//!
//! The queue needs three primitives from its store: an ordered list with a
//! blocking pop, a set for existence checks, and string keys with expiry.
//! `RedisQueueStore` is the production backend; `MemoryQueueStore` keeps the
//! same semantics in-process for tests and local runs.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

/// Keys and payload written by one atomic enqueue
#[derive(Debug, Clone, Copy)]
pub struct AtomicAppend<'a> {
    pub list_key: &'a str,
    pub set_key: &'a str,
    pub member: &'a str,
    pub status_key: &'a str,
    pub payload: &'a str,
    pub ttl: Duration,
}

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append to the list, add to the set and write the status key as one unit
    ///
    /// Nothing is written when `member` is already in the set; returns `false`
    /// in that case.
    async fn append_atomic(&self, op: AtomicAppend<'_>) -> Result<bool>;

    /// Pop the list head, waiting up to `timeout` for an item
    async fn blocking_pop(&self, list_key: &str, timeout: Duration) -> Result<Option<String>>;

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn is_member(&self, set_key: &str, member: &str) -> Result<bool>;

    async fn members(&self, set_key: &str) -> Result<Vec<String>>;

    async fn remove_member(&self, set_key: &str, member: &str) -> Result<()>;

    async fn list_len(&self, list_key: &str) -> Result<usize>;
}

// ============================================================================
// Redis
// ============================================================================

/// SADD gates the write: a known id leaves list and status key untouched
const APPEND_SCRIPT: &str = r#"
if redis.call('SADD', KEYS[2], ARGV[1]) == 0 then
    return 0
end
redis.call('RPUSH', KEYS[1], ARGV[2])
redis.call('SET', KEYS[3], ARGV[2], 'EX', ARGV[3])
return 1
"#;

fn append_script() -> &'static redis::Script {
    static SCRIPT: OnceLock<redis::Script> = OnceLock::new();
    SCRIPT.get_or_init(|| redis::Script::new(APPEND_SCRIPT))
}

/// Redis-backed queue store
pub struct RedisQueueStore {
    conn: MultiplexedConnection,
    // BLPOP holds its connection until it returns, so it gets its own
    blocking_conn: tokio::sync::Mutex<MultiplexedConnection>,
}

impl RedisQueueStore {
    /// Connect to Redis
    ///
    /// # Example
    /// ```ignore
    /// let store = RedisQueueStore::connect("redis://127.0.0.1:6379/0").await?;
    /// ```
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        let blocking_conn = client.get_multiplexed_async_connection().await?;

        Ok(Self {
            conn,
            blocking_conn: tokio::sync::Mutex::new(blocking_conn),
        })
    }

    /// Round-trip a PING to verify the connection
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn append_atomic(&self, op: AtomicAppend<'_>) -> Result<bool> {
        let mut conn = self.conn.clone();
        let appended: i64 = append_script()
            .key(op.list_key)
            .key(op.set_key)
            .key(op.status_key)
            .arg(op.member)
            .arg(op.payload)
            .arg(op.ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;

        Ok(appended == 1)
    }

    async fn blocking_pop(&self, list_key: &str, timeout: Duration) -> Result<Option<String>> {
        let mut conn = self.blocking_conn.lock().await;
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(list_key)
            .arg(timeout.as_secs().max(1))
            .query_async(&mut *conn)
            .await?;

        Ok(popped.map(|(_, payload)| payload))
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn is_member(&self, set_key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = redis::cmd("SISMEMBER")
            .arg(set_key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(exists)
    }

    async fn members(&self, set_key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(set_key)
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }

    async fn remove_member(&self, set_key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SREM")
            .arg(set_key)
            .arg(member)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_len(&self, list_key: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let len: usize = redis::cmd("LLEN").arg(list_key).query_async(&mut conn).await?;
        Ok(len)
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
struct MemoryState {
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, BTreeSet<String>>,
    values: HashMap<String, (String, Instant)>,
    unavailable: bool,
}

impl MemoryState {
    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(PipelineError::StoreUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

/// In-process queue store with the same semantics as the Redis backend
#[derive(Default)]
pub struct MemoryQueueStore {
    state: Mutex<MemoryState>,
    pushed: Notify,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict a key immediately, as if its TTL had run out
    pub fn expire(&self, key: &str) {
        self.lock().values.remove(key);
    }

    /// Push a raw payload onto a list, bypassing serialization
    pub fn push_raw(&self, list_key: &str, payload: &str) {
        self.lock()
            .lists
            .entry(list_key.to_string())
            .or_default()
            .push_back(payload.to_string());
        self.pushed.notify_waiters();
    }

    /// Simulate an outage: every operation fails with `StoreUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_pop(&self, list_key: &str) -> Result<Option<String>> {
        let mut state = self.lock();
        state.check_available()?;
        Ok(state
            .lists
            .get_mut(list_key)
            .and_then(|list| list.pop_front()))
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn append_atomic(&self, op: AtomicAppend<'_>) -> Result<bool> {
        {
            let mut state = self.lock();
            state.check_available()?;
            if state
                .sets
                .get(op.set_key)
                .is_some_and(|set| set.contains(op.member))
            {
                return Ok(false);
            }
            state
                .lists
                .entry(op.list_key.to_string())
                .or_default()
                .push_back(op.payload.to_string());
            state
                .sets
                .entry(op.set_key.to_string())
                .or_default()
                .insert(op.member.to_string());
            state.values.insert(
                op.status_key.to_string(),
                (op.payload.to_string(), Instant::now() + op.ttl),
            );
        }
        self.pushed.notify_waiters();
        Ok(true)
    }

    async fn blocking_pop(&self, list_key: &str, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so a concurrent push is not missed
            let notified = self.pushed.notified();
            if let Some(payload) = self.try_pop(list_key)? {
                return Ok(Some(payload));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                debug!("blocking pop on {} timed out", list_key);
                return Ok(None);
            }
        }
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut state = self.lock();
        state.check_available()?;
        state
            .values
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut state = self.lock();
        state.check_available()?;
        let expired = matches!(state.values.get(key), Some((_, expires_at)) if *expires_at <= Instant::now());
        if expired {
            state.values.remove(key);
        }
        Ok(state.values.get(key).map(|(value, _)| value.clone()))
    }

    async fn is_member(&self, set_key: &str, member: &str) -> Result<bool> {
        let state = self.lock();
        state.check_available()?;
        Ok(state
            .sets
            .get(set_key)
            .is_some_and(|set| set.contains(member)))
    }

    async fn members(&self, set_key: &str) -> Result<Vec<String>> {
        let state = self.lock();
        state.check_available()?;
        Ok(state
            .sets
            .get(set_key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_member(&self, set_key: &str, member: &str) -> Result<()> {
        let mut state = self.lock();
        state.check_available()?;
        if let Some(set) = state.sets.get_mut(set_key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn list_len(&self, list_key: &str) -> Result<usize> {
        let state = self.lock();
        state.check_available()?;
        Ok(state.lists.get(list_key).map_or(0, VecDeque::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn append<'a>(payload: &'a str, member: &'a str, status_key: &'a str) -> AtomicAppend<'a> {
        AtomicAppend {
            list_key: "q",
            set_key: "s",
            member,
            status_key,
            payload,
            ttl: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_memory_append_is_visible_everywhere() {
        let store = MemoryQueueStore::new();
        store.append_atomic(append("p1", "a", "task:a")).await.unwrap();

        assert!(store.is_member("s", "a").await.unwrap());
        assert_eq!(store.get("task:a").await.unwrap().as_deref(), Some("p1"));
        assert_eq!(store.list_len("q").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_append_skips_known_member() {
        let store = MemoryQueueStore::new();
        assert!(store.append_atomic(append("p1", "a", "task:a")).await.unwrap());
        assert!(!store.append_atomic(append("p2", "a", "task:a")).await.unwrap());

        assert_eq!(store.get("task:a").await.unwrap().as_deref(), Some("p1"));
        assert_eq!(store.list_len("q").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_pop_is_fifo() {
        let store = MemoryQueueStore::new();
        store.append_atomic(append("p1", "a", "task:a")).await.unwrap();
        store.append_atomic(append("p2", "b", "task:b")).await.unwrap();

        let first = store.blocking_pop("q", Duration::from_millis(10)).await.unwrap();
        let second = store.blocking_pop("q", Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.as_deref(), Some("p1"));
        assert_eq!(second.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn test_memory_pop_times_out_when_empty() {
        let store = MemoryQueueStore::new();
        let popped = store.blocking_pop("q", Duration::from_millis(20)).await.unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_memory_pop_wakes_on_push() {
        let store = Arc::new(MemoryQueueStore::new());
        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.blocking_pop("q", Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.push_raw("q", "late");

        let popped = waiter.await.unwrap().unwrap();
        assert_eq!(popped.as_deref(), Some("late"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_values_expire() {
        let store = MemoryQueueStore::new();
        store
            .set_with_expiry("k", "v", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_unavailable() {
        let store = MemoryQueueStore::new();
        store.set_unavailable(true);
        let err = store.list_len("q").await.unwrap_err();
        assert!(matches!(err, PipelineError::StoreUnavailable(_)));
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_ping() {
        dotenvy::dotenv().ok();
        let url = std::env::var("REDIS_URL").unwrap();
        let store = RedisQueueStore::connect(&url).await.unwrap();
        store.ping().await.unwrap();
    }
}

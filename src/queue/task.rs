//! Task records and their status lifecycle

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Last nanosecond stamp handed out by `generate_task_id`
static LAST_TASK_NANOS: AtomicI64 = AtomicI64::new(0);

/// Generation task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Completed and failed tasks never move again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Forward-only lifecycle: pending -> running -> {completed, failed}
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of article generation work, as stored in the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub keyword_id: i64,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl TaskRecord {
    /// Create a pending task with a generated id
    pub fn new(keyword_id: i64, category_ids: Vec<i64>, user_id: Option<i64>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_task_id(keyword_id, now),
            keyword_id,
            category_ids,
            status: TaskStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
            user_id,
        }
    }

    /// Create a pending task with a caller-supplied id
    pub fn with_id(
        id: impl Into<String>,
        keyword_id: i64,
        category_ids: Vec<i64>,
        user_id: Option<i64>,
    ) -> Self {
        let mut task = Self::new(keyword_id, category_ids, user_id);
        task.id = id.into();
        task
    }

    /// Move the task forward in its lifecycle
    pub fn transition(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark a running task as failed, recording why
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(TaskStatus::Failed)?;
        let reason = reason.into();
        self.error = Some(if reason.trim().is_empty() {
            "unknown error".to_string()
        } else {
            reason
        });
        Ok(())
    }

    /// Mark a running task as completed
    pub fn complete(&mut self) -> Result<()> {
        self.transition(TaskStatus::Completed)?;
        self.error = None;
        Ok(())
    }
}

/// Derive a task id from the keyword id and a nanosecond timestamp.
///
/// Ids handed out by one process are strictly increasing, so two tasks for the
/// same keyword created within the same clock tick still get distinct ids.
pub fn generate_task_id(keyword_id: i64, now: DateTime<Utc>) -> String {
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000));

    let previous = LAST_TASK_NANOS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(nanos.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    let stamp = nanos.max(previous + 1);

    format!("task_{}_{}", keyword_id, stamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    #[test]
    fn test_only_forward_transitions_allowed() {
        let allowed: Vec<(TaskStatus, TaskStatus)> = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();

        assert_eq!(
            allowed,
            vec![
                (TaskStatus::Pending, TaskStatus::Running),
                (TaskStatus::Running, TaskStatus::Completed),
                (TaskStatus::Running, TaskStatus::Failed),
            ]
        );
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for terminal in [TaskStatus::Completed, TaskStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_completed_task_cannot_rerun() {
        let mut task = TaskRecord::new(1, vec![], None);
        task.transition(TaskStatus::Running).unwrap();
        task.complete().unwrap();

        let err = task.transition(TaskStatus::Running).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition {
                from: TaskStatus::Completed,
                to: TaskStatus::Running
            }
        ));
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn test_failed_task_cannot_complete() {
        let mut task = TaskRecord::new(1, vec![], None);
        task.transition(TaskStatus::Running).unwrap();
        task.fail("boom").unwrap();

        assert!(task.complete().is_err());
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_fail_records_non_empty_reason() {
        let mut task = TaskRecord::new(1, vec![], None);
        task.transition(TaskStatus::Running).unwrap();
        task.fail("  ").unwrap();
        assert_eq!(task.error.as_deref(), Some("unknown error"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let now = Utc::now();
        let a = generate_task_id(7, now);
        let b = generate_task_id(7, now);
        assert_ne!(a, b);
        assert!(a.starts_with("task_7_"));
    }

    #[test]
    fn test_json_shape() {
        let task = TaskRecord::with_id("task_1", 3, vec![4, 5], Some(9));
        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value["id"], "task_1");
        assert_eq!(value["keyword_id"], 3);
        assert_eq!(value["category_ids"], serde_json::json!([4, 5]));
        assert_eq!(value["status"], "pending");
        assert_eq!(value["user_id"], 9);
        assert!(value.get("error").is_none());
    }
}

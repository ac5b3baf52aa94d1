//! Four-priority task queue and worker pool (C12).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    Normal,
    Low,
}

impl Priority {
    /// Strict dispatch order, urgent first (§4.11, §8 invariant 4).
    pub const ORDER: [Priority; 4] = [Priority::Urgent, Priority::High, Priority::Normal, Priority::Low];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub description: String,
    pub result: Option<Value>,
    pub exc_info: Option<String>,
}

struct Task {
    job_id: String,
    payload: Value,
    timeout: Duration,
}

#[derive(Default)]
struct QueueInner {
    queues: HashMap<Priority, VecDeque<Task>>,
    statuses: HashMap<String, JobStatus>,
}

/// In-process task queue: four priority lanes behind one mutex, draining
/// strictly highest-priority-first, FIFO within a lane (§4.11, §8
/// invariant 4). The job body is a plain async closure executed by a
/// caller-driven worker loop rather than a registered function pointer,
/// since this crate has no remote-execution boundary to cross.
pub struct TaskQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        let mut queues = HashMap::new();
        for p in Priority::ORDER {
            queues.insert(p, VecDeque::new());
        }
        TaskQueue { inner: Arc::new(Mutex::new(QueueInner { queues, statuses: HashMap::new() })) }
    }

    pub async fn enqueue(&self, description: impl Into<String>, payload: Value, priority: Priority, timeout: Duration) -> String {
        let job_id = Uuid::new_v4().to_string();
        let description = description.into();
        let created_at = Utc::now();
        let mut inner = self.inner.lock().await;
        inner.queues.get_mut(&priority).unwrap().push_back(Task { job_id: job_id.clone(), payload, timeout });
        inner.statuses.insert(
            job_id.clone(),
            JobStatus { job_id: job_id.clone(), state: JobState::Queued, created_at, started_at: None, ended_at: None, description, result: None, exc_info: None },
        );
        job_id
    }

    /// Pop the next dequeuable task, draining priority lanes in strict
    /// order: urgent fully before high is even peeked, etc.
    async fn pop_next(&self) -> Option<(Priority, Task)> {
        let mut inner = self.inner.lock().await;
        for p in Priority::ORDER {
            if let Some(task) = inner.queues.get_mut(&p).unwrap().pop_front() {
                return Some((p, task));
            }
        }
        None
    }

    /// Run one job to completion using `job_fn`, honoring `timeout`.
    /// Callers drive a worker loop by calling this repeatedly (§4.11, §5
    /// CPU-bound bodies run the caller's `job_fn` via `spawn_blocking`).
    pub async fn run_next<F, Fut>(&self, job_fn: F) -> Option<JobStatus>
    where
        F: FnOnce(Value) -> Fut,
        Fut: std::future::Future<Output = Result<Value, String>>,
    {
        let (_, task) = self.pop_next().await?;
        {
            let mut inner = self.inner.lock().await;
            if let Some(status) = inner.statuses.get_mut(&task.job_id) {
                status.state = JobState::Running;
                status.started_at = Some(Utc::now());
            }
        }

        let result = tokio::time::timeout(task.timeout, job_fn(task.payload)).await;

        let mut inner = self.inner.lock().await;
        let status = inner.statuses.get_mut(&task.job_id).unwrap();
        status.ended_at = Some(Utc::now());
        match result {
            Ok(Ok(value)) => {
                status.state = JobState::Succeeded;
                status.result = Some(value);
            }
            Ok(Err(message)) => {
                status.state = JobState::Failed;
                status.exc_info = Some(message);
            }
            Err(_) => {
                status.state = JobState::Failed;
                status.exc_info = Some("timeout".to_string());
            }
        }
        Some(status.clone())
    }

    pub async fn job_status(&self, job_id: &str) -> Option<JobStatus> {
        self.inner.lock().await.statuses.get(job_id).cloned()
    }

    pub async fn cancel(&self, job_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        for queue in inner.queues.values_mut() {
            queue.retain(|t| t.job_id != job_id);
        }
        if let Some(status) = inner.statuses.get_mut(job_id) {
            status.state = JobState::Cancelled;
            status.ended_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    pub async fn clear(&self, priority: Priority) {
        self.inner.lock().await.queues.get_mut(&priority).unwrap().clear();
    }

    pub async fn retry_failed(&self, job_id: &str, priority: Priority) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(status) = inner.statuses.get(job_id).cloned() else { return false };
        if status.state != JobState::Failed {
            return false;
        }
        inner.queues.get_mut(&priority).unwrap().push_back(Task { job_id: job_id.to_string(), payload: Value::Null, timeout: Duration::from_secs(30) });
        if let Some(status) = inner.statuses.get_mut(job_id) {
            status.state = JobState::Queued;
        }
        true
    }

    pub async fn failed_jobs(&self, limit: usize) -> Vec<JobStatus> {
        let inner = self.inner.lock().await;
        let mut failed: Vec<JobStatus> = inner.statuses.values().filter(|s| s.state == JobState::Failed).cloned().collect();
        failed.sort_by_key(|s| s.ended_at);
        failed.into_iter().rev().take(limit).collect()
    }

    pub async fn queue_stats(&self) -> HashMap<Priority, usize> {
        let inner = self.inner.lock().await;
        inner.queues.iter().map(|(p, q)| (*p, q.len())).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatus {
    pub batch_id: String,
    pub job_ids: Vec<String>,
    pub state: BatchState,
}

/// Aggregate member job states into one batch state by precedence:
/// failed > running > pending, with completed only when every member is
/// terminal-success (§4.11).
pub fn aggregate_batch_state(member_states: &[JobState]) -> BatchState {
    if member_states.contains(&JobState::Failed) {
        BatchState::Failed
    } else if member_states.iter().any(|s| *s == JobState::Running || *s == JobState::Queued) {
        BatchState::Running
    } else if member_states.iter().all(|s| *s == JobState::Succeeded) {
        BatchState::Completed
    } else {
        BatchState::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scenario_e_priority_dispatch_order() {
        let queue = TaskQueue::new();
        queue.enqueue("low_job_1", Value::Null, Priority::Low, Duration::from_secs(5)).await;
        queue.enqueue("normal_job_1", Value::Null, Priority::Normal, Duration::from_secs(5)).await;
        queue.enqueue("urgent_job_1", Value::Null, Priority::Urgent, Duration::from_secs(5)).await;

        let mut dequeue_order = Vec::new();
        for _ in 0..3 {
            let status = queue.run_next(|_| async { Ok(Value::Null) }).await.unwrap();
            dequeue_order.push(status.description);
        }

        assert_eq!(dequeue_order, vec!["urgent_job_1", "normal_job_1", "low_job_1"]);
    }

    #[tokio::test]
    async fn timeout_marks_job_failed() {
        let queue = TaskQueue::new();
        queue.enqueue("slow_job", Value::Null, Priority::Normal, Duration::from_millis(10)).await;
        let status = queue
            .run_next(|_| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(Value::Null)
            })
            .await
            .unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.exc_info.as_deref(), Some("timeout"));
    }

    #[test]
    fn batch_state_precedence() {
        assert_eq!(aggregate_batch_state(&[JobState::Succeeded, JobState::Failed]), BatchState::Failed);
        assert_eq!(aggregate_batch_state(&[JobState::Succeeded, JobState::Running]), BatchState::Running);
        assert_eq!(aggregate_batch_state(&[JobState::Succeeded, JobState::Succeeded]), BatchState::Completed);
    }
}

//! Generation tasks and their lifecycle
//!
//! One task per card id. Status moves `pending -> generating -> review |
//! approved`, back to `pending` on a retryable failure, or to `failed` once the
//! attempt budget is spent.

use cardforge_image::ProcessingResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Status of a generation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    /// In flight. Never persisted as-is: reloads turn it back into `Pending`.
    Generating,
    Review,
    Approved,
    Rejected,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Generating => "generating",
            TaskStatus::Review => "review",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pending" => Some(TaskStatus::Pending),
            "generating" => Some(TaskStatus::Generating),
            "review" => Some(TaskStatus::Review),
            "approved" => Some(TaskStatus::Approved),
            "rejected" => Some(TaskStatus::Rejected),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a successful generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// Model id reported by the provider
    pub model: String,
    #[serde(default)]
    pub revised_prompt: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    pub raw_image_path: PathBuf,
    /// `sha256:<hex>` of the raw image bytes
    pub content_hash: String,
    pub generated_at: DateTime<Utc>,
    /// Transform outputs, once the processing stage has run
    #[serde(default)]
    pub processed: Option<ProcessingResult>,
}

/// A tracked generation task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTask {
    /// Unique task id (UUID)
    pub id: String,
    /// Card id this task generates art for
    pub item_id: String,
    pub theme: String,
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    pub status: TaskStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub result: Option<GenerationResult>,
    /// Last failure message, only set while `status == Failed`
    #[serde(default)]
    pub error: Option<String>,
}

impl GenerationTask {
    pub fn new(
        item_id: &str,
        theme: &str,
        prompt: String,
        negative_prompt: Option<String>,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            item_id: item_id.to_string(),
            theme: theme.to_string(),
            prompt,
            negative_prompt,
            status: TaskStatus::Pending,
            attempts: 0,
            max_attempts,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    /// Whether a `run()` pass may pick this task up
    pub fn is_dispatchable(&self) -> bool {
        self.status == TaskStatus::Pending && self.attempts < self.max_attempts
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Aggregate counts over a set of tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatus {
    pub total: usize,
    pub pending: usize,
    pub generating: usize,
    pub review: usize,
    pub approved: usize,
    pub rejected: usize,
    pub failed: usize,
    /// `round((approved + review) / total * 100)`, 0 when empty
    pub percent_complete: u32,
}

impl BatchStatus {
    pub fn from_tasks<'a, I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = &'a GenerationTask>,
    {
        let mut status = BatchStatus::default();
        for task in tasks {
            status.total += 1;
            match task.status {
                TaskStatus::Pending => status.pending += 1,
                TaskStatus::Generating => status.generating += 1,
                TaskStatus::Review => status.review += 1,
                TaskStatus::Approved => status.approved += 1,
                TaskStatus::Rejected => status.rejected += 1,
                TaskStatus::Failed => status.failed += 1,
            }
        }
        if status.total > 0 {
            let done = (status.approved + status.review) as f64;
            status.percent_complete = (done / status.total as f64 * 100.0).round() as u32;
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus) -> GenerationTask {
        let mut t = GenerationTask::new("card", "fantasy", "prompt".to_string(), None, 3);
        t.status = status;
        t
    }

    #[test]
    fn test_new_task_is_pending() {
        let t = GenerationTask::new("fire-imp", "fantasy", "an imp".to_string(), None, 3);
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.attempts, 0);
        assert!(t.is_dispatchable());
        assert_eq!(t.created_at, t.updated_at);
        assert_eq!(uuid::Uuid::parse_str(&t.id).map(|u| u.get_version_num()).ok(), Some(4));
    }

    #[test]
    fn test_exhausted_task_not_dispatchable() {
        let mut t = task(TaskStatus::Pending);
        t.attempts = 3;
        assert!(!t.is_dispatchable());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Review).unwrap();
        assert_eq!(json, "\"review\"");
        assert_eq!(TaskStatus::parse("APPROVED"), Some(TaskStatus::Approved));
        assert_eq!(TaskStatus::parse("done"), None);
    }

    #[test]
    fn test_task_json_uses_camel_case() {
        let json = serde_json::to_value(task(TaskStatus::Pending)).unwrap();
        assert!(json.get("itemId").is_some());
        assert!(json.get("maxAttempts").is_some());
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_batch_status_percent() {
        let tasks = vec![
            task(TaskStatus::Approved),
            task(TaskStatus::Review),
            task(TaskStatus::Failed),
        ];
        let status = BatchStatus::from_tasks(&tasks);
        assert_eq!(status.total, 3);
        assert_eq!(status.approved, 1);
        assert_eq!(status.review, 1);
        assert_eq!(status.failed, 1);
        assert_eq!(status.percent_complete, 67);
    }

    #[test]
    fn test_batch_status_empty() {
        let status = BatchStatus::from_tasks(std::iter::empty::<&GenerationTask>());
        assert_eq!(status.total, 0);
        assert_eq!(status.percent_complete, 0);
    }
}

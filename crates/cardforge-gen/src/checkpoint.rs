//! On-disk batch checkpoint
//!
//! Stored as `<output_dir>/<theme>/batch-state.json`:
//! `{ "savedAt": "...", "tasks": [["<itemId>", { ...task }], ...] }` in
//! insertion order.

use crate::task::{GenerationTask, TaskStatus};
use cardforge_core::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CHECKPOINT_FILE: &str = "batch-state.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub saved_at: DateTime<Utc>,
    pub tasks: Vec<(String, GenerationTask)>,
}

/// Path of the checkpoint for one theme
pub fn checkpoint_path(output_dir: &Path, theme: &str) -> PathBuf {
    output_dir.join(theme).join(CHECKPOINT_FILE)
}

impl Checkpoint {
    pub fn new(tasks: Vec<(String, GenerationTask)>) -> Self {
        Self {
            saved_at: Utc::now(),
            tasks,
        }
    }

    /// Write through a sibling temp file and rename it into place, so a
    /// reader never sees a half-written checkpoint.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read a checkpoint. `Ok(None)` when no file exists.
    ///
    /// Tasks persisted mid-flight come back as `pending`.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut checkpoint: Checkpoint = serde_json::from_str(&content)?;
        for (_, task) in checkpoint.tasks.iter_mut() {
            if task.status == TaskStatus::Generating {
                task.status = TaskStatus::Pending;
            }
        }
        Ok(Some(checkpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cardforge_checkpoint_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_checkpoint_is_none() {
        let dir = temp_dir();
        assert!(Checkpoint::read(&checkpoint_path(&dir, "fantasy")).unwrap().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_read_keeps_order_and_resets_generating() {
        let dir = temp_dir();
        let path = checkpoint_path(&dir, "fantasy");

        let mut a = GenerationTask::new("a", "fantasy", "p".to_string(), Some("blurry".to_string()), 3);
        a.status = TaskStatus::Generating;
        a.attempts = 1;
        let b = GenerationTask::new("b", "fantasy", "q".to_string(), None, 3);

        Checkpoint::new(vec![("a".to_string(), a.clone()), ("b".to_string(), b)])
            .write(&path)
            .unwrap();
        let loaded = Checkpoint::read(&path).unwrap().unwrap();

        let ids: Vec<&str> = loaded.tasks.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(loaded.tasks[0].1.status, TaskStatus::Pending);
        assert_eq!(loaded.tasks[0].1.attempts, 1);
        assert_eq!(loaded.tasks[0].1.negative_prompt.as_deref(), Some("blurry"));
        assert_eq!(loaded.tasks[0].1.id, a.id);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wire_shape() {
        let task = GenerationTask::new("a", "fantasy", "p".to_string(), None, 3);
        let json = serde_json::to_value(Checkpoint::new(vec![("a".to_string(), task)])).unwrap();
        assert!(json.get("savedAt").is_some());
        assert_eq!(json["tasks"][0][0], "a");
        assert_eq!(json["tasks"][0][1]["status"], "pending");
    }

    #[test]
    fn test_rewrite_replaces_file_and_leaves_no_temp() {
        let dir = temp_dir();
        let path = checkpoint_path(&dir, "fantasy");

        let a = GenerationTask::new("a", "fantasy", "p".to_string(), None, 3);
        Checkpoint::new(vec![("a".to_string(), a.clone())]).write(&path).unwrap();
        let b = GenerationTask::new("b", "fantasy", "q".to_string(), None, 3);
        Checkpoint::new(vec![("a".to_string(), a), ("b".to_string(), b)])
            .write(&path)
            .unwrap();

        assert_eq!(Checkpoint::read(&path).unwrap().unwrap().tasks.len(), 2);
        assert!(!path.with_extension("json.tmp").exists());
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(CHECKPOINT_FILE)]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_checkpoint_errors() {
        let dir = temp_dir();
        let path = checkpoint_path(&dir, "fantasy");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Checkpoint::read(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}

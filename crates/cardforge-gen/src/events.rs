//! Batch lifecycle notifications
//!
//! The manager calls a [`BatchObserver`] synchronously from its run loop.
//! Hooks must not block; forward to a channel with [`ChannelObserver`] when
//! the consumer is slow.

use crate::task::{BatchStatus, GenerationTask};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Receives lifecycle events from a running batch. Every hook is optional.
pub trait BatchObserver: Send + Sync {
    fn on_task_started(&self, _task: &GenerationTask) {}

    fn on_task_completed(&self, _task: &GenerationTask) {}

    /// Called for both retryable and terminal failures; check `task.status`.
    fn on_task_failed(&self, _task: &GenerationTask, _error: &str) {}

    /// Called once after every chunk
    fn on_batch_progress(&self, _status: &BatchStatus) {}

    fn on_batch_complete(&self, _tasks: &[GenerationTask]) {}
}

/// Owned form of an observer callback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BatchEvent {
    TaskStarted { task: GenerationTask },
    TaskCompleted { task: GenerationTask },
    TaskFailed { task: GenerationTask, error: String },
    BatchProgress { status: BatchStatus },
    BatchComplete { tasks: Vec<GenerationTask> },
}

/// Forwards every callback as a [`BatchEvent`] over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<BatchEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: BatchEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

impl BatchObserver for ChannelObserver {
    fn on_task_started(&self, task: &GenerationTask) {
        self.send(BatchEvent::TaskStarted { task: task.clone() });
    }

    fn on_task_completed(&self, task: &GenerationTask) {
        self.send(BatchEvent::TaskCompleted { task: task.clone() });
    }

    fn on_task_failed(&self, task: &GenerationTask, error: &str) {
        self.send(BatchEvent::TaskFailed {
            task: task.clone(),
            error: error.to_string(),
        });
    }

    fn on_batch_progress(&self, status: &BatchStatus) {
        self.send(BatchEvent::BatchProgress {
            status: status.clone(),
        });
    }

    fn on_batch_complete(&self, tasks: &[GenerationTask]) {
        self.send(BatchEvent::BatchComplete {
            tasks: tasks.to_vec(),
        });
    }
}

/// Writes lifecycle events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl BatchObserver for LogObserver {
    fn on_task_started(&self, task: &GenerationTask) {
        tracing::info!(card = %task.item_id, attempt = task.attempts, "generating");
    }

    fn on_task_completed(&self, task: &GenerationTask) {
        tracing::info!(card = %task.item_id, status = %task.status, "generated");
    }

    fn on_task_failed(&self, task: &GenerationTask, error: &str) {
        tracing::warn!(
            card = %task.item_id,
            attempt = task.attempts,
            max_attempts = task.max_attempts,
            status = %task.status,
            error,
            "generation failed"
        );
    }

    fn on_batch_progress(&self, status: &BatchStatus) {
        tracing::info!(
            percent = status.percent_complete,
            pending = status.pending,
            failed = status.failed,
            total = status.total,
            "batch progress"
        );
    }

    fn on_batch_complete(&self, tasks: &[GenerationTask]) {
        tracing::info!(tasks = tasks.len(), "batch complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards_in_order() {
        let (observer, mut rx) = ChannelObserver::new();
        let task = GenerationTask::new("a", "fantasy", "p".to_string(), None, 3);

        observer.on_task_started(&task);
        observer.on_task_failed(&task, "boom");
        observer.on_batch_progress(&BatchStatus::from_tasks([&task]));

        assert!(matches!(rx.try_recv(), Ok(BatchEvent::TaskStarted { .. })));
        match rx.try_recv() {
            Ok(BatchEvent::TaskFailed { error, .. }) => assert_eq!(error, "boom"),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.try_recv() {
            Ok(BatchEvent::BatchProgress { status }) => assert_eq!(status.total, 1),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_batch_complete(&[]);
    }
}

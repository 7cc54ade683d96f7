//! Batch manager: drives card tasks through the image provider
//!
//! Tasks are dispatched in chunks of `concurrency`. Every task of a chunk runs
//! concurrently and the whole chunk is awaited before the checkpoint is written
//! and the next chunk starts. A task is dispatched at most once per `run()`;
//! tasks that fail with attempts left go back to `pending` and are picked up by
//! the next `run()`.
//!
//! The task map is only locked for short synchronous sections, never across an
//! `.await`. While a task is `generating`, its dispatch future is the only
//! writer of that entry.

use crate::checkpoint::{checkpoint_path, Checkpoint};
use crate::config::BatchConfig;
use crate::events::{BatchObserver, LogObserver};
use crate::prompt::{CardDefinition, PromptBuilder, StylePromptBuilder};
use crate::provider::{ImageProvider, ImageRequest};
use crate::task::{BatchStatus, GenerationResult, GenerationTask, TaskStatus};
use cardforge_core::{CardForgeError, ContentHash, Result};
use cardforge_image::ProcessingResult;
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable handle that asks a running batch to stop after the current chunk
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the tasks of one theme and runs them against an [`ImageProvider`]
pub struct BatchManager {
    config: BatchConfig,
    theme: String,
    provider: Arc<dyn ImageProvider>,
    prompts: Arc<dyn PromptBuilder>,
    observer: Arc<dyn BatchObserver>,
    tasks: Mutex<IndexMap<String, GenerationTask>>,
    running: AtomicBool,
    checkpoint_loaded: AtomicBool,
    stop: StopHandle,
}

impl BatchManager {
    pub fn new(config: BatchConfig, theme: &str, provider: Arc<dyn ImageProvider>) -> Self {
        Self {
            config,
            theme: theme.to_string(),
            provider,
            prompts: Arc::new(StylePromptBuilder::default()),
            observer: Arc::new(LogObserver),
            tasks: Mutex::new(IndexMap::new()),
            running: AtomicBool::new(false),
            checkpoint_loaded: AtomicBool::new(false),
            stop: StopHandle::default(),
        }
    }

    pub fn with_prompt_builder(mut self, prompts: Arc<dyn PromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Location of this theme's checkpoint file
    pub fn checkpoint_path(&self) -> PathBuf {
        checkpoint_path(&self.config.output_dir, &self.theme)
    }

    /// Create a `pending` task for every card not tracked yet.
    ///
    /// Cards whose id already has a task are skipped so their progress is kept.
    /// Returns the number of tasks created.
    pub fn add_cards(&self, items: &[CardDefinition], theme: &str) -> usize {
        let mut tasks = self.tasks.lock();
        let mut added = 0;
        for card in items {
            if tasks.contains_key(&card.id) {
                tracing::debug!(card = %card.id, "already tracked, skipping");
                continue;
            }
            let pair = self.prompts.build(card, theme);
            let task = GenerationTask::new(
                &card.id,
                theme,
                pair.prompt,
                pair.negative_prompt,
                self.config.max_attempts,
            );
            tasks.insert(card.id.clone(), task);
            added += 1;
        }
        tracing::info!(added, total = tasks.len(), theme, "cards added");
        added
    }

    /// Dispatch every dispatchable task once, chunk by chunk, until nothing is
    /// left or [`BatchManager::stop`] is called.
    ///
    /// The first run of a manager merges the on-disk checkpoint into memory.
    pub async fn run(&self) -> Result<BatchStatus> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CardForgeError::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);
        self.stop.reset();

        if !self.checkpoint_loaded.load(Ordering::SeqCst) {
            self.load_state();
        }
        self.reset_in_flight();

        let concurrency = self.config.concurrency.max(1);
        let mut dispatched: HashSet<String> = HashSet::new();
        let mut chunks = 0usize;

        tracing::info!(theme = %self.theme, concurrency, provider = self.provider.name(), "batch run started");

        loop {
            if self.stop.is_stopped() {
                tracing::info!(chunks, "stop requested, ending run");
                break;
            }

            let chunk: Vec<String> = {
                let tasks = self.tasks.lock();
                tasks
                    .iter()
                    .filter(|(id, task)| task.is_dispatchable() && !dispatched.contains(*id))
                    .take(concurrency)
                    .map(|(id, _)| id.clone())
                    .collect()
            };
            if chunk.is_empty() {
                break;
            }
            dispatched.extend(chunk.iter().cloned());
            chunks += 1;
            tracing::debug!(chunk = chunks, size = chunk.len(), "dispatching chunk");

            futures::future::join_all(chunk.iter().map(|id| self.dispatch(id))).await;

            let checkpoint = self.snapshot();
            let path = self.checkpoint_path();
            match tokio::task::spawn_blocking(move || checkpoint.write(&path)).await {
                Ok(Ok(())) => tracing::debug!(chunk = chunks, "checkpoint written"),
                Ok(Err(e)) => tracing::warn!(error = %e, "failed to write checkpoint"),
                Err(e) => tracing::warn!(error = %e, "checkpoint writer panicked"),
            }
            self.observer.on_batch_progress(&self.get_status());
        }

        let status = self.get_status();
        tracing::info!(
            chunks,
            review = status.review,
            approved = status.approved,
            pending = status.pending,
            failed = status.failed,
            "batch run finished"
        );
        self.observer.on_batch_complete(&self.tasks());
        Ok(status)
    }

    /// Ask a running batch to stop once the current chunk has finished
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn get_status(&self) -> BatchStatus {
        BatchStatus::from_tasks(self.tasks.lock().values())
    }

    /// Snapshot of every task in insertion order
    pub fn tasks(&self) -> Vec<GenerationTask> {
        self.tasks.lock().values().cloned().collect()
    }

    pub fn get_task(&self, item_id: &str) -> Option<GenerationTask> {
        self.tasks.lock().get(item_id).cloned()
    }

    /// Reset every `failed` task, and every `pending` task whose attempt
    /// budget is spent, to `pending` with a fresh budget.
    /// Returns how many tasks were reset.
    pub fn retry_failed(&self) -> usize {
        let mut tasks = self.tasks.lock();
        let mut reset = 0;
        let stuck = |t: &GenerationTask| {
            t.status == TaskStatus::Failed
                || (t.status == TaskStatus::Pending && t.attempts >= t.max_attempts)
        };
        for task in tasks.values_mut().filter(|t| stuck(t)) {
            task.status = TaskStatus::Pending;
            task.attempts = 0;
            task.error = None;
            task.touch();
            reset += 1;
        }
        tracing::info!(reset, "failed tasks reset");
        reset
    }

    /// Write every task to the checkpoint file
    pub fn save_state(&self) -> Result<()> {
        let path = self.checkpoint_path();
        self.snapshot().write(&path)?;
        tracing::debug!(path = %path.display(), "checkpoint written");
        Ok(())
    }

    fn snapshot(&self) -> Checkpoint {
        let entries: Vec<(String, GenerationTask)> = self
            .tasks
            .lock()
            .iter()
            .map(|(id, task)| (id.clone(), task.clone()))
            .collect();
        Checkpoint::new(entries)
    }

    /// Merge the checkpoint file into memory.
    ///
    /// Persisted tasks replace in-memory tasks with the same id; tasks only
    /// known in memory are kept after them. Returns `false` when there is no
    /// usable checkpoint. A corrupt or unreadable file is logged, not returned.
    pub fn load_state(&self) -> bool {
        self.checkpoint_loaded.store(true, Ordering::SeqCst);
        let path = self.checkpoint_path();
        let checkpoint = match Checkpoint::read(&path) {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => {
                tracing::debug!(path = %path.display(), "no checkpoint");
                return false;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable checkpoint");
                return false;
            }
        };

        let mut tasks = self.tasks.lock();
        let mut merged: IndexMap<String, GenerationTask> = checkpoint.tasks.into_iter().collect();
        for (id, task) in tasks.drain(..) {
            merged.entry(id).or_insert(task);
        }
        *tasks = merged;
        tracing::info!(
            path = %path.display(),
            tasks = tasks.len(),
            saved_at = %checkpoint.saved_at,
            "checkpoint loaded"
        );
        true
    }

    /// Override a task's status (used by review tooling).
    ///
    /// Moving a task back to `pending` gives it a fresh attempt budget so the
    /// next `run()` picks it up.
    pub fn update_task_status(&self, item_id: &str, status: TaskStatus) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(item_id)
            .ok_or_else(|| CardForgeError::TaskNotFound(item_id.to_string()))?;
        if status == TaskStatus::Pending && task.status != TaskStatus::Pending {
            task.attempts = 0;
            task.error = None;
        }
        task.status = status;
        task.touch();
        Ok(())
    }

    /// Record the transform outputs of a generated task
    pub fn attach_processed(&self, item_id: &str, processed: ProcessingResult) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(item_id)
            .ok_or_else(|| CardForgeError::TaskNotFound(item_id.to_string()))?;
        let result = task
            .result
            .as_mut()
            .ok_or_else(|| CardForgeError::NotGenerated(item_id.to_string()))?;
        result.processed = Some(processed);
        task.touch();
        Ok(())
    }

    /// Drop every task and delete the checkpoint file
    pub fn clear_state(&self) -> Result<()> {
        self.tasks.lock().clear();
        let path = self.checkpoint_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(path = %path.display(), "batch state cleared");
        Ok(())
    }

    fn reset_in_flight(&self) {
        let mut tasks = self.tasks.lock();
        for task in tasks.values_mut().filter(|t| t.status == TaskStatus::Generating) {
            task.status = TaskStatus::Pending;
            task.touch();
        }
    }

    #[tracing::instrument(skip(self), fields(theme = %self.theme))]
    async fn dispatch(&self, item_id: &str) {
        let (started, request) = {
            let mut tasks = self.tasks.lock();
            let Some(task) = tasks.get_mut(item_id) else {
                return;
            };
            if task.status != TaskStatus::Pending {
                tracing::warn!(card = %item_id, status = %task.status, "status changed before dispatch, skipping");
                return;
            }
            task.status = TaskStatus::Generating;
            task.attempts += 1;
            task.touch();
            let request = ImageRequest::new(&task.prompt, task.negative_prompt.as_deref(), item_id);
            (task.clone(), request)
        };
        self.observer.on_task_started(&started);

        let outcome = self.generate(&request, &started.theme).await;

        let (finished, error) = {
            let mut tasks = self.tasks.lock();
            let Some(task) = tasks.get_mut(item_id) else {
                return;
            };
            if task.status != TaskStatus::Generating {
                tracing::warn!(
                    card = %item_id,
                    status = %task.status,
                    "status overridden while generating, discarding outcome"
                );
                return;
            }
            let error = match outcome {
                Ok(result) => {
                    task.status = if self.config.review_mode {
                        TaskStatus::Review
                    } else {
                        TaskStatus::Approved
                    };
                    task.result = Some(result);
                    task.error = None;
                    None
                }
                Err(e) => {
                    let message = e.to_string();
                    if task.attempts >= task.max_attempts {
                        task.status = TaskStatus::Failed;
                        task.error = Some(message.clone());
                    } else {
                        task.status = TaskStatus::Pending;
                        task.error = None;
                    }
                    Some(message)
                }
            };
            task.touch();
            (task.clone(), error)
        };

        match error {
            None => self.observer.on_task_completed(&finished),
            Some(message) => {
                if finished.status == TaskStatus::Failed {
                    tracing::error!(card = %item_id, attempts = finished.attempts, error = %message, "task failed permanently");
                }
                self.observer.on_task_failed(&finished, &message);
            }
        }
    }

    async fn generate(&self, request: &ImageRequest, theme: &str) -> Result<GenerationResult> {
        let call = self.provider.generate(request);
        let image = match self.config.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| CardForgeError::Timeout(limit))??,
            None => call.await?,
        };

        let raw_dir = self.config.output_dir.join(theme).join("raw");
        tokio::fs::create_dir_all(&raw_dir).await?;
        let raw_image_path = raw_dir.join(format!("{}.{}", request.file_stem, image.extension));
        tokio::fs::write(&raw_image_path, &image.bytes).await?;
        tracing::debug!(path = %raw_image_path.display(), bytes = image.bytes.len(), "raw image written");

        Ok(GenerationResult {
            model: image.model,
            revised_prompt: image.revised_prompt,
            seed: image.seed,
            raw_image_path,
            content_hash: ContentHash::from_bytes(&image.bytes).to_prefixed_hex(),
            generated_at: Utc::now(),
            processed: None,
        })
    }
}

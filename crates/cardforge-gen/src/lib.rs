//! CardForge Gen - batch generation of card artwork
//!
//! Turns card definitions into generation tasks, runs them against a pluggable
//! image provider under a concurrency bound, and checkpoints progress so an
//! interrupted batch can be resumed. Retries are bounded per task and a failed
//! card never stops the rest of the batch.

pub mod checkpoint;
pub mod config;
pub mod events;
pub mod manager;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod style;
pub mod task;

pub use config::{BatchConfig, CardForgeConfig, ProcessingConfig};
pub use events::{BatchEvent, BatchObserver, ChannelObserver, LogObserver};
pub use manager::{BatchManager, StopHandle};
pub use prompt::{CardDefinition, PromptBuilder, PromptPair, StylePromptBuilder};
pub use provider::{GeneratedImage, ImageProvider, ImageRequest};
pub use style::ThemeStyle;
pub use task::{BatchStatus, GenerationResult, GenerationTask, TaskStatus};

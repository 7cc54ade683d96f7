//! Batch generation, review and processing commands

use anyhow::{bail, Context, Result};
use cardforge_core::ContentHash;
use cardforge_gen::providers::{create_provider, mock::MockProvider};
use cardforge_gen::{
    BatchManager, BatchStatus, CardDefinition, CardForgeConfig, StylePromptBuilder, TaskStatus,
    ThemeStyle,
};
use cardforge_image::{ImageProcessor, OutputFormat, ProcessItem};
use clap::Args;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args)]
pub struct GenerateArgs {
    /// Card definitions (JSON array, or TOML with [[cards]] tables)
    #[arg(long)]
    pub cards: PathBuf,

    /// Theme name; also the output subdirectory
    #[arg(long)]
    pub theme: String,

    /// Provider to use (defaults to config, then "mock")
    #[arg(long)]
    pub provider: Option<String>,

    /// Theme style name (styles/<name>.style.toml)
    #[arg(long)]
    pub style: Option<String>,

    /// Cards generated at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Attempts per card before it is marked failed
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Root directory for raw images and checkpoints
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Approve generated art directly instead of queueing it for review
    #[arg(long)]
    pub no_review: bool,
}

#[derive(Args)]
pub struct RetryArgs {
    #[arg(long)]
    pub theme: String,

    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Only reset failed tasks, do not run the batch
    #[arg(long)]
    pub no_run: bool,
}

#[derive(Args)]
pub struct ProcessArgs {
    #[arg(long)]
    pub theme: String,

    /// Card definitions, used to pick frames by rarity
    #[arg(long)]
    pub cards: Option<PathBuf>,

    #[arg(long)]
    pub processed_dir: Option<PathBuf>,

    #[arg(long)]
    pub frames_dir: Option<PathBuf>,

    /// Output format (png, jpeg, webp)
    #[arg(long)]
    pub format: Option<String>,

    /// Skip frame compositing
    #[arg(long)]
    pub no_frame: bool,

    /// Also process cards still waiting for review
    #[arg(long)]
    pub include_review: bool,
}

#[derive(Deserialize)]
struct CardsFile {
    cards: Vec<CardDefinition>,
}

/// Parse a status accepted by the `review` command
pub fn parse_review_status(s: &str) -> Result<TaskStatus, String> {
    match TaskStatus::parse(s) {
        Some(status @ (TaskStatus::Approved | TaskStatus::Rejected | TaskStatus::Review | TaskStatus::Pending)) => {
            Ok(status)
        }
        _ => Err(format!(
            "invalid status '{}'; valid values: approved, rejected, review, pending",
            s
        )),
    }
}

fn load_cards(path: &Path) -> Result<Vec<CardDefinition>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read card file {}", path.display()))?;
    let cards = if path.extension().and_then(|e| e.to_str()) == Some("toml") {
        toml::from_str::<CardsFile>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
            .cards
    } else {
        serde_json::from_str::<Vec<CardDefinition>>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    };
    Ok(cards)
}

/// Manager for commands that only read or edit the checkpoint. It is never
/// run, so the configured provider and style are not resolved.
fn state_manager(config: &CardForgeConfig, theme: &str) -> BatchManager {
    BatchManager::new(config.batch.clone(), theme, Arc::new(MockProvider::new()))
}

fn generation_manager(config: &CardForgeConfig, theme: &str) -> Result<BatchManager> {
    let batch = config.batch.clone();
    let provider = create_provider(&batch.provider)?;

    let style = match batch.style.as_deref() {
        Some(name) => Some(ThemeStyle::find(name)?),
        None => None,
    };
    if let Some(ref s) = style {
        tracing::info!(style = %s.name, "using theme style");
    }

    Ok(BatchManager::new(batch, theme, provider)
        .with_prompt_builder(Arc::new(StylePromptBuilder::new(style))))
}

fn run_batch(manager: &BatchManager) -> Result<BatchStatus> {
    let runtime = tokio::runtime::Runtime::new()?;
    let status = runtime.block_on(async {
        let handle = manager.stop_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current chunk");
                handle.stop();
            }
        });
        manager.run().await
    })?;
    Ok(status)
}

fn print_status(theme: &str, status: &BatchStatus) {
    println!("Theme '{}': {} task(s), {}% complete", theme, status.total, status.percent_complete);
    println!("  Pending:  {}", status.pending);
    println!("  Review:   {}", status.review);
    println!("  Approved: {}", status.approved);
    println!("  Rejected: {}", status.rejected);
    println!("  Failed:   {}", status.failed);
}

pub fn generate(args: GenerateArgs) -> Result<()> {
    let mut config = CardForgeConfig::load()?;
    if let Some(provider) = args.provider {
        config.batch.provider = provider;
    }
    if let Some(style) = args.style {
        config.batch.style = Some(style);
    }
    if let Some(concurrency) = args.concurrency {
        config.batch.concurrency = concurrency.max(1);
    }
    if let Some(max_attempts) = args.max_attempts {
        config.batch.max_attempts = max_attempts.max(1);
    }
    if let Some(output_dir) = args.output_dir {
        config.batch.output_dir = output_dir;
    }
    if args.no_review {
        config.batch.review_mode = false;
    }

    let cards = load_cards(&args.cards)?;
    let manager = generation_manager(&config, &args.theme)?;
    manager.load_state();
    let added = manager.add_cards(&cards, &args.theme);
    println!(
        "Generating '{}' with provider '{}' ({} new card(s), concurrency {})",
        args.theme, config.batch.provider, added, config.batch.concurrency
    );

    let status = run_batch(&manager)?;
    print_status(&args.theme, &status);
    println!("  Checkpoint: {}", manager.checkpoint_path().display());
    Ok(())
}

pub fn status(theme: &str, format: &str) -> Result<()> {
    let config = CardForgeConfig::load()?;
    let manager = state_manager(&config, theme);
    if !manager.load_state() {
        println!("No batch found for theme '{}'.", theme);
        return Ok(());
    }

    if format == "json" {
        let out = serde_json::json!({
            "status": manager.get_status(),
            "tasks": manager.tasks(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_status(theme, &manager.get_status());
    let failed: Vec<_> = manager
        .tasks()
        .into_iter()
        .filter(|t| t.status == TaskStatus::Failed)
        .collect();
    if !failed.is_empty() {
        println!("\nFailed:");
        for task in failed {
            println!(
                "  {} ({} attempt(s)): {}",
                task.item_id,
                task.attempts,
                task.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    Ok(())
}

pub fn retry(args: RetryArgs) -> Result<()> {
    let mut config = CardForgeConfig::load()?;
    if let Some(provider) = args.provider {
        config.batch.provider = provider;
    }
    if let Some(concurrency) = args.concurrency {
        config.batch.concurrency = concurrency.max(1);
    }

    let manager = generation_manager(&config, &args.theme)?;
    if !manager.load_state() {
        bail!("No batch found for theme '{}'", args.theme);
    }
    let reset = manager.retry_failed();
    manager.save_state()?;
    println!("Reset {} failed task(s).", reset);

    if args.no_run || reset == 0 {
        return Ok(());
    }
    let status = run_batch(&manager)?;
    print_status(&args.theme, &status);
    Ok(())
}

pub fn review(theme: &str, card: &str, status: TaskStatus) -> Result<()> {
    let config = CardForgeConfig::load()?;
    let manager = state_manager(&config, theme);
    if !manager.load_state() {
        bail!("No batch found for theme '{}'", theme);
    }
    manager.update_task_status(card, status)?;
    manager.save_state()?;
    println!("Card '{}' marked {}.", card, status);
    Ok(())
}

pub fn clear(theme: &str) -> Result<()> {
    let config = CardForgeConfig::load()?;
    let manager = state_manager(&config, theme);
    manager.clear_state()?;
    println!("Cleared batch state for theme '{}'.", theme);
    Ok(())
}

pub fn process(args: ProcessArgs) -> Result<()> {
    let mut config = CardForgeConfig::load()?;
    let processing = &mut config.processing;
    if let Some(dir) = args.processed_dir {
        processing.processed_dir = dir;
    }
    if let Some(dir) = args.frames_dir {
        processing.frames_dir = Some(dir);
    }
    if let Some(name) = args.format.as_deref() {
        processing.output.format = OutputFormat::parse(name)
            .with_context(|| format!("Unknown output format '{}'. Available: png, jpeg, webp", name))?;
    }
    if args.no_frame {
        processing.output.with_frame = false;
    }

    let rarities: HashMap<String, String> = match args.cards.as_deref() {
        Some(path) => load_cards(path)?
            .into_iter()
            .filter_map(|c| c.rarity.map(|r| (c.id, r)))
            .collect(),
        None => HashMap::new(),
    };

    let manager = state_manager(&config, &args.theme);
    if !manager.load_state() {
        bail!("No batch found for theme '{}'", args.theme);
    }

    let items: Vec<ProcessItem> = manager
        .tasks()
        .into_iter()
        .filter(|t| {
            t.status == TaskStatus::Approved || (args.include_review && t.status == TaskStatus::Review)
        })
        .filter_map(|t| {
            let result = t.result?;
            match ContentHash::from_file(&result.raw_image_path) {
                Ok(hash) if ContentHash::from_prefixed_hex(&result.content_hash) == Some(hash) => {}
                Ok(_) => tracing::warn!(card = %t.item_id, "raw image changed since generation"),
                Err(e) => {
                    tracing::warn!(card = %t.item_id, error = %e, "raw image unreadable, skipping");
                    return None;
                }
            }
            Some(ProcessItem {
                rarity: rarities.get(&t.item_id).cloned(),
                input_path: result.raw_image_path,
                id: t.item_id,
            })
        })
        .collect();
    if items.is_empty() {
        println!("Nothing to process for theme '{}'.", args.theme);
        return Ok(());
    }

    let processing = &config.processing;
    let mut processor = ImageProcessor::new(processing.output.clone());
    if let Some(ref dir) = processing.frames_dir {
        processor = processor.with_frames_dir(dir);
    }

    println!(
        "Processing {} card(s) into {}",
        items.len(),
        processing.processed_dir.display()
    );
    let results = processor.process_batch(&items, &processing.processed_dir, |done, total| {
        println!("  [{}/{}]", done, total);
    });

    for result in &results {
        manager.attach_processed(&result.card_id, result.clone())?;
    }
    manager.save_state()?;

    println!(
        "Processed {} of {} card(s) ({} frame template(s) loaded)",
        results.len(),
        items.len(),
        processor.frame_template_loads()
    );
    Ok(())
}

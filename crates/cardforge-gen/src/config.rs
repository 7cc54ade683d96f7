//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `CARDFORGE_CONCURRENCY`, `CARDFORGE_MAX_ATTEMPTS`,
//!    `CARDFORGE_OUTPUT_DIR`, `CARDFORGE_PROVIDER`
//! 2. Project-local: `.cardforge/config.toml`
//! 3. Global: `~/.cardforge/config.toml`

use cardforge_core::{CardForgeError, Result};
use cardforge_image::{OutputFormat, OutputSpec, TargetSize};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Orchestrator settings as written in a config file. Unset keys fall through
/// to the next layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSection {
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub review_mode: Option<bool>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub call_timeout_secs: Option<u64>,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SizeSection {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Transform settings as written in a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingSection {
    #[serde(default)]
    pub processed_dir: Option<PathBuf>,
    #[serde(default)]
    pub frames_dir: Option<PathBuf>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub quality: Option<u8>,
    #[serde(default)]
    pub with_frame: Option<bool>,
    #[serde(default)]
    pub small: SizeSection,
    #[serde(default)]
    pub medium: SizeSection,
    #[serde(default)]
    pub large: SizeSection,
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardForgeConfigFile {
    #[serde(default)]
    pub batch: BatchSection,
    #[serde(default)]
    pub processing: ProcessingSection,
}

/// Resolved orchestrator settings
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub review_mode: bool,
    pub output_dir: PathBuf,
    pub provider: String,
    pub call_timeout: Option<Duration>,
    pub style: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_attempts: 3,
            review_mode: true,
            output_dir: PathBuf::from("generated"),
            provider: "mock".to_string(),
            call_timeout: None,
            style: None,
        }
    }
}

/// Resolved transform settings
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub processed_dir: PathBuf,
    pub frames_dir: Option<PathBuf>,
    pub output: OutputSpec,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            processed_dir: PathBuf::from("processed"),
            frames_dir: None,
            output: OutputSpec::default(),
        }
    }
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default)]
pub struct CardForgeConfig {
    pub batch: BatchConfig,
    pub processing: ProcessingConfig,
}

impl CardForgeConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = CardForgeConfigFile::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        let local_path = PathBuf::from(".cardforge/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        Self::apply_env_overrides(&mut config)?;
        Self::resolve(config)
    }

    /// Load config from a specific file path only (for testing)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config)?;
        Self::resolve(config)
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".cardforge").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<CardForgeConfigFile> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            CardForgeError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    fn merge_into(base: &mut CardForgeConfigFile, overlay: CardForgeConfigFile) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        let b = &mut base.batch;
        let o = overlay.batch;
        take(&mut b.concurrency, o.concurrency);
        take(&mut b.max_attempts, o.max_attempts);
        take(&mut b.review_mode, o.review_mode);
        take(&mut b.output_dir, o.output_dir);
        take(&mut b.provider, o.provider);
        take(&mut b.call_timeout_secs, o.call_timeout_secs);
        take(&mut b.style, o.style);

        let p = &mut base.processing;
        let o = overlay.processing;
        take(&mut p.processed_dir, o.processed_dir);
        take(&mut p.frames_dir, o.frames_dir);
        take(&mut p.format, o.format);
        take(&mut p.quality, o.quality);
        take(&mut p.with_frame, o.with_frame);
        for (slot, value) in [
            (&mut p.small, o.small),
            (&mut p.medium, o.medium),
            (&mut p.large, o.large),
        ] {
            take(&mut slot.width, value.width);
            take(&mut slot.height, value.height);
        }
    }

    fn apply_env_overrides(config: &mut CardForgeConfigFile) -> Result<()> {
        if let Ok(value) = std::env::var("CARDFORGE_CONCURRENCY") {
            config.batch.concurrency = Some(parse_env("CARDFORGE_CONCURRENCY", &value)?);
        }
        if let Ok(value) = std::env::var("CARDFORGE_MAX_ATTEMPTS") {
            config.batch.max_attempts = Some(parse_env("CARDFORGE_MAX_ATTEMPTS", &value)?);
        }
        if let Ok(value) = std::env::var("CARDFORGE_OUTPUT_DIR") {
            config.batch.output_dir = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var("CARDFORGE_PROVIDER") {
            config.batch.provider = Some(value);
        }
        Ok(())
    }

    fn resolve(file: CardForgeConfigFile) -> Result<Self> {
        let defaults = BatchConfig::default();
        let b = file.batch;
        let batch = BatchConfig {
            concurrency: b.concurrency.unwrap_or(defaults.concurrency),
            max_attempts: b.max_attempts.unwrap_or(defaults.max_attempts),
            review_mode: b.review_mode.unwrap_or(defaults.review_mode),
            output_dir: b.output_dir.unwrap_or(defaults.output_dir),
            provider: b.provider.unwrap_or(defaults.provider),
            call_timeout: b.call_timeout_secs.map(Duration::from_secs),
            style: b.style,
        };
        if batch.concurrency == 0 {
            return Err(CardForgeError::ConfigError("concurrency must be at least 1".to_string()));
        }
        if batch.max_attempts == 0 {
            return Err(CardForgeError::ConfigError("max_attempts must be at least 1".to_string()));
        }

        let spec = OutputSpec::default();
        let p = file.processing;
        let format = match p.format {
            Some(name) => OutputFormat::parse(&name).ok_or_else(|| {
                CardForgeError::ConfigError(format!(
                    "Unknown output format '{}'. Available: png, jpeg, webp",
                    name
                ))
            })?,
            None => spec.format,
        };
        let output = OutputSpec {
            small: resolve_size(p.small, spec.small)?,
            medium: resolve_size(p.medium, spec.medium)?,
            large: resolve_size(p.large, spec.large)?,
            format,
            quality: p.quality.unwrap_or(spec.quality),
            with_frame: p.with_frame.unwrap_or(spec.with_frame),
        };

        Ok(CardForgeConfig {
            batch,
            processing: ProcessingConfig {
                processed_dir: p.processed_dir.unwrap_or_else(|| PathBuf::from("processed")),
                frames_dir: p.frames_dir,
                output,
            },
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CardForgeError::ConfigError(format!("Invalid value for {}: '{}'", key, value)))
}

fn resolve_size(section: SizeSection, default: TargetSize) -> Result<TargetSize> {
    let size = TargetSize::new(
        section.width.unwrap_or(default.width),
        section.height.unwrap_or(default.height),
    );
    if size.width == 0 || size.height == 0 {
        return Err(CardForgeError::ConfigError(format!(
            "Output size {}x{} must be non-zero",
            size.width, size.height
        )));
    }
    Ok(size)
}
